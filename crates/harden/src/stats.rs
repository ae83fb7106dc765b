//! Transformation statistics.
//!
//! Every strategy increments its named counters; the module driver prints
//! the aggregate once per run. Purely observational, and not synchronized:
//! a stats value belongs to one pass invocation.

use std::fmt;

/// Counters accumulated across all functions of a module run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransformStats {
    pub branches_hardened: u64,
    pub loads_hardened: u64,
    pub stores_hardened: u64,
    pub arithmetic_hardened: u64,

    pub indirect_calls_hardened: u64,
    pub critical_variables_protected: u64,
    pub bounds_checks_added: u64,
    pub return_addresses_protected: u64,
    pub exception_paths_hardened: u64,
    pub hardware_io_validated: u64,
    pub fault_logs_added: u64,
    pub timing_mitigations_added: u64,

    pub phi_nodes_verified: u64,
    pub tmr_applications: u64,
    pub temporaries_protected: u64,
    pub functions_fully_covered: u64,

    pub verification_calls_added: u64,
    pub instructions_duplicated: u64,
    pub basic_blocks_split: u64,
}

impl TransformStats {
    /// Total number of strategy applications (one per hardened site).
    pub fn total_transformations(&self) -> u64 {
        self.branches_hardened
            + self.loads_hardened
            + self.stores_hardened
            + self.arithmetic_hardened
            + self.indirect_calls_hardened
            + self.critical_variables_protected
            + self.bounds_checks_added
            + self.return_addresses_protected
            + self.exception_paths_hardened
            + self.hardware_io_validated
            + self.timing_mitigations_added
            + self.phi_nodes_verified
            + self.tmr_applications
            + self.temporaries_protected
    }
}

impl fmt::Display for TransformStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "========================================")?;
        writeln!(f, "FI Hardening Transformation Statistics")?;
        writeln!(f, "========================================")?;
        writeln!(f, "Basic hardening:")?;
        writeln!(f, "  Branches hardened:          {}", self.branches_hardened)?;
        writeln!(f, "  Loads hardened:             {}", self.loads_hardened)?;
        writeln!(f, "  Stores hardened:            {}", self.stores_hardened)?;
        writeln!(f, "  Arithmetic ops hardened:    {}", self.arithmetic_hardened)?;
        writeln!(f)?;
        writeln!(f, "Advanced hardening:")?;
        writeln!(f, "  Indirect calls hardened:    {}", self.indirect_calls_hardened)?;
        writeln!(
            f,
            "  Critical vars protected:    {}",
            self.critical_variables_protected
        )?;
        writeln!(f, "  Bounds checks added:        {}", self.bounds_checks_added)?;
        writeln!(
            f,
            "  Return addrs protected:     {}",
            self.return_addresses_protected
        )?;
        writeln!(
            f,
            "  Exception paths hardened:   {}",
            self.exception_paths_hardened
        )?;
        writeln!(f, "  Hardware I/O validated:     {}", self.hardware_io_validated)?;
        writeln!(f, "  Fault logs added:           {}", self.fault_logs_added)?;
        writeln!(
            f,
            "  Timing mitigations:         {}",
            self.timing_mitigations_added
        )?;
        writeln!(f)?;
        writeln!(f, "Whole-function coverage:")?;
        writeln!(f, "  Phi nodes verified:         {}", self.phi_nodes_verified)?;
        writeln!(f, "  TMR applications:           {}", self.tmr_applications)?;
        writeln!(f, "  Temporaries protected:      {}", self.temporaries_protected)?;
        writeln!(f, "  Functions fully covered:    {}", self.functions_fully_covered)?;
        writeln!(f)?;
        writeln!(f, "Instrumentation:")?;
        writeln!(
            f,
            "  Verification calls added:   {}",
            self.verification_calls_added
        )?;
        writeln!(
            f,
            "  Instructions duplicated:    {}",
            self.instructions_duplicated
        )?;
        writeln!(f, "  Basic blocks split:         {}", self.basic_blocks_split)?;
        writeln!(f, "========================================")?;
        writeln!(f, "Total transformations:      {}", self.total_transformations())?;
        writeln!(f, "========================================")
    }
}
