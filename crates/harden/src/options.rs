//! Hardening policy: the level knob plus per-strategy toggles.
//!
//! The level is not a set of additive flags; it gates specific behaviors
//! (checksum updates, triple loads, TMR, temporary coverage density) while
//! the boolean toggles select which strategy families run at all.

use crate::error::HardenError;

/// Hardening aggressiveness, 0–3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HardenLevel {
    /// Minimal: only critical-path instructions.
    Minimal = 0,
    /// Moderate coverage.
    Moderate = 1,
    /// Aggressive: checksums on stores, whole-function coverage scan.
    Aggressive = 2,
    /// Maximum: triple loads, TMR execution, full temporary coverage.
    Maximum = 3,
}

impl HardenLevel {
    pub fn from_raw(raw: u32) -> Result<HardenLevel, HardenError> {
        match raw {
            0 => Ok(HardenLevel::Minimal),
            1 => Ok(HardenLevel::Moderate),
            2 => Ok(HardenLevel::Aggressive),
            3 => Ok(HardenLevel::Maximum),
            other => Err(HardenError::InvalidLevel(other)),
        }
    }
}

/// Configuration of one transformation run.
#[derive(Debug, Clone)]
pub struct HardenOptions {
    pub level: HardenLevel,
    pub branches: bool,
    pub memory: bool,
    /// Off by default due to overhead.
    pub arithmetic: bool,
    pub cfi: bool,
    pub data_redundancy: bool,
    pub memory_safety: bool,
    pub stack: bool,
    pub exceptions: bool,
    pub hardware_io: bool,
    pub logging: bool,
    pub timing: bool,
    pub show_stats: bool,
    pub verify_ir: bool,
}

impl Default for HardenOptions {
    fn default() -> Self {
        HardenOptions {
            level: HardenLevel::Maximum,
            branches: true,
            memory: true,
            arithmetic: false,
            cfi: true,
            data_redundancy: true,
            memory_safety: true,
            stack: true,
            exceptions: false,
            hardware_io: false,
            logging: true,
            timing: false,
            show_stats: false,
            verify_ir: true,
        }
    }
}

impl HardenOptions {
    /// Stores also update a region checksum at level ≥ 2.
    pub fn checksum_on_stores(&self) -> bool {
        self.level >= HardenLevel::Aggressive
    }

    /// Loads get a third copy (weak 2-of-3) at the highest level.
    pub fn triple_load(&self) -> bool {
        self.level >= HardenLevel::Maximum
    }

    /// Plain arithmetic duplication requires the toggle and level ≥ 2.
    pub fn arithmetic_duplication(&self) -> bool {
        self.arithmetic && self.level >= HardenLevel::Aggressive
    }

    /// Whole-function strategies (phi, TMR scan, temporaries) run at
    /// level ≥ 2.
    pub fn comprehensive(&self) -> bool {
        self.level >= HardenLevel::Aggressive
    }

    /// TMR voting executes only at the highest level.
    pub fn tmr(&self) -> bool {
        self.level >= HardenLevel::Maximum
    }

    /// Every how-many-th temporary gets protected: all of them at level 3,
    /// every second one at level 2.
    pub fn temporary_stride(&self) -> usize {
        if self.level >= HardenLevel::Maximum {
            1
        } else {
            2
        }
    }

    /// Stack protection runs unless disabled or at level 0.
    pub fn stack_protection(&self) -> bool {
        self.stack && self.level >= HardenLevel::Moderate
    }

    /// Timing noise requires the toggle and level ≥ 2.
    pub fn timing_noise(&self) -> bool {
        self.timing && self.level >= HardenLevel::Aggressive
    }
}
