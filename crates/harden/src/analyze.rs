//! Read-only vulnerability analysis.
//!
//! The detection counterpart of the transformation: reports conditional
//! branches without a redundant comparison nearby and memory operations
//! without a verification call in their block, without modifying the IR.
//! Running it on hardened output shows the per-category warning counts
//! dropping, which is how the statistics-conservation property is checked
//! from the outside.

use std::fmt;

use ir::{Module, Op};

/// Per-function vulnerability count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionReport {
    pub name: String,
    pub vulnerable: usize,
}

/// Result of analyzing one module.
#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    /// Warning lines, one per vulnerable instruction, in module order.
    pub warnings: Vec<String>,
    /// One entry per function with at least one finding.
    pub functions: Vec<FunctionReport>,
}

impl AnalysisReport {
    pub fn total_vulnerabilities(&self) -> usize {
        self.functions.iter().map(|f| f.vulnerable).sum()
    }
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        for w in &self.warnings {
            writeln!(out, "Warning: {w}")?;
        }
        for f in &self.functions {
            writeln!(
                out,
                "Function '{}' has {} potentially vulnerable instruction(s)",
                f.name, f.vulnerable
            )?;
        }
        Ok(())
    }
}

/// Analyze a module. Takes no configuration and never mutates the IR.
pub fn analyze_module(module: &Module) -> AnalysisReport {
    let mut report = AnalysisReport::default();

    for f in module.functions() {
        let mut vulnerable = 0usize;

        for block in f.block_ids() {
            // First pass over the block: does it contain an equality
            // comparison, and does it contain any call?
            let mut has_equality = false;
            let mut has_call = false;
            for &id in f.block(block).insts() {
                match &f.inst(id).op {
                    Op::Icmp { pred, .. } if pred.is_equality() => has_equality = true,
                    Op::Call { .. } => has_call = true,
                    _ => {}
                }
            }

            // Second pass: flag the vulnerable instructions.
            for &id in f.block(block).insts() {
                match &f.inst(id).op {
                    Op::CondBr { .. } if !has_equality => {
                        report.warnings.push(format!(
                            "Conditional branch in function '{}' lacks redundant \
                             condition check (no equality comparison in block)",
                            f.name
                        ));
                        vulnerable += 1;
                    }
                    Op::Load { .. } if !has_call => {
                        report.warnings.push(format!(
                            "Load instruction in function '{}' lacks verification \
                             call in block",
                            f.name
                        ));
                        vulnerable += 1;
                    }
                    Op::Store { .. } if !has_call => {
                        report.warnings.push(format!(
                            "Store instruction in function '{}' lacks verification \
                             call in block",
                            f.name
                        ));
                        vulnerable += 1;
                    }
                    _ => {}
                }
            }
        }

        if vulnerable > 0 {
            report.functions.push(FunctionReport {
                name: f.name.clone(),
                vulnerable,
            });
        }
    }

    report
}
