//! Remaining strategies: critical-variable redundancy, exception-path
//! hardening, and timing-noise injection.

use ir::{Function, InstId, Instruction, Op, Operand, Type};
use tracing::debug;

use crate::mutate::log_fault_call;
use crate::options::{HardenLevel, HardenOptions};
use crate::runtime_abi::{self, Severity};
use crate::stats::TransformStats;

/// Critical-variable redundancy: allocate a shadow slot next to each
/// critical alloca and mirror every store to the original into it.
pub fn protect_critical_variables(
    f: &mut Function,
    candidates: &[InstId],
    opts: &HardenOptions,
    stats: &mut TransformStats,
) {
    // Redundant copies only pay off at aggressive levels.
    if opts.level < HardenLevel::Aggressive {
        return;
    }

    for &alloca in candidates {
        let Some((block, pos)) = f.find_inst(alloca) else {
            continue;
        };
        let Op::Alloca { ty } = f.inst(alloca).op else {
            continue;
        };

        let base = f
            .inst(alloca)
            .name
            .clone()
            .unwrap_or_else(|| "var".to_string());
        let shadow_name = f.fresh_value_name(&format!("{base}.redundant"));
        let shadow = f.insert_inst(
            block,
            pos + 1,
            Instruction::named(shadow_name, Op::Alloca { ty }),
        );

        // Mirror stores; collect first, then mutate.
        let stores: Vec<InstId> = f
            .inst_ids()
            .filter(|&i| {
                matches!(
                    &f.inst(i).op,
                    Op::Store { ptr, .. } if ptr.as_inst() == Some(alloca)
                )
            })
            .collect();
        for store in stores {
            let Some((store_block, store_pos)) = f.find_inst(store) else {
                continue;
            };
            let Op::Store { ty, value, .. } = f.inst(store).op.clone() else {
                continue;
            };
            f.insert_inst(
                store_block,
                store_pos + 1,
                Instruction::anon(Op::Store {
                    ty,
                    value,
                    ptr: Operand::Inst(shadow),
                    volatile: false,
                }),
            );
        }

        stats.critical_variables_protected += 1;
        debug!(function = %f.name, "protected critical variable");
    }
}

/// Exception-path hardening: record entry into each handler so a
/// spuriously taken exception edge becomes observable.
pub fn harden_exception_paths(
    f: &mut Function,
    candidates: &[InstId],
    opts: &HardenOptions,
    stats: &mut TransformStats,
) {
    for &pad in candidates {
        let Some((block, pos)) = f.find_inst(pad) else {
            continue;
        };
        if opts.logging {
            f.insert_inst(
                block,
                pos + 1,
                log_fault_call("Exception handler entered", Severity::Warning),
            );
            stats.fault_logs_added += 1;
        }
        stats.exception_paths_hardened += 1;
        debug!(function = %f.name, "hardened exception path");
    }
}

/// Timing-noise injection before conditional branches.
pub fn inject_timing_noise(
    f: &mut Function,
    conditional_branches: &[InstId],
    stats: &mut TransformStats,
) {
    for &branch in conditional_branches {
        let Some((block, pos)) = f.find_inst(branch) else {
            continue;
        };
        f.insert_inst(
            block,
            pos,
            Instruction::anon(Op::Call {
                ret: Type::Void,
                callee: ir::Callee::Direct(runtime_abi::ADD_TIMING_NOISE.to_string()),
                args: Vec::new(),
            }),
        );
        stats.timing_mitigations_added += 1;
        stats.verification_calls_added += 1;
    }
    if !conditional_branches.is_empty() {
        debug!(function = %f.name, count = conditional_branches.len(), "added timing noise");
    }
}
