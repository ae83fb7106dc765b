//! The pass driver.
//!
//! Per function: classify once, then apply strategies in a fixed order —
//! stack protection at entry, per-instruction basic strategies, advanced
//! per-instruction strategies, then the whole-function strategies gated by
//! level ≥ 2. Candidates are collected before any mutation begins, so
//! later strategies operate on the original instruction set (collect-then-
//! mutate, never mutate-while-scanning).

use ir::{Function, InstId, Module, Op};
use tracing::{debug, info};

use crate::classify::{classify, Candidates};
use crate::error::HardenError;
use crate::options::{HardenLevel, HardenOptions};
use crate::runtime_abi;
use crate::stats::TransformStats;
use crate::strategy;

/// Harden every function of a module. Returns the accumulated statistics.
pub fn harden_module(
    module: &mut Module,
    opts: &HardenOptions,
) -> Result<TransformStats, HardenError> {
    info!(module = %module.name, level = ?opts.level, "running hardening transformation");
    let mut stats = TransformStats::default();
    for f in module.functions_mut() {
        // Never instrument the runtime's own functions.
        if runtime_abi::is_runtime_fn(&f.name) {
            continue;
        }
        harden_function(f, opts, &mut stats)?;
    }
    Ok(stats)
}

/// Harden one function in place.
pub fn harden_function(
    f: &mut Function,
    opts: &HardenOptions,
    stats: &mut TransformStats,
) -> Result<(), HardenError> {
    if f.num_blocks() == 0 {
        return Ok(());
    }
    debug!(function = %f.name, "classifying instructions");
    let candidates = classify(f, opts);

    // At the minimal level, per-instruction strategies only touch
    // critical-path instructions.
    let (branches, loads, stores, indirect_calls);
    if opts.level == HardenLevel::Minimal {
        branches = critical_path_only(f, &candidates.branches);
        loads = critical_path_only(f, &candidates.loads);
        stores = critical_path_only(f, &candidates.stores);
        indirect_calls = critical_path_only(f, &candidates.indirect_calls);
    } else {
        branches = candidates.branches.clone();
        loads = candidates.loads.clone();
        stores = candidates.stores.clone();
        indirect_calls = candidates.indirect_calls.clone();
    }

    // Function-level strategies first.
    if opts.stack_protection() {
        strategy::flow::protect_stack(f, &candidates.returns, opts, stats);
    }
    if opts.timing_noise() {
        strategy::extra::inject_timing_noise(f, &candidates.conditional_branches, stats);
    }

    // Per-instruction basic strategies.
    strategy::branch::harden_branches(f, &branches, stats);
    strategy::memory::harden_loads(f, &loads, opts, stats);
    strategy::memory::harden_stores(f, &stores, opts, stats);
    if opts.arithmetic_duplication() {
        strategy::arith::duplicate_div_rem(f, &candidates.div_rem_ops, stats);
    }

    // Advanced per-instruction strategies.
    strategy::flow::harden_indirect_calls(f, &indirect_calls, opts, stats);
    strategy::extra::protect_critical_variables(f, &candidates.critical_variables, opts, stats);
    strategy::flow::add_bounds_checks(f, &candidates.address_computations, opts, stats);
    strategy::extra::harden_exception_paths(f, &candidates.landing_pads, opts, stats);
    strategy::memory::validate_volatile_loads(f, &candidates.volatile_loads, stats);

    // Whole-function coverage at level >= 2.
    if opts.comprehensive() {
        apply_comprehensive_coverage(f, &candidates, opts, stats);
    }

    if opts.verify_ir {
        ir::verify::verify_function(f).map_err(|errors| HardenError::VerificationFailed {
            function: f.name.clone(),
            errors,
        })?;
        debug!(function = %f.name, "post-transformation IR verification passed");
    }

    Ok(())
}

/// Phi verification, TMR voting (level 3), and temporary protection.
fn apply_comprehensive_coverage(
    f: &mut Function,
    candidates: &Candidates,
    opts: &HardenOptions,
    stats: &mut TransformStats,
) {
    debug!(
        function = %f.name,
        phis = candidates.phis.len(),
        tmr = candidates.tmr_candidates.len(),
        temporaries = candidates.temporaries.len(),
        "applying whole-function coverage"
    );

    strategy::ssa::verify_phis(f, &candidates.phis, stats);
    if opts.tmr() {
        strategy::arith::apply_tmr(f, &candidates.tmr_candidates, opts, stats);
    }
    strategy::ssa::protect_temporaries(f, &candidates.temporaries, opts, stats);

    stats.functions_fully_covered += 1;
}

/// Critical-path heuristic used at the minimal level: the entry block, or
/// any instruction whose result feeds a return or a conditional branch.
fn critical_path_only(f: &Function, ids: &[InstId]) -> Vec<InstId> {
    let uses = f.build_use_map();
    let entry = f.entry();
    ids.iter()
        .copied()
        .filter(|&id| {
            if f.find_inst(id).map(|(block, _)| Some(block) == entry) == Some(true) {
                return true;
            }
            uses.get(&id)
                .map(|users| {
                    users
                        .iter()
                        .any(|&u| matches!(f.inst(u).op, Op::Ret { .. } | Op::CondBr { .. }))
                })
                .unwrap_or(false)
        })
        .collect()
}
