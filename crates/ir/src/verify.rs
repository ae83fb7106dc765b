//! Structural IR verifier.
//!
//! Checks the invariants the CFG mutator is required to preserve: one
//! terminator per block (and only at the end), phis grouped at block start
//! with incoming edges matching real predecessors, operands in range, and
//! defs dominating uses along reachable paths. Run after transformation
//! when the "verify resulting IR" option is on.

use std::collections::HashMap;

use crate::cfg::Cfg;
use crate::error::VerifyError;
use crate::function::Function;
use crate::instruction::{BlockId, InstId, Op, Operand};

/// Verify one function. Returns all defects found, not just the first.
pub fn verify_function(f: &Function) -> Result<(), Vec<VerifyError>> {
    let mut errors = Vec::new();

    if f.entry().is_none() {
        errors.push(VerifyError::EmptyFunction {
            function: f.name.clone(),
        });
        return Err(errors);
    }

    check_block_shape(f, &mut errors);
    check_operands(f, &mut errors);

    let cfg = Cfg::build(f);
    check_phis(f, &cfg, &mut errors);
    check_dominance(f, &cfg, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Verify every function in a module.
pub fn verify_module(module: &crate::module::Module) -> Result<(), Vec<VerifyError>> {
    let mut errors = Vec::new();
    for f in module.functions() {
        if let Err(mut e) = verify_function(f) {
            errors.append(&mut e);
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_block_shape(f: &Function, errors: &mut Vec<VerifyError>) {
    for block in f.block_ids() {
        let insts = f.block(block).insts();
        if insts.is_empty() {
            errors.push(VerifyError::EmptyBlock {
                function: f.name.clone(),
                block: f.block(block).label.clone(),
            });
            continue;
        }
        let last = *insts.last().unwrap();
        if !f.inst(last).op.is_terminator() {
            errors.push(VerifyError::MissingTerminator {
                function: f.name.clone(),
                block: f.block(block).label.clone(),
            });
        }
        if insts[..insts.len() - 1]
            .iter()
            .any(|&i| f.inst(i).op.is_terminator())
        {
            errors.push(VerifyError::EarlyTerminator {
                function: f.name.clone(),
                block: f.block(block).label.clone(),
            });
        }
        let first_non_phi = f.first_non_phi(block);
        if insts[first_non_phi..].iter().any(|&i| f.inst(i).op.is_phi()) {
            errors.push(VerifyError::MisplacedPhi {
                function: f.name.clone(),
                block: f.block(block).label.clone(),
            });
        }
    }
}

fn check_operands(f: &Function, errors: &mut Vec<VerifyError>) {
    for id in f.inst_ids() {
        for operand in f.inst(id).op.operands() {
            if let Operand::Arg(index) = operand {
                if *index >= f.params.len() {
                    errors.push(VerifyError::ArgOutOfRange {
                        function: f.name.clone(),
                        index: *index,
                    });
                }
            }
        }
    }
}

fn check_phis(f: &Function, cfg: &Cfg, errors: &mut Vec<VerifyError>) {
    for block in f.block_ids() {
        let preds = cfg.predecessors(block);
        for &id in f.block(block).insts() {
            if let Op::Phi { incoming, .. } = &f.inst(id).op {
                for (_, pred) in incoming {
                    if !preds.contains(pred) {
                        errors.push(VerifyError::PhiBadPredecessor {
                            function: f.name.clone(),
                            block: f.block(block).label.clone(),
                            pred: f.block(*pred).label.clone(),
                        });
                    }
                }
            }
        }
    }
}

/// Defs must dominate uses. Phi uses are checked against the incoming
/// predecessor (the value must be available at the end of that block);
/// unreachable blocks are skipped since dominance is undefined there.
fn check_dominance(f: &Function, cfg: &Cfg, errors: &mut Vec<VerifyError>) {
    let Some(dom) = cfg.dominators() else {
        return;
    };
    let reachable = cfg.reachable();

    // Position of every instruction within its block, for same-block checks.
    let mut positions: HashMap<InstId, (BlockId, usize)> = HashMap::new();
    for block in f.block_ids() {
        for (pos, &id) in f.block(block).insts().iter().enumerate() {
            positions.insert(id, (block, pos));
        }
    }

    let mut report = |value: InstId| {
        let name = f
            .inst(value)
            .name
            .clone()
            .unwrap_or_else(|| format!("v{}", value.index()));
        errors.push(VerifyError::UseNotDominated {
            function: f.name.clone(),
            value: name,
        });
    };

    for block in f.block_ids() {
        if !reachable.contains(&block) {
            continue;
        }
        for (use_pos, &user) in f.block(block).insts().iter().enumerate() {
            match &f.inst(user).op {
                Op::Phi { incoming, .. } => {
                    for (value, pred) in incoming {
                        let Some(def) = value.as_inst() else { continue };
                        let Some(&(def_block, _)) = positions.get(&def) else {
                            continue;
                        };
                        if !reachable.contains(pred) {
                            continue;
                        }
                        if !dom.dominates(def_block, *pred) {
                            report(def);
                        }
                    }
                }
                op => {
                    for operand in op.operands() {
                        let Some(def) = operand.as_inst() else { continue };
                        let Some(&(def_block, def_pos)) = positions.get(&def) else {
                            continue;
                        };
                        let ok = if def_block == block {
                            def_pos < use_pos
                        } else {
                            dom.dominates(def_block, block)
                        };
                        if !ok {
                            report(def);
                        }
                    }
                }
            }
        }
    }
}
