//! Control-flow protections: indirect-call CFI, memory bounds checks, and
//! stack/return-address protection.

use ir::{Callee, Function, InstId, Instruction, Op, Operand, Predicate, Type};
use tracing::debug;

use crate::mutate::{
    create_error_block, location_tag, log_fault_call, replace_terminator_with_condbr,
};
use crate::options::HardenOptions;
use crate::runtime_abi::{self, Severity};
use crate::stats::TransformStats;

/// Estimated region size handed to the bounds-check primitive. A fixed
/// placeholder until allocation-size tracking exists; refine rather than
/// rely on it.
pub const BOUNDS_REGION_SIZE: i64 = 1024;

/// CFI for indirect calls: verify the call target against the expected
/// one before transferring control.
///
/// The expected value currently echoes the observed target, pending a
/// points-to analysis that can compute real target sets; the check
/// structure and call protocol are what this strategy pins down.
pub fn harden_indirect_calls(
    f: &mut Function,
    candidates: &[InstId],
    opts: &HardenOptions,
    stats: &mut TransformStats,
) {
    for &call in candidates {
        let Some((block, pos)) = f.find_inst(call) else {
            continue;
        };
        let Op::Call {
            callee: Callee::Indirect(target),
            ..
        } = &f.inst(call).op
        else {
            continue;
        };
        let target = target.clone();
        let tag = location_tag(&f.name, "indirect_call");

        f.insert_inst(
            block,
            pos,
            Instruction::anon(Op::Call {
                ret: Type::Void,
                callee: Callee::Direct(runtime_abi::VERIFY_CFI.to_string()),
                args: vec![
                    (Type::Ptr, target.clone()),
                    (Type::Ptr, target),
                    (Type::Ptr, Operand::Str(tag)),
                ],
            }),
        );
        stats.verification_calls_added += 1;
        stats.indirect_calls_hardened += 1;

        if opts.logging {
            f.insert_inst(block, pos + 1, log_fault_call("CFI check passed", Severity::Info));
            stats.fault_logs_added += 1;
        }
        debug!(function = %f.name, "hardened indirect call");
    }
}

/// Bounds checking after pointer-offset computations: branch to an error
/// block when the computed pointer leaves the estimated region.
pub fn add_bounds_checks(
    f: &mut Function,
    candidates: &[InstId],
    opts: &HardenOptions,
    stats: &mut TransformStats,
) {
    for &gep in candidates {
        let Some((block, pos)) = f.find_inst(gep) else {
            continue;
        };
        let Op::Gep { base, .. } = f.inst(gep).op.clone() else {
            continue;
        };

        let check_name = f.fresh_value_name("bounds.check");
        let check = f.insert_inst(
            block,
            pos + 1,
            Instruction::named(
                check_name,
                Op::Call {
                    ret: Type::I32,
                    callee: Callee::Direct(runtime_abi::CHECK_BOUNDS.to_string()),
                    args: vec![
                        (Type::Ptr, Operand::Inst(gep)),
                        (Type::Ptr, base),
                        (Type::I64, Operand::IntConst(BOUNDS_REGION_SIZE)),
                    ],
                },
            ),
        );
        let ok_name = f.fresh_value_name("bounds.ok");
        let ok = f.insert_inst(
            block,
            pos + 2,
            Instruction::named(
                ok_name,
                Op::Icmp {
                    pred: Predicate::Ne,
                    ty: Type::I32,
                    lhs: Operand::Inst(check),
                    rhs: Operand::IntConst(0),
                },
            ),
        );

        let cont_label = f.fresh_label("bounds_safe");
        let cont = f.split_block(block, pos + 3, cont_label);
        let error = create_error_block(
            f,
            cont,
            "bounds_error",
            "Bounds check failed!",
            Severity::Error,
            opts.logging,
        );
        replace_terminator_with_condbr(f, block, Operand::Inst(ok), cont, error);

        stats.bounds_checks_added += 1;
        stats.basic_blocks_split += 1;
        debug!(function = %f.name, "added memory bounds check");
    }
}

/// Stack protection: save the return-address slot at function entry and
/// verify it immediately before every return, branching to an error block
/// on corruption.
pub fn protect_stack(
    f: &mut Function,
    returns: &[InstId],
    opts: &HardenOptions,
    stats: &mut TransformStats,
) {
    let Some(entry) = f.entry() else {
        return;
    };

    let slot_name = f.fresh_value_name("return_addr_storage");
    let slot = f.insert_inst(
        entry,
        0,
        Instruction::named(slot_name, Op::Alloca { ty: Type::Ptr }),
    );
    f.insert_inst(
        entry,
        1,
        Instruction::anon(Op::Call {
            ret: Type::Void,
            callee: Callee::Direct(runtime_abi::PROTECT_RETURN_ADDR.to_string()),
            args: vec![(Type::Ptr, Operand::Inst(slot))],
        }),
    );
    stats.return_addresses_protected += 1;

    for &ret in returns {
        let Some((block, pos)) = f.find_inst(ret) else {
            continue;
        };

        let check_name = f.fresh_value_name("ret.check");
        let check = f.insert_inst(
            block,
            pos,
            Instruction::named(
                check_name,
                Op::Call {
                    ret: Type::I32,
                    callee: Callee::Direct(runtime_abi::VERIFY_RETURN_ADDR.to_string()),
                    args: vec![(Type::Ptr, Operand::Inst(slot))],
                },
            ),
        );
        let ok_name = f.fresh_value_name("ret.ok");
        let ok = f.insert_inst(
            block,
            pos + 1,
            Instruction::named(
                ok_name,
                Op::Icmp {
                    pred: Predicate::Ne,
                    ty: Type::I32,
                    lhs: Operand::Inst(check),
                    rhs: Operand::IntConst(0),
                },
            ),
        );

        let cont_label = f.fresh_label("safe_return");
        let cont = f.split_block(block, pos + 2, cont_label);
        let error = create_error_block(
            f,
            cont,
            "return_corrupted",
            "Return address corrupted!",
            Severity::Critical,
            opts.logging,
        );
        replace_terminator_with_condbr(f, block, Operand::Inst(ok), cont, error);
        stats.basic_blocks_split += 1;
    }

    debug!(function = %f.name, returns = returns.len(), "protected return addresses");
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::classify::classify;
    use crate::options::HardenOptions;
    use ir::{parse, verify::verify_function};

    fn function(input: &str) -> Function {
        parse(input).unwrap().functions()[0].clone()
    }

    fn count_calls(f: &Function, name: &str) -> usize {
        f.inst_ids()
            .filter(|&i| {
                matches!(
                    &f.inst(i).op,
                    Op::Call { callee, .. } if callee.direct_name() == Some(name)
                )
            })
            .count()
    }

    #[test]
    fn test_cfi_checks_observed_target() {
        let mut f = function(indoc! {"
            func @f(ptr %fp) -> void {
            entry:
              call void %fp(i32 1)
              ret void
            }
        "});
        let opts = HardenOptions::default();
        let c = classify(&f, &opts);
        let mut stats = TransformStats::default();
        harden_indirect_calls(&mut f, &c.indirect_calls, &opts, &mut stats);

        assert_eq!(stats.indirect_calls_hardened, 1);
        assert_eq!(count_calls(&f, "fi_verify_cfi"), 1);
        // Info log accompanies the check when logging is on.
        assert_eq!(count_calls(&f, "fi_log_fault"), 1);
        assert_eq!(stats.fault_logs_added, 1);

        // Target and expected are the same operand (placeholder expected
        // value).
        let cfi = f
            .inst_ids()
            .find(|&i| {
                matches!(
                    &f.inst(i).op,
                    Op::Call { callee, .. } if callee.direct_name() == Some("fi_verify_cfi")
                )
            })
            .unwrap();
        let Op::Call { args, .. } = &f.inst(cfi).op else {
            unreachable!()
        };
        assert_eq!(args[0].1, args[1].1);
        verify_function(&f).unwrap();
    }

    #[test]
    fn test_bounds_check_splits_and_branches() {
        let mut f = function(indoc! {"
            func @f(ptr %base, i64 %i) -> i32 {
            entry:
              %g = gep i32, ptr %base, i64 %i
              %v = load i32, ptr %g
              ret i32 %v
            }
        "});
        let opts = HardenOptions::default();
        let c = classify(&f, &opts);
        let mut stats = TransformStats::default();
        add_bounds_checks(&mut f, &c.address_computations, &opts, &mut stats);

        assert_eq!(stats.bounds_checks_added, 1);
        assert_eq!(stats.basic_blocks_split, 1);
        assert_eq!(count_calls(&f, "fi_check_bounds"), 1);

        // The load moved into the safe continuation.
        let entry = f.entry().unwrap();
        let term = f.terminator(entry).unwrap();
        let Op::CondBr {
            then_dest,
            else_dest,
            ..
        } = f.inst(term).op
        else {
            panic!("expected conditional branch after bounds check");
        };
        assert!(f.block(then_dest).label.starts_with("bounds_safe"));
        assert!(f
            .block(then_dest)
            .insts()
            .iter()
            .any(|&i| matches!(f.inst(i).op, Op::Load { .. })));
        assert!(f.block(else_dest).label.starts_with("bounds_error"));
        verify_function(&f).unwrap();
    }

    #[test]
    fn test_stack_protection_covers_every_return() {
        let mut f = function(indoc! {"
            func @f(i32 %n) -> i32 {
            entry:
              %c = icmp eq i32 %n, 0
              br i1 %c, label %a, label %b
            a:
              ret i32 1
            b:
              ret i32 0
            }
        "});
        let opts = HardenOptions::default();
        let c = classify(&f, &opts);
        let mut stats = TransformStats::default();
        protect_stack(&mut f, &c.returns, &opts, &mut stats);

        assert_eq!(stats.return_addresses_protected, 1);
        assert_eq!(count_calls(&f, "fi_protect_return_addr"), 1);
        assert_eq!(count_calls(&f, "fi_verify_return_addr"), 2);
        assert_eq!(stats.basic_blocks_split, 2);

        // Entry starts with the slot alloca followed by the protect call.
        let entry = f.entry().unwrap();
        let first = f.block(entry).insts()[0];
        assert!(matches!(f.inst(first).op, Op::Alloca { ty: Type::Ptr }));

        verify_function(&f).unwrap();
    }

    #[test]
    fn test_stack_protection_on_entry_block_return() {
        let mut f = function(indoc! {"
            func @f() -> void {
            entry:
              ret void
            }
        "});
        let opts = HardenOptions::default();
        let c = classify(&f, &opts);
        let mut stats = TransformStats::default();
        protect_stack(&mut f, &c.returns, &opts, &mut stats);

        assert_eq!(count_calls(&f, "fi_verify_return_addr"), 1);
        verify_function(&f).unwrap();
    }
}
