//! Branch hardening.
//!
//! For each conditional branch whose condition is a direct comparison:
//! synthesize a duplicate comparison from the same operands, verify both
//! outcomes through the runtime, and re-branch on the AND of the two, so a
//! single flipped outcome forces the false edge.

use ir::{BinOp, Callee, Function, InstId, Instruction, Op, Operand, Type};
use tracing::debug;

use crate::mutate::location_tag;
use crate::runtime_abi;
use crate::stats::TransformStats;

pub fn harden_branches(f: &mut Function, candidates: &[InstId], stats: &mut TransformStats) {
    for &branch in candidates {
        let Some((block, pos)) = f.find_inst(branch) else {
            continue;
        };
        let Op::CondBr { cond, .. } = &f.inst(branch).op else {
            continue;
        };
        let Some(cond_id) = cond.as_inst() else {
            continue;
        };
        let cond_op = f.inst(cond_id).op.clone();
        if !matches!(cond_op, Op::Icmp { .. } | Op::Fcmp { .. }) {
            continue;
        }

        let tag = location_tag(&f.name, "branch");

        // Duplicate condition evaluation.
        let dup_name = f.fresh_value_name("cond.dup");
        let dup = f.insert_inst(block, pos, Instruction::named(dup_name, cond_op));
        stats.instructions_duplicated += 1;

        // Verify both conditions match.
        let int1_name = f.fresh_value_name("cond.int");
        let int1 = f.insert_inst(
            block,
            pos + 1,
            Instruction::named(
                int1_name,
                Op::Zext {
                    value: Operand::Inst(cond_id),
                    from: Type::I1,
                    to: Type::I32,
                },
            ),
        );
        let int2_name = f.fresh_value_name("cond.dup.int");
        let int2 = f.insert_inst(
            block,
            pos + 2,
            Instruction::named(
                int2_name,
                Op::Zext {
                    value: Operand::Inst(dup),
                    from: Type::I1,
                    to: Type::I32,
                },
            ),
        );
        f.insert_inst(
            block,
            pos + 3,
            Instruction::anon(Op::Call {
                ret: Type::Void,
                callee: Callee::Direct(runtime_abi::VERIFY_BRANCH.to_string()),
                args: vec![
                    (Type::I32, Operand::Inst(int1)),
                    (Type::I32, Operand::Inst(int2)),
                    (Type::Ptr, Operand::Str(tag)),
                ],
            }),
        );
        stats.verification_calls_added += 1;

        // Branch on the redundant condition.
        let red_name = f.fresh_value_name("cond.redundant");
        let red = f.insert_inst(
            block,
            pos + 4,
            Instruction::named(
                red_name,
                Op::Binary {
                    op: BinOp::And,
                    ty: Type::I1,
                    lhs: Operand::Inst(cond_id),
                    rhs: Operand::Inst(dup),
                },
            ),
        );
        if let Op::CondBr { cond, .. } = &mut f.inst_mut(branch).op {
            *cond = Operand::Inst(red);
        }

        stats.branches_hardened += 1;
        debug!(function = %f.name, "hardened conditional branch");
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::harden_branches;
    use crate::classify::classify;
    use crate::options::HardenOptions;
    use crate::stats::TransformStats;
    use ir::{parse, verify::verify_function, Op};

    #[test]
    fn test_branch_rewritten_to_redundant_condition() {
        let module = parse(indoc! {"
            func @f(i32 %n) -> i32 {
            entry:
              %cmp = icmp eq i32 %n, 0
              br i1 %cmp, label %a, label %b
            a:
              ret i32 1
            b:
              ret i32 0
            }
        "})
        .unwrap();
        let mut f = module.functions()[0].clone();
        let candidates = classify(&f, &HardenOptions::default());
        let mut stats = TransformStats::default();

        harden_branches(&mut f, &candidates.branches, &mut stats);

        assert_eq!(stats.branches_hardened, 1);
        assert_eq!(stats.verification_calls_added, 1);
        assert_eq!(stats.instructions_duplicated, 1);

        // The branch now tests the AND of original and duplicate.
        let entry = f.entry().unwrap();
        let term = f.terminator(entry).unwrap();
        let Op::CondBr { cond, .. } = &f.inst(term).op else {
            panic!("terminator must stay a conditional branch");
        };
        let and_id = cond.as_inst().unwrap();
        assert!(matches!(
            f.inst(and_id).op,
            Op::Binary {
                op: ir::BinOp::And,
                ..
            }
        ));

        // Duplicate comparison mirrors the original's predicate/operands.
        let Op::Binary { lhs, rhs, .. } = &f.inst(and_id).op else {
            unreachable!()
        };
        let (orig, dup) = (lhs.as_inst().unwrap(), rhs.as_inst().unwrap());
        let (Op::Icmp { pred: p1, lhs: a1, rhs: b1, .. }, Op::Icmp { pred: p2, lhs: a2, rhs: b2, .. }) =
            (&f.inst(orig).op, &f.inst(dup).op)
        else {
            panic!("both condition operands must be comparisons");
        };
        assert_eq!(p1, p2);
        assert_eq!(a1, a2);
        assert_eq!(b1, b2);

        // A verify-branch call was inserted before the branch.
        let has_verify = f.block(entry).insts().iter().any(|&i| {
            matches!(
                &f.inst(i).op,
                Op::Call { callee, .. } if callee.direct_name() == Some("fi_verify_branch")
            )
        });
        assert!(has_verify);

        verify_function(&f).expect("hardened function must stay valid");
    }

    #[test]
    fn test_unfaulted_behavior_preserved_on_true_edge() {
        // With both copies of the condition agreeing, AND(x, x) == x: the
        // branch takes the same edge as before hardening.
        let module = parse(indoc! {"
            func @f(i32 %n) -> i32 {
            entry:
              %cmp = icmp sgt i32 %n, 10
              br i1 %cmp, label %a, label %b
            a:
              ret i32 1
            b:
              ret i32 0
            }
        "})
        .unwrap();
        let mut f = module.functions()[0].clone();
        let candidates = classify(&f, &HardenOptions::default());
        let mut stats = TransformStats::default();
        harden_branches(&mut f, &candidates.branches, &mut stats);

        let entry = f.entry().unwrap();
        let term = f.terminator(entry).unwrap();
        let Op::CondBr {
            then_dest,
            else_dest,
            ..
        } = &f.inst(term).op
        else {
            unreachable!()
        };
        // Destinations unchanged.
        assert_eq!(f.block(*then_dest).label, "a");
        assert_eq!(f.block(*else_dest).label, "b");
    }

    #[test]
    fn test_empty_candidate_list_is_noop() {
        let module = parse(indoc! {"
            func @f() -> void {
            entry:
              ret void
            }
        "})
        .unwrap();
        let mut f = module.functions()[0].clone();
        let before = f.num_insts();
        let mut stats = TransformStats::default();
        harden_branches(&mut f, &[], &mut stats);
        assert_eq!(f.num_insts(), before);
        assert_eq!(stats, TransformStats::default());
    }

    #[test]
    fn test_name_collisions_resolved() {
        // A user value already named cond.dup must not clash.
        let module = parse(indoc! {"
            func @f(i32 %n) -> i32 {
            entry:
              %cond.dup = add i32 %n, 1
              %cmp = icmp eq i32 %cond.dup, 0
              br i1 %cmp, label %a, label %b
            a:
              ret i32 1
            b:
              ret i32 0
            }
        "})
        .unwrap();
        let mut f = module.functions()[0].clone();
        let candidates = classify(&f, &HardenOptions::default());
        let mut stats = TransformStats::default();
        harden_branches(&mut f, &candidates.branches, &mut stats);
        verify_function(&f).expect("name collision must not break the function");
        // Printed form must still round-trip.
        let mut m = ir::Module::new("m");
        m.add_function(f);
        ir::parse(&m.to_string()).expect("printed hardened IR re-parses");
    }
}
