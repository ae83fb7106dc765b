//! Arithmetic hardening: plain duplication and TMR voting.
//!
//! Plain duplication recomputes division/remainder results and verifies
//! equality through the runtime. TMR computes two additional copies of
//! multiply/divide/remainder operations, forms the three pairwise equality
//! tests, and accepts when at least one pair matches (two of three values
//! agree); on acceptance execution continues on the original value, which
//! is then guaranteed to equal at least one copy. Total disagreement
//! branches to an error block that logs a critical fault and never
//! returns.

use ir::{BinOp, FloatPredicate, Function, InstId, Instruction, Op, Operand, Predicate, Type};
use tracing::debug;

use crate::mutate::{
    create_error_block, location_tag, replace_terminator_with_condbr, verify_call,
};
use crate::options::HardenOptions;
use crate::runtime_abi::Severity;
use crate::stats::TransformStats;

/// Plain duplication of division/remainder operations.
pub fn duplicate_div_rem(f: &mut Function, candidates: &[InstId], stats: &mut TransformStats) {
    for &id in candidates {
        let Some((block, pos)) = f.find_inst(id) else {
            continue;
        };
        let Op::Binary { op, ty, lhs, rhs } = f.inst(id).op.clone() else {
            continue;
        };
        if !op.is_div_rem() {
            continue;
        }

        let tag = location_tag(&f.name, "arithmetic");
        let dup_name = f.fresh_value_name("arith.dup");
        let dup = f.insert_inst(
            block,
            pos + 1,
            Instruction::named(dup_name, Op::Binary { op, ty, lhs, rhs }),
        );
        stats.instructions_duplicated += 1;

        // Only the integer widths with dedicated primitives get verified.
        if matches!(ty, Type::I32 | Type::I64) {
            if let Some(call) = verify_call(ty, Operand::Inst(id), Operand::Inst(dup), tag) {
                f.insert_inst(block, pos + 2, call);
                stats.verification_calls_added += 1;
            }
        }

        stats.arithmetic_hardened += 1;
        debug!(function = %f.name, op = op.mnemonic(), "duplicated arithmetic");
    }
}

/// The pairwise equality test appropriate for the operand type.
fn equality_test(ty: Type, lhs: Operand, rhs: Operand) -> Op {
    if ty.is_float() {
        Op::Fcmp {
            pred: FloatPredicate::Oeq,
            ty,
            lhs,
            rhs,
        }
    } else {
        Op::Icmp {
            pred: Predicate::Eq,
            ty,
            lhs,
            rhs,
        }
    }
}

/// Triple-modular-redundancy voting over multiply/divide/remainder ops.
pub fn apply_tmr(
    f: &mut Function,
    candidates: &[InstId],
    opts: &HardenOptions,
    stats: &mut TransformStats,
) {
    for &id in candidates {
        let Some((block, pos)) = f.find_inst(id) else {
            continue;
        };
        let Op::Binary { op, ty, lhs, rhs } = f.inst(id).op.clone() else {
            continue;
        };
        debug!(function = %f.name, op = op.mnemonic(), "applying TMR");

        // Two independent recomputations.
        let clone1_name = f.fresh_value_name("tmr1");
        let clone1 = f.insert_inst(
            block,
            pos + 1,
            Instruction::named(
                clone1_name,
                Op::Binary {
                    op,
                    ty,
                    lhs: lhs.clone(),
                    rhs: rhs.clone(),
                },
            ),
        );
        let clone2_name = f.fresh_value_name("tmr2");
        let clone2 = f.insert_inst(
            block,
            pos + 2,
            Instruction::named(clone2_name, Op::Binary { op, ty, lhs, rhs }),
        );
        stats.instructions_duplicated += 2;

        // Three pairwise tests; accept when at least one pair agrees.
        let m12_name = f.fresh_value_name("tmr.match12");
        let m12 = f.insert_inst(
            block,
            pos + 3,
            Instruction::named(
                m12_name,
                equality_test(ty, Operand::Inst(id), Operand::Inst(clone1)),
            ),
        );
        let m13_name = f.fresh_value_name("tmr.match13");
        let m13 = f.insert_inst(
            block,
            pos + 4,
            Instruction::named(
                m13_name,
                equality_test(ty, Operand::Inst(id), Operand::Inst(clone2)),
            ),
        );
        let m23_name = f.fresh_value_name("tmr.match23");
        let m23 = f.insert_inst(
            block,
            pos + 5,
            Instruction::named(
                m23_name,
                equality_test(ty, Operand::Inst(clone1), Operand::Inst(clone2)),
            ),
        );
        let or_name = f.fresh_value_name("tmr.or");
        let or12_13 = f.insert_inst(
            block,
            pos + 6,
            Instruction::named(
                or_name,
                Op::Binary {
                    op: BinOp::Or,
                    ty: Type::I1,
                    lhs: Operand::Inst(m12),
                    rhs: Operand::Inst(m13),
                },
            ),
        );
        let valid_name = f.fresh_value_name("tmr.valid");
        let valid = f.insert_inst(
            block,
            pos + 7,
            Instruction::named(
                valid_name,
                Op::Binary {
                    op: BinOp::Or,
                    ty: Type::I1,
                    lhs: Operand::Inst(or12_13),
                    rhs: Operand::Inst(m23),
                },
            ),
        );

        // Split right after the voting logic; the continuation keeps every
        // use of the original value.
        let cont_label = f.fresh_label("tmr.continue");
        let cont = f.split_block(block, pos + 8, cont_label);
        let message = format!("TMR voting failed in {}", f.name);
        let error = create_error_block(
            f,
            cont,
            "tmr.error",
            &message,
            Severity::Critical,
            opts.logging,
        );
        replace_terminator_with_condbr(f, block, Operand::Inst(valid), cont, error);

        stats.arithmetic_hardened += 1;
        stats.basic_blocks_split += 1;
        stats.verification_calls_added += 1;
        stats.tmr_applications += 1;
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::classify::classify;
    use crate::options::HardenOptions;
    use ir::{parse, verify::verify_function, Cfg};

    fn function(input: &str) -> Function {
        parse(input).unwrap().functions()[0].clone()
    }

    #[test]
    fn test_div_duplicated_and_verified() {
        let mut f = function(indoc! {"
            func @f(i32 %a, i32 %b) -> i32 {
            entry:
              %q = sdiv i32 %a, %b
              ret i32 %q
            }
        "});
        let mut opts = HardenOptions::default();
        opts.arithmetic = true;
        let c = classify(&f, &opts);
        let mut stats = TransformStats::default();
        duplicate_div_rem(&mut f, &c.div_rem_ops, &mut stats);

        assert_eq!(stats.arithmetic_hardened, 1);
        assert_eq!(stats.instructions_duplicated, 1);
        assert_eq!(stats.verification_calls_added, 1);
        verify_function(&f).unwrap();
    }

    #[test]
    fn test_tmr_structure() {
        let mut f = function(indoc! {"
            func @f(i32 %a, i32 %b) -> i32 {
            entry:
              %m = mul i32 %a, %b
              %r = add i32 %m, 1
              ret i32 %r
            }
        "});
        let opts = HardenOptions::default();
        let c = classify(&f, &opts);
        assert_eq!(c.tmr_candidates.len(), 1);
        let mut stats = TransformStats::default();
        apply_tmr(&mut f, &c.tmr_candidates, &opts, &mut stats);

        assert_eq!(stats.tmr_applications, 1);
        assert_eq!(stats.instructions_duplicated, 2);
        assert_eq!(stats.basic_blocks_split, 1);

        // Two extra multiplies.
        let muls = f
            .inst_ids()
            .filter(|&i| {
                matches!(
                    f.inst(i).op,
                    Op::Binary {
                        op: BinOp::Mul,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(muls, 3);

        // Three pairwise comparisons.
        let cmps = f
            .inst_ids()
            .filter(|&i| matches!(f.inst(i).op, Op::Icmp { .. }))
            .count();
        assert_eq!(cmps, 3);

        // The original block now ends in a conditional branch whose false
        // edge reaches an unreachable-terminated error block.
        let entry = f.entry().unwrap();
        let term = f.terminator(entry).unwrap();
        let Op::CondBr {
            then_dest,
            else_dest,
            ..
        } = f.inst(term).op
        else {
            panic!("expected conditional branch after TMR");
        };
        assert!(f.block(then_dest).label.starts_with("tmr.continue"));
        assert!(f.block(else_dest).label.starts_with("tmr.error"));
        let error_term = f.terminator(else_dest).unwrap();
        assert!(matches!(f.inst(error_term).op, Op::Unreachable));

        // The continuation holds the original value's uses.
        let cfg = Cfg::build(&f);
        assert!(cfg.successors(else_dest).is_empty());

        verify_function(&f).unwrap();
    }

    #[test]
    fn test_tmr_float_uses_fcmp() {
        let mut f = function(indoc! {"
            func @f(f64 %a) -> f64 {
            entry:
              %m = fmul f64 %a, %a
              ret f64 %m
            }
        "});
        let opts = HardenOptions::default();
        let c = classify(&f, &opts);
        let mut stats = TransformStats::default();
        apply_tmr(&mut f, &c.tmr_candidates, &opts, &mut stats);

        let fcmps = f
            .inst_ids()
            .filter(|&i| matches!(f.inst(i).op, Op::Fcmp { .. }))
            .count();
        assert_eq!(fcmps, 3);
        verify_function(&f).unwrap();
    }

    #[test]
    fn test_tmr_multiple_candidates_in_one_block() {
        let mut f = function(indoc! {"
            func @f(i32 %a, i32 %b) -> i32 {
            entry:
              %m = mul i32 %a, %b
              %d = sdiv i32 %m, %b
              ret i32 %d
            }
        "});
        let opts = HardenOptions::default();
        let c = classify(&f, &opts);
        let mut stats = TransformStats::default();
        apply_tmr(&mut f, &c.tmr_candidates, &opts, &mut stats);

        assert_eq!(stats.tmr_applications, 2);
        assert_eq!(stats.basic_blocks_split, 2);
        verify_function(&f).unwrap();
    }
}
