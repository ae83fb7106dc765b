//! Load/store verification and hardware-I/O validation.
//!
//! Loads are re-executed bit-identically (same address, same volatility)
//! and both results verified through the type-dispatched primitive; at the
//! highest level a third load gives a weak 2-of-3 check (mismatch is only
//! flagged, no majority value is selected). Stores are read back and the
//! read-back compared against the stored value, plus a checksum update over
//! the written byte range at level ≥ 2. Volatile loads can additionally be
//! validated as hardware I/O.

use ir::{Callee, Function, InstId, Instruction, Op, Operand, Type};
use tracing::debug;

use crate::mutate::{location_tag, verify_call};
use crate::options::HardenOptions;
use crate::runtime_abi;
use crate::stats::TransformStats;

pub fn harden_loads(
    f: &mut Function,
    candidates: &[InstId],
    opts: &HardenOptions,
    stats: &mut TransformStats,
) {
    for &load in candidates {
        let Some((block, pos)) = f.find_inst(load) else {
            continue;
        };
        let Op::Load { ty, ptr, volatile } = f.inst(load).op.clone() else {
            continue;
        };
        let tag = location_tag(&f.name, "load");

        // Duplicate the load at the same source location.
        let dup_name = f.fresh_value_name("load.dup");
        let dup = f.insert_inst(
            block,
            pos + 1,
            Instruction::named(
                dup_name,
                Op::Load {
                    ty,
                    ptr: ptr.clone(),
                    volatile,
                },
            ),
        );
        stats.instructions_duplicated += 1;

        let mut at = pos + 2;
        if let Some(call) = verify_call(ty, Operand::Inst(load), Operand::Inst(dup), tag.clone()) {
            f.insert_inst(block, at, call);
            at += 1;
            stats.verification_calls_added += 1;
        }

        // Third load at the highest level: verify the two duplicates as a
        // weak 2-of-3 approximation.
        if opts.triple_load() {
            let dup2_name = f.fresh_value_name("load.dup2");
            let dup2 = f.insert_inst(
                block,
                at,
                Instruction::named(dup2_name, Op::Load { ty, ptr, volatile }),
            );
            at += 1;
            stats.instructions_duplicated += 1;
            if let Some(call) = verify_call(ty, Operand::Inst(dup), Operand::Inst(dup2), tag) {
                f.insert_inst(block, at, call);
                stats.verification_calls_added += 1;
            }
        }

        stats.loads_hardened += 1;
        debug!(function = %f.name, "hardened load");
    }
}

pub fn harden_stores(
    f: &mut Function,
    candidates: &[InstId],
    opts: &HardenOptions,
    stats: &mut TransformStats,
) {
    for &store in candidates {
        let Some((block, pos)) = f.find_inst(store) else {
            continue;
        };
        let Op::Store { ty, value, ptr, .. } = f.inst(store).op.clone() else {
            continue;
        };
        let tag = location_tag(&f.name, "store");

        // Read back the just-written location.
        let readback_name = f.fresh_value_name("store.verify");
        let readback = f.insert_inst(
            block,
            pos + 1,
            Instruction::named(
                readback_name,
                Op::Load {
                    ty,
                    ptr: ptr.clone(),
                    volatile: false,
                },
            ),
        );

        let mut at = pos + 2;
        if let Some(call) = verify_call(ty, Operand::Inst(readback), value, tag) {
            f.insert_inst(block, at, call);
            at += 1;
            stats.verification_calls_added += 1;
        }

        // Track the written byte range at level >= 2.
        if opts.checksum_on_stores() {
            if let Some(size) = ty.store_size() {
                f.insert_inst(
                    block,
                    at,
                    Instruction::anon(Op::Call {
                        ret: Type::Void,
                        callee: Callee::Direct(runtime_abi::CHECKSUM_UPDATE.to_string()),
                        args: vec![
                            (Type::Ptr, ptr),
                            (Type::I64, Operand::IntConst(size as i64)),
                        ],
                    }),
                );
                stats.verification_calls_added += 1;
            }
        }

        stats.stores_hardened += 1;
        debug!(function = %f.name, "hardened store");
    }
}

/// Validate volatile (hardware) loads: the runtime re-reads the register
/// and compares against the value the program observed. Only 32-bit loads
/// have a validation primitive.
pub fn validate_volatile_loads(
    f: &mut Function,
    candidates: &[InstId],
    stats: &mut TransformStats,
) {
    for &load in candidates {
        let Some((block, pos)) = f.find_inst(load) else {
            continue;
        };
        let Op::Load {
            ty: Type::I32,
            ptr,
            volatile: true,
        } = f.inst(load).op.clone()
        else {
            continue;
        };

        f.insert_inst(
            block,
            pos + 1,
            Instruction::anon(Op::Call {
                ret: Type::Void,
                callee: Callee::Direct(runtime_abi::VALIDATE_HARDWARE_IO.to_string()),
                args: vec![(Type::Ptr, ptr), (Type::I32, Operand::Inst(load))],
            }),
        );
        stats.verification_calls_added += 1;
        stats.hardware_io_validated += 1;
        debug!(function = %f.name, "validated hardware I/O load");
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::classify::classify;
    use crate::options::{HardenLevel, HardenOptions};
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

    fn count_loads(f: &Function) -> usize {
        f.inst_ids()
            .filter(|&i| matches!(f.inst(i).op, Op::Load { .. }))
            .count()
    }

    const LOAD_STORE: &str = indoc! {"
        func @f(ptr %p, i32 %v) -> i32 {
        entry:
          store i32 %v, ptr %p
          %x = load i32, ptr %p
          ret i32 %x
        }
    "};

    #[test]
    fn test_load_duplicated_and_verified_at_level3() {
        let mut f = function(LOAD_STORE);
        let opts = HardenOptions::default();
        let c = classify(&f, &opts);
        let mut stats = TransformStats::default();
        harden_loads(&mut f, &c.loads, &opts, &mut stats);

        assert_eq!(stats.loads_hardened, 1);
        // Original + dup + dup2 at level 3.
        assert_eq!(count_loads(&f), 3);
        // Pairwise verify for (orig, dup) and (dup, dup2).
        assert_eq!(count_calls(&f, "fi_verify_int32"), 2);
        assert_eq!(stats.instructions_duplicated, 2);
        assert_eq!(stats.verification_calls_added, 2);
        verify_function(&f).unwrap();
    }

    #[test]
    fn test_load_two_copies_below_level3() {
        let mut f = function(LOAD_STORE);
        let mut opts = HardenOptions::default();
        opts.level = HardenLevel::Aggressive;
        let c = classify(&f, &opts);
        let mut stats = TransformStats::default();
        harden_loads(&mut f, &c.loads, &opts, &mut stats);

        assert_eq!(count_loads(&f), 2);
        assert_eq!(count_calls(&f, "fi_verify_int32"), 1);
    }

    #[test]
    fn test_store_readback_and_checksum() {
        let mut f = function(LOAD_STORE);
        let opts = HardenOptions::default();
        let c = classify(&f, &opts);
        let mut stats = TransformStats::default();
        harden_stores(&mut f, &c.stores, &opts, &mut stats);

        assert_eq!(stats.stores_hardened, 1);
        // Read-back load added.
        assert_eq!(count_loads(&f), 2);
        assert_eq!(count_calls(&f, "fi_verify_int32"), 1);
        assert_eq!(count_calls(&f, "fi_checksum_update"), 1);
        // The checksum size argument equals the stored type's byte size.
        let checksum = f
            .inst_ids()
            .find(|&i| {
                matches!(
                    &f.inst(i).op,
                    Op::Call { callee, .. } if callee.direct_name() == Some("fi_checksum_update")
                )
            })
            .unwrap();
        let Op::Call { args, .. } = &f.inst(checksum).op else {
            unreachable!()
        };
        assert_eq!(args[1].1, Operand::IntConst(4));
        verify_function(&f).unwrap();
    }

    #[test]
    fn test_store_no_checksum_below_level2() {
        let mut f = function(LOAD_STORE);
        let mut opts = HardenOptions::default();
        opts.level = HardenLevel::Moderate;
        let c = classify(&f, &opts);
        let mut stats = TransformStats::default();
        harden_stores(&mut f, &c.stores, &opts, &mut stats);
        assert_eq!(count_calls(&f, "fi_checksum_update"), 0);
    }

    #[test]
    fn test_unsupported_type_duplicated_but_not_verified() {
        // f32 has no verification primitive: the load is still duplicated
        // but no verify call is emitted (documented limitation).
        let mut f = function(indoc! {"
            func @f(ptr %p) -> f32 {
            entry:
              %x = load f32, ptr %p
              ret f32 %x
            }
        "});
        let opts = HardenOptions::default();
        let c = classify(&f, &opts);
        let mut stats = TransformStats::default();
        harden_loads(&mut f, &c.loads, &opts, &mut stats);

        assert_eq!(stats.loads_hardened, 1);
        assert_eq!(count_loads(&f), 3);
        assert_eq!(count_calls(&f, "fi_verify_int32"), 0);
        assert_eq!(stats.verification_calls_added, 0);
    }

    #[test]
    fn test_volatile_load_duplication_stays_volatile() {
        let mut f = function(indoc! {"
            func @io(ptr %reg) -> i32 {
            entry:
              %v = load volatile i32, ptr %reg
              ret i32 %v
            }
        "});
        let opts = HardenOptions::default();
        let c = classify(&f, &opts);
        let mut stats = TransformStats::default();
        harden_loads(&mut f, &c.loads, &opts, &mut stats);

        // Bit-identical duplication preserves volatility.
        let volatile_loads = f
            .inst_ids()
            .filter(|&i| matches!(f.inst(i).op, Op::Load { volatile: true, .. }))
            .count();
        assert_eq!(volatile_loads, 3);
    }

    #[test]
    fn test_hardware_io_validation() {
        let mut f = function(indoc! {"
            func @io(ptr %reg) -> i32 {
            entry:
              %v = load volatile i32, ptr %reg
              %w = load volatile i64, ptr %reg
              store i64 %w, ptr %reg
              ret i32 %v
            }
        "});
        let mut opts = HardenOptions::default();
        opts.hardware_io = true;
        let c = classify(&f, &opts);
        let mut stats = TransformStats::default();
        validate_volatile_loads(&mut f, &c.volatile_loads, &mut stats);

        // Only the i32 volatile load gets a validation call.
        assert_eq!(count_calls(&f, "fi_validate_hardware_io"), 1);
        assert_eq!(stats.hardware_io_validated, 1);
        verify_function(&f).unwrap();
    }
}
