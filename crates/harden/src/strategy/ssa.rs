//! SSA-value protections: phi-node verification and temporary-value
//! duplication.
//!
//! Phi verification targets corruption of loop-carried and merge-point
//! state, which duplication downstream of the merge cannot catch: a shadow
//! phi mirrors every (value, predecessor) pair and both results are
//! compared once the phi group ends. Temporary protection clones generic
//! value-producing instructions and verifies the two results.

use ir::{Function, InstId, Instruction, Op, Operand, Type};
use tracing::debug;

use crate::mutate::{location_tag, verify_call};
use crate::options::HardenOptions;
use crate::stats::TransformStats;

pub fn verify_phis(f: &mut Function, candidates: &[InstId], stats: &mut TransformStats) {
    for &phi in candidates {
        let Some((block, pos)) = f.find_inst(phi) else {
            continue;
        };
        let Op::Phi { ty, incoming } = f.inst(phi).op.clone() else {
            continue;
        };

        // Shadow phi mirroring every incoming pair, kept inside the phi
        // group.
        let base = f.inst(phi).name.clone().unwrap_or_else(|| "phi".to_string());
        let dup_name = f.fresh_value_name(&format!("{base}.dup"));
        let dup = f.insert_inst(
            block,
            pos + 1,
            Instruction::named(dup_name, Op::Phi { ty, incoming }),
        );
        stats.instructions_duplicated += 1;

        // Compare after the last phi of the block.
        let tag = location_tag(&f.name, "phi");
        if let Some(call) = verify_call(ty, Operand::Inst(phi), Operand::Inst(dup), tag) {
            let at = f.first_non_phi(block);
            f.insert_inst(block, at, call);
            stats.verification_calls_added += 1;
        }

        stats.phi_nodes_verified += 1;
        debug!(function = %f.name, "verified phi node");
    }
}

/// Mnemonic used in the diagnostic tag of a protected temporary.
fn temp_mnemonic(op: &Op) -> &'static str {
    match op {
        Op::Binary { op, .. } => op.mnemonic(),
        Op::Icmp { .. } => "icmp",
        Op::Fcmp { .. } => "fcmp",
        Op::Zext { .. } => "zext",
        Op::Gep { .. } => "gep",
        Op::LandingPad { .. } => "landingpad",
        _ => "value",
    }
}

pub fn protect_temporaries(
    f: &mut Function,
    candidates: &[InstId],
    opts: &HardenOptions,
    stats: &mut TransformStats,
) {
    // Coverage density: every candidate at level 3, every second one at
    // level 2.
    let stride = opts.temporary_stride();

    for (index, &temp) in candidates.iter().enumerate() {
        if index % stride != 0 {
            continue;
        }
        let Some((block, pos)) = f.find_inst(temp) else {
            continue;
        };
        let op = f.inst(temp).op.clone();
        let Some(ty) = op.result_type() else {
            continue;
        };

        let base = f
            .inst(temp)
            .name
            .clone()
            .unwrap_or_else(|| "temp".to_string());
        let tag = location_tag(&f.name, &format!("temp:{}", temp_mnemonic(&op)));

        let dup_name = f.fresh_value_name(&format!("{base}.temp_dup"));
        let dup = f.insert_inst(block, pos + 1, Instruction::named(dup_name, op));
        stats.instructions_duplicated += 1;

        match ty {
            Type::I32 | Type::I64 | Type::Ptr => {
                if let Some(call) = verify_call(ty, Operand::Inst(temp), Operand::Inst(dup), tag) {
                    f.insert_inst(block, pos + 2, call);
                    stats.verification_calls_added += 1;
                }
            }
            // Narrow integers widen to 32 bits for comparison.
            Type::I1 | Type::I8 | Type::I16 => {
                let ext1_name = f.fresh_value_name(&format!("{base}.ext"));
                let ext1 = f.insert_inst(
                    block,
                    pos + 2,
                    Instruction::named(
                        ext1_name,
                        Op::Zext {
                            value: Operand::Inst(temp),
                            from: ty,
                            to: Type::I32,
                        },
                    ),
                );
                let ext2_name = f.fresh_value_name(&format!("{base}.temp_dup.ext"));
                let ext2 = f.insert_inst(
                    block,
                    pos + 3,
                    Instruction::named(
                        ext2_name,
                        Op::Zext {
                            value: Operand::Inst(dup),
                            from: ty,
                            to: Type::I32,
                        },
                    ),
                );
                if let Some(call) =
                    verify_call(Type::I32, Operand::Inst(ext1), Operand::Inst(ext2), tag)
                {
                    f.insert_inst(block, pos + 4, call);
                    stats.verification_calls_added += 1;
                }
            }
            _ => {}
        }

        stats.temporaries_protected += 1;
        debug!(function = %f.name, "protected temporary value");
    }
}
