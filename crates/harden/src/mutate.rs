//! CFG mutation primitives shared by the strategies.
//!
//! Two structural operations underpin every error-path-producing strategy:
//! splitting a block at an instruction boundary (the split itself lives on
//! [`ir::Function`]; this module layers the hardening conventions on top)
//! and creating a dedicated error block that logs a fault and never
//! returns. Inserted definitions always sit immediately adjacent to their
//! sole consumers, which is what keeps def-use and dominance intact.

use ir::{BlockId, Callee, Function, Instruction, Op, Operand, Type};

use crate::runtime_abi::{self, Severity};

/// Build the diagnostic location tag attached to a verification call.
pub fn location_tag(function: &str, category: &str) -> String {
    format!("{function}:{category}")
}

/// Build a call to the typed value-verification primitive for `ty`, or
/// `None` when the type has no primitive (not verified; known limitation).
pub fn verify_call(ty: Type, value: Operand, expected: Operand, tag: String) -> Option<Instruction> {
    let callee = runtime_abi::verify_fn_for(ty)?;
    Some(Instruction::anon(Op::Call {
        ret: Type::Void,
        callee: Callee::Direct(callee.to_string()),
        args: vec![
            (ty, value),
            (ty, expected),
            (Type::Ptr, Operand::Str(tag)),
        ],
    }))
}

/// Build a call to the fault logger.
pub fn log_fault_call(message: impl Into<String>, severity: Severity) -> Instruction {
    Instruction::anon(Op::Call {
        ret: Type::Void,
        callee: Callee::Direct(runtime_abi::LOG_FAULT.to_string()),
        args: vec![
            (Type::Ptr, Operand::Str(message.into())),
            (Type::I32, Operand::IntConst(severity as i64)),
        ],
    })
}

/// Create an error-handling block placed after `after`: it logs the fault
/// (when logging is enabled) and ends in `unreachable`, so the path is
/// defined to never return control.
pub fn create_error_block(
    f: &mut Function,
    after: BlockId,
    label_base: &str,
    message: &str,
    severity: Severity,
    logging: bool,
) -> BlockId {
    let label = f.fresh_label(label_base);
    let bb = f.insert_block_after(after, label);
    if logging {
        f.push_inst(bb, log_fault_call(message, severity));
    }
    f.push_inst(bb, Instruction::anon(Op::Unreachable));
    bb
}

/// Replace a block's terminator (typically the unconditional branch a
/// split just created) with a conditional branch.
pub fn replace_terminator_with_condbr(
    f: &mut Function,
    block: BlockId,
    cond: Operand,
    then_dest: BlockId,
    else_dest: BlockId,
) {
    let term = f
        .terminator(block)
        .expect("block must have a terminator to replace");
    f.inst_mut(term).op = Op::CondBr {
        cond,
        then_dest,
        else_dest,
    };
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use ir::{parse, verify::verify_function};

    #[test]
    fn test_error_block_shape() {
        let module = parse(indoc! {"
            func @f() -> void {
            entry:
              ret void
            }
        "})
        .unwrap();
        let mut f = module.functions()[0].clone();
        let entry = f.entry().unwrap();

        let bb = create_error_block(&mut f, entry, "fault", "boom", Severity::Critical, true);
        let insts = f.block(bb).insts();
        assert_eq!(insts.len(), 2);
        assert!(matches!(
            &f.inst(insts[0]).op,
            Op::Call { callee, args, .. }
                if callee.direct_name() == Some("fi_log_fault")
                    && args[1].1 == Operand::IntConst(3)
        ));
        assert!(matches!(f.inst(insts[1]).op, Op::Unreachable));
    }

    #[test]
    fn test_error_block_without_logging_is_bare() {
        let module = parse(indoc! {"
            func @f() -> void {
            entry:
              ret void
            }
        "})
        .unwrap();
        let mut f = module.functions()[0].clone();
        let entry = f.entry().unwrap();

        let bb = create_error_block(&mut f, entry, "fault", "boom", Severity::Error, false);
        assert_eq!(f.block(bb).len(), 1);
        assert!(matches!(
            f.inst(f.block(bb).insts()[0]).op,
            Op::Unreachable
        ));
    }

    #[test]
    fn test_split_then_condbr_keeps_function_valid() {
        let module = parse(indoc! {"
            func @f(i32 %n) -> i32 {
            entry:
              %a = add i32 %n, 1
              %ok = icmp ne i32 %a, 0
              %b = mul i32 %a, 2
              ret i32 %b
            }
        "})
        .unwrap();
        let mut f = module.functions()[0].clone();
        let entry = f.entry().unwrap();
        let ok = f.block(entry).insts()[1];

        let cont = f.split_block(entry, 2, "cont");
        let error = create_error_block(&mut f, cont, "fault", "boom", Severity::Error, true);
        replace_terminator_with_condbr(&mut f, entry, Operand::Inst(ok), cont, error);

        verify_function(&f).expect("mutated function must stay structurally valid");
    }

    #[test]
    fn test_verify_call_dispatch() {
        let tag = "f:load".to_string();
        assert!(verify_call(Type::I32, Operand::IntConst(1), Operand::IntConst(1), tag.clone())
            .is_some());
        assert!(verify_call(Type::Ptr, Operand::NullPtr, Operand::NullPtr, tag.clone()).is_some());
        assert!(verify_call(Type::F64, Operand::FloatConst(1.0), Operand::FloatConst(1.0), tag)
            .is_none());
    }

    #[test]
    fn test_location_tag_format() {
        assert_eq!(location_tag("main", "branch"), "main:branch");
    }
}
