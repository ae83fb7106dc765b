//! Instruction classification.
//!
//! A pure read over one function that partitions its instructions into
//! hardening-candidate lists according to the active policy. The lists are
//! materialized in full before any strategy mutates the function, so no
//! strategy ever iterates a structure being edited.

use ir::{Callee, Function, InstId, Op, Operand};

use crate::options::HardenOptions;
use crate::runtime_abi;

/// Candidate instruction sets for one function, one per strategy family.
///
/// Lists may overlap (a volatile load is both a load candidate and a
/// hardware-I/O candidate); an empty list makes the corresponding strategy
/// a no-op.
#[derive(Debug, Default)]
pub struct Candidates {
    /// Conditional branches whose condition is a direct comparison.
    pub branches: Vec<InstId>,
    /// All conditional branches (timing-noise insertion points).
    pub conditional_branches: Vec<InstId>,
    pub loads: Vec<InstId>,
    /// Volatile loads (hardware I/O validation).
    pub volatile_loads: Vec<InstId>,
    pub stores: Vec<InstId>,
    /// Division/remainder operations (plain duplication).
    pub div_rem_ops: Vec<InstId>,
    /// Calls with no statically known callee.
    pub indirect_calls: Vec<InstId>,
    /// Allocas whose loaded values feed comparisons or returns.
    pub critical_variables: Vec<InstId>,
    /// Pointer-offset computations (bounds checking).
    pub address_computations: Vec<InstId>,
    pub landing_pads: Vec<InstId>,
    /// Return instructions (stack-protection verify points).
    pub returns: Vec<InstId>,
    pub phis: Vec<InstId>,
    /// Multiply/divide/remainder ops eligible for TMR voting.
    pub tmr_candidates: Vec<InstId>,
    /// Generic value-producing instructions worth duplicating.
    pub temporaries: Vec<InstId>,
}

/// Classify every instruction of `f` under the given policy. Pure: the
/// function is not mutated, and the result is not cached anywhere.
pub fn classify(f: &Function, opts: &HardenOptions) -> Candidates {
    let mut c = Candidates::default();
    let uses = f.build_use_map();

    for block in f.block_ids() {
        for &id in f.block(block).insts() {
            let inst = f.inst(id);
            if should_skip(&inst.op, opts) {
                continue;
            }

            match &inst.op {
                Op::CondBr { cond, .. } => {
                    c.conditional_branches.push(id);
                    if opts.branches && condition_is_comparison(f, cond) {
                        c.branches.push(id);
                    }
                }
                Op::Load { volatile, .. } => {
                    if opts.memory {
                        c.loads.push(id);
                    }
                    if opts.hardware_io && *volatile {
                        c.volatile_loads.push(id);
                    }
                }
                Op::Store { .. } => {
                    if opts.memory {
                        c.stores.push(id);
                    }
                }
                Op::Binary { op, ty, .. } => {
                    if opts.arithmetic && op.is_div_rem() {
                        c.div_rem_ops.push(id);
                    }
                    if op.is_mul_div_rem() && (ty.is_integer() || ty.is_float()) {
                        c.tmr_candidates.push(id);
                    }
                    if is_temporary(id, &inst.op, &uses) {
                        c.temporaries.push(id);
                    }
                }
                Op::Call { callee, .. } => {
                    if opts.cfi && matches!(callee, Callee::Indirect(_)) {
                        c.indirect_calls.push(id);
                    }
                }
                Op::Alloca { .. } => {
                    if opts.data_redundancy && is_critical_variable(f, id, &uses) {
                        c.critical_variables.push(id);
                    }
                }
                Op::Gep { .. } => {
                    if opts.memory_safety {
                        c.address_computations.push(id);
                    }
                    if is_temporary(id, &inst.op, &uses) {
                        c.temporaries.push(id);
                    }
                }
                Op::LandingPad { .. } => {
                    // Reached only when exception hardening is enabled; the
                    // skip rule filters landing pads out otherwise.
                    c.landing_pads.push(id);
                    if is_temporary(id, &inst.op, &uses) {
                        c.temporaries.push(id);
                    }
                }
                Op::Phi { .. } => {
                    c.phis.push(id);
                }
                Op::Ret { .. } => {
                    c.returns.push(id);
                }
                op @ (Op::Icmp { .. } | Op::Fcmp { .. } | Op::Zext { .. }) => {
                    if is_temporary(id, op, &uses) {
                        c.temporaries.push(id);
                    }
                }
                Op::Br { .. } | Op::Resume { .. } | Op::Unreachable => {}
            }
        }
    }

    c
}

/// Instructions the classifier never considers: exception plumbing (unless
/// exception hardening is on) and calls into intrinsics or the runtime's
/// own verification functions, which must not be re-instrumented.
fn should_skip(op: &Op, opts: &HardenOptions) -> bool {
    match op {
        Op::LandingPad { .. } | Op::Resume { .. } => !opts.exceptions,
        Op::Call { callee, .. } => match callee.direct_name() {
            Some(name) => runtime_abi::is_intrinsic(name) || runtime_abi::is_runtime_fn(name),
            None => false,
        },
        _ => false,
    }
}

/// A branch condition qualifies only when it is a direct comparison, so a
/// duplicate comparison can be synthesized from the same operands.
fn condition_is_comparison(f: &Function, cond: &Operand) -> bool {
    cond.as_inst()
        .map(|id| matches!(f.inst(id).op, Op::Icmp { .. } | Op::Fcmp { .. }))
        .unwrap_or(false)
}

/// An alloca is critical when some value loaded from it feeds a comparison
/// or a return.
fn is_critical_variable(
    f: &Function,
    alloca: InstId,
    uses: &std::collections::HashMap<InstId, Vec<InstId>>,
) -> bool {
    let Some(users) = uses.get(&alloca) else {
        return false;
    };
    for &user in users {
        let is_load_of_alloca = matches!(
            &f.inst(user).op,
            Op::Load { ptr, .. } if ptr.as_inst() == Some(alloca)
        );
        if !is_load_of_alloca {
            continue;
        }
        if let Some(load_users) = uses.get(&user) {
            for &load_user in load_users {
                if matches!(
                    f.inst(load_user).op,
                    Op::Icmp { .. } | Op::Fcmp { .. } | Op::Ret { .. }
                ) {
                    return true;
                }
            }
        }
    }
    false
}

/// A temporary is any value-producing instruction that is not a
/// phi/alloca/branch/load/store/call, has at least one use (dead values are
/// not worth protecting), and carries an integer or pointer type.
fn is_temporary(
    id: InstId,
    op: &Op,
    uses: &std::collections::HashMap<InstId, Vec<InstId>>,
) -> bool {
    if matches!(
        op,
        Op::Phi { .. }
            | Op::Alloca { .. }
            | Op::Load { .. }
            | Op::Store { .. }
            | Op::Call { .. }
    ) || op.is_terminator()
    {
        return false;
    }
    let Some(ty) = op.result_type() else {
        return false;
    };
    if !ty.is_integer() && !ty.is_pointer() {
        return false;
    }
    uses.get(&id).map(|u| !u.is_empty()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::classify;
    use crate::options::HardenOptions;
    use ir::parse;

    fn classify_source(input: &str) -> super::Candidates {
        let module = parse(input).unwrap();
        classify(&module.functions()[0], &HardenOptions::default())
    }

    #[test]
    fn test_branch_requires_comparison_condition() {
        let c = classify_source(indoc! {"
            func @f(i32 %n) -> i32 {
            entry:
              %cmp = icmp eq i32 %n, 0
              br i1 %cmp, label %a, label %b
            a:
              ret i32 1
            b:
              ret i32 0
            }
        "});
        assert_eq!(c.branches.len(), 1);
        assert_eq!(c.conditional_branches.len(), 1);
        assert_eq!(c.returns.len(), 2);
    }

    #[test]
    fn test_branch_on_non_comparison_excluded() {
        let c = classify_source(indoc! {"
            func @f(i32 %n) -> i32 {
            entry:
              %x = and i32 %n, 1
              %cmp = icmp ne i32 %x, 0
              %both = and i1 %cmp, %cmp
              br i1 %both, label %a, label %b
            a:
              ret i32 1
            b:
              ret i32 0
            }
        "});
        // Condition is an `and`, not a comparison: no duplicate can be
        // synthesized from comparison operands.
        assert!(c.branches.is_empty());
        assert_eq!(c.conditional_branches.len(), 1);
    }

    #[test]
    fn test_memory_and_hardware_io_overlap() {
        let mut opts = HardenOptions::default();
        opts.hardware_io = true;
        let module = parse(indoc! {"
            func @io(ptr %reg, ptr %mem) -> i32 {
            entry:
              %a = load volatile i32, ptr %reg
              %b = load i32, ptr %mem
              store i32 %b, ptr %mem
              ret i32 %a
            }
        "})
        .unwrap();
        let c = classify(&module.functions()[0], &opts);
        assert_eq!(c.loads.len(), 2);
        assert_eq!(c.volatile_loads.len(), 1);
        assert_eq!(c.stores.len(), 1);
    }

    #[test]
    fn test_runtime_calls_are_never_candidates() {
        let c = classify_source(indoc! {r#"
            func @f(ptr %p) -> void {
            entry:
              call void @fi_verify_int32(i32 1, i32 1, ptr "x")
              call void @llvm.dbg.value(ptr %p)
              call void @user_fn(ptr %p)
              ret void
            }
        "#});
        // Direct calls are not CFI candidates either way, but the runtime
        // and intrinsic calls must not appear anywhere.
        assert!(c.indirect_calls.is_empty());
    }

    #[test]
    fn test_indirect_call_detected() {
        let c = classify_source(indoc! {"
            func @f(ptr %fp) -> void {
            entry:
              call void %fp(i32 1)
              ret void
            }
        "});
        assert_eq!(c.indirect_calls.len(), 1);
    }

    #[test]
    fn test_critical_variable_requires_compare_or_return_use() {
        let c = classify_source(indoc! {"
            func @f(i32 %n) -> i32 {
            entry:
              %guard = alloca i32
              %scratch = alloca i32
              store i32 %n, ptr %guard
              store i32 %n, ptr %scratch
              %g = load i32, ptr %guard
              %s = load i32, ptr %scratch
              %cmp = icmp eq i32 %g, 0
              %sum = add i32 %s, 1
              store i32 %sum, ptr %scratch
              br i1 %cmp, label %a, label %b
            a:
              ret i32 1
            b:
              ret i32 0
            }
        "});
        // Only %guard feeds a comparison through a load.
        assert_eq!(c.critical_variables.len(), 1);
    }

    #[test]
    fn test_tmr_candidates_include_float_ops() {
        let c = classify_source(indoc! {"
            func @f(i32 %a, f64 %x) -> void {
            entry:
              %m = mul i32 %a, %a
              %d = sdiv i32 %m, 3
              %fm = fmul f64 %x, %x
              %s = add i32 %a, 1
              store i32 %s, ptr null
              store i32 %m, ptr null
              store i32 %d, ptr null
              store f64 %fm, ptr null
              ret void
            }
        "});
        assert_eq!(c.tmr_candidates.len(), 3);
        // Plain duplication is toggle-gated off by default.
        assert!(c.div_rem_ops.is_empty());
    }

    #[test]
    fn test_temporaries_require_uses_and_scalar_type() {
        let c = classify_source(indoc! {"
            func @f(i32 %a) -> i32 {
            entry:
              %used = add i32 %a, 1
              %dead = add i32 %a, 2
              %fval = fadd f64 1.0, 2.0
              store f64 %fval, ptr null
              ret i32 %used
            }
        "});
        // %used qualifies; %dead has no uses; %fval is float-typed.
        assert_eq!(c.temporaries.len(), 1);
    }

    #[test]
    fn test_landing_pads_gated_by_exception_toggle() {
        let source = indoc! {"
            func @eh() -> void {
            entry:
              br label %lp
            lp:
              %e = landingpad ptr
              resume ptr %e
            }
        "};
        let module = parse(source).unwrap();

        let c = classify(&module.functions()[0], &HardenOptions::default());
        assert!(c.landing_pads.is_empty());

        let mut opts = HardenOptions::default();
        opts.exceptions = true;
        let c = classify(&module.functions()[0], &opts);
        assert_eq!(c.landing_pads.len(), 1);
    }

    #[test]
    fn test_phis_collected() {
        let c = classify_source(indoc! {"
            func @f(i32 %n) -> i32 {
            entry:
              br label %loop
            loop:
              %i = phi i32 [ 0, %entry ], [ %next, %loop ]
              %next = add i32 %i, 1
              %done = icmp sge i32 %next, %n
              br i1 %done, label %exit, label %loop
            exit:
              ret i32 %next
            }
        "});
        assert_eq!(c.phis.len(), 1);
    }
}
