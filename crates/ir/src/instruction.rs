//! Instruction representation.
//!
//! Instructions are a closed tagged enum over the operation categories the
//! hardening engine classifies: branches, loads, stores, arithmetic, calls,
//! allocas, address computations, phis, landing pads, and the terminators.
//! Exhaustive matching replaces the dynamic downcasting a pointer-based IR
//! would need.
//!
//! Instructions and blocks live in per-function arenas and are addressed by
//! [`InstId`] / [`BlockId`] indices. Indices stay valid across block splits
//! and insertions, which is what lets the strategies collect candidates
//! first and mutate afterwards.

use std::fmt;

use crate::types::Type;

/// Stable handle to an instruction in a function's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(pub(crate) u32);

impl InstId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable handle to a basic block in a function's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub(crate) u32);

impl BlockId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// An operand: either a reference to a defined value or an immediate.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Result of another instruction.
    Inst(InstId),
    /// Function parameter, by position.
    Arg(usize),
    /// Integer immediate.
    IntConst(i64),
    /// Floating-point immediate.
    FloatConst(f64),
    /// The null pointer.
    NullPtr,
    /// A string literal. Only meaningful as a call argument (typed `ptr`);
    /// used for location tags and fault messages.
    Str(String),
}

impl Operand {
    /// Reference to another instruction's result, if this operand is one.
    pub fn as_inst(&self) -> Option<InstId> {
        match self {
            Operand::Inst(id) => Some(*id),
            _ => None,
        }
    }
}

/// Integer and floating-point binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    And,
    Or,
    Xor,
    FAdd,
    FSub,
    FMul,
    FDiv,
}

impl BinOp {
    /// Division and remainder operations (the plain-duplication targets).
    pub fn is_div_rem(self) -> bool {
        matches!(self, BinOp::SDiv | BinOp::UDiv | BinOp::SRem | BinOp::URem)
    }

    /// Multiply/divide/remainder, integer or floating-point (the TMR
    /// candidates).
    pub fn is_mul_div_rem(self) -> bool {
        matches!(
            self,
            BinOp::Mul
                | BinOp::SDiv
                | BinOp::UDiv
                | BinOp::SRem
                | BinOp::URem
                | BinOp::FMul
                | BinOp::FDiv
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, BinOp::FAdd | BinOp::FSub | BinOp::FMul | BinOp::FDiv)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::SDiv => "sdiv",
            BinOp::UDiv => "udiv",
            BinOp::SRem => "srem",
            BinOp::URem => "urem",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
            BinOp::FAdd => "fadd",
            BinOp::FSub => "fsub",
            BinOp::FMul => "fmul",
            BinOp::FDiv => "fdiv",
        }
    }

    pub fn parse(s: &str) -> Option<BinOp> {
        match s {
            "add" => Some(BinOp::Add),
            "sub" => Some(BinOp::Sub),
            "mul" => Some(BinOp::Mul),
            "sdiv" => Some(BinOp::SDiv),
            "udiv" => Some(BinOp::UDiv),
            "srem" => Some(BinOp::SRem),
            "urem" => Some(BinOp::URem),
            "and" => Some(BinOp::And),
            "or" => Some(BinOp::Or),
            "xor" => Some(BinOp::Xor),
            "fadd" => Some(BinOp::FAdd),
            "fsub" => Some(BinOp::FSub),
            "fmul" => Some(BinOp::FMul),
            "fdiv" => Some(BinOp::FDiv),
            _ => None,
        }
    }
}

/// Integer comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

impl Predicate {
    /// `eq` / `ne`.
    pub fn is_equality(self) -> bool {
        matches!(self, Predicate::Eq | Predicate::Ne)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Predicate::Eq => "eq",
            Predicate::Ne => "ne",
            Predicate::Slt => "slt",
            Predicate::Sle => "sle",
            Predicate::Sgt => "sgt",
            Predicate::Sge => "sge",
            Predicate::Ult => "ult",
            Predicate::Ule => "ule",
            Predicate::Ugt => "ugt",
            Predicate::Uge => "uge",
        }
    }

    pub fn parse(s: &str) -> Option<Predicate> {
        match s {
            "eq" => Some(Predicate::Eq),
            "ne" => Some(Predicate::Ne),
            "slt" => Some(Predicate::Slt),
            "sle" => Some(Predicate::Sle),
            "sgt" => Some(Predicate::Sgt),
            "sge" => Some(Predicate::Sge),
            "ult" => Some(Predicate::Ult),
            "ule" => Some(Predicate::Ule),
            "ugt" => Some(Predicate::Ugt),
            "uge" => Some(Predicate::Uge),
            _ => None,
        }
    }
}

/// Floating-point comparison predicates (ordered comparisons only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatPredicate {
    Oeq,
    One,
    Olt,
    Ogt,
}

impl FloatPredicate {
    pub fn mnemonic(self) -> &'static str {
        match self {
            FloatPredicate::Oeq => "oeq",
            FloatPredicate::One => "one",
            FloatPredicate::Olt => "olt",
            FloatPredicate::Ogt => "ogt",
        }
    }

    pub fn parse(s: &str) -> Option<FloatPredicate> {
        match s {
            "oeq" => Some(FloatPredicate::Oeq),
            "one" => Some(FloatPredicate::One),
            "olt" => Some(FloatPredicate::Olt),
            "ogt" => Some(FloatPredicate::Ogt),
            _ => None,
        }
    }
}

/// Call target: a named symbol or a computed function pointer.
#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    Direct(String),
    Indirect(Operand),
}

impl Callee {
    /// The statically known callee name, if any.
    pub fn direct_name(&self) -> Option<&str> {
        match self {
            Callee::Direct(name) => Some(name),
            Callee::Indirect(_) => None,
        }
    }
}

/// The operation an instruction performs.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Binary {
        op: BinOp,
        ty: Type,
        lhs: Operand,
        rhs: Operand,
    },
    Icmp {
        pred: Predicate,
        ty: Type,
        lhs: Operand,
        rhs: Operand,
    },
    Fcmp {
        pred: FloatPredicate,
        ty: Type,
        lhs: Operand,
        rhs: Operand,
    },
    Zext {
        value: Operand,
        from: Type,
        to: Type,
    },
    Load {
        ty: Type,
        ptr: Operand,
        volatile: bool,
    },
    Store {
        ty: Type,
        value: Operand,
        ptr: Operand,
        volatile: bool,
    },
    Alloca {
        ty: Type,
    },
    /// Pointer-offset computation: `base + index * sizeof(elem)`.
    Gep {
        elem: Type,
        base: Operand,
        index: Operand,
    },
    Phi {
        ty: Type,
        incoming: Vec<(Operand, BlockId)>,
    },
    Call {
        ret: Type,
        callee: Callee,
        /// Arguments carry their declared type for printing and checking.
        args: Vec<(Type, Operand)>,
    },
    /// Entry marker of an exception handler block.
    LandingPad {
        ty: Type,
    },
    /// Re-raise from an exception handler (terminator).
    Resume {
        value: Operand,
    },
    /// Unconditional branch (terminator).
    Br {
        dest: BlockId,
    },
    /// Conditional branch (terminator).
    CondBr {
        cond: Operand,
        then_dest: BlockId,
        else_dest: BlockId,
    },
    /// Function return (terminator).
    Ret {
        ty: Type,
        value: Option<Operand>,
    },
    /// Defined-unreachable terminator; error paths end here.
    Unreachable,
}

impl Op {
    /// Check if this operation ends a basic block.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Op::Br { .. }
                | Op::CondBr { .. }
                | Op::Ret { .. }
                | Op::Resume { .. }
                | Op::Unreachable
        )
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, Op::Phi { .. })
    }

    /// Type of the value this operation produces, if it produces one.
    pub fn result_type(&self) -> Option<Type> {
        match self {
            Op::Binary { ty, .. } => Some(*ty),
            Op::Icmp { .. } | Op::Fcmp { .. } => Some(Type::I1),
            Op::Zext { to, .. } => Some(*to),
            Op::Load { ty, .. } => Some(*ty),
            Op::Alloca { .. } | Op::Gep { .. } => Some(Type::Ptr),
            Op::Phi { ty, .. } => Some(*ty),
            Op::Call { ret, .. } => {
                if *ret == Type::Void {
                    None
                } else {
                    Some(*ret)
                }
            }
            Op::LandingPad { ty } => Some(*ty),
            Op::Store { .. }
            | Op::Resume { .. }
            | Op::Br { .. }
            | Op::CondBr { .. }
            | Op::Ret { .. }
            | Op::Unreachable => None,
        }
    }

    /// Successor blocks of a terminator (empty for non-terminators and for
    /// `ret`/`resume`/`unreachable`).
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Op::Br { dest } => vec![*dest],
            Op::CondBr {
                then_dest,
                else_dest,
                ..
            } => vec![*then_dest, *else_dest],
            _ => Vec::new(),
        }
    }

    /// All value operands of this operation, in syntactic order.
    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Op::Binary { lhs, rhs, .. }
            | Op::Icmp { lhs, rhs, .. }
            | Op::Fcmp { lhs, rhs, .. } => vec![lhs, rhs],
            Op::Zext { value, .. } => vec![value],
            Op::Load { ptr, .. } => vec![ptr],
            Op::Store { value, ptr, .. } => vec![value, ptr],
            Op::Alloca { .. } => Vec::new(),
            Op::Gep { base, index, .. } => vec![base, index],
            Op::Phi { incoming, .. } => incoming.iter().map(|(v, _)| v).collect(),
            Op::Call { callee, args, .. } => {
                let mut ops: Vec<&Operand> = Vec::new();
                if let Callee::Indirect(target) = callee {
                    ops.push(target);
                }
                ops.extend(args.iter().map(|(_, v)| v));
                ops
            }
            Op::LandingPad { .. } => Vec::new(),
            Op::Resume { value } => vec![value],
            Op::Br { .. } => Vec::new(),
            Op::CondBr { cond, .. } => vec![cond],
            Op::Ret { value, .. } => value.iter().collect(),
            Op::Unreachable => Vec::new(),
        }
    }
}

/// An instruction: a named (or anonymous) operation in a block.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// SSA result name, without the `%` sigil. Present exactly when the
    /// operation produces a value.
    pub name: Option<String>,
    pub op: Op,
}

impl Instruction {
    pub fn named(name: impl Into<String>, op: Op) -> Self {
        Instruction {
            name: Some(name.into()),
            op,
        }
    }

    pub fn anon(op: Op) -> Self {
        Instruction { name: None, op }
    }
}

impl fmt::Display for InstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "inst{}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block{}", self.0)
    }
}
