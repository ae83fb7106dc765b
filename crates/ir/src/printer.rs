//! Textual IR emission.
//!
//! Prints the same syntax [`crate::parser`] accepts, so hardened modules
//! round-trip through the toolchain.

use std::fmt::{self, Write};

use crate::function::Function;
use crate::instruction::{Callee, Op, Operand};
use crate::module::Module;

impl fmt::Display for Module {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, f) in self.functions().iter().enumerate() {
            if i > 0 {
                out.write_char('\n')?;
            }
            write!(out, "{f}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(out, "func @{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                out.write_str(", ")?;
            }
            write!(out, "{} %{}", p.ty, p.name)?;
        }
        writeln!(out, ") -> {} {{", self.ret)?;

        for block in self.block_ids() {
            writeln!(out, "{}:", self.block(block).label)?;
            for &id in self.block(block).insts() {
                out.write_str("  ")?;
                self.fmt_inst(out, id)?;
                out.write_char('\n')?;
            }
        }

        writeln!(out, "}}")
    }
}

impl Function {
    fn fmt_inst(&self, out: &mut fmt::Formatter<'_>, id: crate::instruction::InstId) -> fmt::Result {
        let inst = self.inst(id);
        if inst.op.result_type().is_some() {
            match &inst.name {
                Some(name) => write!(out, "%{name} = ")?,
                None => write!(out, "%v{} = ", id.index())?,
            }
        }

        match &inst.op {
            Op::Binary { op, ty, lhs, rhs } => {
                write!(out, "{} {ty} ", op.mnemonic())?;
                self.fmt_operand(out, lhs)?;
                out.write_str(", ")?;
                self.fmt_operand(out, rhs)
            }
            Op::Icmp { pred, ty, lhs, rhs } => {
                write!(out, "icmp {} {ty} ", pred.mnemonic())?;
                self.fmt_operand(out, lhs)?;
                out.write_str(", ")?;
                self.fmt_operand(out, rhs)
            }
            Op::Fcmp { pred, ty, lhs, rhs } => {
                write!(out, "fcmp {} {ty} ", pred.mnemonic())?;
                self.fmt_operand(out, lhs)?;
                out.write_str(", ")?;
                self.fmt_operand(out, rhs)
            }
            Op::Zext { value, from, to } => {
                write!(out, "zext {from} ")?;
                self.fmt_operand(out, value)?;
                write!(out, " to {to}")
            }
            Op::Load { ty, ptr, volatile } => {
                out.write_str("load ")?;
                if *volatile {
                    out.write_str("volatile ")?;
                }
                write!(out, "{ty}, ptr ")?;
                self.fmt_operand(out, ptr)
            }
            Op::Store {
                ty,
                value,
                ptr,
                volatile,
            } => {
                out.write_str("store ")?;
                if *volatile {
                    out.write_str("volatile ")?;
                }
                write!(out, "{ty} ")?;
                self.fmt_operand(out, value)?;
                out.write_str(", ptr ")?;
                self.fmt_operand(out, ptr)
            }
            Op::Alloca { ty } => write!(out, "alloca {ty}"),
            Op::Gep { elem, base, index } => {
                write!(out, "gep {elem}, ptr ")?;
                self.fmt_operand(out, base)?;
                out.write_str(", i64 ")?;
                self.fmt_operand(out, index)
            }
            Op::Phi { ty, incoming } => {
                write!(out, "phi {ty} ")?;
                for (i, (value, pred)) in incoming.iter().enumerate() {
                    if i > 0 {
                        out.write_str(", ")?;
                    }
                    out.write_str("[ ")?;
                    self.fmt_operand(out, value)?;
                    write!(out, ", %{} ]", self.block(*pred).label)?;
                }
                Ok(())
            }
            Op::Call { ret, callee, args } => {
                write!(out, "call {ret} ")?;
                match callee {
                    Callee::Direct(name) => write!(out, "@{name}")?,
                    Callee::Indirect(target) => self.fmt_operand(out, target)?,
                }
                out.write_char('(')?;
                for (i, (ty, value)) in args.iter().enumerate() {
                    if i > 0 {
                        out.write_str(", ")?;
                    }
                    write!(out, "{ty} ")?;
                    self.fmt_operand(out, value)?;
                }
                out.write_char(')')
            }
            Op::LandingPad { ty } => write!(out, "landingpad {ty}"),
            Op::Resume { value } => {
                out.write_str("resume ptr ")?;
                self.fmt_operand(out, value)
            }
            Op::Br { dest } => {
                write!(out, "br label %{}", self.block(*dest).label)
            }
            Op::CondBr {
                cond,
                then_dest,
                else_dest,
            } => {
                out.write_str("br i1 ")?;
                self.fmt_operand(out, cond)?;
                write!(
                    out,
                    ", label %{}, label %{}",
                    self.block(*then_dest).label,
                    self.block(*else_dest).label
                )
            }
            Op::Ret { ty, value } => match value {
                Some(v) => {
                    write!(out, "ret {ty} ")?;
                    self.fmt_operand(out, v)
                }
                None => out.write_str("ret void"),
            },
            Op::Unreachable => out.write_str("unreachable"),
        }
    }

    fn fmt_operand(&self, out: &mut fmt::Formatter<'_>, operand: &Operand) -> fmt::Result {
        match operand {
            Operand::Inst(id) => match &self.inst(*id).name {
                Some(name) => write!(out, "%{name}"),
                None => write!(out, "%v{}", id.index()),
            },
            Operand::Arg(index) => write!(out, "%{}", self.params[*index].name),
            Operand::IntConst(v) => write!(out, "{v}"),
            Operand::FloatConst(v) => write!(out, "{v:?}"),
            Operand::NullPtr => out.write_str("null"),
            Operand::Str(s) => write!(out, "\"{}\"", escape(s)),
        }
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}
