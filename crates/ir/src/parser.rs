//! Textual IR parser.
//!
//! Line-oriented, LLVM-flavored syntax:
//!
//! ```text
//! func @scale(i32 %n, ptr %p) -> i32 {
//! entry:
//!   %v = load i32, ptr %p
//!   %c = icmp eq i32 %v, %n
//!   br i1 %c, label %then, label %done
//! then:
//!   %m = mul i32 %v, 3
//!   ret i32 %m
//! done:
//!   ret i32 0
//! }
//! ```
//!
//! `;` starts a comment. Each function is parsed in two passes: the first
//! collects block labels and result names so branches and phis can refer
//! forward, the second builds the instructions.

use std::collections::HashMap;

use crate::error::ParseError;
use crate::function::{Function, Param};
use crate::instruction::{
    BinOp, BlockId, Callee, FloatPredicate, InstId, Instruction, Op, Operand, Predicate,
};
use crate::module::Module;
use crate::types::Type;

/// Parse a whole module from textual IR.
pub fn parse(input: &str) -> Result<Module, ParseError> {
    let mut module = Module::new("module");
    let lines: Vec<(usize, &str)> = input
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, strip_comment(l).trim()))
        .filter(|(_, l)| !l.is_empty())
        .collect();

    let mut idx = 0;
    while idx < lines.len() {
        let (line_no, line) = lines[idx];
        if !line.starts_with("func ") {
            return Err(ParseError::ExpectedFunction {
                line: line_no,
                content: line.to_string(),
            });
        }
        // Find the closing brace of this function body.
        let mut end = idx + 1;
        while end < lines.len() && lines[end].1 != "}" {
            end += 1;
        }
        if end == lines.len() {
            return Err(ParseError::UnexpectedEof { line: line_no });
        }

        let function = FuncParser::parse(lines[idx], &lines[idx + 1..end])?;
        module.add_function(function);
        idx = end + 1;
    }

    Ok(module)
}

fn strip_comment(line: &str) -> &str {
    // A ';' inside a string literal does not start a comment.
    let mut in_str = false;
    let mut prev_backslash = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' if !prev_backslash => in_str = !in_str,
            ';' if !in_str => return &line[..i],
            _ => {}
        }
        prev_backslash = c == '\\' && !prev_backslash;
    }
    line
}

struct FuncParser {
    values: HashMap<String, InstId>,
    labels: HashMap<String, BlockId>,
}

impl FuncParser {
    fn parse(
        header: (usize, &str),
        body: &[(usize, &str)],
    ) -> Result<Function, ParseError> {
        let (name, params, ret) = parse_header(header.0, header.1)?;
        let mut f = Function::new(name, params, ret);

        // First pass: create blocks for labels, pre-assign instruction
        // handles to result names. Instruction handles are allocated
        // sequentially by the arena, so the k-th instruction line gets
        // handle k.
        let mut parser = FuncParser {
            values: HashMap::new(),
            labels: HashMap::new(),
        };
        let mut inst_count = 0u32;
        for &(line_no, line) in body {
            if let Some(label) = label_of(line) {
                if parser.labels.contains_key(label) {
                    return Err(ParseError::DuplicateLabel {
                        line: line_no,
                        label: label.to_string(),
                    });
                }
                let id = f.add_block(label);
                parser.labels.insert(label.to_string(), id);
            } else {
                if let Some(result) = result_name(line) {
                    if parser.values.contains_key(result) || f.param_index(result).is_some() {
                        return Err(ParseError::DuplicateValue {
                            line: line_no,
                            name: result.to_string(),
                        });
                    }
                    parser.values.insert(result.to_string(), InstId(inst_count));
                }
                inst_count += 1;
            }
        }

        // Second pass: build instructions in order.
        let mut current: Option<BlockId> = None;
        for &(line_no, line) in body {
            if let Some(label) = label_of(line) {
                current = Some(parser.labels[label]);
                continue;
            }
            let block = current.ok_or(ParseError::InstructionOutsideBlock { line: line_no })?;
            let inst = parser.parse_instruction(&f, line_no, line)?;
            f.push_inst(block, inst);
        }

        for block in f.block_ids().collect::<Vec<_>>() {
            if f.terminator(block).is_none() {
                return Err(ParseError::MissingTerminator {
                    function: f.name.clone(),
                    block: f.block(block).label.clone(),
                });
            }
        }

        Ok(f)
    }

    fn parse_instruction(
        &self,
        f: &Function,
        line_no: usize,
        line: &str,
    ) -> Result<Instruction, ParseError> {
        let (name, rest) = match result_name(line) {
            Some(n) => {
                let eq = line.find('=').unwrap();
                (Some(n.to_string()), line[eq + 1..].trim())
            }
            None => (None, line),
        };

        let (mnemonic, operands_str) = split_first_word(rest);
        let op = self.parse_op(f, line_no, mnemonic, operands_str)?;

        Ok(Instruction { name, op })
    }

    fn parse_op(
        &self,
        f: &Function,
        line: usize,
        mnemonic: &str,
        rest: &str,
    ) -> Result<Op, ParseError> {
        if let Some(op) = BinOp::parse(mnemonic) {
            let (ty, rest) = self.take_type(line, rest)?;
            let parts = split_commas(rest);
            let [lhs, rhs] = two(line, &parts, rest)?;
            return Ok(Op::Binary {
                op,
                ty,
                lhs: self.operand(f, line, lhs)?,
                rhs: self.operand(f, line, rhs)?,
            });
        }

        match mnemonic {
            "icmp" => {
                let (pred_str, rest) = split_first_word(rest);
                let pred = Predicate::parse(pred_str).ok_or_else(|| {
                    ParseError::MalformedInstruction {
                        line,
                        content: rest.to_string(),
                    }
                })?;
                let (ty, rest) = self.take_type(line, rest)?;
                let parts = split_commas(rest);
                let [lhs, rhs] = two(line, &parts, rest)?;
                Ok(Op::Icmp {
                    pred,
                    ty,
                    lhs: self.operand(f, line, lhs)?,
                    rhs: self.operand(f, line, rhs)?,
                })
            }
            "fcmp" => {
                let (pred_str, rest) = split_first_word(rest);
                let pred = FloatPredicate::parse(pred_str).ok_or_else(|| {
                    ParseError::MalformedInstruction {
                        line,
                        content: rest.to_string(),
                    }
                })?;
                let (ty, rest) = self.take_type(line, rest)?;
                let parts = split_commas(rest);
                let [lhs, rhs] = two(line, &parts, rest)?;
                Ok(Op::Fcmp {
                    pred,
                    ty,
                    lhs: self.operand(f, line, lhs)?,
                    rhs: self.operand(f, line, rhs)?,
                })
            }
            "zext" => {
                // zext <from> <value> to <to>
                let (from, rest) = self.take_type(line, rest)?;
                let Some((value_str, to_str)) = rest.split_once(" to ") else {
                    return Err(ParseError::MalformedInstruction {
                        line,
                        content: rest.to_string(),
                    });
                };
                let to = self.type_of(line, to_str.trim())?;
                Ok(Op::Zext {
                    value: self.operand(f, line, value_str.trim())?,
                    from,
                    to,
                })
            }
            "load" => {
                let (volatile, rest) = take_keyword(rest, "volatile");
                let parts = split_commas(rest);
                let [ty_str, ptr_str] = two(line, &parts, rest)?;
                let ty = self.type_of(line, ty_str)?;
                let ptr = self.typed_operand(f, line, ptr_str)?.1;
                Ok(Op::Load { ty, ptr, volatile })
            }
            "store" => {
                let (volatile, rest) = take_keyword(rest, "volatile");
                let parts = split_commas(rest);
                let [value_str, ptr_str] = two(line, &parts, rest)?;
                let (ty, value) = self.typed_operand(f, line, value_str)?;
                let ptr = self.typed_operand(f, line, ptr_str)?.1;
                Ok(Op::Store {
                    ty,
                    value,
                    ptr,
                    volatile,
                })
            }
            "alloca" => {
                let ty = self.type_of(line, rest.trim())?;
                Ok(Op::Alloca { ty })
            }
            "gep" => {
                let parts = split_commas(rest);
                let [elem_str, base_str, index_str] = three(line, &parts, rest)?;
                let elem = self.type_of(line, elem_str)?;
                let base = self.typed_operand(f, line, base_str)?.1;
                let index = self.typed_operand(f, line, index_str)?.1;
                Ok(Op::Gep { elem, base, index })
            }
            "phi" => {
                let (ty, rest) = self.take_type(line, rest)?;
                let mut incoming = Vec::new();
                for arm in split_commas_outside_brackets(rest) {
                    let arm = arm.trim();
                    let inner = arm
                        .strip_prefix('[')
                        .and_then(|s| s.strip_suffix(']'))
                        .ok_or_else(|| ParseError::MalformedInstruction {
                            line,
                            content: arm.to_string(),
                        })?;
                    let parts = split_commas(inner);
                    let [value_str, label_str] = two(line, &parts, inner)?;
                    let value = self.operand(f, line, value_str)?;
                    let block = self.label(line, label_str)?;
                    incoming.push((value, block));
                }
                Ok(Op::Phi { ty, incoming })
            }
            "call" => {
                let (ret, rest) = self.take_type(line, rest)?;
                let open = rest.find('(').ok_or_else(|| {
                    ParseError::MalformedInstruction {
                        line,
                        content: rest.to_string(),
                    }
                })?;
                let close = rest.rfind(')').ok_or_else(|| {
                    ParseError::MalformedInstruction {
                        line,
                        content: rest.to_string(),
                    }
                })?;
                let target = rest[..open].trim();
                let callee = if let Some(symbol) = target.strip_prefix('@') {
                    Callee::Direct(symbol.to_string())
                } else {
                    Callee::Indirect(self.operand(f, line, target)?)
                };
                let mut args = Vec::new();
                let args_str = &rest[open + 1..close];
                if !args_str.trim().is_empty() {
                    for arg in split_commas(args_str) {
                        args.push(self.typed_operand(f, line, arg)?);
                    }
                }
                Ok(Op::Call { ret, callee, args })
            }
            "landingpad" => {
                let ty = self.type_of(line, rest.trim())?;
                Ok(Op::LandingPad { ty })
            }
            "resume" => {
                let value = self.typed_operand(f, line, rest)?.1;
                Ok(Op::Resume { value })
            }
            "br" => {
                let parts = split_commas(rest);
                match parts.len() {
                    1 => Ok(Op::Br {
                        dest: self.branch_label(line, parts[0])?,
                    }),
                    3 => {
                        let cond = self.typed_operand(f, line, parts[0])?.1;
                        Ok(Op::CondBr {
                            cond,
                            then_dest: self.branch_label(line, parts[1])?,
                            else_dest: self.branch_label(line, parts[2])?,
                        })
                    }
                    _ => Err(ParseError::MalformedInstruction {
                        line,
                        content: rest.to_string(),
                    }),
                }
            }
            "ret" => {
                let rest = rest.trim();
                if rest == "void" {
                    Ok(Op::Ret {
                        ty: Type::Void,
                        value: None,
                    })
                } else {
                    let (ty, value) = self.typed_operand(f, line, rest)?;
                    Ok(Op::Ret {
                        ty,
                        value: Some(value),
                    })
                }
            }
            "unreachable" => Ok(Op::Unreachable),
            other => Err(ParseError::UnknownInstruction {
                line,
                mnemonic: other.to_string(),
            }),
        }
    }

    /// Parse an operand token: `%name`, `null`, a literal, or a string.
    fn operand(&self, f: &Function, line: usize, token: &str) -> Result<Operand, ParseError> {
        let token = token.trim();
        if let Some(name) = token.strip_prefix('%') {
            if let Some(&id) = self.values.get(name) {
                return Ok(Operand::Inst(id));
            }
            if let Some(index) = f.param_index(name) {
                return Ok(Operand::Arg(index));
            }
            return Err(ParseError::UndefinedValue {
                line,
                name: name.to_string(),
            });
        }
        if token == "null" {
            return Ok(Operand::NullPtr);
        }
        if let Some(body) = token.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
            return Ok(Operand::Str(unescape(body)));
        }
        if !token.contains('.') {
            if let Ok(v) = token.parse::<i64>() {
                return Ok(Operand::IntConst(v));
            }
        }
        if let Ok(v) = token.parse::<f64>() {
            return Ok(Operand::FloatConst(v));
        }
        Err(ParseError::MalformedInstruction {
            line,
            content: token.to_string(),
        })
    }

    /// Parse a `<type> <operand>` pair.
    fn typed_operand(
        &self,
        f: &Function,
        line: usize,
        token: &str,
    ) -> Result<(Type, Operand), ParseError> {
        let (ty_str, rest) = split_first_word(token.trim());
        let ty = self.type_of(line, ty_str)?;
        Ok((ty, self.operand(f, line, rest)?))
    }

    fn take_type<'a>(&self, line: usize, rest: &'a str) -> Result<(Type, &'a str), ParseError> {
        let (ty_str, rest) = split_first_word(rest);
        Ok((self.type_of(line, ty_str)?, rest))
    }

    fn type_of(&self, line: usize, s: &str) -> Result<Type, ParseError> {
        Type::parse(s.trim()).ok_or_else(|| ParseError::UnknownType {
            line,
            ty: s.trim().to_string(),
        })
    }

    fn label(&self, line: usize, token: &str) -> Result<BlockId, ParseError> {
        let token = token.trim();
        let name = token.strip_prefix('%').unwrap_or(token);
        self.labels
            .get(name)
            .copied()
            .ok_or_else(|| ParseError::UndefinedLabel {
                line,
                label: name.to_string(),
            })
    }

    /// Parse `label %name`.
    fn branch_label(&self, line: usize, token: &str) -> Result<BlockId, ParseError> {
        let token = token.trim();
        let name = token.strip_prefix("label").map(str::trim).unwrap_or(token);
        self.label(line, name)
    }
}

fn parse_header(line_no: usize, line: &str) -> Result<(String, Vec<Param>, Type), ParseError> {
    let malformed = || ParseError::MalformedHeader {
        line: line_no,
        content: line.to_string(),
    };

    // func @name(<params>) -> <ty> {
    let rest = line.strip_prefix("func ").ok_or_else(malformed)?;
    let rest = rest.trim().strip_prefix('@').ok_or_else(malformed)?;
    let open = rest.find('(').ok_or_else(malformed)?;
    let close = rest.rfind(')').ok_or_else(malformed)?;
    let name = rest[..open].trim().to_string();

    let mut params = Vec::new();
    let params_str = &rest[open + 1..close];
    if !params_str.trim().is_empty() {
        for p in split_commas(params_str) {
            let (ty_str, name_str) = split_first_word(p.trim());
            let ty = Type::parse(ty_str).ok_or_else(|| ParseError::UnknownType {
                line: line_no,
                ty: ty_str.to_string(),
            })?;
            let name = name_str.trim().strip_prefix('%').ok_or_else(malformed)?;
            params.push(Param {
                name: name.to_string(),
                ty,
            });
        }
    }

    let tail = rest[close + 1..].trim();
    let tail = tail.strip_prefix("->").ok_or_else(malformed)?;
    let tail = tail.trim().strip_suffix('{').ok_or_else(malformed)?;
    let ret = Type::parse(tail.trim()).ok_or_else(|| ParseError::UnknownType {
        line: line_no,
        ty: tail.trim().to_string(),
    })?;

    Ok((name, params, ret))
}

/// Label line: `name:` with nothing after the colon.
fn label_of(line: &str) -> Option<&str> {
    let name = line.strip_suffix(':')?;
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
    {
        return None;
    }
    Some(name)
}

/// `%name` on the left of `=`, if this line defines a result.
fn result_name(line: &str) -> Option<&str> {
    let rest = line.strip_prefix('%')?;
    let eq = rest.find('=')?;
    let name = rest[..eq].trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    Some(name)
}

fn split_first_word(s: &str) -> (&str, &str) {
    let s = s.trim();
    match s.find(char::is_whitespace) {
        Some(pos) => (&s[..pos], s[pos..].trim()),
        None => (s, ""),
    }
}

fn take_keyword<'a>(s: &'a str, keyword: &str) -> (bool, &'a str) {
    let s = s.trim();
    match s.strip_prefix(keyword) {
        Some(rest) if rest.starts_with(char::is_whitespace) => (true, rest.trim()),
        _ => (false, s),
    }
}

/// Split on commas at depth zero (outside quotes).
fn split_commas(s: &str) -> Vec<&str> {
    split_on(s, false)
}

/// Split on commas outside `[...]` arms and quotes (for phi lists).
fn split_commas_outside_brackets(s: &str) -> Vec<&str> {
    split_on(s, true)
}

fn split_on(s: &str, respect_brackets: bool) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_str = false;
    let mut prev_backslash = false;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '"' if !prev_backslash => in_str = !in_str,
            '[' if respect_brackets && !in_str => depth += 1,
            ']' if respect_brackets && !in_str => depth -= 1,
            ',' if depth == 0 && !in_str => {
                let part = s[start..i].trim();
                if !part.is_empty() {
                    parts.push(part);
                }
                start = i + 1;
            }
            _ => {}
        }
        prev_backslash = c == '\\' && !prev_backslash;
    }
    let part = s[start..].trim();
    if !part.is_empty() {
        parts.push(part);
    }
    parts
}

fn two<'a>(line: usize, parts: &[&'a str], context: &str) -> Result<[&'a str; 2], ParseError> {
    if parts.len() == 2 {
        Ok([parts[0], parts[1]])
    } else {
        Err(ParseError::MalformedInstruction {
            line,
            content: context.to_string(),
        })
    }
}

fn three<'a>(line: usize, parts: &[&'a str], context: &str) -> Result<[&'a str; 3], ParseError> {
    if parts.len() == 3 {
        Ok([parts[0], parts[1], parts[2]])
    } else {
        Err(ParseError::MalformedInstruction {
            line,
            content: context.to_string(),
        })
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::parse;
    use crate::error::ParseError;
    use crate::instruction::{BinOp, Callee, Op, Operand, Predicate};
    use crate::types::Type;

    #[test]
    fn test_parse_simple_function() {
        let module = parse(indoc! {"
            func @scale(i32 %n, ptr %p) -> i32 {
            entry:
              %v = load i32, ptr %p
              %c = icmp eq i32 %v, %n
              br i1 %c, label %then, label %done
            then:
              %m = mul i32 %v, 3
              ret i32 %m
            done:
              ret i32 0
            }
        "})
        .unwrap();

        let f = module.function("scale").unwrap();
        assert_eq!(f.params.len(), 2);
        assert_eq!(f.ret, Type::I32);
        assert_eq!(f.num_blocks(), 3);

        let entry = f.entry().unwrap();
        let insts = f.block(entry).insts();
        assert!(matches!(f.inst(insts[0]).op, Op::Load { ty: Type::I32, .. }));
        assert!(matches!(
            f.inst(insts[1]).op,
            Op::Icmp {
                pred: Predicate::Eq,
                ..
            }
        ));
        assert!(matches!(f.inst(insts[2]).op, Op::CondBr { .. }));
    }

    #[test]
    fn test_parse_phi_with_forward_reference() {
        let module = parse(indoc! {"
            func @count(i32 %n) -> i32 {
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
        "})
        .unwrap();

        let f = module.function("count").unwrap();
        let loop_bb = f.block_ids().nth(1).unwrap();
        let phi = f.block(loop_bb).insts()[0];
        match &f.inst(phi).op {
            Op::Phi { incoming, .. } => {
                assert_eq!(incoming.len(), 2);
                assert_eq!(incoming[0].0, Operand::IntConst(0));
                // Second arm references %next, defined after the phi.
                assert!(incoming[1].0.as_inst().is_some());
            }
            other => panic!("expected phi, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_calls_and_strings() {
        let module = parse(indoc! {r#"
            func @f(ptr %fp) -> void {
            entry:
              %r = call i32 @fi_check_bounds(ptr null, ptr null, i64 1024)
              call void %fp(ptr "entry;tag")
              ret void
            }
        "#})
        .unwrap();

        let f = module.function("f").unwrap();
        let entry = f.entry().unwrap();
        let insts = f.block(entry).insts();
        match &f.inst(insts[0]).op {
            Op::Call { callee, args, .. } => {
                assert_eq!(callee.direct_name(), Some("fi_check_bounds"));
                assert_eq!(args.len(), 3);
                assert_eq!(args[2], (Type::I64, Operand::IntConst(1024)));
            }
            other => panic!("expected call, got {other:?}"),
        }
        match &f.inst(insts[1]).op {
            Op::Call { callee, args, .. } => {
                assert!(matches!(callee, Callee::Indirect(Operand::Arg(0))));
                // The ';' inside the string must not start a comment.
                assert_eq!(args[0], (Type::Ptr, Operand::Str("entry;tag".into())));
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_volatile_and_store() {
        let module = parse(indoc! {"
            func @io(ptr %reg) -> i32 {
            entry:
              %v = load volatile i32, ptr %reg
              store volatile i32 %v, ptr %reg
              ret i32 %v
            }
        "})
        .unwrap();

        let f = module.function("io").unwrap();
        let entry = f.entry().unwrap();
        let insts = f.block(entry).insts();
        assert!(matches!(f.inst(insts[0]).op, Op::Load { volatile: true, .. }));
        assert!(matches!(
            f.inst(insts[1]).op,
            Op::Store { volatile: true, .. }
        ));
    }

    #[test]
    fn test_parse_arithmetic_forms() {
        let module = parse(indoc! {"
            func @ops(f64 %x, f64 %y, i64 %a) -> void {
            entry:
              %q = fdiv f64 %x, %y
              %eq = fcmp oeq f64 %q, %x
              %r = srem i64 %a, 7
              %z = zext i1 %eq to i32
              %g = gep i64, ptr null, i64 %a
              ret void
            }
        "})
        .unwrap();

        let f = module.function("ops").unwrap();
        let entry = f.entry().unwrap();
        let insts = f.block(entry).insts();
        assert!(matches!(
            f.inst(insts[0]).op,
            Op::Binary {
                op: BinOp::FDiv,
                ..
            }
        ));
        assert!(matches!(f.inst(insts[3]).op, Op::Zext { to: Type::I32, .. }));
        assert!(matches!(f.inst(insts[4]).op, Op::Gep { elem: Type::I64, .. }));
    }

    #[test]
    fn test_undefined_value_is_error() {
        let err = parse(indoc! {"
            func @f() -> void {
            entry:
              %x = add i32 %missing, 1
              ret void
            }
        "})
        .unwrap_err();
        assert!(matches!(err, ParseError::UndefinedValue { .. }));
    }

    #[test]
    fn test_undefined_label_is_error() {
        let err = parse(indoc! {"
            func @f() -> void {
            entry:
              br label %nowhere
            }
        "})
        .unwrap_err();
        assert!(matches!(err, ParseError::UndefinedLabel { .. }));
    }

    #[test]
    fn test_missing_terminator_is_error() {
        let err = parse(indoc! {"
            func @f() -> void {
            entry:
              %x = add i32 1, 2
            }
        "})
        .unwrap_err();
        assert!(matches!(err, ParseError::MissingTerminator { .. }));
    }

    #[test]
    fn test_duplicate_value_is_error() {
        let err = parse(indoc! {"
            func @f() -> void {
            entry:
              %x = add i32 1, 2
              %x = add i32 3, 4
              ret void
            }
        "})
        .unwrap_err();
        assert!(matches!(err, ParseError::DuplicateValue { .. }));
    }

    #[test]
    fn test_comments_and_blank_lines_ignored() {
        let module = parse(indoc! {"
            ; leading comment
            func @f() -> void {
            entry:               ; block comment

              ret void           ; trailing
            }
        "})
        .unwrap();
        assert_eq!(module.functions().len(), 1);
    }
}
