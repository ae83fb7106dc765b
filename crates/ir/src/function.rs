//! Functions and basic blocks.
//!
//! A function owns two arenas: one for instructions, one for blocks. Both
//! are append-only; handles ([`InstId`], [`BlockId`]) are indices into them
//! and remain valid for the lifetime of the function, including across
//! block splits. A block is an ordered list of instruction handles; layout
//! order of blocks is kept separately so newly created blocks can be placed
//! next to their parents when printing.

use std::collections::HashMap;

use crate::instruction::{BlockId, InstId, Instruction, Op};
use crate::types::Type;

/// A formal parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

/// A basic block: a label plus an ordered run of instructions, the last of
/// which is the block's only terminator.
#[derive(Debug, Clone)]
pub struct Block {
    pub label: String,
    insts: Vec<InstId>,
}

impl Block {
    pub fn insts(&self) -> &[InstId] {
        &self.insts
    }

    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }
}

/// A function under transformation.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Type,
    insts: Vec<Instruction>,
    blocks: Vec<Block>,
    order: Vec<BlockId>,
}

impl Function {
    pub fn new(name: impl Into<String>, params: Vec<Param>, ret: Type) -> Self {
        Function {
            name: name.into(),
            params,
            ret,
            insts: Vec::new(),
            blocks: Vec::new(),
            order: Vec::new(),
        }
    }

    /// The entry block. The first block added is the entry and stays so.
    pub fn entry(&self) -> Option<BlockId> {
        self.order.first().copied()
    }

    /// Block handles in layout order.
    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.order.iter().copied()
    }

    pub fn num_blocks(&self) -> usize {
        self.order.len()
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn inst(&self, id: InstId) -> &Instruction {
        &self.insts[id.index()]
    }

    pub fn inst_mut(&mut self, id: InstId) -> &mut Instruction {
        &mut self.insts[id.index()]
    }

    pub fn num_insts(&self) -> usize {
        self.insts.len()
    }

    /// All instruction handles, in arena order (not execution order).
    pub fn inst_ids(&self) -> impl Iterator<Item = InstId> {
        (0..self.insts.len() as u32).map(InstId)
    }

    /// Look up a parameter index by name.
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }

    /// Append a new, empty block at the end of the layout order.
    pub fn add_block(&mut self, label: impl Into<String>) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block {
            label: label.into(),
            insts: Vec::new(),
        });
        self.order.push(id);
        id
    }

    /// Create a new block placed immediately after `after` in layout order.
    pub fn insert_block_after(&mut self, after: BlockId, label: impl Into<String>) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block {
            label: label.into(),
            insts: Vec::new(),
        });
        let pos = self
            .order
            .iter()
            .position(|&b| b == after)
            .map(|p| p + 1)
            .unwrap_or(self.order.len());
        self.order.insert(pos, id);
        id
    }

    /// Append an instruction to a block.
    pub fn push_inst(&mut self, block: BlockId, inst: Instruction) -> InstId {
        let id = InstId(self.insts.len() as u32);
        self.insts.push(inst);
        self.blocks[block.index()].insts.push(id);
        id
    }

    /// Insert an instruction at `pos` within a block.
    pub fn insert_inst(&mut self, block: BlockId, pos: usize, inst: Instruction) -> InstId {
        let id = InstId(self.insts.len() as u32);
        self.insts.push(inst);
        self.blocks[block.index()].insts.insert(pos, id);
        id
    }

    /// Locate an instruction: which block holds it, and at what position.
    pub fn find_inst(&self, id: InstId) -> Option<(BlockId, usize)> {
        for &b in &self.order {
            if let Some(pos) = self.blocks[b.index()].insts.iter().position(|&i| i == id) {
                return Some((b, pos));
            }
        }
        None
    }

    /// The block's terminator, if its last instruction is one.
    pub fn terminator(&self, block: BlockId) -> Option<InstId> {
        let last = *self.blocks[block.index()].insts.last()?;
        if self.insts[last.index()].op.is_terminator() {
            Some(last)
        } else {
            None
        }
    }

    /// Position of the first non-phi instruction in a block.
    pub fn first_non_phi(&self, block: BlockId) -> usize {
        self.blocks[block.index()]
            .insts
            .iter()
            .position(|&i| !self.insts[i.index()].op.is_phi())
            .unwrap_or(self.blocks[block.index()].insts.len())
    }

    /// Generate a value name not used by any instruction or parameter.
    ///
    /// Returns `base` itself when free, otherwise `base.1`, `base.2`, ...
    pub fn fresh_value_name(&self, base: &str) -> String {
        if !self.value_name_used(base) {
            return base.to_string();
        }
        let mut n = 1usize;
        loop {
            let candidate = format!("{base}.{n}");
            if !self.value_name_used(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn value_name_used(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name == name)
            || self
                .insts
                .iter()
                .any(|i| i.name.as_deref() == Some(name))
    }

    /// Generate a block label not used by any existing block.
    pub fn fresh_label(&self, base: &str) -> String {
        if !self.blocks.iter().any(|b| b.label == base) {
            return base.to_string();
        }
        let mut n = 1usize;
        loop {
            let candidate = format!("{base}.{n}");
            if !self.blocks.iter().any(|b| b.label == candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Split `block` so that the instructions from position `at` onward move
    /// into a new continuation block, which inherits the original
    /// terminator and therefore all successor edges. The original block is
    /// re-terminated with an unconditional branch to the continuation
    /// (callers typically replace it with a conditional branch).
    ///
    /// Phi nodes in the moved terminator's successors are rewired so their
    /// incoming edges name the continuation block.
    ///
    /// Splitting at or past the end of the block is a no-op that returns
    /// the block unchanged.
    pub fn split_block(&mut self, block: BlockId, at: usize, label: impl Into<String>) -> BlockId {
        if at >= self.blocks[block.index()].insts.len() {
            return block;
        }

        let tail: Vec<InstId> = self.blocks[block.index()].insts.split_off(at);
        let cont = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block {
            label: label.into(),
            insts: tail,
        });
        let pos = self
            .order
            .iter()
            .position(|&b| b == block)
            .map(|p| p + 1)
            .unwrap_or(self.order.len());
        self.order.insert(pos, cont);

        // Successor phis must now name the continuation as their
        // predecessor, since the branch into them moved there.
        let successors = self
            .terminator(cont)
            .map(|t| self.insts[t.index()].op.successors())
            .unwrap_or_default();
        for succ in successors {
            self.rewire_phi_incoming(succ, block, cont);
        }

        self.push_inst(block, Instruction::anon(Op::Br { dest: cont }));
        cont
    }

    /// Point phi incoming edges of `block` that name `from` at `to` instead.
    pub fn rewire_phi_incoming(&mut self, block: BlockId, from: BlockId, to: BlockId) {
        let ids: Vec<InstId> = self.blocks[block.index()].insts.clone();
        for id in ids {
            if let Op::Phi { incoming, .. } = &mut self.insts[id.index()].op {
                for (_, pred) in incoming.iter_mut() {
                    if *pred == from {
                        *pred = to;
                    }
                }
            }
        }
    }

    /// Map each instruction to the instructions that use its result.
    pub fn build_use_map(&self) -> HashMap<InstId, Vec<InstId>> {
        let mut uses: HashMap<InstId, Vec<InstId>> = HashMap::new();
        for user in self.inst_ids() {
            for operand in self.insts[user.index()].op.operands() {
                if let Some(def) = operand.as_inst() {
                    uses.entry(def).or_default().push(user);
                }
            }
        }
        uses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{BinOp, Operand};

    fn sample_function() -> (Function, BlockId, InstId, InstId) {
        let mut f = Function::new("f", Vec::new(), Type::I32);
        let entry = f.add_block("entry");
        let a = f.push_inst(
            entry,
            Instruction::named(
                "a",
                Op::Binary {
                    op: BinOp::Add,
                    ty: Type::I32,
                    lhs: Operand::IntConst(1),
                    rhs: Operand::IntConst(2),
                },
            ),
        );
        let b = f.push_inst(
            entry,
            Instruction::named(
                "b",
                Op::Binary {
                    op: BinOp::Mul,
                    ty: Type::I32,
                    lhs: Operand::Inst(a),
                    rhs: Operand::IntConst(3),
                },
            ),
        );
        f.push_inst(
            entry,
            Instruction::anon(Op::Ret {
                ty: Type::I32,
                value: Some(Operand::Inst(b)),
            }),
        );
        (f, entry, a, b)
    }

    #[test]
    fn test_split_moves_tail_and_adds_branch() {
        let (mut f, entry, a, b) = sample_function();
        let cont = f.split_block(entry, 1, "cont");

        // Original block: [a, br cont]
        assert_eq!(f.block(entry).insts()[0], a);
        let term = f.terminator(entry).unwrap();
        assert_eq!(f.inst(term).op, Op::Br { dest: cont });

        // Continuation: [b, ret]
        assert_eq!(f.block(cont).insts()[0], b);
        assert!(f.terminator(cont).is_some());

        // Layout order places the continuation right after the original.
        let order: Vec<BlockId> = f.block_ids().collect();
        assert_eq!(order, vec![entry, cont]);
    }

    #[test]
    fn test_split_past_end_is_noop() {
        let (mut f, entry, ..) = sample_function();
        let n = f.block(entry).len();
        let same = f.split_block(entry, n, "cont");
        assert_eq!(same, entry);
        assert_eq!(f.num_blocks(), 1);
    }

    #[test]
    fn test_split_rewires_successor_phis() {
        let mut f = Function::new("g", Vec::new(), Type::I32);
        let entry = f.add_block("entry");
        let merge = f.add_block("merge");
        let x = f.push_inst(
            entry,
            Instruction::named(
                "x",
                Op::Binary {
                    op: BinOp::Add,
                    ty: Type::I32,
                    lhs: Operand::IntConst(1),
                    rhs: Operand::IntConst(1),
                },
            ),
        );
        f.push_inst(entry, Instruction::anon(Op::Br { dest: merge }));
        let phi = f.push_inst(
            merge,
            Instruction::named(
                "p",
                Op::Phi {
                    ty: Type::I32,
                    incoming: vec![(Operand::Inst(x), entry)],
                },
            ),
        );
        f.push_inst(
            merge,
            Instruction::anon(Op::Ret {
                ty: Type::I32,
                value: Some(Operand::Inst(phi)),
            }),
        );

        // Split entry before its terminator; the phi's predecessor must
        // follow the branch into the continuation.
        let cont = f.split_block(entry, 1, "entry.cont");
        match &f.inst(phi).op {
            Op::Phi { incoming, .. } => assert_eq!(incoming[0].1, cont),
            other => panic!("expected phi, got {other:?}"),
        }
    }

    #[test]
    fn test_fresh_names_avoid_collisions() {
        let (f, ..) = sample_function();
        assert_eq!(f.fresh_value_name("a"), "a.1");
        assert_eq!(f.fresh_value_name("c"), "c");
        assert_eq!(f.fresh_label("entry"), "entry.1");
    }

    #[test]
    fn test_use_map() {
        let (f, _, a, b) = sample_function();
        let uses = f.build_use_map();
        assert_eq!(uses[&a], vec![b]);
        // b is used by the return.
        assert_eq!(uses[&b].len(), 1);
    }
}
