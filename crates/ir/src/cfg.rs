//! Control-flow graph over a function's basic blocks.
//!
//! Backed by petgraph. Built once per query site from the function's
//! current block structure; the graph is a read-only view, so it must be
//! rebuilt after structural mutation.

use std::collections::{HashMap, HashSet};

use petgraph::algo::dominators::{self, Dominators};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;

use crate::function::Function;
use crate::instruction::BlockId;

/// Control-flow graph for one function.
pub struct Cfg {
    graph: DiGraph<BlockId, ()>,
    nodes: HashMap<BlockId, NodeIndex>,
    entry: Option<NodeIndex>,
}

impl Cfg {
    /// Build the CFG from the function's terminators.
    pub fn build(f: &Function) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();

        for block in f.block_ids() {
            let node = graph.add_node(block);
            nodes.insert(block, node);
        }
        for block in f.block_ids() {
            if let Some(term) = f.terminator(block) {
                for succ in f.inst(term).op.successors() {
                    graph.add_edge(nodes[&block], nodes[&succ], ());
                }
            }
        }

        let entry = f.entry().map(|e| nodes[&e]);
        Cfg {
            graph,
            nodes,
            entry,
        }
    }

    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        self.graph
            .neighbors(self.nodes[&block])
            .map(|n| self.graph[n])
            .collect()
    }

    pub fn predecessors(&self, block: BlockId) -> Vec<BlockId> {
        self.graph
            .neighbors_directed(self.nodes[&block], petgraph::Direction::Incoming)
            .map(|n| self.graph[n])
            .collect()
    }

    /// All blocks reachable from the entry, via BFS.
    pub fn reachable(&self) -> HashSet<BlockId> {
        let mut reachable = HashSet::new();
        let Some(entry) = self.entry else {
            return reachable;
        };
        let mut bfs = Bfs::new(&self.graph, entry);
        while let Some(node) = bfs.next(&self.graph) {
            reachable.insert(self.graph[node]);
        }
        reachable
    }

    /// Dominator tree rooted at the entry block.
    pub fn dominators(&self) -> Option<DominatorTree> {
        let entry = self.entry?;
        Some(DominatorTree {
            inner: dominators::simple_fast(&self.graph, entry),
            nodes: self.nodes.clone(),
        })
    }
}

/// Dominance queries over the CFG.
pub struct DominatorTree {
    inner: Dominators<NodeIndex>,
    nodes: HashMap<BlockId, NodeIndex>,
}

impl DominatorTree {
    /// Check whether `a` dominates `b`. A block dominates itself.
    ///
    /// Returns `false` for blocks unreachable from the entry, where
    /// dominance is undefined.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let (na, nb) = (self.nodes[&a], self.nodes[&b]);
        match self.inner.dominators(nb) {
            Some(mut doms) => doms.any(|d| d == na),
            None => false,
        }
    }
}
