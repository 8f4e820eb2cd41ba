//! Branch tree (§4.E)
//!
//! Every conditional whose outcome cannot be statically resolved forks the
//! current path into one child per outcome. The tree of forks is kept as an
//! arena (`BranchTree`) rather than a recursive structure so the walk order
//! is explicit and stable across runs — the same "index into a flat vec,
//! never a raw pointer" discipline the teacher uses for its block/row
//! indices (`BlockIdx`/`RowIdx` in `stream.rs`), generalized here to a tree
//! instead of a linear chunk sequence.
//!
//! Traversal is deterministic pre-order by construction: children are
//! appended in outcome order (`true` branch before `false`), and nothing
//! in this module reorders them later. This is what keeps monotone,
//! append-only state (failure-code ids, unique-name counters) reproducible
//! run to run, per the engine's single-threaded cooperative model.

use crate::context::ExecContext;
use crate::failure::ScriptFailure;
use crate::value::SymValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BranchId(u32);

impl std::fmt::Display for BranchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b{}", self.0)
    }
}

impl BranchId {
    /// The root id, exposed for handler unit tests that need an `OpEnv`
    /// without constructing a whole `BranchTree`.
    pub fn default_for_test() -> Self {
        BranchId(0)
    }
}

struct Node {
    parent: Option<BranchId>,
    children: Vec<BranchId>,
    ctx: ExecContext,
    /// `None` while still executing; `Some(Ok(()))` once it reaches
    /// finalization without error; `Some(Err(_))` once a handler kills it.
    outcome: Option<Result<(), ScriptFailure>>,
}

/// The arena holding every branch ever forked during one analysis run.
pub struct BranchTree {
    nodes: Vec<Node>,
}

impl BranchTree {
    pub fn new(root_ctx: ExecContext) -> Self {
        Self { nodes: vec![Node { parent: None, children: Vec::new(), ctx: root_ctx, outcome: None }] }
    }

    pub fn root(&self) -> BranchId {
        BranchId(0)
    }

    pub fn ctx(&self, id: BranchId) -> &ExecContext {
        &self.nodes[id.0 as usize].ctx
    }

    pub fn ctx_mut(&mut self, id: BranchId) -> &mut ExecContext {
        &mut self.nodes[id.0 as usize].ctx
    }

    pub fn parent(&self, id: BranchId) -> Option<BranchId> {
        self.nodes[id.0 as usize].parent
    }

    pub fn children(&self, id: BranchId) -> &[BranchId] {
        &self.nodes[id.0 as usize].children
    }

    pub fn is_leaf(&self, id: BranchId) -> bool {
        self.nodes[id.0 as usize].children.is_empty()
    }

    pub fn outcome(&self, id: BranchId) -> Option<&Result<(), ScriptFailure>> {
        self.nodes[id.0 as usize].outcome.as_ref()
    }

    /// Create a new child of `parent` carrying `child_ctx`. Children are
    /// appended in call order, which callers use to mean "outcome order"
    /// (e.g. the taken branch of an `IF` before the not-taken branch).
    pub fn fork(&mut self, parent: BranchId, child_ctx: ExecContext) -> BranchId {
        let id = BranchId(self.nodes.len() as u32);
        self.nodes.push(Node { parent: Some(parent), children: Vec::new(), ctx: child_ctx, outcome: None });
        self.nodes[parent.0 as usize].children.push(id);
        id
    }

    pub fn mark_done(&mut self, id: BranchId, outcome: Result<(), ScriptFailure>) {
        if let Err(f) = &outcome {
            self.nodes[id.0 as usize].ctx.last_failure = Some(f.clone());
        }
        self.nodes[id.0 as usize].outcome = Some(outcome);
    }

    /// Deterministic pre-order walk over every node in the tree (including
    /// internal, non-leaf nodes — post-analysis passes need both).
    pub fn walk_branches(&self) -> Vec<BranchId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            out.push(id);
            // push children in reverse so pre-order pop gives left-to-right.
            for &c in self.children(id).iter().rev() {
                stack.push(c);
            }
        }
        out
    }

    /// Leaves that finalized without error — the set of "live" paths a
    /// finished analysis reports on.
    pub fn get_valid_branches(&self) -> Vec<BranchId> {
        self.walk_branches()
            .into_iter()
            .filter(|&id| self.is_leaf(id) && matches!(self.outcome(id), Some(Ok(()))))
            .collect()
    }

    /// Root-to-`id` path inclusive, used by the unique-enforcement set
    /// algebra (§4.I) to know which ancestors an enforcement is shared by.
    pub fn path_to_root(&self, id: BranchId) -> Vec<BranchId> {
        let mut out = vec![id];
        let mut cur = id;
        while let Some(p) = self.parent(cur) {
            out.push(p);
            cur = p;
        }
        out.reverse();
        out
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Synthesizes unique value names from `(opcode, pc, branch, intra-pc
/// sequence number)` so that two values created at the same program point
/// on two different branches never collide, and two values created by the
/// same opcode invocation (e.g. both halves of a `CHECKMULTISIG` fan-out)
/// get distinguishable names (§9 Design Notes).
#[derive(Default)]
pub struct NameCtx {
    counters: std::collections::HashMap<(u32, BranchId), u32>,
}

impl NameCtx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, opcode: &str, pc: u32, branch: BranchId) -> String {
        let seq = self.counters.entry((pc, branch)).or_insert(0);
        let name = format!("{opcode}_{branch}_{pc}_{seq}");
        *seq += 1;
        name
    }
}

/// A `$ident` data placeholder must resolve to the same `SymValue` every
/// time it's referenced within one run, not a fresh witness per occurrence
/// (`original_source/tests/test_data_placeholders.py`). This registry is
/// run-scoped like `NameCtx`, not branch-scoped: the first branch to touch
/// an identifier fixes the witness every other branch (including ones
/// forked before that point) must reuse.
#[derive(Default)]
pub struct PlaceholderRegistry {
    bound: std::collections::HashMap<String, SymValue>,
}

impl PlaceholderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the identifier's bound `SymValue`, minting a fresh witness
    /// the first time it's seen.
    pub fn resolve(&mut self, ident: &str, src_pc: u32) -> SymValue {
        self.bound.entry(ident.to_string()).or_insert_with(|| SymValue::new_witness(ident.to_string(), 0, src_pc)).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_registers_parent_child_link() {
        let mut tree = BranchTree::new(ExecContext::new());
        let root = tree.root();
        let child = tree.fork(root, ExecContext::new());
        assert_eq!(tree.parent(child), Some(root));
        assert_eq!(tree.children(root), &[child]);
    }

    #[test]
    fn walk_branches_is_preorder() {
        let mut tree = BranchTree::new(ExecContext::new());
        let root = tree.root();
        let a = tree.fork(root, ExecContext::new());
        let _b = tree.fork(root, ExecContext::new());
        let c = tree.fork(a, ExecContext::new());
        let order = tree.walk_branches();
        assert_eq!(order[0], root);
        assert!(order.iter().position(|&x| x == a).unwrap() < order.iter().position(|&x| x == c).unwrap());
    }

    #[test]
    fn valid_branches_excludes_failed_leaves() {
        let mut tree = BranchTree::new(ExecContext::new());
        let root = tree.root();
        let a = tree.fork(root, ExecContext::new());
        let b = tree.fork(root, ExecContext::new());
        tree.mark_done(a, Ok(()));
        tree.mark_done(b, Err(ScriptFailure::opaque(0, "bad")));
        let valid = tree.get_valid_branches();
        assert_eq!(valid, vec![a]);
    }

    #[test]
    fn path_to_root_is_root_first() {
        let mut tree = BranchTree::new(ExecContext::new());
        let root = tree.root();
        let a = tree.fork(root, ExecContext::new());
        let b = tree.fork(a, ExecContext::new());
        assert_eq!(tree.path_to_root(b), vec![root, a, b]);
    }

    #[test]
    fn name_ctx_disambiguates_same_pc_same_branch() {
        let mut names = NameCtx::new();
        let b = BranchId(0);
        let n0 = names.next("ADD", 5, b);
        let n1 = names.next("ADD", 5, b);
        assert_ne!(n0, n1);
    }
}
