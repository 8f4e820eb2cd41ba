//! Post-analysis passes (§4.I)
//!
//! Run once the branch tree is fully explored. Each pass folds information
//! that only makes sense in aggregate across sibling branches — a single
//! path's `ExecContext` cannot answer "is this always true?" or "is this
//! value ever used?" on its own.

use std::collections::HashSet;

use crate::branch::{BranchId, BranchTree};
use crate::config::EnvConfig;
use crate::solver::{CheckOutcome, Expr, ModelValue, SolverFrameStack, Sort};

/// Enforcements (by description) that hold on every valid leaf — candidates
/// for being reported as invariants rather than per-path observations.
pub fn process_always_true_enforcements(tree: &BranchTree) -> Vec<String> {
    let valid = tree.get_valid_branches();
    let mut iter = valid.iter();
    let Some(&first) = iter.next() else { return Vec::new() };
    let mut common: HashSet<String> = tree.ctx(first).enforcements().iter().map(|e| e.description.clone()).collect();
    for &id in iter {
        let here: HashSet<String> = tree.ctx(id).enforcements().iter().map(|e| e.description.clone()).collect();
        common = common.intersection(&here).cloned().collect();
    }
    let mut out: Vec<String> = common.into_iter().collect();
    out.sort();
    out
}

/// Values declared somewhere but never consumed on *any* valid leaf — the
/// intersection (not the union) of each path's unused set, since a value
/// used on at least one surviving path is not dead.
pub fn process_unused_values(tree: &BranchTree) -> Vec<String> {
    let valid = tree.get_valid_branches();
    let mut iter = valid.iter();
    let Some(&first) = iter.next() else { return Vec::new() };
    let mut common: HashSet<String> = tree.ctx(first).unused_values().iter().map(|v| v.unique_name()).collect();
    for &id in iter {
        let here: HashSet<String> = tree.ctx(id).unused_values().iter().map(|v| v.unique_name()).collect();
        common = common.intersection(&here).cloned().collect();
    }
    let mut out: Vec<String> = common.into_iter().collect();
    out.sort();
    out
}

/// Bottom-up fold of "unique-kind" enforcement descriptions (conventionally
/// prefixed `unique:`, e.g. a CHECKSIG uniqueness quantifier) across the
/// branch tree: a node guarantees an enforcement only if *every* child that
/// reaches a valid leaf guarantees it (AND); when children diverge, the
/// node is credited with whichever the union of its children guarantees
/// (OR), a weaker fact reported separately so it is never mistaken for an
/// unconditional guarantee.
#[derive(Debug, Clone, Default)]
pub struct UniqueEnforcementReport {
    /// Guaranteed on every surviving path through this node (AND-folded).
    pub guaranteed: HashSet<String>,
    /// Reached on at least one surviving path, but not all (OR-folded).
    pub possible: HashSet<String>,
}

pub fn process_unique_enforcements(tree: &BranchTree) -> UniqueEnforcementReport {
    fold_unique(tree, tree.root())
}

fn fold_unique(tree: &BranchTree, id: BranchId) -> UniqueEnforcementReport {
    if tree.is_leaf(id) {
        let mut report = UniqueEnforcementReport::default();
        if matches!(tree.outcome(id), Some(Ok(()))) {
            let set: HashSet<String> = tree
                .ctx(id)
                .enforcements()
                .iter()
                .filter(|e| e.description.starts_with("unique:"))
                .map(|e| e.description.clone())
                .collect();
            report.guaranteed = set.clone();
            report.possible = set;
        }
        return report;
    }

    let child_reports: Vec<UniqueEnforcementReport> = tree.children(id).iter().map(|&c| fold_unique(tree, c)).collect();
    let contributing: Vec<&UniqueEnforcementReport> = child_reports.iter().filter(|r| !r.possible.is_empty() || !r.guaranteed.is_empty()).collect();

    let mut out = UniqueEnforcementReport::default();
    if !contributing.is_empty() {
        out.guaranteed = contributing
            .iter()
            .map(|r| r.guaranteed.clone())
            .reduce(|a, b| a.intersection(&b).cloned().collect())
            .unwrap_or_default();
        out.possible = contributing.iter().fold(HashSet::new(), |acc, r| acc.union(&r.possible).cloned().collect());
    }
    out
}

fn model_value_const(v: &ModelValue) -> Option<Expr> {
    match v {
        ModelValue::Bool(b) => Some(Expr::BoolConst(*b)),
        ModelValue::Int(i) => Some(Expr::IntConst(*i)),
        ModelValue::Bv64(i) => Some(Expr::Bv64Const(*i)),
        ModelValue::Bytes(b) => Some(Expr::BytesConst(b.clone())),
    }
}

/// Whether `value` is the *only* satisfying assignment for `var_name` given
/// the current frame stack: assert `var != value` and check — `Unsat` means
/// unique. Used when reporting a model value, so a report can distinguish
/// "this witness must be exactly this" from "this witness happened to be
/// this in the model the solver picked."
pub fn probe_model_value_uniqueness(
    solver: &mut SolverFrameStack,
    cfg: &EnvConfig,
    var_name: &str,
    sort: Sort,
    value: &ModelValue,
) -> bool {
    let Some(const_expr) = model_value_const(value) else { return false };
    let var = Expr::var(var_name, sort);
    solver.push();
    solver.add(Expr::Not(Box::new(Expr::Eq(Box::new(var), Box::new(const_expr)))), None, None);
    let outcome = solver.check(cfg, None);
    solver.pop();
    matches!(outcome, CheckOutcome::Unsat(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecContext;
    use crate::failure::{FailureCode, ScriptFailure};
    use crate::solver::Expr;

    fn enforce(ctx: &mut ExecContext, desc: &str) {
        ctx.add_enforcement(desc, Expr::BoolConst(true), (FailureCode::Verify, 0));
    }

    #[test]
    fn always_true_requires_presence_on_every_valid_leaf() {
        let mut root_ctx = ExecContext::new();
        enforce(&mut root_ctx, "shared");
        let mut tree = BranchTree::new(root_ctx);
        let root = tree.root();
        let mut ctx_a = tree.ctx(root).fork();
        enforce(&mut ctx_a, "only_a");
        let a = tree.fork(root, ctx_a);
        let ctx_b = tree.ctx(root).fork();
        let b = tree.fork(root, ctx_b);
        tree.mark_done(a, Ok(()));
        tree.mark_done(b, Ok(()));
        let always = process_always_true_enforcements(&tree);
        assert_eq!(always, vec!["shared".to_string()]);
    }

    #[test]
    fn failed_leaves_are_excluded_from_always_true() {
        let mut tree = BranchTree::new(ExecContext::new());
        let root = tree.root();
        let mut ctx_a = tree.ctx(root).fork();
        enforce(&mut ctx_a, "only_on_failed");
        let a = tree.fork(root, ctx_a);
        tree.mark_done(a, Err(ScriptFailure::opaque(0, "dead")));
        let always = process_always_true_enforcements(&tree);
        assert!(always.is_empty());
    }

    #[test]
    fn unique_enforcement_and_folds_when_all_children_agree() {
        let mut tree = BranchTree::new(ExecContext::new());
        let root = tree.root();
        let mut ctx_a = tree.ctx(root).fork();
        enforce(&mut ctx_a, "unique:sig0");
        let a = tree.fork(root, ctx_a);
        let mut ctx_b = tree.ctx(root).fork();
        enforce(&mut ctx_b, "unique:sig0");
        let b = tree.fork(root, ctx_b);
        tree.mark_done(a, Ok(()));
        tree.mark_done(b, Ok(()));
        let report = process_unique_enforcements(&tree);
        assert!(report.guaranteed.contains("unique:sig0"));
    }

    #[test]
    fn unique_enforcement_falls_back_to_possible_when_children_diverge() {
        let mut tree = BranchTree::new(ExecContext::new());
        let root = tree.root();
        let mut ctx_a = tree.ctx(root).fork();
        enforce(&mut ctx_a, "unique:sig0");
        let a = tree.fork(root, ctx_a);
        let b = tree.fork(root, tree.ctx(root).fork());
        tree.mark_done(a, Ok(()));
        tree.mark_done(b, Ok(()));
        let report = process_unique_enforcements(&tree);
        assert!(!report.guaranteed.contains("unique:sig0"));
        assert!(report.possible.contains("unique:sig0"));
    }
}
