//! Execution context (§4.D)
//!
//! `ExecContext` is the bundle of per-path state an opcode handler reads and
//! mutates: the two stacks, the conditional-nesting mask, the running op
//! budget, the lazily-populated transaction field map, and the bookkeeping
//! (`enforcements`, `declared`/`used` value sets, data-reference refcounts)
//! that the post-analysis passes in `analysis.rs` later fold across sibling
//! branches. It plays the role the teacher's `Locals` bundle plays for one
//! AIR row: a small, cheaply-cloned struct threaded through one evaluation
//! step at a time.
//!
//! Cloning an `ExecContext` is the mechanism a fork uses to hand each child
//! branch its own copy-on-write view of the path's state (`SymValue` clones
//! are `Rc` bumps, so this stays cheap even for long scripts).

use std::collections::HashMap;

use crate::config::EnvConfig;
use crate::failure::{FailureCode, ScriptFailure};
use crate::solver::{Expr, ModelValue, SolverFrameStack};
use crate::txfield::TxFieldMap;
use crate::value::SymValue;

/// One nested `IF`/`NOTIF` frame.
#[derive(Debug, Clone, Copy)]
pub struct CondFrame {
    /// Whether opcodes between this frame's current branch marker and the
    /// next `ELSE`/`ENDIF` execute (`true`) or are skipped (`false`).
    pub executing: bool,
    /// Whether an `ELSE` has already been seen for this `IF` (a second
    /// `ELSE` before `ENDIF` is malformed).
    pub seen_else: bool,
}

/// A post-hoc constraint recorded by an opcode handler for later
/// cross-branch folding (§4.I): `process_always_true_enforcements` ANDs
/// these if the same description recurs on every sibling;
/// `process_unique_enforcements` instead ORs/ANDs disjoint `UniqueSet`
/// groups depending on whether every child, or only some, enforces them.
#[derive(Debug, Clone)]
pub struct Enforcement {
    pub description: String,
    pub expr: Expr,
    pub origin: (FailureCode, u32),
}

/// One `CHECKSIG`-family call recorded on this path, used to install
/// explicit, named congruence assertions (§9) between calls that share the
/// same uninterpreted function: the SMT backend already derives "same args
/// imply same result" from `UfApply` semantics alone, but leaving it
/// implicit means an unsat core stemming from it names nothing. Recording
/// each call lets `crypto.rs` tag that specific congruence with
/// `FailureCode::KnownArgsDifferentResult` so attribution stays legible.
#[derive(Debug, Clone)]
pub struct ChecksigCall {
    pub family: &'static str,
    pub arg_reprs: Vec<String>,
    pub result: SymValue,
}

/// Execution state for one path through the script, shared (via `Rc`
/// clones inside `SymValue`) but not aliased across sibling branches once
/// forked.
#[derive(Clone)]
pub struct ExecContext {
    pub pc: u32,
    stack: Vec<SymValue>,
    altstack: Vec<SymValue>,
    cond_stack: Vec<CondFrame>,
    op_count: u32,
    enforcements: Vec<Enforcement>,
    declared: Vec<SymValue>,
    used: std::collections::HashSet<String>,
    /// Data-reference name -> how many times it has been dereferenced by a
    /// transaction-inspection opcode (used for the "neighbor" refcount
    /// checks on `INSPECTINPUT*`/`INSPECTOUTPUT*`).
    refcounts: HashMap<String, u32>,
    next_witness: u32,
    pub tx_fields: TxFieldMap,
    pub last_failure: Option<ScriptFailure>,
    model_values: Vec<(String, ModelValue)>,
    checksig_calls: Vec<ChecksigCall>,
}

impl ExecContext {
    pub fn new() -> Self {
        Self {
            pc: 0,
            stack: Vec::new(),
            altstack: Vec::new(),
            cond_stack: Vec::new(),
            op_count: 0,
            enforcements: Vec::new(),
            declared: Vec::new(),
            used: std::collections::HashSet::new(),
            refcounts: HashMap::new(),
            next_witness: 0,
            tx_fields: TxFieldMap::new(),
            last_failure: None,
            model_values: Vec::new(),
            checksig_calls: Vec::new(),
        }
    }

    /// Produce an independent copy of this context for a forked child
    /// branch. Currently identical to `clone()`; kept as a distinct name so
    /// call sites in `branch.rs` read as "fork", not "duplicate state for no
    /// reason".
    pub fn fork(&self) -> Self {
        self.clone()
    }

    pub fn is_skipping(&self) -> bool {
        self.cond_stack.iter().any(|f| !f.executing)
    }

    pub fn cond_depth(&self) -> usize {
        self.cond_stack.len()
    }

    pub fn push_cond(&mut self, executing: bool) {
        self.cond_stack.push(CondFrame { executing, seen_else: false });
    }

    pub fn toggle_else(&mut self) -> Result<(), ScriptFailure> {
        let parent_executing = self.cond_stack.len() < 2 || self.cond_stack[self.cond_stack.len() - 2].executing;
        let frame = self.cond_stack.last_mut().ok_or_else(|| ScriptFailure::opaque(self.pc, "ELSE without matching IF"))?;
        if frame.seen_else {
            return Err(ScriptFailure::opaque(self.pc, "duplicate ELSE in the same IF"));
        }
        frame.seen_else = true;
        frame.executing = parent_executing && !frame.executing;
        Ok(())
    }

    pub fn pop_cond(&mut self) -> Result<(), ScriptFailure> {
        self.cond_stack.pop().ok_or_else(|| ScriptFailure::opaque(self.pc, "ENDIF without matching IF"))?;
        Ok(())
    }

    pub fn conditional_balanced(&self) -> bool {
        self.cond_stack.is_empty()
    }

    pub fn op_count(&self) -> u32 {
        self.op_count
    }

    pub fn bump_op_count(&mut self, cfg: &EnvConfig) -> Result<(), ScriptFailure> {
        if !cfg.sigversion.counts_ops() {
            return Ok(());
        }
        self.op_count += 1;
        if self.op_count as usize > cfg.max_ops_per_script {
            return Err(ScriptFailure::opaque(self.pc, "script exceeded the maximum op budget"));
        }
        Ok(())
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    pub fn altstack_len(&self) -> usize {
        self.altstack.len()
    }

    fn check_capacity(&self, cfg: &EnvConfig) -> Result<(), ScriptFailure> {
        if self.stack.len() + self.altstack.len() > cfg.max_stack_size {
            return Err(ScriptFailure::opaque(self.pc, "combined stack depth exceeded the maximum"));
        }
        Ok(())
    }

    pub fn push(&mut self, v: SymValue, cfg: &EnvConfig) -> Result<(), ScriptFailure> {
        self.declared.push(v.clone());
        self.stack.push(v);
        self.check_capacity(cfg)
    }

    pub fn push_alt(&mut self, v: SymValue, cfg: &EnvConfig) -> Result<(), ScriptFailure> {
        self.altstack.push(v);
        self.check_capacity(cfg)
    }

    pub fn pop(&mut self) -> Result<SymValue, ScriptFailure> {
        self.stack.pop().ok_or_else(|| ScriptFailure::opaque(self.pc, "stack underflow"))
    }

    pub fn pop_alt(&mut self) -> Result<SymValue, ScriptFailure> {
        self.altstack.pop().ok_or_else(|| ScriptFailure::opaque(self.pc, "altstack underflow"))
    }

    /// `stacktop(-1)` is the top of stack, `stacktop(-2)` the one beneath,
    /// etc. (matching the reference implementation's negative-index
    /// convention).
    pub fn stacktop(&self, neg_index: i32) -> Result<SymValue, ScriptFailure> {
        if neg_index >= 0 {
            return Err(ScriptFailure::opaque(self.pc, "stacktop index must be negative"));
        }
        let depth = (-neg_index) as usize;
        if depth > self.stack.len() {
            return Err(ScriptFailure::opaque(self.pc, "stack underflow"));
        }
        Ok(self.stack[self.stack.len() - depth].clone())
    }

    /// Remove and return the element `depth` positions from the top
    /// (`depth == 0` is the top), used by `PICK`/`ROLL`'s static-index path.
    pub fn remove_from_top(&mut self, depth: usize) -> Result<SymValue, ScriptFailure> {
        if depth >= self.stack.len() {
            return Err(ScriptFailure::opaque(self.pc, "stack underflow"));
        }
        let idx = self.stack.len() - 1 - depth;
        Ok(self.stack.remove(idx))
    }

    pub fn peek_from_top(&self, depth: usize) -> Result<SymValue, ScriptFailure> {
        if depth >= self.stack.len() {
            return Err(ScriptFailure::opaque(self.pc, "stack underflow"));
        }
        Ok(self.stack[self.stack.len() - 1 - depth].clone())
    }

    pub fn fresh_witness(&mut self, unique_name: impl Into<String>, src_pc: u32) -> SymValue {
        let n = self.next_witness;
        self.next_witness += 1;
        SymValue::new_witness(unique_name.into(), n, src_pc)
    }

    pub fn add_enforcement(&mut self, description: impl Into<String>, expr: Expr, origin: (FailureCode, u32)) {
        self.enforcements.push(Enforcement { description: description.into(), expr, origin });
    }

    pub fn enforcements(&self) -> &[Enforcement] {
        &self.enforcements
    }

    /// Record a `CHECKSIG`-family call and return every prior call on this
    /// path against the same uninterpreted function, so the caller can
    /// install a congruence assertion per pair.
    pub fn register_checksig_call(&mut self, family: &'static str, arg_reprs: Vec<String>, result: SymValue) -> Vec<ChecksigCall> {
        let prior: Vec<ChecksigCall> = self.checksig_calls.iter().filter(|c| c.family == family).cloned().collect();
        self.checksig_calls.push(ChecksigCall { family, arg_reprs, result });
        prior
    }

    pub fn mark_used(&mut self, v: &SymValue) {
        self.used.insert(v.unique_name());
    }

    /// Values declared (pushed at least once) but never consumed by a
    /// handler as an operand on this path — input to
    /// `analysis::process_unused_values`.
    pub fn unused_values(&self) -> Vec<SymValue> {
        self.declared.iter().filter(|v| !self.used.contains(&v.unique_name())).cloned().collect()
    }

    /// Every value pushed on this path at least once, in declaration order —
    /// used to build a model-value request at finalization time.
    pub fn declared_values(&self) -> &[SymValue] {
        &self.declared
    }

    /// Model values the solver produced for this path at finalization
    /// (populated only when `EnvConfig::produce_model_values` is set and
    /// the path turned out to be satisfiable).
    pub fn model_values(&self) -> &[(String, ModelValue)] {
        &self.model_values
    }

    pub(crate) fn set_model_values(&mut self, values: Vec<(String, ModelValue)>) {
        self.model_values = values;
    }

    pub fn bump_refcount(&mut self, data_reference: &str) -> u32 {
        let count = self.refcounts.entry(data_reference.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn refcount(&self, data_reference: &str) -> u32 {
        self.refcounts.get(data_reference).copied().unwrap_or(0)
    }

    /// Record a terminal failure for this path and return it, so call sites
    /// can `return ctx.register_failure(...)` from a handler.
    pub fn register_failure(&mut self, failure: ScriptFailure) -> ScriptFailure {
        self.last_failure = Some(failure.clone());
        failure
    }

    /// Install every enforcement onto `frames` as a tracked assertion,
    /// called once the path reaches a finalization point (§4.F step 9,
    /// §4.I). `solver` is threaded in explicitly rather than stored on the
    /// context, since one frame stack is shared by the whole branch tree.
    pub fn install_enforcements(&self, frames: &mut SolverFrameStack) {
        for (i, e) in self.enforcements.iter().enumerate() {
            let name = format!("check_{}~{}@{}", e.origin.0.name(), i, e.origin.1);
            frames.add(e.expr.clone(), Some(name), Some(e.origin));
        }
    }
}

impl Default for ExecContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EnvConfig {
        EnvConfig::default()
    }

    #[test]
    fn push_pop_roundtrip() {
        let mut ctx = ExecContext::new();
        let v = SymValue::new_witness("w".into(), 0, 0);
        ctx.push(v.clone(), &cfg()).unwrap();
        assert_eq!(ctx.stack_len(), 1);
        let popped = ctx.pop().unwrap();
        assert_eq!(popped.unique_name(), v.unique_name());
    }

    #[test]
    fn pop_on_empty_stack_is_opaque_failure() {
        let mut ctx = ExecContext::new();
        let err = ctx.pop().unwrap_err();
        assert!(matches!(err, ScriptFailure::Opaque { .. }));
    }

    #[test]
    fn else_without_if_is_rejected() {
        let mut ctx = ExecContext::new();
        assert!(ctx.toggle_else().is_err());
    }

    #[test]
    fn nested_conditional_skip_propagates() {
        let mut ctx = ExecContext::new();
        ctx.push_cond(false);
        ctx.push_cond(true);
        assert!(ctx.is_skipping());
    }

    #[test]
    fn unused_values_excludes_marked_used() {
        let mut ctx = ExecContext::new();
        let a = SymValue::new_witness("a".into(), 0, 0);
        let b = SymValue::new_witness("b".into(), 1, 0);
        ctx.push(a.clone(), &cfg()).unwrap();
        ctx.push(b.clone(), &cfg()).unwrap();
        ctx.mark_used(&a);
        let unused = ctx.unused_values();
        assert_eq!(unused.len(), 1);
        assert_eq!(unused[0].unique_name(), b.unique_name());
    }

    #[test]
    fn refcount_increments_per_bump() {
        let mut ctx = ExecContext::new();
        assert_eq!(ctx.bump_refcount("input0"), 1);
        assert_eq!(ctx.bump_refcount("input0"), 2);
        assert_eq!(ctx.refcount("input1"), 0);
    }
}
