//! Opcode dispatch and the top-level branch walk (§4.E, §4.F)
//!
//! This is the only module holding a `&mut BranchTree`: every other handler
//! module works one `ExecContext` at a time and leaves forking to its
//! caller. Three responsibilities live here that don't fit any single
//! opcode family:
//!
//! - Routing a parsed `OpCode` to its handler (`route`).
//! - The handful of opcodes too trivial for their own submodule —
//!   `VERIFY`, `RETURN`, `NOP`, `CODESEPARATOR` — plus `NUMEQUALVERIFY`,
//!   which composes `arithmetic::handle_numequal` with the same
//!   pop-and-check tail `bytewise::handle_equalverify` uses for `EQUAL`.
//! - Forking on a non-static `IF`/`NOTIF` condition and walking the
//!   resulting tree, mirroring each push/pop of `BranchTree` with a
//!   push/pop of the solver's frame stack (`solver::SolverFrameStack`'s own
//!   doc comment: "a stack of assertion frames mirrors the branch tree").

use crate::branch::{BranchId, BranchTree, NameCtx, PlaceholderRegistry};
use crate::config::EnvConfig;
use crate::context::ExecContext;
use crate::failure::{FailureCode, ScriptFailure};
use crate::plugin::HookRegistry;
use crate::solver::{CheckOutcome, Expr, ModelRequest, SolverFrameStack};
use crate::token::{OpCode, Token};
use crate::value::{Concrete, SymValue, View};

use super::conditionals::{self, IfOutcome};
use super::{arithmetic, bytewise, crypto, elements64, hashing, stack_ops, txinspect, OpEnv};

/// What happened after one token was stepped on one branch.
enum StepOutcome {
    /// Execution continues on the same branch at `pc + 1`.
    Continue,
    /// This branch is finished — either a handler raised, or (when `pc`
    /// already ran past the end of the token stream) finalization ran.
    Done(Result<(), ScriptFailure>),
    /// A non-static `IF`/`NOTIF` forked the branch into these two children,
    /// each carrying the constraint the caller must assert in its own
    /// solver frame before walking into it.
    Forked([ForkedChild; 2]),
}

struct ForkedChild {
    branch: BranchId,
    entry_constraint: Expr,
}

/// Execute an entire token stream to completion, starting a fresh
/// `BranchTree` at its root.
pub fn run(cfg: &EnvConfig, solver: &mut SolverFrameStack, hooks: &mut HookRegistry, tokens: &[Token]) -> BranchTree {
    let mut tree = BranchTree::new(ExecContext::new());
    let mut names = NameCtx::new();
    let mut placeholders = PlaceholderRegistry::new();
    let root = tree.root();
    hooks.report_start();
    run_branch(&mut tree, root, cfg, solver, &mut names, &mut placeholders, hooks, tokens);
    hooks.report_end();
    tree
}

fn run_branch(
    tree: &mut BranchTree,
    branch: BranchId,
    cfg: &EnvConfig,
    solver: &mut SolverFrameStack,
    names: &mut NameCtx,
    placeholders: &mut PlaceholderRegistry,
    hooks: &mut HookRegistry,
    tokens: &[Token],
) {
    loop {
        let pc = tree.ctx(branch).pc;
        if pc as usize >= tokens.len() {
            hooks.pre_finalize(tree.ctx(branch));
            let outcome = finalize(tree, branch, cfg, solver);
            if let Err(f) = &outcome {
                hooks.script_failure(f);
            }
            tree.mark_done(branch, outcome);
            hooks.post_finalize(tree.ctx(branch));
            return;
        }
        let token = &tokens[pc as usize];
        match step(tree, branch, cfg, solver, names, placeholders, hooks, pc, token) {
            StepOutcome::Continue => {
                tree.ctx_mut(branch).pc = pc + 1;
            }
            StepOutcome::Done(outcome) => {
                if let Err(f) = &outcome {
                    hooks.script_failure(f);
                }
                tree.mark_done(branch, outcome);
                return;
            }
            StepOutcome::Forked(children) => {
                for child in children {
                    tree.ctx_mut(child.branch).pc = pc + 1;
                    solver.push();
                    solver.add(child.entry_constraint, None, None);
                    run_branch(tree, child.branch, cfg, solver, names, placeholders, hooks, tokens);
                    solver.pop();
                }
                return;
            }
        }
    }
}

fn step(
    tree: &mut BranchTree,
    branch: BranchId,
    cfg: &EnvConfig,
    solver: &mut SolverFrameStack,
    names: &mut NameCtx,
    placeholders: &mut PlaceholderRegistry,
    hooks: &mut HookRegistry,
    pc: u32,
    token: &Token,
) -> StepOutcome {
    if hooks.pre_opcode(tree.ctx(branch), token) {
        hooks.post_opcode(tree.ctx(branch), token);
        return StepOutcome::Continue;
    }

    let skipping = tree.ctx(branch).is_skipping();
    let is_cond_op = matches!(token, Token::Op(OpCode::If | OpCode::NotIf | OpCode::Else | OpCode::EndIf));
    if skipping && !is_cond_op {
        hooks.post_opcode(tree.ctx(branch), token);
        return StepOutcome::Continue;
    }

    if let Err(e) = tree.ctx_mut(branch).bump_op_count(cfg) {
        let f = tree.ctx_mut(branch).register_failure(e);
        return StepOutcome::Done(Err(f));
    }

    match token {
        Token::Push(bytes) => {
            let result = dispatch_push(tree.ctx_mut(branch), cfg, names, branch, pc, bytes);
            finish_simple(tree, branch, hooks, token, result)
        }
        Token::Placeholder(name) => {
            let result = dispatch_placeholder(tree.ctx_mut(branch), cfg, placeholders, pc, name);
            finish_simple(tree, branch, hooks, token, result)
        }
        Token::Op(OpCode::If) => dispatch_conditional(tree, branch, cfg, solver, names, pc, false),
        Token::Op(OpCode::NotIf) => dispatch_conditional(tree, branch, cfg, solver, names, pc, true),
        Token::Op(OpCode::Else) => {
            let result = {
                let env = OpEnv { cfg, solver, names, branch };
                conditionals::evaluate_else(tree.ctx_mut(branch), &env, pc)
            };
            finish_simple(tree, branch, hooks, token, result)
        }
        Token::Op(OpCode::EndIf) => {
            let result = {
                let env = OpEnv { cfg, solver, names, branch };
                conditionals::evaluate_endif(tree.ctx_mut(branch), &env, pc)
            };
            finish_simple(tree, branch, hooks, token, result)
        }
        Token::Op(op) => {
            let result = {
                let mut env = OpEnv { cfg, solver, names, branch };
                route(tree.ctx_mut(branch), &mut env, pc, *op)
            };
            finish_simple(tree, branch, hooks, token, result)
        }
    }
}

fn finish_simple(tree: &mut BranchTree, branch: BranchId, hooks: &mut HookRegistry, token: &Token, result: Result<(), ScriptFailure>) -> StepOutcome {
    match result {
        Ok(()) => {
            hooks.post_opcode(tree.ctx(branch), token);
            StepOutcome::Continue
        }
        Err(e) => {
            let failure = tree.ctx_mut(branch).register_failure(e);
            StepOutcome::Done(Err(failure))
        }
    }
}

fn dispatch_push(ctx: &mut ExecContext, cfg: &EnvConfig, names: &mut NameCtx, branch: BranchId, pc: u32, bytes: &[u8]) -> Result<(), ScriptFailure> {
    if bytes.len() > cfg.max_script_element_size {
        return Err(ScriptFailure::solver_one(FailureCode::DataTooLong, pc));
    }
    let name = names.next("PUSH", pc, branch);
    let v = SymValue::new(name, None, Vec::new(), pc);
    v.set_static(Concrete::Bytes(bytes.to_vec())).map_err(|_| ScriptFailure::opaque(pc, "push value could not be made static"))?;
    ctx.push(v, cfg)
}

fn dispatch_placeholder(ctx: &mut ExecContext, cfg: &EnvConfig, placeholders: &mut PlaceholderRegistry, pc: u32, name: &str) -> Result<(), ScriptFailure> {
    let v = placeholders.resolve(name, pc);
    ctx.push(v, cfg)
}

/// `IF`/`NOTIF`: pop the condition, and either continue on the statically
/// known branch or fork. `is_notif` inverts a static outcome (the inversion
/// for a dynamic one is already handled by `conditionals::evaluate_notif`).
fn dispatch_conditional(
    tree: &mut BranchTree,
    branch: BranchId,
    cfg: &EnvConfig,
    solver: &mut SolverFrameStack,
    names: &mut NameCtx,
    pc: u32,
    is_notif: bool,
) -> StepOutcome {
    let outcome = {
        let env = OpEnv { cfg, solver, names, branch };
        let ctx = tree.ctx_mut(branch);
        if is_notif {
            conditionals::evaluate_notif(ctx, &env, pc)
        } else {
            conditionals::evaluate_if(ctx, &env, pc)
        }
    };
    match outcome {
        Err(e) => {
            let f = tree.ctx_mut(branch).register_failure(e);
            StepOutcome::Done(Err(f))
        }
        Ok(IfOutcome::Static(take)) => {
            tree.ctx_mut(branch).push_cond(take);
            StepOutcome::Continue
        }
        Ok(IfOutcome::Dynamic(cond)) => fork_on_condition(tree, branch, cfg, solver, pc, cond),
    }
}

/// Fork on a symbolic condition, pruning a side the solver already knows is
/// infeasible given everything asserted so far rather than forking it and
/// discovering that only once its subtree finalizes. If *neither* side is
/// feasible, the path itself is already contradictory — a condition that
/// cannot be true and cannot be false is a misuse this engine reports as
/// `BranchConditionInvalid` rather than silently preferring one arm.
fn fork_on_condition(tree: &mut BranchTree, branch: BranchId, cfg: &EnvConfig, solver: &mut SolverFrameStack, pc: u32, cond: SymValue) -> StepOutcome {
    let view = View::ScriptNum { max_size: cfg.scriptnum_max_size_for(false) as u8 };
    let constraints = cond.request_view(view).unwrap_or_default();
    for c in constraints {
        solver.add(c, None, None);
    }
    let var = Expr::var(cond.var_name(view), view.sort());
    let true_expr = Expr::Not(Box::new(Expr::Eq(Box::new(var.clone()), Box::new(Expr::int(0)))));
    let false_expr = Expr::Eq(Box::new(var), Box::new(Expr::int(0)));

    let true_possible = solver.is_cond_possible(cfg, true_expr.clone());
    let false_possible = solver.is_cond_possible(cfg, false_expr.clone());

    if !true_possible && !false_possible {
        let f = ScriptFailure::solver_one(FailureCode::BranchConditionInvalid, pc);
        let f = tree.ctx_mut(branch).register_failure(f);
        return StepOutcome::Done(Err(f));
    }
    if !false_possible {
        tree.ctx_mut(branch).push_cond(true);
        return StepOutcome::Continue;
    }
    if !true_possible {
        tree.ctx_mut(branch).push_cond(false);
        return StepOutcome::Continue;
    }

    let mut true_ctx = tree.ctx(branch).fork();
    true_ctx.push_cond(true);
    let mut false_ctx = tree.ctx(branch).fork();
    false_ctx.push_cond(false);
    let true_id = tree.fork(branch, true_ctx);
    let false_id = tree.fork(branch, false_ctx);

    StepOutcome::Forked([ForkedChild { branch: true_id, entry_constraint: true_expr }, ForkedChild { branch: false_id, entry_constraint: false_expr }])
}

/// Pop the top value and fail `code` unless it is script-true, used for
/// `VERIFY` and for the verify tail of `NUMEQUALVERIFY`.
fn verify_top(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32, code: FailureCode) -> Result<(), ScriptFailure> {
    let v = ctx.pop()?;
    ctx.mark_used(&v);
    if v.is_static() {
        return if v.as_bool().unwrap_or(false) { Ok(()) } else { Err(ScriptFailure::solver_one(code, pc)) };
    }
    let view = View::ScriptNum { max_size: env.cfg.scriptnum_max_size_for(false) as u8 };
    let constraints = v.request_view(view).map_err(|_| ScriptFailure::opaque(pc, "VERIFY operand has an incompatible view"))?;
    for c in constraints {
        env.solver.add(c, None, None);
    }
    let var = Expr::var(v.var_name(view), view.sort());
    let name = format!("check_{}~0@{pc}", code.name());
    env.solver.add(Expr::Not(Box::new(Expr::Eq(Box::new(var), Box::new(Expr::int(0))))), Some(name), Some((code, pc)));
    Ok(())
}

fn numequalverify(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    arithmetic::handle_numequal(ctx, env, pc)?;
    verify_top(ctx, env, pc, FailureCode::NumEqualVerify)
}

fn route(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32, op: OpCode) -> Result<(), ScriptFailure> {
    use OpCode::*;
    match op {
        If | NotIf | Else | EndIf => unreachable!("conditionals are routed by `step`, not `route`"),

        Verify => verify_top(ctx, env, pc, FailureCode::Verify),
        Return => Err(ScriptFailure::opaque(pc, "OP_RETURN encountered")),
        Nop(_) => Ok(()),
        CodeSeparator => Ok(()),

        ToAltStack => stack_ops::handle_toaltstack(ctx, env, pc),
        FromAltStack => stack_ops::handle_fromaltstack(ctx, env, pc),
        IfDup => stack_ops::handle_ifdup(ctx, env, pc),
        Depth => stack_ops::handle_depth(ctx, env, pc),
        Drop => stack_ops::handle_drop(ctx, env, pc),
        Dup => stack_ops::handle_dup(ctx, env, pc),
        Nip => stack_ops::handle_nip(ctx, env, pc),
        Over => stack_ops::handle_over(ctx, env, pc),
        Pick => stack_ops::handle_pick(ctx, env, pc),
        Roll => stack_ops::handle_roll(ctx, env, pc),
        Rot => stack_ops::handle_rot(ctx, env, pc),
        Swap => stack_ops::handle_swap(ctx, env, pc),
        Tuck => stack_ops::handle_tuck(ctx, env, pc),
        Drop2 => stack_ops::handle_2drop(ctx, env, pc),
        Dup2 => stack_ops::handle_2dup(ctx, env, pc),
        Dup3 => stack_ops::handle_3dup(ctx, env, pc),
        Over2 => stack_ops::handle_2over(ctx, env, pc),
        Rot2 => stack_ops::handle_2rot(ctx, env, pc),
        Swap2 => stack_ops::handle_2swap(ctx, env, pc),

        Cat => bytewise::handle_cat(ctx, env, pc),
        Split => bytewise::handle_split(ctx, env, pc),
        Left => bytewise::handle_left(ctx, env, pc),
        Right => bytewise::handle_right(ctx, env, pc),
        Size => bytewise::handle_size(ctx, env, pc),
        Invert => bytewise::handle_invert(ctx, env, pc),
        And => bytewise::handle_and(ctx, env, pc),
        Or => bytewise::handle_or(ctx, env, pc),
        Xor => bytewise::handle_xor(ctx, env, pc),
        Equal => bytewise::handle_equal(ctx, env, pc),
        EqualVerify => bytewise::handle_equalverify(ctx, env, pc),

        Add1 => arithmetic::handle_1add(ctx, env, pc),
        Sub1 => arithmetic::handle_1sub(ctx, env, pc),
        Negate => arithmetic::handle_negate(ctx, env, pc),
        Abs => arithmetic::handle_abs(ctx, env, pc),
        Not => arithmetic::handle_not(ctx, env, pc),
        Add => arithmetic::handle_add(ctx, env, pc),
        Sub => arithmetic::handle_sub(ctx, env, pc),
        Mul => arithmetic::handle_mul(ctx, env, pc),
        Div => arithmetic::handle_div(ctx, env, pc),
        Mod => arithmetic::handle_mod(ctx, env, pc),
        BoolAnd => arithmetic::handle_booland(ctx, env, pc),
        BoolOr => arithmetic::handle_boolor(ctx, env, pc),
        NumEqual => arithmetic::handle_numequal(ctx, env, pc),
        NumEqualVerify => numequalverify(ctx, env, pc),
        NumNotEqual => arithmetic::handle_numnotequal(ctx, env, pc),
        LessThan => arithmetic::handle_lessthan(ctx, env, pc),
        GreaterThan => arithmetic::handle_greaterthan(ctx, env, pc),
        LessThanOrEqual => arithmetic::handle_lessthanorequal(ctx, env, pc),
        GreaterThanOrEqual => arithmetic::handle_greaterthanorequal(ctx, env, pc),
        Min => arithmetic::handle_min(ctx, env, pc),
        Max => arithmetic::handle_max(ctx, env, pc),
        Within => arithmetic::handle_within(ctx, env, pc),

        Ripemd160 => hashing::handle_ripemd160(ctx, env, pc),
        Sha1 => hashing::handle_sha1(ctx, env, pc),
        Sha256 => hashing::handle_sha256(ctx, env, pc),
        Hash160 => hashing::handle_hash160(ctx, env, pc),
        Hash256 => hashing::handle_hash256(ctx, env, pc),
        Sha256Initialize => hashing::handle_sha256initialize(ctx, env, pc),
        Sha256Update => hashing::handle_sha256update(ctx, env, pc),
        Sha256Finalize => hashing::handle_sha256finalize(ctx, env, pc),

        CheckSig => crypto::handle_checksig(ctx, env, pc),
        CheckSigVerify => crypto::handle_checksigverify(ctx, env, pc),
        CheckMultisig => crypto::handle_checkmultisig(ctx, env, pc),
        CheckMultisigVerify => crypto::handle_checkmultisigverify(ctx, env, pc),
        CheckSigFromStack => crypto::handle_checksigfromstack(ctx, env, pc),
        CheckSigFromStackVerify => crypto::handle_checksigfromstackverify(ctx, env, pc),
        CheckLockTimeVerify => crypto::handle_checklocktimeverify(ctx, env, pc),
        CheckSequenceVerify => crypto::handle_checksequenceverify(ctx, env, pc),
        EcMulScalarVerify => crypto::handle_ecmulscalarverify(ctx, env, pc),
        TweakVerify => crypto::handle_tweakverify(ctx, env, pc),

        Add64 => elements64::handle_add64(ctx, env, pc),
        Sub64 => elements64::handle_sub64(ctx, env, pc),
        Mul64 => elements64::handle_mul64(ctx, env, pc),
        Div64 => elements64::handle_div64(ctx, env, pc),
        Neg64 => elements64::handle_neg64(ctx, env, pc),
        LessThan64 => elements64::handle_lessthan64(ctx, env, pc),
        LessThanOrEqual64 => elements64::handle_lessthanorequal64(ctx, env, pc),
        GreaterThan64 => elements64::handle_greaterthan64(ctx, env, pc),
        GreaterThanOrEqual64 => elements64::handle_greaterthanorequal64(ctx, env, pc),
        Le64ToScriptNum => elements64::handle_le64toscriptnum(ctx, env, pc),
        ScriptNumToLe64 => elements64::handle_scriptnumtole64(ctx, env, pc),
        Le32ToLe64 => elements64::handle_le32tole64(ctx, env, pc),
        Le64ToLe32 => elements64::handle_le64tole32(ctx, env, pc),

        InspectInputOutpoint => txinspect::handle_inspect_input_outpoint(ctx, env, pc),
        InspectInputAsset => txinspect::handle_inspect_input_asset(ctx, env, pc),
        InspectInputValue => txinspect::handle_inspect_input_value(ctx, env, pc),
        InspectInputScriptPubKey => txinspect::handle_inspect_input_scriptpubkey(ctx, env, pc),
        InspectInputSequence => txinspect::handle_inspect_input_sequence(ctx, env, pc),
        InspectOutputAsset => txinspect::handle_inspect_output_asset(ctx, env, pc),
        InspectOutputValue => txinspect::handle_inspect_output_value(ctx, env, pc),
        InspectOutputNonce => txinspect::handle_inspect_output_nonce(ctx, env, pc),
        InspectOutputScriptPubKey => txinspect::handle_inspect_output_scriptpubkey(ctx, env, pc),
        InspectVersion => txinspect::handle_inspect_version(ctx, env, pc),
        InspectLockTime => txinspect::handle_inspect_locktime(ctx, env, pc),
        InspectNumInputs => txinspect::handle_inspect_num_inputs(ctx, env, pc),
        InspectNumOutputs => txinspect::handle_inspect_num_outputs(ctx, env, pc),
        InspectCurrentInputIndex => txinspect::handle_inspect_current_input_index(ctx, env, pc),
        TxWeight => txinspect::handle_tx_weight(ctx, env, pc),
    }
}

/// Script-level finalization (§4.F step 9): the conditional stack must be
/// balanced, every deferred enforcement gets installed on the solver, and
/// the element left on top of the stack must be provably true. Only the
/// top element is checked — this engine follows the core `EvalScript`
/// success rule, not the stricter single-element `CLEANSTACK` policy rule
/// (`EnvConfig` carries no such flag).
fn finalize(tree: &mut BranchTree, branch: BranchId, cfg: &EnvConfig, solver: &mut SolverFrameStack) -> Result<(), ScriptFailure> {
    let pc = tree.ctx(branch).pc;
    if !tree.ctx(branch).conditional_balanced() {
        return Err(ScriptFailure::opaque(pc, "unbalanced conditional at end of script"));
    }
    tree.ctx(branch).install_enforcements(solver);

    if tree.ctx(branch).stack_len() == 0 {
        return Err(ScriptFailure::opaque(pc, "stack is empty at end of script"));
    }
    let top = tree.ctx(branch).peek_from_top(0)?;

    if top.is_static() {
        if !top.as_bool().unwrap_or(false) {
            return Err(ScriptFailure::solver_one(FailureCode::FinalVerify, pc));
        }
    } else {
        let view = View::ScriptNum { max_size: cfg.scriptnum_max_size_for(false) as u8 };
        let constraints = top.request_view(view).unwrap_or_default();
        for c in constraints {
            solver.add(c, None, None);
        }
        let var = Expr::var(top.var_name(view), view.sort());
        let name = format!("check_final_verify~0@{pc}");
        solver.add(Expr::Not(Box::new(Expr::Eq(Box::new(var), Box::new(Expr::int(0))))), Some(name), Some((FailureCode::FinalVerify, pc)));
    }

    let model_request = if cfg.produce_model_values {
        Some(ModelRequest { names: model_request_names(tree.ctx(branch)) })
    } else {
        None
    };

    match solver.check(cfg, model_request.as_ref()) {
        CheckOutcome::Sat(values) => {
            tree.ctx_mut(branch).set_model_values(values);
            Ok(())
        }
        CheckOutcome::Unsat(codes) => Err(ScriptFailure::Solver { codes }),
        CheckOutcome::Unknown if cfg.retry.exit_on_unknown => Err(ScriptFailure::SolverUnknown { pc }),
        CheckOutcome::Unknown => {
            // §5/§7: without `exit_on_unknown`, an undecided path is not a
            // failed one — the undecided constraints are dropped and the
            // path is reported feasible, same as running with the solver
            // off entirely. This is the only backend this workspace builds
            // by default (`StubBackend`), so every forked path would
            // otherwise fail here.
            tracing::warn!(pc, "solver returned unknown at finalization; treating path as feasible");
            Ok(())
        }
    }
}

/// Every materialized view of every value declared on this path, as a flat
/// list the solver can resolve in one model — the set of names a
/// downstream report would want values for.
fn model_request_names(ctx: &ExecContext) -> Vec<(String, crate::solver::Sort)> {
    ctx.declared_values().iter().flat_map(|v| v.views().into_iter().map(move |view| (v.var_name(view), view.sort()))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvConfig;
    use crate::solver::SolverFrameStack;

    fn cfg() -> EnvConfig {
        EnvConfig { z3_enabled: false, ..Default::default() }
    }

    #[test]
    fn static_arithmetic_script_finalizes_successfully() {
        let tokens = vec![Token::Push(vec![1]), Token::Push(vec![1]), Token::Op(OpCode::Add)];
        let cfg = cfg();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut hooks = HookRegistry::new();
        let tree = run(&cfg, &mut solver, &mut hooks, &tokens);
        assert_eq!(tree.get_valid_branches(), vec![tree.root()]);
    }

    #[test]
    fn verify_on_static_false_fails() {
        let tokens = vec![Token::Push(vec![0]), Token::Op(OpCode::Verify)];
        let cfg = cfg();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut hooks = HookRegistry::new();
        let tree = run(&cfg, &mut solver, &mut hooks, &tokens);
        assert!(matches!(tree.outcome(tree.root()), Some(Err(ScriptFailure::Solver { codes })) if codes == &vec![(FailureCode::Verify, 1)]));
    }

    #[test]
    fn unbalanced_conditional_is_rejected_at_finalize() {
        let tokens = vec![Token::Push(vec![1]), Token::Op(OpCode::If)];
        let cfg = cfg();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut hooks = HookRegistry::new();
        let tree = run(&cfg, &mut solver, &mut hooks, &tokens);
        assert!(matches!(tree.outcome(tree.root()), Some(Err(ScriptFailure::Opaque { .. }))));
    }

    #[test]
    fn dynamic_if_forks_into_two_branches_one_valid() {
        let tokens = vec![
            Token::Placeholder("x".into()),
            Token::Op(OpCode::If),
            Token::Push(vec![1]),
            Token::Op(OpCode::Else),
            Token::Push(vec![0]),
            Token::Op(OpCode::EndIf),
        ];
        let cfg = cfg();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut hooks = HookRegistry::new();
        let tree = run(&cfg, &mut solver, &mut hooks, &tokens);
        assert_eq!(tree.len(), 3);
        let valid = tree.get_valid_branches();
        assert_eq!(valid.len(), 1);
        assert_eq!(tree.ctx(valid[0]).stack_len(), 1);
    }

    #[test]
    fn return_always_fails() {
        let tokens = vec![Token::Op(OpCode::Return)];
        let cfg = cfg();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut hooks = HookRegistry::new();
        let tree = run(&cfg, &mut solver, &mut hooks, &tokens);
        assert!(matches!(tree.outcome(tree.root()), Some(Err(ScriptFailure::Opaque { .. }))));
    }

    #[test]
    fn nop_is_a_pure_pass_through() {
        let tokens = vec![Token::Push(vec![1]), Token::Op(OpCode::Nop(42))];
        let cfg = cfg();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut hooks = HookRegistry::new();
        let tree = run(&cfg, &mut solver, &mut hooks, &tokens);
        assert_eq!(tree.get_valid_branches(), vec![tree.root()]);
    }

    #[test]
    fn numequalverify_fails_on_static_mismatch() {
        let tokens = vec![Token::Push(vec![1]), Token::Push(vec![2]), Token::Op(OpCode::NumEqualVerify)];
        let cfg = cfg();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut hooks = HookRegistry::new();
        let tree = run(&cfg, &mut solver, &mut hooks, &tokens);
        assert!(matches!(tree.outcome(tree.root()), Some(Err(ScriptFailure::Solver { codes })) if codes == &vec![(FailureCode::NumEqualVerify, 2)]));
    }
}
