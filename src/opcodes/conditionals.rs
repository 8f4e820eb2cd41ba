//! `IF`/`NOTIF`/`ELSE`/`ENDIF` (§4.F)
//!
//! `ELSE`/`ENDIF` never fork (they only flip or pop the top `CondFrame`,
//! handled directly on `ExecContext`). `IF`/`NOTIF` fork whenever the
//! popped condition is not statically known; the actual tree-forking lives
//! in `dispatch.rs`, which is the only place holding a `&mut BranchTree`.

use crate::context::ExecContext;
use crate::failure::{FailureCode, ScriptFailure};
use crate::staticfold;
use crate::value::SymValue;

use super::OpEnv;

/// What `IF`/`NOTIF` found once it popped its condition.
pub enum IfOutcome {
    /// The condition was static; no fork needed, `.0` is the branch to take
    /// (already inverted for `NOTIF` by the caller).
    Static(bool),
    /// The condition is symbolic; `.0` is the popped value so the caller can
    /// install `value == true` / `value == false` on each forked child.
    Dynamic(SymValue),
}

fn pop_condition(ctx: &mut ExecContext, env: &OpEnv, pc: u32) -> Result<IfOutcome, ScriptFailure> {
    let cond = ctx.pop()?;
    ctx.mark_used(&cond);
    // `IF`/`NOTIF` reads its condition the same way any other scriptnum
    // consumer does (§4.A `request_view`), so a statically-known condition
    // is held to the same encoding discipline before its truthiness is even
    // considered: too-long or non-minimal bytes fail the path here rather
    // than silently casting to bool.
    if env.cfg.minimaldata_flag && cond.is_static() {
        let bytes = cond.as_bytes().map_err(|_| ScriptFailure::opaque(pc, "condition is not static bytes"))?;
        let max_size = env.cfg.scriptnum_max_size_for(false);
        if bytes.len() > max_size {
            return Err(ScriptFailure::solver_one(FailureCode::ScriptnumEncodingExceedsDatalen, pc));
        }
        if !staticfold::is_minimally_encoded(&bytes) {
            return Err(ScriptFailure::solver_one(FailureCode::ScriptnumMinimalEncoding, pc));
        }
    }
    if env.cfg.minimalif_flag && cond.is_static() {
        let bytes = cond.as_bytes().map_err(|_| ScriptFailure::opaque(pc, "condition is not static bytes"))?;
        if !(bytes.is_empty() || bytes == [1]) {
            return Err(ScriptFailure::solver_one(FailureCode::MinimalIf, pc));
        }
    }
    if cond.is_static() {
        Ok(IfOutcome::Static(cond.as_bool().map_err(|_| ScriptFailure::opaque(pc, "condition is not a static bool"))?))
    } else {
        Ok(IfOutcome::Dynamic(cond))
    }
}

pub fn evaluate_if(ctx: &mut ExecContext, env: &OpEnv, pc: u32) -> Result<IfOutcome, ScriptFailure> {
    pop_condition(ctx, env, pc)
}

pub fn evaluate_notif(ctx: &mut ExecContext, env: &OpEnv, pc: u32) -> Result<IfOutcome, ScriptFailure> {
    Ok(match pop_condition(ctx, env, pc)? {
        IfOutcome::Static(b) => IfOutcome::Static(!b),
        dynamic => dynamic,
    })
}

pub fn evaluate_else(ctx: &mut ExecContext, _env: &OpEnv, _pc: u32) -> Result<(), ScriptFailure> {
    ctx.toggle_else()
}

pub fn evaluate_endif(ctx: &mut ExecContext, _env: &OpEnv, _pc: u32) -> Result<(), ScriptFailure> {
    ctx.pop_cond()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::{BranchId, NameCtx};
    use crate::config::EnvConfig;
    use crate::solver::SolverFrameStack;
    use crate::value::Concrete;

    fn env<'a>(cfg: &'a EnvConfig, solver: &'a mut SolverFrameStack, names: &'a mut NameCtx) -> OpEnv<'a> {
        OpEnv { cfg, solver, names, branch: BranchId::default_for_test() }
    }

    #[test]
    fn static_true_condition_takes_true_branch() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut ctx = ExecContext::new();
        let v = SymValue::new_witness("w".into(), 0, 0);
        v.set_static(Concrete::Int(1)).unwrap();
        ctx.push(v, &cfg).unwrap();
        let outcome = evaluate_if(&mut ctx, &env(&cfg, &mut solver, &mut names), 0).unwrap();
        assert!(matches!(outcome, IfOutcome::Static(true)));
    }

    #[test]
    fn dynamic_condition_yields_dynamic_outcome() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut ctx = ExecContext::new();
        let v = SymValue::new_witness("w".into(), 0, 0);
        ctx.push(v, &cfg).unwrap();
        let outcome = evaluate_if(&mut ctx, &env(&cfg, &mut solver, &mut names), 0).unwrap();
        assert!(matches!(outcome, IfOutcome::Dynamic(_)));
    }

    #[test]
    fn non_minimal_static_condition_fails_under_minimaldata() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut ctx = ExecContext::new();
        let v = SymValue::new_witness("w".into(), 0, 0);
        // 0x0080 has a redundant zero padding byte: not minimally encoded.
        v.set_static(Concrete::Bytes(vec![0x00, 0x80])).unwrap();
        ctx.push(v, &cfg).unwrap();
        let err = evaluate_if(&mut ctx, &env(&cfg, &mut solver, &mut names), 0).unwrap_err();
        assert!(matches!(err, ScriptFailure::Solver { codes } if codes == vec![(FailureCode::ScriptnumMinimalEncoding, 0)]));
    }

    #[test]
    fn oversized_static_condition_fails_datalen_check() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut ctx = ExecContext::new();
        let v = SymValue::new_witness("w".into(), 0, 0);
        v.set_static(Concrete::Bytes(vec![0x01, 0x02, 0x03, 0x04, 0x05])).unwrap();
        ctx.push(v, &cfg).unwrap();
        let err = evaluate_if(&mut ctx, &env(&cfg, &mut solver, &mut names), 0).unwrap_err();
        assert!(matches!(err, ScriptFailure::Solver { codes } if codes == vec![(FailureCode::ScriptnumEncodingExceedsDatalen, 0)]));
    }
}
