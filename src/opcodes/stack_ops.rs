//! Stack manipulation family (§4.F)
//!
//! Stack shape (how many elements, in what order) is always concretely
//! known along a single path — only the *values* on the stack are
//! symbolic. So `DEPTH`, `PICK`/`ROLL` with a static index, and every
//! reordering opcode here are pure `ExecContext` operations; none of them
//! touch the solver.

use crate::context::ExecContext;
use crate::failure::ScriptFailure;
use crate::value::{Concrete, SymValue};

use super::OpEnv;

pub fn handle_toaltstack(ctx: &mut ExecContext, env: &mut OpEnv, _pc: u32) -> Result<(), ScriptFailure> {
    let v = ctx.pop()?;
    ctx.push_alt(v, env.cfg)
}

pub fn handle_fromaltstack(ctx: &mut ExecContext, env: &mut OpEnv, _pc: u32) -> Result<(), ScriptFailure> {
    let v = ctx.pop_alt()?;
    ctx.push(v, env.cfg)
}

pub fn handle_ifdup(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let top = ctx.peek_from_top(0)?;
    if top.is_static() {
        if top.as_bool().map_err(|_| ScriptFailure::opaque(pc, "IFDUP operand is not a static bool"))? {
            ctx.push(top, env.cfg)?;
        }
        return Ok(());
    }
    // A symbolic value may or may not be script-true; duplicating it
    // unconditionally is observably different only if something later
    // distinguishes "duplicated" from "not", which no opcode here does
    // without first consuming the duplicate — so we duplicate and leave the
    // truthiness question to whatever consumes it.
    ctx.push(top, env.cfg)
}

pub fn handle_depth(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let name = env.fresh_name("DEPTH", pc);
    let v = SymValue::new(name, Some("DEPTH".into()), Vec::new(), pc);
    v.set_static(Concrete::Int(ctx.stack_len() as i128)).ok();
    ctx.push(v, env.cfg)
}

pub fn handle_drop(ctx: &mut ExecContext, _env: &mut OpEnv, _pc: u32) -> Result<(), ScriptFailure> {
    ctx.pop()?;
    Ok(())
}

pub fn handle_dup(ctx: &mut ExecContext, env: &mut OpEnv, _pc: u32) -> Result<(), ScriptFailure> {
    let top = ctx.peek_from_top(0)?;
    ctx.push(top, env.cfg)
}

pub fn handle_nip(ctx: &mut ExecContext, env: &mut OpEnv, _pc: u32) -> Result<(), ScriptFailure> {
    let top = ctx.pop()?;
    ctx.pop()?;
    ctx.push(top, env.cfg)
}

pub fn handle_over(ctx: &mut ExecContext, env: &mut OpEnv, _pc: u32) -> Result<(), ScriptFailure> {
    let v = ctx.peek_from_top(1)?;
    ctx.push(v, env.cfg)
}

/// Shared by `PICK` and `ROLL`: pop the static index `n`, then return the
/// value `n` positions below the (now-exposed) top — `ROLL` additionally
/// removes it from its original position.
fn resolve_index(ctx: &mut ExecContext, pc: u32) -> Result<usize, ScriptFailure> {
    let idx_val = ctx.pop()?;
    ctx.mark_used(&idx_val);
    let n = idx_val
        .as_scriptnum_int()
        .map_err(|_| ScriptFailure::opaque(pc, "PICK/ROLL requires a statically known index"))?;
    if n < 0 {
        return Err(ScriptFailure::opaque(pc, "PICK/ROLL index must be non-negative"));
    }
    Ok(n as usize)
}

pub fn handle_pick(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let n = resolve_index(ctx, pc)?;
    let v = ctx.peek_from_top(n)?;
    ctx.push(v, env.cfg)
}

pub fn handle_roll(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let n = resolve_index(ctx, pc)?;
    let v = ctx.remove_from_top(n)?;
    ctx.push(v, env.cfg)
}

pub fn handle_rot(ctx: &mut ExecContext, env: &mut OpEnv, _pc: u32) -> Result<(), ScriptFailure> {
    let v = ctx.remove_from_top(2)?;
    ctx.push(v, env.cfg)
}

pub fn handle_swap(ctx: &mut ExecContext, env: &mut OpEnv, _pc: u32) -> Result<(), ScriptFailure> {
    let v = ctx.remove_from_top(1)?;
    ctx.push(v, env.cfg)
}

pub fn handle_tuck(ctx: &mut ExecContext, env: &mut OpEnv, _pc: u32) -> Result<(), ScriptFailure> {
    let top = ctx.pop()?;
    let second = ctx.pop()?;
    ctx.push(top.clone(), env.cfg)?;
    ctx.push(second, env.cfg)?;
    ctx.push(top, env.cfg)
}

pub fn handle_2drop(ctx: &mut ExecContext, _env: &mut OpEnv, _pc: u32) -> Result<(), ScriptFailure> {
    ctx.pop()?;
    ctx.pop()?;
    Ok(())
}

pub fn handle_2dup(ctx: &mut ExecContext, env: &mut OpEnv, _pc: u32) -> Result<(), ScriptFailure> {
    let a = ctx.peek_from_top(1)?;
    let b = ctx.peek_from_top(0)?;
    ctx.push(a, env.cfg)?;
    ctx.push(b, env.cfg)
}

pub fn handle_3dup(ctx: &mut ExecContext, env: &mut OpEnv, _pc: u32) -> Result<(), ScriptFailure> {
    let a = ctx.peek_from_top(2)?;
    let b = ctx.peek_from_top(1)?;
    let c = ctx.peek_from_top(0)?;
    ctx.push(a, env.cfg)?;
    ctx.push(b, env.cfg)?;
    ctx.push(c, env.cfg)
}

pub fn handle_2over(ctx: &mut ExecContext, env: &mut OpEnv, _pc: u32) -> Result<(), ScriptFailure> {
    let a = ctx.peek_from_top(3)?;
    let b = ctx.peek_from_top(2)?;
    ctx.push(a, env.cfg)?;
    ctx.push(b, env.cfg)
}

pub fn handle_2rot(ctx: &mut ExecContext, env: &mut OpEnv, _pc: u32) -> Result<(), ScriptFailure> {
    let a = ctx.remove_from_top(5)?;
    let b = ctx.remove_from_top(4)?;
    ctx.push(a, env.cfg)?;
    ctx.push(b, env.cfg)
}

pub fn handle_2swap(ctx: &mut ExecContext, env: &mut OpEnv, _pc: u32) -> Result<(), ScriptFailure> {
    let a = ctx.remove_from_top(3)?;
    let b = ctx.remove_from_top(2)?;
    ctx.push(a, env.cfg)?;
    ctx.push(b, env.cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::{BranchId, NameCtx};
    use crate::config::EnvConfig;
    use crate::solver::SolverFrameStack;

    fn witness(n: u32) -> SymValue {
        SymValue::new_witness(format!("w{n}"), n, 0)
    }

    #[test]
    fn roll_removes_from_original_position() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        let a = witness(0);
        let b = witness(1);
        let c = witness(2);
        ctx.push(a.clone(), &cfg).unwrap();
        ctx.push(b, &cfg).unwrap();
        ctx.push(c, &cfg).unwrap();
        let idx = SymValue::new_witness("idx".into(), 9, 0);
        idx.set_static(Concrete::Int(2)).unwrap();
        ctx.push(idx, &cfg).unwrap();
        handle_roll(&mut ctx, &mut env, 0).unwrap();
        assert_eq!(ctx.stack_len(), 3);
        let top = ctx.pop().unwrap();
        assert_eq!(top.unique_name(), a.unique_name());
    }

    #[test]
    fn depth_is_always_static() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        ctx.push(witness(0), &cfg).unwrap();
        ctx.push(witness(1), &cfg).unwrap();
        handle_depth(&mut ctx, &mut env, 0).unwrap();
        let top = ctx.pop().unwrap();
        assert_eq!(top.as_scriptnum_int().unwrap(), 2);
    }

    #[test]
    fn swap_exchanges_top_two() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        let a = witness(0);
        let b = witness(1);
        ctx.push(a.clone(), &cfg).unwrap();
        ctx.push(b.clone(), &cfg).unwrap();
        handle_swap(&mut ctx, &mut env, 0).unwrap();
        assert_eq!(ctx.pop().unwrap().unique_name(), a.unique_name());
        assert_eq!(ctx.pop().unwrap().unique_name(), b.unique_name());
    }
}
