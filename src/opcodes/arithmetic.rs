//! Arithmetic family (§4.F)
//!
//! All results are scriptnums. When both operands are static the result is
//! folded directly (`SymValue::set_static`); otherwise a fresh result value
//! is created and its `SCRIPT_NUM` view is linked to the operands' views by
//! a definitional equality installed straight on the solver frame (it can
//! never fail, so it carries no tracking name or failure origin — only
//! assertions that gate path validity get those).

use crate::context::ExecContext;
use crate::failure::{FailureCode, ScriptFailure};
use crate::solver::Expr;
use crate::value::{Concrete, SymValue, View};

use super::OpEnv;

fn numeric_view(env: &OpEnv, wide: bool) -> View {
    View::ScriptNum { max_size: env.cfg.scriptnum_max_size_for(wide) as u8 }
}

fn require_view(v: &SymValue, view: View, env: &mut OpEnv, pc: u32) -> Result<Expr, ScriptFailure> {
    let constraints = v.request_view(view).map_err(|_| ScriptFailure::solver_one(FailureCode::InvalidArguments, pc))?;
    for c in constraints {
        env.solver.add(c, None, None);
    }
    Ok(Expr::var(v.var_name(view), view.sort()))
}

fn unary_numeric_op(
    ctx: &mut ExecContext,
    env: &mut OpEnv,
    pc: u32,
    opname: &str,
    wide: bool,
    fold: impl Fn(i128) -> i128,
    build: impl Fn(Expr) -> Expr,
) -> Result<(), ScriptFailure> {
    let a = ctx.pop()?;
    ctx.mark_used(&a);
    let view = numeric_view(env, wide);
    let name = env.fresh_name(opname, pc);
    let result = SymValue::new(name, Some(opname.into()), vec![a.clone()], pc);

    if a.is_static() {
        let av = a.as_scriptnum_int().map_err(|_| ScriptFailure::opaque(pc, "operand is not a static scriptnum"))?;
        result.set_static(Concrete::Int(fold(av))).ok();
    } else {
        let a_var = require_view(&a, view, env, pc)?;
        let r_var = require_view(&result, view, env, pc)?;
        env.solver.add(Expr::Eq(Box::new(r_var), Box::new(build(a_var))), None, None);
    }
    ctx.push(result, env.cfg)
}

fn binary_numeric_op(
    ctx: &mut ExecContext,
    env: &mut OpEnv,
    pc: u32,
    opname: &str,
    wide: bool,
    fold: impl Fn(i128, i128) -> i128,
    build: impl Fn(Expr, Expr) -> Expr,
) -> Result<(), ScriptFailure> {
    let b = ctx.pop()?;
    let a = ctx.pop()?;
    ctx.mark_used(&a);
    ctx.mark_used(&b);
    let view = numeric_view(env, wide);
    let name = env.fresh_name(opname, pc);
    let result = SymValue::new(name, Some(opname.into()), vec![a.clone(), b.clone()], pc);

    if a.is_static() && b.is_static() {
        let av = a.as_scriptnum_int().map_err(|_| ScriptFailure::opaque(pc, "operand is not a static scriptnum"))?;
        let bv = b.as_scriptnum_int().map_err(|_| ScriptFailure::opaque(pc, "operand is not a static scriptnum"))?;
        result.set_static(Concrete::Int(fold(av, bv))).ok();
    } else {
        let a_var = require_view(&a, view, env, pc)?;
        let b_var = require_view(&b, view, env, pc)?;
        let r_var = require_view(&result, view, env, pc)?;
        env.solver.add(Expr::Eq(Box::new(r_var), Box::new(build(a_var, b_var))), None, None);
    }
    ctx.push(result, env.cfg)
}

fn nz(e: Expr) -> Expr {
    Expr::Not(Box::new(Expr::Eq(Box::new(e), Box::new(Expr::IntConst(0)))))
}

pub fn handle_1add(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    unary_numeric_op(ctx, env, pc, "1ADD", true, |a| a + 1, |a| Expr::Add(Box::new(a), Box::new(Expr::IntConst(1))))
}

pub fn handle_1sub(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    unary_numeric_op(ctx, env, pc, "1SUB", true, |a| a - 1, |a| Expr::Sub(Box::new(a), Box::new(Expr::IntConst(1))))
}

pub fn handle_negate(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    unary_numeric_op(ctx, env, pc, "NEGATE", false, |a| -a, |a| Expr::Neg(Box::new(a)))
}

pub fn handle_abs(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    unary_numeric_op(ctx, env, pc, "ABS", false, |a| a.abs(), |a| {
        Expr::Ite(Box::new(Expr::Lt(Box::new(a.clone()), Box::new(Expr::IntConst(0)))), Box::new(Expr::Neg(Box::new(a.clone()))), Box::new(a))
    })
}

pub fn handle_not(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    unary_numeric_op(ctx, env, pc, "NOT", false, |a| if a == 0 { 1 } else { 0 }, |a| {
        Expr::Ite(Box::new(Expr::Eq(Box::new(a), Box::new(Expr::IntConst(0)))), Box::new(Expr::IntConst(1)), Box::new(Expr::IntConst(0)))
    })
}

pub fn handle_add(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    binary_numeric_op(ctx, env, pc, "ADD", true, |a, b| a + b, |a, b| Expr::Add(Box::new(a), Box::new(b)))
}

pub fn handle_sub(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    binary_numeric_op(ctx, env, pc, "SUB", true, |a, b| a - b, |a, b| Expr::Sub(Box::new(a), Box::new(b)))
}

pub fn handle_mul(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    binary_numeric_op(ctx, env, pc, "MUL", false, |a, b| a * b, |a, b| Expr::Mul(Box::new(a), Box::new(b)))
}

pub fn handle_div(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let b = ctx.peek_from_top(0)?;
    if b.is_static() {
        let bv = b.as_scriptnum_int().unwrap_or(0);
        if bv == 0 {
            return Err(ScriptFailure::solver_one(FailureCode::InvalidArguments, pc));
        }
    } else {
        let view = numeric_view(env, false);
        let b_var = require_view(&b, view, env, pc)?;
        let name = format!("check_invalid_arguments~div@{pc}");
        env.solver.add(nz(b_var), Some(name), Some((FailureCode::InvalidArguments, pc)));
    }
    binary_numeric_op(ctx, env, pc, "DIV", false, |a, b| if b == 0 { 0 } else { a / b }, |a, b| Expr::Div(Box::new(a), Box::new(b)))
}

pub fn handle_mod(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let b = ctx.peek_from_top(0)?;
    if b.is_static() {
        let bv = b.as_scriptnum_int().unwrap_or(0);
        if bv == 0 {
            return Err(ScriptFailure::solver_one(FailureCode::InvalidArguments, pc));
        }
    } else {
        let view = numeric_view(env, false);
        let b_var = require_view(&b, view, env, pc)?;
        let name = format!("check_invalid_arguments~mod@{pc}");
        env.solver.add(nz(b_var), Some(name), Some((FailureCode::InvalidArguments, pc)));
    }
    binary_numeric_op(ctx, env, pc, "MOD", false, |a, b| if b == 0 { 0 } else { a % b }, |a, b| {
        Expr::Sub(Box::new(a.clone()), Box::new(Expr::Mul(Box::new(Expr::Div(Box::new(a), Box::new(b.clone()))), Box::new(b))))
    })
}

pub fn handle_booland(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    binary_numeric_op(ctx, env, pc, "BOOLAND", false, |a, b| if a != 0 && b != 0 { 1 } else { 0 }, |a, b| {
        Expr::Ite(Box::new(Expr::And(vec![nz(a), nz(b)])), Box::new(Expr::IntConst(1)), Box::new(Expr::IntConst(0)))
    })
}

pub fn handle_boolor(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    binary_numeric_op(ctx, env, pc, "BOOLOR", false, |a, b| if a != 0 || b != 0 { 1 } else { 0 }, |a, b| {
        Expr::Ite(Box::new(Expr::Or(vec![nz(a), nz(b)])), Box::new(Expr::IntConst(1)), Box::new(Expr::IntConst(0)))
    })
}

pub fn handle_numequal(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    binary_numeric_op(ctx, env, pc, "NUMEQUAL", false, |a, b| if a == b { 1 } else { 0 }, |a, b| {
        Expr::Ite(Box::new(Expr::Eq(Box::new(a), Box::new(b))), Box::new(Expr::IntConst(1)), Box::new(Expr::IntConst(0)))
    })
}

pub fn handle_numnotequal(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    binary_numeric_op(ctx, env, pc, "NUMNOTEQUAL", false, |a, b| if a != b { 1 } else { 0 }, |a, b| {
        Expr::Ite(Box::new(Expr::Not(Box::new(Expr::Eq(Box::new(a), Box::new(b))))), Box::new(Expr::IntConst(1)), Box::new(Expr::IntConst(0)))
    })
}

pub fn handle_lessthan(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    binary_numeric_op(ctx, env, pc, "LESSTHAN", false, |a, b| if a < b { 1 } else { 0 }, |a, b| {
        Expr::Ite(Box::new(Expr::Lt(Box::new(a), Box::new(b))), Box::new(Expr::IntConst(1)), Box::new(Expr::IntConst(0)))
    })
}

pub fn handle_greaterthan(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    binary_numeric_op(ctx, env, pc, "GREATERTHAN", false, |a, b| if a > b { 1 } else { 0 }, |a, b| {
        Expr::Ite(Box::new(Expr::Lt(Box::new(b), Box::new(a))), Box::new(Expr::IntConst(1)), Box::new(Expr::IntConst(0)))
    })
}

pub fn handle_lessthanorequal(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    binary_numeric_op(ctx, env, pc, "LESSTHANOREQUAL", false, |a, b| if a <= b { 1 } else { 0 }, |a, b| {
        Expr::Ite(Box::new(Expr::Le(Box::new(a), Box::new(b))), Box::new(Expr::IntConst(1)), Box::new(Expr::IntConst(0)))
    })
}

pub fn handle_greaterthanorequal(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    binary_numeric_op(ctx, env, pc, "GREATERTHANOREQUAL", false, |a, b| if a >= b { 1 } else { 0 }, |a, b| {
        Expr::Ite(Box::new(Expr::Le(Box::new(b), Box::new(a))), Box::new(Expr::IntConst(1)), Box::new(Expr::IntConst(0)))
    })
}

pub fn handle_min(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    binary_numeric_op(ctx, env, pc, "MIN", false, |a, b| a.min(b), |a, b| {
        Expr::Ite(Box::new(Expr::Lt(Box::new(a.clone()), Box::new(b.clone()))), Box::new(a), Box::new(b))
    })
}

pub fn handle_max(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    binary_numeric_op(ctx, env, pc, "MAX", false, |a, b| a.max(b), |a, b| {
        Expr::Ite(Box::new(Expr::Lt(Box::new(a.clone()), Box::new(b.clone()))), Box::new(b), Box::new(a))
    })
}

pub fn handle_within(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let max = ctx.pop()?;
    let min = ctx.pop()?;
    let x = ctx.pop()?;
    ctx.mark_used(&max);
    ctx.mark_used(&min);
    ctx.mark_used(&x);
    let view = numeric_view(env, false);
    let name = env.fresh_name("WITHIN", pc);
    let result = SymValue::new(name, Some("WITHIN".into()), vec![x.clone(), min.clone(), max.clone()], pc);

    if x.is_static() && min.is_static() && max.is_static() {
        let xv = x.as_scriptnum_int().map_err(|_| ScriptFailure::opaque(pc, "WITHIN operand not static"))?;
        let minv = min.as_scriptnum_int().unwrap_or(0);
        let maxv = max.as_scriptnum_int().unwrap_or(0);
        result.set_static(Concrete::Int(if xv >= minv && xv < maxv { 1 } else { 0 })).ok();
    } else {
        let xv = require_view(&x, view, env, pc)?;
        let minv = require_view(&min, view, env, pc)?;
        let maxv = require_view(&max, view, env, pc)?;
        let rv = require_view(&result, view, env, pc)?;
        let within = Expr::And(vec![Expr::Le(Box::new(minv), Box::new(xv.clone())), Expr::Lt(Box::new(xv), Box::new(maxv))]);
        env.solver.add(
            Expr::Eq(Box::new(rv), Box::new(Expr::Ite(Box::new(within), Box::new(Expr::IntConst(1)), Box::new(Expr::IntConst(0))))),
            None,
            None,
        );
    }
    ctx.push(result, env.cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::{BranchId, NameCtx};
    use crate::config::EnvConfig;
    use crate::solver::SolverFrameStack;

    fn push_static(ctx: &mut ExecContext, cfg: &EnvConfig, v: i128) {
        let val = SymValue::new_witness(format!("w{v}"), 0, 0);
        val.set_static(Concrete::Int(v)).unwrap();
        ctx.push(val, cfg).unwrap();
    }

    #[test]
    fn add_folds_static_operands() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        push_static(&mut ctx, &cfg, 2);
        push_static(&mut ctx, &cfg, 3);
        handle_add(&mut ctx, &mut env, 0).unwrap();
        let top = ctx.pop().unwrap();
        assert_eq!(top.as_scriptnum_int().unwrap(), 5);
    }

    #[test]
    fn div_by_static_zero_fails() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        push_static(&mut ctx, &cfg, 5);
        push_static(&mut ctx, &cfg, 0);
        let err = handle_div(&mut ctx, &mut env, 0).unwrap_err();
        assert!(matches!(err, ScriptFailure::Solver { .. }));
    }

    #[test]
    fn mod_folds_static_operands() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        push_static(&mut ctx, &cfg, 7);
        push_static(&mut ctx, &cfg, 3);
        handle_mod(&mut ctx, &mut env, 0).unwrap();
        let top = ctx.pop().unwrap();
        assert_eq!(top.as_scriptnum_int().unwrap(), 1);
    }

    #[test]
    fn mod_by_static_zero_fails() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        push_static(&mut ctx, &cfg, 5);
        push_static(&mut ctx, &cfg, 0);
        let err = handle_mod(&mut ctx, &mut env, 0).unwrap_err();
        assert!(matches!(err, ScriptFailure::Solver { .. }));
    }

    #[test]
    fn within_folds_half_open_interval() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        push_static(&mut ctx, &cfg, 5);
        push_static(&mut ctx, &cfg, 0);
        push_static(&mut ctx, &cfg, 5);
        handle_within(&mut ctx, &mut env, 0).unwrap();
        let top = ctx.pop().unwrap();
        assert_eq!(top.as_scriptnum_int().unwrap(), 0, "5 is not within [0,5)");
    }
}
