//! Elements 64-bit arithmetic family (§4.F)
//!
//! Unlike the base scriptnum arithmetic opcodes, this family operates on a
//! fixed 64-bit view (`View::Int64`, backed by `Sort::BitVec64`) and folds
//! through native `i64`/`checked_*` arithmetic when both operands are
//! static. Overflow is a hard per-opcode failure rather than a fork: the
//! reference encoding these came from treats a 64-bit overflow the same way
//! as any other `InvalidArguments`-shaped precondition.

use crate::context::ExecContext;
use crate::failure::{FailureCode, ScriptFailure};
use crate::solver::{Expr, Sort};
use crate::staticfold;
use crate::value::{Concrete, SymValue, View};

use super::OpEnv;

fn require_le64(v: &SymValue) -> Vec<Expr> {
    v.request_view(View::Int64).unwrap_or_default()
}

fn install(env: &mut OpEnv, constraints: Vec<Expr>) {
    for c in constraints {
        env.solver.add(c, None, None);
    }
}

fn le64_var(v: &SymValue) -> Expr {
    Expr::var(v.var_name(View::Int64), Sort::BitVec64)
}

fn binary_checked(
    ctx: &mut ExecContext,
    env: &mut OpEnv,
    pc: u32,
    opname: &str,
    fold: impl Fn(i64, i64) -> Option<i64>,
    relate: impl Fn(Expr, Expr, Expr) -> Expr,
) -> Result<(), ScriptFailure> {
    let b = ctx.pop()?;
    let a = ctx.pop()?;
    ctx.mark_used(&a);
    ctx.mark_used(&b);
    let name = env.fresh_name(opname, pc);
    let result = SymValue::new(name, Some(opname.into()), vec![a.clone(), b.clone()], pc);

    if a.is_static() && b.is_static() {
        let av = a.as_le64().map_err(|_| ScriptFailure::opaque(pc, "LE64 operand is not static"))?;
        let bv = b.as_le64().map_err(|_| ScriptFailure::opaque(pc, "LE64 operand is not static"))?;
        let r = fold(av, bv).ok_or_else(|| ScriptFailure::solver_one(FailureCode::Int64OutOfBounds, pc))?;
        result.set_static(Concrete::Le64(r)).ok();
    } else {
        let ca = require_le64(&a);
        let cb = require_le64(&b);
        install(env, ca);
        install(env, cb);
        install(env, result.request_view(View::Int64).unwrap_or_default());
        let relation = relate(le64_var(&a), le64_var(&b), le64_var(&result));
        let tracking = format!("check_int64_out_of_bounds~0@{pc}");
        env.solver.add(relation, Some(tracking), Some((FailureCode::Int64OutOfBounds, pc)));
    }
    ctx.push(result, env.cfg)
}

pub fn handle_add64(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    binary_checked(ctx, env, pc, "ADD64", |a, b| a.checked_add(b), |a, b, r| {
        Expr::Eq(Box::new(r), Box::new(Expr::Add(Box::new(a), Box::new(b))))
    })
}

pub fn handle_sub64(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    binary_checked(ctx, env, pc, "SUB64", |a, b| a.checked_sub(b), |a, b, r| {
        Expr::Eq(Box::new(r), Box::new(Expr::Sub(Box::new(a), Box::new(b))))
    })
}

pub fn handle_mul64(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    binary_checked(ctx, env, pc, "MUL64", |a, b| a.checked_mul(b), |a, b, r| {
        Expr::Eq(Box::new(r), Box::new(Expr::Mul(Box::new(a), Box::new(b))))
    })
}

pub fn handle_div64(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let b = ctx.pop()?;
    let a = ctx.pop()?;
    ctx.mark_used(&a);
    ctx.mark_used(&b);
    let quot_name = env.fresh_name("DIV64_Q", pc);
    let rem_name = env.fresh_name("DIV64_R", pc);
    let quot = SymValue::new(quot_name, Some("DIV64_Q".into()), vec![a.clone(), b.clone()], pc);
    let rem = SymValue::new(rem_name, Some("DIV64_R".into()), vec![a.clone(), b.clone()], pc);

    if a.is_static() && b.is_static() {
        let av = a.as_le64().map_err(|_| ScriptFailure::opaque(pc, "LE64 operand is not static"))?;
        let bv = b.as_le64().map_err(|_| ScriptFailure::opaque(pc, "LE64 operand is not static"))?;
        if bv == 0 || (av == i64::MIN && bv == -1) {
            return Err(ScriptFailure::solver_one(FailureCode::Int64OutOfBounds, pc));
        }
        quot.set_static(Concrete::Le64(av / bv)).ok();
        rem.set_static(Concrete::Le64(av % bv)).ok();
    } else {
        install(env, require_le64(&a));
        install(env, require_le64(&b));
        install(env, quot.request_view(View::Int64).unwrap_or_default());
        install(env, rem.request_view(View::Int64).unwrap_or_default());
        let b_var = le64_var(&b);
        let nonzero_name = format!("check_int64_out_of_bounds~0@{pc}");
        env.solver.add(
            Expr::Not(Box::new(Expr::Eq(Box::new(b_var.clone()), Box::new(Expr::Bv64Const(0))))),
            Some(nonzero_name),
            Some((FailureCode::Int64OutOfBounds, pc)),
        );
        env.solver.add(
            Expr::Eq(
                Box::new(le64_var(&a)),
                Box::new(Expr::Add(Box::new(Expr::Mul(Box::new(b_var), Box::new(le64_var(&quot)))), Box::new(le64_var(&rem)))),
            ),
            None,
            None,
        );
    }
    ctx.push(quot, env.cfg)?;
    ctx.push(rem, env.cfg)
}

pub fn handle_neg64(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let a = ctx.pop()?;
    ctx.mark_used(&a);
    let name = env.fresh_name("NEG64", pc);
    let result = SymValue::new(name, Some("NEG64".into()), vec![a.clone()], pc);
    if a.is_static() {
        let av = a.as_le64().map_err(|_| ScriptFailure::opaque(pc, "LE64 operand is not static"))?;
        let r = av.checked_neg().ok_or_else(|| ScriptFailure::solver_one(FailureCode::Int64OutOfBounds, pc))?;
        result.set_static(Concrete::Le64(r)).ok();
    } else {
        install(env, require_le64(&a));
        install(env, result.request_view(View::Int64).unwrap_or_default());
        let tracking = format!("check_int64_out_of_bounds~0@{pc}");
        env.solver.add(
            Expr::Not(Box::new(Expr::Eq(Box::new(le64_var(&a)), Box::new(Expr::Bv64Const(i64::MIN))))),
            Some(tracking),
            Some((FailureCode::Int64OutOfBounds, pc)),
        );
        env.solver.add(Expr::Eq(Box::new(le64_var(&result)), Box::new(Expr::Neg(Box::new(le64_var(&a))))), None, None);
    }
    ctx.push(result, env.cfg)
}

fn compare64(
    ctx: &mut ExecContext,
    env: &mut OpEnv,
    pc: u32,
    opname: &str,
    fold: impl Fn(i64, i64) -> bool,
    relate: impl Fn(Expr, Expr) -> Expr,
) -> Result<(), ScriptFailure> {
    let b = ctx.pop()?;
    let a = ctx.pop()?;
    ctx.mark_used(&a);
    ctx.mark_used(&b);
    let name = env.fresh_name(opname, pc);
    let result = SymValue::new(name, Some(opname.into()), vec![a.clone(), b.clone()], pc);
    if a.is_static() && b.is_static() {
        let av = a.as_le64().map_err(|_| ScriptFailure::opaque(pc, "LE64 operand is not static"))?;
        let bv = b.as_le64().map_err(|_| ScriptFailure::opaque(pc, "LE64 operand is not static"))?;
        result.set_static(Concrete::Int(if fold(av, bv) { 1 } else { 0 })).ok();
    } else {
        install(env, require_le64(&a));
        install(env, require_le64(&b));
        let view = View::ScriptNum { max_size: 1 };
        install(env, result.request_view(view).unwrap_or_default());
        let r_var = Expr::var(result.var_name(view), Sort::Int);
        env.solver.add(
            Expr::Eq(
                Box::new(r_var),
                Box::new(Expr::Ite(Box::new(relate(le64_var(&a), le64_var(&b))), Box::new(Expr::int(1)), Box::new(Expr::int(0)))),
            ),
            None,
            None,
        );
    }
    ctx.push(result, env.cfg)
}

pub fn handle_lessthan64(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    compare64(ctx, env, pc, "LESSTHAN64", |a, b| a < b, |a, b| Expr::Lt(Box::new(a), Box::new(b)))
}

pub fn handle_lessthanorequal64(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    compare64(ctx, env, pc, "LESSTHANOREQUAL64", |a, b| a <= b, |a, b| Expr::Le(Box::new(a), Box::new(b)))
}

pub fn handle_greaterthan64(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    compare64(ctx, env, pc, "GREATERTHAN64", |a, b| a > b, |a, b| Expr::Lt(Box::new(b), Box::new(a)))
}

pub fn handle_greaterthanorequal64(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    compare64(ctx, env, pc, "GREATERTHANOREQUAL64", |a, b| a >= b, |a, b| Expr::Le(Box::new(b), Box::new(a)))
}

pub fn handle_le64toscriptnum(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let a = ctx.pop()?;
    ctx.mark_used(&a);
    let name = env.fresh_name("LE64TOSCRIPTNUM", pc);
    let result = SymValue::new(name, Some("LE64TOSCRIPTNUM".into()), vec![a.clone()], pc);
    if a.is_static() {
        let av = a.as_le64().map_err(|_| ScriptFailure::opaque(pc, "LE64 operand is not static"))?;
        result.set_static(Concrete::Int(av as i128)).ok();
    } else {
        install(env, require_le64(&a));
        let view = View::ScriptNum { max_size: 8 };
        install(env, result.request_view(view).unwrap_or_default());
        let r_var = Expr::var(result.var_name(view), Sort::Int);
        env.solver.add(
            Expr::Eq(Box::new(r_var), Box::new(Expr::UfApply { name: "le64_to_scriptnum".into(), args: vec![le64_var(&a)], ret: Sort::Int })),
            None,
            None,
        );
    }
    ctx.push(result, env.cfg)
}

pub fn handle_scriptnumtole64(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let a = ctx.pop()?;
    ctx.mark_used(&a);
    let name = env.fresh_name("SCRIPTNUMTOLE64", pc);
    let result = SymValue::new(name, Some("SCRIPTNUMTOLE64".into()), vec![a.clone()], pc);
    if a.is_static() {
        let av = a.as_scriptnum_int().map_err(|_| ScriptFailure::opaque(pc, "scriptnum operand is not static"))?;
        if av > i64::MAX as i128 || av < i64::MIN as i128 {
            return Err(ScriptFailure::solver_one(FailureCode::Int64OutOfBounds, pc));
        }
        result.set_static(Concrete::Le64(av as i64)).ok();
    } else {
        let view = View::ScriptNum { max_size: 4 };
        install(env, a.request_view(view).unwrap_or_default());
        install(env, result.request_view(View::Int64).unwrap_or_default());
        let a_var = Expr::var(a.var_name(view), Sort::Int);
        env.solver.add(
            Expr::Eq(
                Box::new(le64_var(&result)),
                Box::new(Expr::UfApply { name: "scriptnum_to_le64".into(), args: vec![a_var], ret: Sort::BitVec64 }),
            ),
            None,
            None,
        );
    }
    ctx.push(result, env.cfg)
}

/// `LE32TOLE64` / `LE64TOLE32`: straightforward fixed-width reinterpretation
/// with a hard bounds check in the 64-to-32 direction.
pub fn handle_le32tole64(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let a = ctx.pop()?;
    ctx.mark_used(&a);
    let name = env.fresh_name("LE32TOLE64", pc);
    let result = SymValue::new(name, Some("LE32TOLE64".into()), vec![a.clone()], pc);
    if a.is_static() {
        let bytes = a.as_bytes().map_err(|_| ScriptFailure::opaque(pc, "LE32 operand is not static"))?;
        let v = staticfold::decode_le_signed(&bytes).map_err(|_| ScriptFailure::solver_one(FailureCode::Le32WrongSize, pc))?;
        result.set_static(Concrete::Le64(v as i64)).ok();
    } else {
        install(env, a.request_view(View::ByteSeq).unwrap_or_default());
        install(env, result.request_view(View::Int64).unwrap_or_default());
        let len = Expr::var(a.var_name(View::Length), Sort::Int);
        let tracking = format!("check_le32_wrong_size~0@{pc}");
        env.solver.add(Expr::Eq(Box::new(len), Box::new(Expr::int(4))), Some(tracking), Some((FailureCode::Le32WrongSize, pc)));
        let a_bytes = Expr::var(a.var_name(View::ByteSeq), Sort::Bytes);
        env.solver.add(
            Expr::Eq(
                Box::new(le64_var(&result)),
                Box::new(Expr::UfApply { name: "le32_to_le64".into(), args: vec![a_bytes], ret: Sort::BitVec64 }),
            ),
            None,
            None,
        );
    }
    ctx.push(result, env.cfg)
}

pub fn handle_le64tole32(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let a = ctx.pop()?;
    ctx.mark_used(&a);
    let name = env.fresh_name("LE64TOLE32", pc);
    let result = SymValue::new(name, Some("LE64TOLE32".into()), vec![a.clone()], pc);
    if a.is_static() {
        let v = a.as_le64().map_err(|_| ScriptFailure::opaque(pc, "LE64 operand is not static"))?;
        if v > i32::MAX as i64 || v < i32::MIN as i64 {
            return Err(ScriptFailure::solver_one(FailureCode::Le64WrongSize, pc));
        }
        result.set_static(Concrete::Bytes(staticfold::encode_le32_signed(v as i32))).ok();
    } else {
        install(env, require_le64(&a));
        install(env, result.request_view(View::ByteSeq).unwrap_or_default());
        let tracking = format!("check_le64_wrong_size~0@{pc}");
        let in_range = Expr::And(vec![
            Expr::Le(Box::new(Expr::int(i32::MIN as i128)), Box::new(le64_var(&a))),
            Expr::Le(Box::new(le64_var(&a)), Box::new(Expr::int(i32::MAX as i128))),
        ]);
        env.solver.add(in_range, Some(tracking), Some((FailureCode::Le64WrongSize, pc)));
        let r_bytes = Expr::var(result.var_name(View::ByteSeq), Sort::Bytes);
        env.solver.add(
            Expr::Eq(Box::new(r_bytes), Box::new(Expr::UfApply { name: "le64_to_le32".into(), args: vec![le64_var(&a)], ret: Sort::Bytes })),
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

    fn le64(n: i64) -> SymValue {
        let v = SymValue::new_witness(format!("w{n}"), n as u32, 0);
        v.set_static(Concrete::Le64(n)).unwrap();
        v
    }

    #[test]
    fn add64_folds_static_operands() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        ctx.push(le64(2), &cfg).unwrap();
        ctx.push(le64(40), &cfg).unwrap();
        handle_add64(&mut ctx, &mut env, 0).unwrap();
        assert_eq!(ctx.pop().unwrap().as_le64().unwrap(), 42);
    }

    #[test]
    fn add64_overflow_is_a_hard_failure() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        ctx.push(le64(i64::MAX), &cfg).unwrap();
        ctx.push(le64(1), &cfg).unwrap();
        let err = handle_add64(&mut ctx, &mut env, 0).unwrap_err();
        assert!(matches!(err, ScriptFailure::Solver { .. }));
    }

    #[test]
    fn div64_by_static_zero_fails() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        ctx.push(le64(10), &cfg).unwrap();
        ctx.push(le64(0), &cfg).unwrap();
        let err = handle_div64(&mut ctx, &mut env, 0).unwrap_err();
        assert!(matches!(err, ScriptFailure::Solver { .. }));
    }
}
