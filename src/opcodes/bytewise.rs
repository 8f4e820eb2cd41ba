//! Bytewise / splicing family (§4.F)
//!
//! `CAT`/`SPLIT`/`LEFT`/`RIGHT` and the bitwise ops all operate on the
//! `BYTE_SEQ` view. Static operands fold directly; symbolic operands get a
//! fresh result value whose `Length`/`ByteSeq` views are linked by a
//! `Concat`/`Extract` expression.

use crate::context::ExecContext;
use crate::failure::{FailureCode, ScriptFailure};
use crate::solver::Expr;
use crate::value::{Concrete, SymValue, View};

use super::OpEnv;

fn require_bytes(v: &SymValue) -> Vec<Expr> {
    v.request_view(View::ByteSeq).unwrap_or_default()
}

fn install(env: &mut OpEnv, constraints: Vec<Expr>) {
    for c in constraints {
        env.solver.add(c, None, None);
    }
}

pub fn handle_cat(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let b = ctx.pop()?;
    let a = ctx.pop()?;
    ctx.mark_used(&a);
    ctx.mark_used(&b);
    let name = env.fresh_name("CAT", pc);
    let result = SymValue::new(name, Some("CAT".into()), vec![a.clone(), b.clone()], pc);

    if a.is_static() && b.is_static() {
        let mut bytes = a.as_bytes().unwrap();
        bytes.extend(b.as_bytes().unwrap());
        if bytes.len() > env.cfg.max_script_element_size {
            return Err(ScriptFailure::solver_one(FailureCode::DataTooLong, pc));
        }
        result.set_static(Concrete::Bytes(bytes)).ok();
    } else {
        let ca = require_bytes(&a);
        let cb = require_bytes(&b);
        let cr = require_bytes(&result);
        install(env, ca);
        install(env, cb);
        install(env, cr);
        let a_bytes = Expr::var(a.var_name(View::ByteSeq), crate::solver::Sort::Bytes);
        let b_bytes = Expr::var(b.var_name(View::ByteSeq), crate::solver::Sort::Bytes);
        let r_bytes = Expr::var(result.var_name(View::ByteSeq), crate::solver::Sort::Bytes);
        env.solver.add(Expr::Eq(Box::new(r_bytes), Box::new(Expr::Concat(vec![a_bytes, b_bytes]))), None, None);
        let a_len = Expr::var(a.var_name(View::Length), crate::solver::Sort::Int);
        let b_len = Expr::var(b.var_name(View::Length), crate::solver::Sort::Int);
        let r_len = Expr::var(result.var_name(View::Length), crate::solver::Sort::Int);
        let name = format!("check_data_too_long~cat@{pc}");
        env.solver.add(
            Expr::Eq(Box::new(r_len), Box::new(Expr::Add(Box::new(a_len), Box::new(b_len)))),
            None,
            None,
        );
        env.solver.add(
            Expr::Le(Box::new(r_len), Box::new(Expr::int(env.cfg.max_script_element_size as i128))),
            Some(name),
            Some((FailureCode::DataTooLong, pc)),
        );
    }
    ctx.push(result, env.cfg)
}

/// `SPLIT`: pops a static index `n` and the byte string, pushes the two
/// halves `[0,n)` and `[n,len)`. The index must be static — there is no
/// uninterpreted "extract at symbolic offset" model, matching the
/// `PICK`/`ROLL` capability cliff for non-static indices.
pub fn handle_split(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let n_val = ctx.pop()?;
    let data = ctx.pop()?;
    ctx.mark_used(&n_val);
    ctx.mark_used(&data);
    let n = n_val
        .as_scriptnum_int()
        .map_err(|_| ScriptFailure::opaque(pc, "SPLIT requires a statically known index"))? as usize;

    if data.is_static() {
        let bytes = data.as_bytes().unwrap();
        if n > bytes.len() {
            return Err(ScriptFailure::solver_one(FailureCode::InvalidArguments, pc));
        }
        let (left, right) = bytes.split_at(n);
        let left_v = SymValue::new(env.fresh_name("SPLIT_L", pc), Some("SPLIT_L".into()), vec![data.clone()], pc);
        left_v.set_static(Concrete::Bytes(left.to_vec())).ok();
        let right_v = SymValue::new(env.fresh_name("SPLIT_R", pc), Some("SPLIT_R".into()), vec![data.clone()], pc);
        right_v.set_static(Concrete::Bytes(right.to_vec())).ok();
        ctx.push(left_v, env.cfg)?;
        ctx.push(right_v, env.cfg)?;
        Ok(())
    } else {
        let cd = require_bytes(&data);
        install(env, cd);
        let data_bytes = Expr::var(data.var_name(View::ByteSeq), crate::solver::Sort::Bytes);
        let data_len = Expr::var(data.var_name(View::Length), crate::solver::Sort::Int);
        let name = format!("check_invalid_arguments~split@{pc}");
        env.solver.add(Expr::Le(Box::new(Expr::int(n as i128)), Box::new(data_len)), Some(name), Some((FailureCode::InvalidArguments, pc)));

        let left_v = SymValue::new(env.fresh_name("SPLIT_L", pc), Some("SPLIT_L".into()), vec![data.clone()], pc);
        let cl = require_bytes(&left_v);
        install(env, cl);
        let left_bytes = Expr::var(left_v.var_name(View::ByteSeq), crate::solver::Sort::Bytes);
        env.solver.add(
            Expr::Eq(
                Box::new(left_bytes),
                Box::new(Expr::Extract { base: Box::new(data_bytes.clone()), offset: Box::new(Expr::int(0)), len: Box::new(Expr::int(n as i128)) }),
            ),
            None,
            None,
        );

        let right_v = SymValue::new(env.fresh_name("SPLIT_R", pc), Some("SPLIT_R".into()), vec![data.clone()], pc);
        let cr = require_bytes(&right_v);
        install(env, cr);
        let right_bytes = Expr::var(right_v.var_name(View::ByteSeq), crate::solver::Sort::Bytes);
        let remaining_len = Expr::Sub(Box::new(Expr::var(data.var_name(View::Length), crate::solver::Sort::Int)), Box::new(Expr::int(n as i128)));
        env.solver.add(
            Expr::Eq(
                Box::new(right_bytes),
                Box::new(Expr::Extract { base: Box::new(data_bytes), offset: Box::new(Expr::int(n as i128)), len: Box::new(remaining_len) }),
            ),
            None,
            None,
        );

        ctx.push(left_v, env.cfg)?;
        ctx.push(right_v, env.cfg)?;
        Ok(())
    }
}

/// `LEFT`: pops a static count `n` and the byte string, pushes the first
/// `n` bytes. Equivalent to keeping only the left half of `SPLIT`.
pub fn handle_left(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let n_val = ctx.pop()?;
    let data = ctx.pop()?;
    ctx.mark_used(&n_val);
    ctx.mark_used(&data);
    let n = n_val.as_scriptnum_int().map_err(|_| ScriptFailure::opaque(pc, "LEFT requires a statically known count"))? as usize;

    if data.is_static() {
        let bytes = data.as_bytes().unwrap();
        if n > bytes.len() {
            return Err(ScriptFailure::solver_one(FailureCode::InvalidArguments, pc));
        }
        let result = SymValue::new(env.fresh_name("LEFT", pc), Some("LEFT".into()), vec![data.clone()], pc);
        result.set_static(Concrete::Bytes(bytes[..n].to_vec())).ok();
        ctx.push(result, env.cfg)
    } else {
        let cd = require_bytes(&data);
        install(env, cd);
        let data_bytes = Expr::var(data.var_name(View::ByteSeq), crate::solver::Sort::Bytes);
        let data_len = Expr::var(data.var_name(View::Length), crate::solver::Sort::Int);
        let name = format!("check_invalid_arguments~left@{pc}");
        env.solver.add(Expr::Le(Box::new(Expr::int(n as i128)), Box::new(data_len)), Some(name), Some((FailureCode::InvalidArguments, pc)));

        let result = SymValue::new(env.fresh_name("LEFT", pc), Some("LEFT".into()), vec![data.clone()], pc);
        let cr = require_bytes(&result);
        install(env, cr);
        let r_bytes = Expr::var(result.var_name(View::ByteSeq), crate::solver::Sort::Bytes);
        env.solver.add(
            Expr::Eq(
                Box::new(r_bytes),
                Box::new(Expr::Extract { base: Box::new(data_bytes), offset: Box::new(Expr::int(0)), len: Box::new(Expr::int(n as i128)) }),
            ),
            None,
            None,
        );
        ctx.push(result, env.cfg)
    }
}

/// `RIGHT`: pops a static count `n` and the byte string, pushes the last
/// `n` bytes. Equivalent to keeping only the right half of `SPLIT`.
pub fn handle_right(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let n_val = ctx.pop()?;
    let data = ctx.pop()?;
    ctx.mark_used(&n_val);
    ctx.mark_used(&data);
    let n = n_val.as_scriptnum_int().map_err(|_| ScriptFailure::opaque(pc, "RIGHT requires a statically known count"))? as usize;

    if data.is_static() {
        let bytes = data.as_bytes().unwrap();
        if n > bytes.len() {
            return Err(ScriptFailure::solver_one(FailureCode::InvalidArguments, pc));
        }
        let result = SymValue::new(env.fresh_name("RIGHT", pc), Some("RIGHT".into()), vec![data.clone()], pc);
        result.set_static(Concrete::Bytes(bytes[bytes.len() - n..].to_vec())).ok();
        ctx.push(result, env.cfg)
    } else {
        let cd = require_bytes(&data);
        install(env, cd);
        let data_bytes = Expr::var(data.var_name(View::ByteSeq), crate::solver::Sort::Bytes);
        let data_len = Expr::var(data.var_name(View::Length), crate::solver::Sort::Int);
        let name = format!("check_invalid_arguments~right@{pc}");
        env.solver.add(Expr::Le(Box::new(Expr::int(n as i128)), Box::new(data_len.clone())), Some(name), Some((FailureCode::InvalidArguments, pc)));

        let result = SymValue::new(env.fresh_name("RIGHT", pc), Some("RIGHT".into()), vec![data.clone()], pc);
        let cr = require_bytes(&result);
        install(env, cr);
        let r_bytes = Expr::var(result.var_name(View::ByteSeq), crate::solver::Sort::Bytes);
        let offset = Expr::Sub(Box::new(data_len), Box::new(Expr::int(n as i128)));
        env.solver.add(
            Expr::Eq(
                Box::new(r_bytes),
                Box::new(Expr::Extract { base: Box::new(data_bytes), offset: Box::new(offset), len: Box::new(Expr::int(n as i128)) }),
            ),
            None,
            None,
        );
        ctx.push(result, env.cfg)
    }
}

/// `INVERT`: bitwise NOT of every byte. Length is preserved exactly, so a
/// symbolic operand's result is tied to the input only through `Length`;
/// the actual bitwise relationship is left to an uninterpreted function
/// since `Expr` carries no bit-level byte arithmetic.
pub fn handle_invert(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let top = ctx.pop()?;
    ctx.mark_used(&top);
    let result = SymValue::new(env.fresh_name("INVERT", pc), Some("INVERT".into()), vec![top.clone()], pc);
    if top.is_static() {
        let bytes = top.as_bytes().unwrap().iter().map(|b| !b).collect();
        result.set_static(Concrete::Bytes(bytes)).ok();
    } else {
        let ci = require_bytes(&top);
        install(env, ci);
        let cr = require_bytes(&result);
        install(env, cr);
        let in_bytes = Expr::var(top.var_name(View::ByteSeq), crate::solver::Sort::Bytes);
        let r_bytes = Expr::var(result.var_name(View::ByteSeq), crate::solver::Sort::Bytes);
        env.solver.add(
            Expr::Eq(Box::new(r_bytes), Box::new(Expr::UfApply { name: "bytewise_invert".into(), args: vec![in_bytes], ret: crate::solver::Sort::Bytes })),
            None,
            None,
        );
        let in_len = Expr::var(top.var_name(View::Length), crate::solver::Sort::Int);
        let r_len = Expr::var(result.var_name(View::Length), crate::solver::Sort::Int);
        env.solver.add(Expr::Eq(Box::new(r_len), Box::new(in_len)), None, None);
    }
    ctx.push(result, env.cfg)
}

/// Shared by `AND`/`OR`/`XOR`: both operands must be the same length; the
/// bitwise relationship itself is an elementwise uninterpreted function
/// since `Expr` has no bit-level byte arithmetic.
fn bitwise_op(
    ctx: &mut ExecContext,
    env: &mut OpEnv,
    pc: u32,
    opname: &'static str,
    fn_name: &'static str,
    fold: impl Fn(u8, u8) -> u8,
) -> Result<(), ScriptFailure> {
    let b = ctx.pop()?;
    let a = ctx.pop()?;
    ctx.mark_used(&a);
    ctx.mark_used(&b);
    let result = SymValue::new(env.fresh_name(opname, pc), Some(opname.into()), vec![a.clone(), b.clone()], pc);

    if a.is_static() && b.is_static() {
        let ab = a.as_bytes().unwrap();
        let bb = b.as_bytes().unwrap();
        if ab.len() != bb.len() {
            return Err(ScriptFailure::solver_one(FailureCode::LengthMismatch, pc));
        }
        let out = ab.iter().zip(bb.iter()).map(|(&x, &y)| fold(x, y)).collect();
        result.set_static(Concrete::Bytes(out)).ok();
    } else {
        let ca = require_bytes(&a);
        let cb = require_bytes(&b);
        install(env, ca);
        install(env, cb);
        let a_len = Expr::var(a.var_name(View::Length), crate::solver::Sort::Int);
        let b_len = Expr::var(b.var_name(View::Length), crate::solver::Sort::Int);
        let name = format!("check_length_mismatch~{opname}@{pc}");
        env.solver.add(Expr::Eq(Box::new(a_len.clone()), Box::new(b_len)), Some(name), Some((FailureCode::LengthMismatch, pc)));

        let cr = require_bytes(&result);
        install(env, cr);
        let a_bytes = Expr::var(a.var_name(View::ByteSeq), crate::solver::Sort::Bytes);
        let b_bytes = Expr::var(b.var_name(View::ByteSeq), crate::solver::Sort::Bytes);
        let r_bytes = Expr::var(result.var_name(View::ByteSeq), crate::solver::Sort::Bytes);
        env.solver.add(
            Expr::Eq(
                Box::new(r_bytes),
                Box::new(Expr::UfApply { name: fn_name.into(), args: vec![a_bytes, b_bytes], ret: crate::solver::Sort::Bytes }),
            ),
            None,
            None,
        );
        let r_len = Expr::var(result.var_name(View::Length), crate::solver::Sort::Int);
        env.solver.add(Expr::Eq(Box::new(r_len), Box::new(a_len)), None, None);
    }
    ctx.push(result, env.cfg)
}

pub fn handle_and(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    bitwise_op(ctx, env, pc, "AND", "bytewise_and", |x, y| x & y)
}

pub fn handle_or(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    bitwise_op(ctx, env, pc, "OR", "bytewise_or", |x, y| x | y)
}

pub fn handle_xor(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    bitwise_op(ctx, env, pc, "XOR", "bytewise_xor", |x, y| x ^ y)
}

pub fn handle_size(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let top = ctx.peek_from_top(0)?;
    let name = env.fresh_name("SIZE", pc);
    let result = SymValue::new(name, Some("SIZE".into()), vec![top.clone()], pc);
    if top.is_static() {
        result.set_static(Concrete::Int(top.as_bytes().unwrap().len() as i128)).ok();
    } else {
        let c = require_bytes(&top);
        install(env, c);
        let len = Expr::var(top.var_name(View::Length), crate::solver::Sort::Int);
        let view = View::ScriptNum { max_size: env.cfg.scriptnum_max_size_for(false) as u8 };
        let rc = result.request_view(view).unwrap_or_default();
        install(env, rc);
        let r_var = Expr::var(result.var_name(view), view.sort());
        env.solver.add(Expr::Eq(Box::new(r_var), Box::new(len)), None, None);
    }
    ctx.push(result, env.cfg)
}

pub fn handle_equal(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let b = ctx.pop()?;
    let a = ctx.pop()?;
    ctx.mark_used(&a);
    ctx.mark_used(&b);
    let name = env.fresh_name("EQUAL", pc);
    let result = SymValue::new(name, Some("EQUAL".into()), vec![a.clone(), b.clone()], pc);

    if a.is_static() && b.is_static() {
        let eq = a.as_bytes().unwrap() == b.as_bytes().unwrap();
        result.set_static(Concrete::Int(if eq { 1 } else { 0 })).ok();
    } else {
        let ca = require_bytes(&a);
        let cb = require_bytes(&b);
        install(env, ca);
        install(env, cb);
        let a_bytes = Expr::var(a.var_name(View::ByteSeq), crate::solver::Sort::Bytes);
        let b_bytes = Expr::var(b.var_name(View::ByteSeq), crate::solver::Sort::Bytes);
        let view = View::ScriptNum { max_size: env.cfg.scriptnum_max_size_for(false) as u8 };
        let rc = result.request_view(view).unwrap_or_default();
        install(env, rc);
        let r_var = Expr::var(result.var_name(view), view.sort());
        env.solver.add(
            Expr::Eq(
                Box::new(r_var),
                Box::new(Expr::Ite(Box::new(Expr::Eq(Box::new(a_bytes), Box::new(b_bytes))), Box::new(Expr::int(1)), Box::new(Expr::int(0)))),
            ),
            None,
            None,
        );
    }
    ctx.push(result, env.cfg)
}

pub fn handle_equalverify(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    handle_equal(ctx, env, pc)?;
    let result = ctx.pop()?;
    if result.is_static() {
        if result.as_bool().unwrap_or(false) {
            return Ok(());
        }
        return Err(ScriptFailure::solver_one(FailureCode::EqualVerify, pc));
    }
    let view = View::ScriptNum { max_size: env.cfg.scriptnum_max_size_for(false) as u8 };
    let r_var = Expr::var(result.var_name(view), view.sort());
    let name = format!("check_equalverify~0@{pc}");
    env.solver.add(Expr::Not(Box::new(Expr::Eq(Box::new(r_var), Box::new(Expr::int(0))))), Some(name), Some((FailureCode::EqualVerify, pc)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::{BranchId, NameCtx};
    use crate::config::EnvConfig;
    use crate::solver::SolverFrameStack;

    fn static_bytes(bytes: &[u8]) -> SymValue {
        let v = SymValue::new_witness(format!("w{}", bytes.len()), 0, 0);
        v.set_static(Concrete::Bytes(bytes.to_vec())).unwrap();
        v
    }

    #[test]
    fn cat_concatenates_static_operands() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        ctx.push(static_bytes(&[1, 2]), &cfg).unwrap();
        ctx.push(static_bytes(&[3, 4]), &cfg).unwrap();
        handle_cat(&mut ctx, &mut env, 0).unwrap();
        let top = ctx.pop().unwrap();
        assert_eq!(top.as_bytes().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn split_divides_at_static_index() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        ctx.push(static_bytes(&[1, 2, 3, 4]), &cfg).unwrap();
        let n = SymValue::new_witness("n".into(), 0, 0);
        n.set_static(Concrete::Int(2)).unwrap();
        ctx.push(n, &cfg).unwrap();
        handle_split(&mut ctx, &mut env, 0).unwrap();
        let right = ctx.pop().unwrap();
        let left = ctx.pop().unwrap();
        assert_eq!(left.as_bytes().unwrap(), vec![1, 2]);
        assert_eq!(right.as_bytes().unwrap(), vec![3, 4]);
    }

    #[test]
    fn equalverify_fails_on_static_mismatch() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        ctx.push(static_bytes(&[1]), &cfg).unwrap();
        ctx.push(static_bytes(&[2]), &cfg).unwrap();
        let err = handle_equalverify(&mut ctx, &mut env, 0).unwrap_err();
        assert!(matches!(err, ScriptFailure::Solver { .. }));
    }

    #[test]
    fn xor_is_elementwise_on_static_operands() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        ctx.push(static_bytes(&[0b1010, 0b1111]), &cfg).unwrap();
        ctx.push(static_bytes(&[0b0110, 0b0000]), &cfg).unwrap();
        handle_xor(&mut ctx, &mut env, 0).unwrap();
        let top = ctx.pop().unwrap();
        assert_eq!(top.as_bytes().unwrap(), vec![0b1100, 0b1111]);
    }

    #[test]
    fn and_rejects_mismatched_static_lengths() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        ctx.push(static_bytes(&[1, 2]), &cfg).unwrap();
        ctx.push(static_bytes(&[1]), &cfg).unwrap();
        let err = handle_and(&mut ctx, &mut env, 0).unwrap_err();
        assert!(matches!(err, ScriptFailure::Solver { .. }));
    }

    #[test]
    fn left_and_right_split_static_bytes() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        ctx.push(static_bytes(&[1, 2, 3, 4]), &cfg).unwrap();
        let n = SymValue::new_witness("n".into(), 0, 0);
        n.set_static(Concrete::Int(3)).unwrap();
        ctx.push(n, &cfg).unwrap();
        handle_left(&mut ctx, &mut env, 0).unwrap();
        let left = ctx.pop().unwrap();
        assert_eq!(left.as_bytes().unwrap(), vec![1, 2, 3]);

        ctx.push(static_bytes(&[1, 2, 3, 4]), &cfg).unwrap();
        let n2 = SymValue::new_witness("n2".into(), 1, 0);
        n2.set_static(Concrete::Int(1)).unwrap();
        ctx.push(n2, &cfg).unwrap();
        handle_right(&mut ctx, &mut env, 0).unwrap();
        let right = ctx.pop().unwrap();
        assert_eq!(right.as_bytes().unwrap(), vec![4]);
    }

    #[test]
    fn invert_flips_every_bit() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        ctx.push(static_bytes(&[0x00, 0xff]), &cfg).unwrap();
        handle_invert(&mut ctx, &mut env, 0).unwrap();
        let top = ctx.pop().unwrap();
        assert_eq!(top.as_bytes().unwrap(), vec![0xff, 0x00]);
    }
}
