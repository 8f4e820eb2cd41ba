//! Hashing family (§4.F)
//!
//! Static inputs fold directly through `staticfold::fold_*`. Symbolic
//! inputs get an uninterpreted function of the input bytes; 256-bit
//! digests are always modeled collision-free (two equal-value results
//! imply equal inputs), 160-bit digests only when
//! `EnvConfig::assume_no_160bit_hash_collisions` is set — installed as a
//! `ForAll` no-collision axiom the first time each hash kind is used on a
//! symbolic input.

use crate::context::ExecContext;
use crate::failure::{FailureCode, ScriptFailure};
use crate::solver::{Expr, Sort};
use crate::staticfold::{self, Sha256Context, Sha256ContextError};
use crate::value::{Concrete, SymValue, View};

use super::OpEnv;

fn no_collision_axiom(fn_name: &str) -> Expr {
    let a = ("a".to_string(), Sort::Bytes);
    let b = ("b".to_string(), Sort::Bytes);
    let ra = Expr::UfApply { name: fn_name.into(), args: vec![Expr::var("a", Sort::Bytes)], ret: Sort::Bytes };
    let rb = Expr::UfApply { name: fn_name.into(), args: vec![Expr::var("b", Sort::Bytes)], ret: Sort::Bytes };
    Expr::ForAll {
        vars: vec![a, b],
        body: Box::new(Expr::Implies(
            Box::new(Expr::Eq(Box::new(ra), Box::new(rb))),
            Box::new(Expr::Eq(Box::new(Expr::var("a", Sort::Bytes)), Box::new(Expr::var("b", Sort::Bytes)))),
        )),
    }
}

fn generic_hash(
    ctx: &mut ExecContext,
    env: &mut OpEnv,
    pc: u32,
    opname: &str,
    fn_name: &str,
    collision_free: bool,
    fold: impl Fn(&[u8]) -> Vec<u8>,
) -> Result<(), ScriptFailure> {
    let input = ctx.pop()?;
    ctx.mark_used(&input);
    let name = env.fresh_name(opname, pc);
    let result = SymValue::new(name, Some(opname.into()), vec![input.clone()], pc);

    if input.is_static() {
        let bytes = input.as_bytes().map_err(|_| ScriptFailure::opaque(pc, "hash input is not static bytes"))?;
        result.set_static(Concrete::Bytes(fold(&bytes))).ok();
    } else {
        let ic = input.request_view(View::ByteSeq).unwrap_or_default();
        for c in ic {
            env.solver.add(c, None, None);
        }
        let rc = result.request_view(View::ByteSeq).unwrap_or_default();
        for c in rc {
            env.solver.add(c, None, None);
        }
        let in_bytes = Expr::var(input.var_name(View::ByteSeq), Sort::Bytes);
        let r_bytes = Expr::var(result.var_name(View::ByteSeq), Sort::Bytes);
        env.solver.add(
            Expr::Eq(Box::new(r_bytes), Box::new(Expr::UfApply { name: fn_name.into(), args: vec![in_bytes], ret: Sort::Bytes })),
            None,
            None,
        );
        if collision_free {
            env.solver.add(no_collision_axiom(fn_name), None, None);
        }
    }
    ctx.push(result, env.cfg)
}

pub fn handle_ripemd160(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let collision_free = env.cfg.assume_no_160bit_hash_collisions;
    generic_hash(ctx, env, pc, "RIPEMD160", "ripemd160", collision_free, |b| staticfold::fold_ripemd160(b).to_vec())
}

pub fn handle_sha1(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    // SHA-1 is modeled like RIPEMD160 for collision assumptions: neither is
    // treated as unconditionally collision-free.
    let collision_free = env.cfg.assume_no_160bit_hash_collisions;
    generic_hash(ctx, env, pc, "SHA1", "sha1", collision_free, |b| staticfold::fold_sha1(b).to_vec())
}

pub fn handle_sha256(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    generic_hash(ctx, env, pc, "SHA256", "sha256", true, |b| staticfold::fold_sha256(b).to_vec())
}

pub fn handle_hash160(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let collision_free = env.cfg.assume_no_160bit_hash_collisions;
    generic_hash(ctx, env, pc, "HASH160", "hash160", collision_free, |b| staticfold::fold_hash160(b).to_vec())
}

pub fn handle_hash256(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    generic_hash(ctx, env, pc, "HASH256", "hash256", true, |b| staticfold::fold_hash256(b).to_vec())
}

/// Length bound shared by every streaming context opcode: `ctx_len ∈
/// [40, 103]`, with a separate failure code for each side of the range.
fn assert_context_length_bounds(env: &mut OpEnv, pc: u32, ctx_var: &SymValue, opname: &str) {
    let len = Expr::var(ctx_var.var_name(View::Length), Sort::Int);
    let name_short = format!("check_sha256_context_too_short~{opname}@{pc}");
    env.solver.add(
        Expr::Le(Box::new(Expr::int(40)), Box::new(len.clone())),
        Some(name_short),
        Some((FailureCode::Sha256ContextTooShort, pc)),
    );
    let name_long = format!("check_sha256_context_too_long~{opname}@{pc}");
    env.solver.add(Expr::Le(Box::new(len), Box::new(Expr::int(103))), Some(name_long), Some((FailureCode::Sha256ContextTooLong, pc)));
}

/// `SHA256INITIALIZE`: pops the initial tail bytes (0..63 of them),
/// pushes a context whose midstate is the SHA-256 IV.
pub fn handle_sha256initialize(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let data = ctx.pop()?;
    ctx.mark_used(&data);
    let name = env.fresh_name("SHA256INITIALIZE", pc);
    let result = SymValue::new(name, Some("SHA256INITIALIZE".into()), vec![data.clone()], pc);

    if data.is_static() {
        let bytes = data.as_bytes().map_err(|_| ScriptFailure::opaque(pc, "SHA256INITIALIZE input is not static bytes"))?;
        if bytes.len() >= 64 {
            return Err(ScriptFailure::solver_one(FailureCode::Sha256ContextTooLong, pc));
        }
        result.set_static(Concrete::Bytes(Sha256Context::initial(&bytes).encode())).ok();
    } else {
        let dc = data.request_view(View::ByteSeq).unwrap_or_default();
        for c in dc {
            env.solver.add(c, None, None);
        }
        let rc = result.request_view(View::ByteSeq).unwrap_or_default();
        for c in rc {
            env.solver.add(c, None, None);
        }
        let in_bytes = Expr::var(data.var_name(View::ByteSeq), Sort::Bytes);
        let r_bytes = Expr::var(result.var_name(View::ByteSeq), Sort::Bytes);
        env.solver.add(
            Expr::Eq(Box::new(r_bytes), Box::new(Expr::UfApply { name: "sha256ctx_init".into(), args: vec![in_bytes], ret: Sort::Bytes })),
            None,
            None,
        );
        let in_len = Expr::var(data.var_name(View::Length), Sort::Int);
        let r_len = Expr::var(result.var_name(View::Length), Sort::Int);
        env.solver.add(Expr::Eq(Box::new(r_len), Box::new(Expr::Add(Box::new(Expr::int(40)), Box::new(in_len)))), None, None);
        assert_context_length_bounds(env, pc, &result, "init");
    }
    ctx.push(result, env.cfg)
}

/// `SHA256UPDATE`: pops a chunk of data and a context, pushes the context
/// advanced by that chunk.
pub fn handle_sha256update(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let data = ctx.pop()?;
    let base = ctx.pop()?;
    ctx.mark_used(&data);
    ctx.mark_used(&base);
    let name = env.fresh_name("SHA256UPDATE", pc);
    let result = SymValue::new(name, Some("SHA256UPDATE".into()), vec![base.clone(), data.clone()], pc);

    if base.is_static() && data.is_static() {
        let base_bytes = base.as_bytes().map_err(|_| ScriptFailure::opaque(pc, "SHA256UPDATE base context is not static"))?;
        let data_bytes = data.as_bytes().map_err(|_| ScriptFailure::opaque(pc, "SHA256UPDATE data is not static"))?;
        let mut decoded = match Sha256Context::decode(&base_bytes) {
            Ok(c) => c,
            Err(Sha256ContextError::TooShort) => return Err(ScriptFailure::solver_one(FailureCode::Sha256ContextTooShort, pc)),
            Err(Sha256ContextError::TooLong) => return Err(ScriptFailure::solver_one(FailureCode::Sha256ContextTooLong, pc)),
            Err(Sha256ContextError::Invalid) => return Err(ScriptFailure::solver_one(FailureCode::InvalidSha256Context, pc)),
        };
        decoded.update(&data_bytes);
        result.set_static(Concrete::Bytes(decoded.encode())).ok();
    } else {
        let bc = base.request_view(View::ByteSeq).unwrap_or_default();
        for c in bc {
            env.solver.add(c, None, None);
        }
        let dc = data.request_view(View::ByteSeq).unwrap_or_default();
        for c in dc {
            env.solver.add(c, None, None);
        }
        let rc = result.request_view(View::ByteSeq).unwrap_or_default();
        for c in rc {
            env.solver.add(c, None, None);
        }
        assert_context_length_bounds(env, pc, &base, "update_base");

        let base_bytes_e = Expr::var(base.var_name(View::ByteSeq), Sort::Bytes);
        let data_bytes_e = Expr::var(data.var_name(View::ByteSeq), Sort::Bytes);
        let r_bytes = Expr::var(result.var_name(View::ByteSeq), Sort::Bytes);
        env.solver.add(
            Expr::Eq(
                Box::new(r_bytes),
                Box::new(Expr::UfApply { name: "sha256ctx_update".into(), args: vec![base_bytes_e, data_bytes_e], ret: Sort::Bytes }),
            ),
            None,
            None,
        );
        let base_len = Expr::var(base.var_name(View::Length), Sort::Int);
        let data_len = Expr::var(data.var_name(View::Length), Sort::Int);
        let r_len = Expr::var(result.var_name(View::Length), Sort::Int);
        // tail length only ever wraps modulo 64, but the context length
        // itself still moves within [40,103]; exact wraparound is left to
        // the uninterpreted function and checked at the result's own bound.
        env.solver.add(Expr::Le(Box::new(r_len), Box::new(Expr::Add(Box::new(base_len), Box::new(data_len)))), None, None);
        assert_context_length_bounds(env, pc, &result, "update_result");
    }
    ctx.push(result, env.cfg)
}

/// `SHA256FINALIZE`: pops a final chunk of data and a context, pushes the
/// completed 32-byte digest.
pub fn handle_sha256finalize(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let data = ctx.pop()?;
    let base = ctx.pop()?;
    ctx.mark_used(&data);
    ctx.mark_used(&base);
    let name = env.fresh_name("SHA256FINALIZE", pc);
    let result = SymValue::new(name, Some("SHA256FINALIZE".into()), vec![base.clone(), data.clone()], pc);

    if base.is_static() && data.is_static() {
        let base_bytes = base.as_bytes().map_err(|_| ScriptFailure::opaque(pc, "SHA256FINALIZE base context is not static"))?;
        let data_bytes = data.as_bytes().map_err(|_| ScriptFailure::opaque(pc, "SHA256FINALIZE data is not static"))?;
        let decoded = match Sha256Context::decode(&base_bytes) {
            Ok(c) => c,
            Err(Sha256ContextError::TooShort) => return Err(ScriptFailure::solver_one(FailureCode::Sha256ContextTooShort, pc)),
            Err(Sha256ContextError::TooLong) => return Err(ScriptFailure::solver_one(FailureCode::Sha256ContextTooLong, pc)),
            Err(Sha256ContextError::Invalid) => return Err(ScriptFailure::solver_one(FailureCode::InvalidSha256Context, pc)),
        };
        result.set_static(Concrete::Bytes(decoded.finalize(&data_bytes).to_vec())).ok();
    } else {
        let bc = base.request_view(View::ByteSeq).unwrap_or_default();
        for c in bc {
            env.solver.add(c, None, None);
        }
        let dc = data.request_view(View::ByteSeq).unwrap_or_default();
        for c in dc {
            env.solver.add(c, None, None);
        }
        let rc = result.request_view(View::ByteSeq).unwrap_or_default();
        for c in rc {
            env.solver.add(c, None, None);
        }
        assert_context_length_bounds(env, pc, &base, "finalize_base");

        let base_bytes_e = Expr::var(base.var_name(View::ByteSeq), Sort::Bytes);
        let data_bytes_e = Expr::var(data.var_name(View::ByteSeq), Sort::Bytes);
        let r_bytes = Expr::var(result.var_name(View::ByteSeq), Sort::Bytes);
        env.solver.add(
            Expr::Eq(
                Box::new(r_bytes),
                Box::new(Expr::UfApply { name: "sha256ctx_finalize".into(), args: vec![base_bytes_e, data_bytes_e], ret: Sort::Bytes }),
            ),
            None,
            None,
        );
        let r_len = Expr::var(result.var_name(View::Length), Sort::Int);
        env.solver.add(Expr::Eq(Box::new(r_len), Box::new(Expr::int(32))), None, None);
    }
    ctx.push(result, env.cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::{BranchId, NameCtx};
    use crate::config::EnvConfig;
    use crate::solver::SolverFrameStack;

    #[test]
    fn sha256_folds_static_input() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        let v = SymValue::new_witness("w".into(), 0, 0);
        v.set_static(Concrete::Bytes(vec![])).unwrap();
        ctx.push(v, &cfg).unwrap();
        handle_sha256(&mut ctx, &mut env, 0).unwrap();
        let top = ctx.pop().unwrap();
        assert_eq!(hex::encode(top.as_bytes().unwrap()), "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
    }

    #[test]
    fn hash160_matches_ripemd_of_sha256() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        let v = SymValue::new_witness("w".into(), 0, 0);
        v.set_static(Concrete::Bytes(b"abc".to_vec())).unwrap();
        ctx.push(v, &cfg).unwrap();
        handle_hash160(&mut ctx, &mut env, 0).unwrap();
        let top = ctx.pop().unwrap();
        assert_eq!(top.as_bytes().unwrap(), staticfold::fold_hash160(b"abc").to_vec());
    }

    #[test]
    fn sha256update_then_finalize_matches_plain_sha256() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();

        let init_data = SymValue::new_witness("init".into(), 0, 0);
        init_data.set_static(Concrete::Bytes(b"hello ".to_vec())).unwrap();
        ctx.push(init_data, &cfg).unwrap();
        handle_sha256initialize(&mut ctx, &mut env, 0).unwrap();

        let mid = SymValue::new_witness("mid".into(), 1, 0);
        mid.set_static(Concrete::Bytes(b"wor".to_vec())).unwrap();
        ctx.push(mid, &cfg).unwrap();
        handle_sha256update(&mut ctx, &mut env, 0).unwrap();

        let tail = SymValue::new_witness("tail".into(), 2, 0);
        tail.set_static(Concrete::Bytes(b"ld".to_vec())).unwrap();
        ctx.push(tail, &cfg).unwrap();
        handle_sha256finalize(&mut ctx, &mut env, 0).unwrap();

        let digest = ctx.pop().unwrap();
        assert_eq!(digest.as_bytes().unwrap(), staticfold::fold_sha256(b"hello world").to_vec());
    }

    #[test]
    fn sha256initialize_rejects_tail_of_64_or_more_bytes() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        let v = SymValue::new_witness("w".into(), 0, 0);
        v.set_static(Concrete::Bytes(vec![0u8; 64])).unwrap();
        ctx.push(v, &cfg).unwrap();
        let err = handle_sha256initialize(&mut ctx, &mut env, 0).unwrap_err();
        assert!(matches!(err, ScriptFailure::Solver { .. }));
    }

    #[test]
    fn sha256_context_pipeline_folds_to_expected_digest() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();

        let init_data = SymValue::new_witness("init".into(), 0, 0);
        init_data.set_static(Concrete::Bytes(b"hello ".to_vec())).unwrap();
        ctx.push(init_data, &cfg).unwrap();
        handle_sha256initialize(&mut ctx, &mut env, 0).unwrap();

        let tail = SymValue::new_witness("tail".into(), 1, 0);
        tail.set_static(Concrete::Bytes(b"world".to_vec())).unwrap();
        ctx.push(tail, &cfg).unwrap();
        handle_sha256finalize(&mut ctx, &mut env, 0).unwrap();

        let digest = ctx.pop().unwrap();
        assert_eq!(digest.as_bytes().unwrap(), staticfold::fold_sha256(b"hello world").to_vec());
    }
}
