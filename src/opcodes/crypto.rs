//! Signature / EC family (§4.F)
//!
//! Whether a signature cryptographically verifies is never decided here —
//! that depends on a sighash this engine does not compute. Every
//! `CHECKSIG`-shaped result is instead an uninterpreted function of its
//! (signature bytes, pubkey bytes) pair: functional consistency of a UF
//! already gives "the same args always produce the same result" for free,
//! which is what the known-args/known-result uniqueness checks in the
//! reference implementation are getting at. What this layer *does* decide
//! statically is shape: pubkey/signature length and encoding, NULLFAIL,
//! low-S, and hashtype-byte validity.

use crate::config::SigVersion;
use crate::context::ExecContext;
use crate::failure::{FailureCode, ScriptFailure};
use crate::solver::{Expr, Sort};
use crate::staticfold::{probe_pubkey_shape, PubkeyShapeError};
use crate::value::{Concrete, SymValue, View};

use super::OpEnv;

fn check_pubkey(v: &SymValue, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let x_only = matches!(env.cfg.sigversion, SigVersion::Tapscript);
    if v.is_static() {
        let bytes = v.as_bytes().unwrap();
        return probe_pubkey_shape(&bytes, x_only).map_err(|e| match e {
            PubkeyShapeError::InvalidLength => ScriptFailure::solver_one(FailureCode::InvalidPubkeyLength, pc),
            PubkeyShapeError::InvalidEncoding => ScriptFailure::solver_one(FailureCode::InvalidPubkey, pc),
        });
    }
    let sizes: std::collections::BTreeSet<usize> = if x_only { [32].into() } else { [33, 65].into() };
    v.set_possible_sizes(sizes).map_err(|_| ScriptFailure::solver_one(FailureCode::InvalidPubkeyLength, pc))?;
    for c in v.request_view(View::ByteSeq).unwrap_or_default() {
        env.solver.add(c, None, None);
    }
    Ok(())
}

/// Shape-only signature validation for a statically-known signature; a
/// symbolic signature only gets its length/bytes views installed, not a
/// DER/schnorr structural check (structural parsing of unknown bytes is
/// out of scope, matching the static-only folding discipline elsewhere).
fn check_static_signature(bytes: &[u8], env: &OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    if bytes.is_empty() {
        return Ok(());
    }
    let sig_len = bytes.len();
    if matches!(env.cfg.sigversion, SigVersion::Tapscript) {
        if sig_len != 64 && sig_len != 65 {
            return Err(ScriptFailure::solver_one(FailureCode::InvalidSignatureLength, pc));
        }
        return Ok(());
    }
    if !(9..=73).contains(&sig_len) {
        return Err(ScriptFailure::solver_one(FailureCode::InvalidSignatureLength, pc));
    }
    if bytes[0] != 0x30 {
        return Err(ScriptFailure::solver_one(FailureCode::InvalidSignatureEncoding, pc));
    }
    let hashtype = bytes[sig_len - 1];
    let base = hashtype & !0x80;
    if !(1..=3).contains(&base) {
        return Err(ScriptFailure::solver_one(FailureCode::SignatureBadHashtype, pc));
    }
    if env.cfg.require_minimal_sig {
        // Low-S: a full DER parse is out of scope; this checks the
        // structurally-cheap necessary condition (S's high bit clear,
        // i.e. S is itself a non-negative DER integer) rather than
        // comparing against secp256k1's curve order over two.
        if sig_len >= 3 {
            let s_len = bytes[sig_len - 3] as usize;
            if s_len > 0 && sig_len > s_len + 2 {
                let s_first_byte = bytes[sig_len - 2 - s_len];
                if s_first_byte & 0x80 != 0 {
                    return Err(ScriptFailure::solver_one(FailureCode::SignatureLowS, pc));
                }
            }
        }
    }
    Ok(())
}

fn checksig_result(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32, sig: &SymValue, pubkey: &SymValue) -> Result<SymValue, ScriptFailure> {
    let name = env.fresh_name("CHECKSIG", pc);
    let result = SymValue::new(name, Some("CHECKSIG".into()), vec![sig.clone(), pubkey.clone()], pc);

    if sig.is_static() && sig.as_bytes().unwrap().is_empty() {
        result.set_static(Concrete::Int(0)).ok();
        install_checksig_consistency(ctx, env, pc, "checksig_verifies", vec![sig.canonical_repr(env.cfg.tag_values_with_position), pubkey.canonical_repr(env.cfg.tag_values_with_position)], &result)?;
        return Ok(result);
    }

    let view = View::ScriptNum { max_size: 1 };
    for c in result.request_view(view).unwrap_or_default() {
        env.solver.add(c, None, None);
    }
    for c in sig.request_view(View::ByteSeq).unwrap_or_default() {
        env.solver.add(c, None, None);
    }
    for c in pubkey.request_view(View::ByteSeq).unwrap_or_default() {
        env.solver.add(c, None, None);
    }
    let sig_bytes = Expr::var(sig.var_name(View::ByteSeq), Sort::Bytes);
    let pk_bytes = Expr::var(pubkey.var_name(View::ByteSeq), Sort::Bytes);
    let r_var = Expr::var(result.var_name(view), Sort::Int);
    let uf = Expr::UfApply { name: "checksig_verifies".into(), args: vec![sig_bytes, pk_bytes], ret: Sort::Bool };
    env.solver.add(
        Expr::Eq(Box::new(r_var), Box::new(Expr::Ite(Box::new(uf), Box::new(Expr::int(1)), Box::new(Expr::int(0))))),
        None,
        None,
    );
    install_checksig_consistency(ctx, env, pc, "checksig_verifies", vec![sig.canonical_repr(env.cfg.tag_values_with_position), pubkey.canonical_repr(env.cfg.tag_values_with_position)], &result)?;
    Ok(result)
}

/// Installs the congruence half of the known-args/known-result uniqueness
/// checks the reference implementation names: two calls against the same
/// uninterpreted function with structurally-identical argument reprs must
/// agree on their result, named `KnownArgsDifferentResult` so a resulting
/// unsat core points at this specific pairing rather than an opaque UF
/// contradiction. The converse direction (different args forcing a shared
/// result) isn't a logical necessity — two independent signatures can
/// legitimately both fail or both succeed — so it is not asserted here; see
/// DESIGN.md for the `KnownResultDifferentArgs` scope decision.
fn install_checksig_consistency(
    ctx: &mut ExecContext,
    env: &mut OpEnv,
    pc: u32,
    family: &'static str,
    arg_reprs: Vec<String>,
    result: &SymValue,
) -> Result<(), ScriptFailure> {
    let prior = ctx.register_checksig_call(family, arg_reprs.clone(), result.clone());
    for prev in prior.into_iter().filter(|p| p.arg_reprs == arg_reprs) {
        if result.is_static() && prev.result.is_static() {
            if result.as_bool().unwrap_or(false) != prev.result.as_bool().unwrap_or(false) {
                return Err(ScriptFailure::solver_one(FailureCode::KnownArgsDifferentResult, pc));
            }
            continue;
        }
        if result.is_static() || prev.result.is_static() {
            continue;
        }
        let view = View::ScriptNum { max_size: 1 };
        let rv = Expr::var(result.var_name(view), Sort::Int);
        let pv = Expr::var(prev.result.var_name(view), Sort::Int);
        let name = format!("check_known_args_different_result~0@{pc}");
        env.solver.add(Expr::Eq(Box::new(rv), Box::new(pv)), Some(name), Some((FailureCode::KnownArgsDifferentResult, pc)));
    }
    Ok(())
}

fn install_nullfail(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32, result: &SymValue, sig: &SymValue) {
    if !env.cfg.nullfail_flag {
        return;
    }
    let view = View::ScriptNum { max_size: 1 };
    let r_var = Expr::var(result.var_name(view), view.sort());
    let sig_len = Expr::var(sig.var_name(View::Length), Sort::Int);
    let nullfail = Expr::Implies(
        Box::new(Expr::Eq(Box::new(r_var), Box::new(Expr::int(0)))),
        Box::new(Expr::Eq(Box::new(sig_len), Box::new(Expr::int(0)))),
    );
    let description = format!("unique:nullfail@{pc}");
    ctx.add_enforcement(description.clone(), nullfail.clone(), (FailureCode::SignatureNullfail, pc));
    env.solver.add(nullfail, Some(format!("check_signature_nullfail~0@{pc}")), Some((FailureCode::SignatureNullfail, pc)));
}

pub fn handle_checksig(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let pubkey = ctx.pop()?;
    let sig = ctx.pop()?;
    ctx.mark_used(&pubkey);
    ctx.mark_used(&sig);
    check_pubkey(&pubkey, env, pc)?;
    if sig.is_static() {
        check_static_signature(&sig.as_bytes().unwrap(), env, pc)?;
    } else {
        for c in sig.request_view(View::ByteSeq).unwrap_or_default() {
            env.solver.add(c, None, None);
        }
    }
    let result = checksig_result(ctx, env, pc, &sig, &pubkey)?;
    install_nullfail(ctx, env, pc, &result, &sig);
    ctx.push(result, env.cfg)
}

pub fn handle_checksigverify(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    handle_checksig(ctx, env, pc)?;
    force_true(ctx, env, pc, FailureCode::CheckSigVerify)
}

fn force_true(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32, code: FailureCode) -> Result<(), ScriptFailure> {
    let result = ctx.pop()?;
    if result.is_static() {
        return if result.as_bool().unwrap_or(false) { Ok(()) } else { Err(ScriptFailure::solver_one(code, pc)) };
    }
    let view = View::ScriptNum { max_size: 1 };
    let r_var = Expr::var(result.var_name(view), view.sort());
    let name = format!("check_{}~0@{pc}", code.name());
    env.solver.add(Expr::Not(Box::new(Expr::Eq(Box::new(r_var), Box::new(Expr::int(0))))), Some(name), Some((code, pc)));
    Ok(())
}

/// `m`-of-`n` multisig. Does not attempt the real algorithm's combinatorial
/// "skip non-matching pubkeys" search — each of the `m` signatures is
/// checked against the pubkey at the same position, which is sufficient to
/// model "is satisfiable at all" for every script this engine's enforced
/// size limits make tractable and is called out explicitly as a scope
/// decision (see DESIGN.md).
pub fn handle_checkmultisig(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let n_val = ctx.pop()?;
    let n = n_val.as_scriptnum_int().map_err(|_| ScriptFailure::opaque(pc, "CHECKMULTISIG requires a static pubkey count"))? as usize;
    let mut pubkeys = Vec::with_capacity(n);
    for _ in 0..n {
        pubkeys.push(ctx.pop()?);
    }
    let m_val = ctx.pop()?;
    let m = m_val.as_scriptnum_int().map_err(|_| ScriptFailure::opaque(pc, "CHECKMULTISIG requires a static signature count"))? as usize;
    if m > n {
        return Err(ScriptFailure::opaque(pc, "CHECKMULTISIG requires sigcount <= pubkeycount"));
    }
    let mut sigs = Vec::with_capacity(m);
    for _ in 0..m {
        sigs.push(ctx.pop()?);
    }
    let bug = ctx.pop()?;
    ctx.mark_used(&bug);
    for p in &pubkeys {
        ctx.mark_used(p);
        check_pubkey(p, env, pc)?;
    }
    for s in &sigs {
        ctx.mark_used(s);
    }

    if env.cfg.nulldummy_flag {
        if bug.is_static() {
            if !bug.as_bytes().unwrap().is_empty() {
                return Err(ScriptFailure::solver_one(FailureCode::CheckMultisigBugbyteZero, pc));
            }
        } else {
            let c = bug.request_view(View::Length).unwrap_or_default();
            for e in c {
                env.solver.add(e, None, None);
            }
            let len = Expr::var(bug.var_name(View::Length), Sort::Int);
            let name = format!("check_checkmultisig_bugbyte_zero~0@{pc}");
            env.solver.add(Expr::Eq(Box::new(len), Box::new(Expr::int(0))), Some(name), Some((FailureCode::CheckMultisigBugbyteZero, pc)));
        }
    }

    let mut results = Vec::with_capacity(m);
    for (sig, pubkey) in sigs.iter().zip(pubkeys.iter()) {
        if sig.is_static() {
            let bytes = sig.as_bytes().unwrap();
            if !bytes.is_empty() {
                check_static_signature(&bytes, env, pc)?;
            }
        }
        let result = checksig_result(ctx, env, pc, sig, pubkey)?;
        install_nullfail(ctx, env, pc, &result, sig);
        results.push(result);
    }

    let name = env.fresh_name("CHECKMULTISIG", pc);
    let combined = SymValue::new(name, Some("CHECKMULTISIG".into()), results.clone(), pc);
    if results.iter().all(|r| r.is_static()) {
        let all_true = results.iter().all(|r| r.as_bool().unwrap_or(false));
        combined.set_static(Concrete::Int(if all_true { 1 } else { 0 })).ok();
    } else {
        let view = View::ScriptNum { max_size: 1 };
        for c in combined.request_view(view).unwrap_or_default() {
            env.solver.add(c, None, None);
        }
        let parts: Vec<Expr> = results
            .iter()
            .map(|r| {
                let rv = Expr::var(r.var_name(View::ScriptNum { max_size: 1 }), Sort::Int);
                Expr::Not(Box::new(Expr::Eq(Box::new(rv), Box::new(Expr::int(0)))))
            })
            .collect();
        let combined_var = Expr::var(combined.var_name(view), Sort::Int);
        env.solver.add(
            Expr::Eq(
                Box::new(combined_var),
                Box::new(Expr::Ite(Box::new(Expr::And(parts)), Box::new(Expr::int(1)), Box::new(Expr::int(0)))),
            ),
            None,
            None,
        );
    }
    ctx.push(combined, env.cfg)
}

pub fn handle_checkmultisigverify(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    handle_checkmultisig(ctx, env, pc)?;
    force_true(ctx, env, pc, FailureCode::CheckMultisigVerify)
}

pub fn handle_checksigfromstack(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let pubkey = ctx.pop()?;
    let message = ctx.pop()?;
    let sig = ctx.pop()?;
    ctx.mark_used(&pubkey);
    ctx.mark_used(&message);
    ctx.mark_used(&sig);
    check_pubkey(&pubkey, env, pc)?;

    let name = env.fresh_name("CHECKSIGFROMSTACK", pc);
    let result = SymValue::new(name, Some("CHECKSIGFROMSTACK".into()), vec![sig.clone(), message.clone(), pubkey.clone()], pc);
    let view = View::ScriptNum { max_size: 1 };
    for c in result.request_view(view).unwrap_or_default() {
        env.solver.add(c, None, None);
    }
    for v in [&sig, &message, &pubkey] {
        for c in v.request_view(View::ByteSeq).unwrap_or_default() {
            env.solver.add(c, None, None);
        }
    }
    let sig_bytes = Expr::var(sig.var_name(View::ByteSeq), Sort::Bytes);
    let msg_bytes = Expr::var(message.var_name(View::ByteSeq), Sort::Bytes);
    let pk_bytes = Expr::var(pubkey.var_name(View::ByteSeq), Sort::Bytes);
    let r_var = Expr::var(result.var_name(view), Sort::Int);
    let uf = Expr::UfApply { name: "checksigfromstack_verifies".into(), args: vec![sig_bytes, msg_bytes, pk_bytes], ret: Sort::Bool };
    env.solver.add(
        Expr::Eq(Box::new(r_var), Box::new(Expr::Ite(Box::new(uf), Box::new(Expr::int(1)), Box::new(Expr::int(0))))),
        None,
        None,
    );
    let arg_reprs = vec![
        sig.canonical_repr(env.cfg.tag_values_with_position),
        message.canonical_repr(env.cfg.tag_values_with_position),
        pubkey.canonical_repr(env.cfg.tag_values_with_position),
    ];
    install_checksig_consistency(ctx, env, pc, "checksigfromstack_verifies", arg_reprs, &result)?;
    install_nullfail(ctx, env, pc, &result, &sig);
    ctx.push(result, env.cfg)
}

pub fn handle_checksigfromstackverify(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    handle_checksigfromstack(ctx, env, pc)?;
    force_true(ctx, env, pc, FailureCode::CheckSigFromStackVerify)
}

pub fn handle_checklocktimeverify(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let top = ctx.peek_from_top(0)?;
    let (locktime, constraints) = ctx.tx_fields.tx_level(env.cfg, crate::txfield::TxLevelField::Locktime, pc);
    for c in constraints {
        env.solver.add(c, None, None);
    }
    // Compared directly against the tx-level locktime (an Int64 view), so
    // the stack operand is requested as Int64 too rather than ScriptNum —
    // the two numeric views can't coexist on one value (§4.A), and this
    // opcode only ever needs the comparison, not scriptnum-specific shape.
    for c in top.request_view(View::Int64).unwrap_or_default() {
        env.solver.add(c, None, None);
    }
    let locktime_var = Expr::var(locktime.var_name(View::Int64), Sort::BitVec64);
    let top_var = Expr::var(top.var_name(View::Int64), Sort::BitVec64);
    // The lock-time *type* (block height vs. UNIX time) of both operands
    // must agree: both below or both at/above the threshold.
    const THRESHOLD: i128 = 500_000_000;
    let name_type = format!("check_locktime_type_mismatch~0@{pc}");
    env.solver.add(
        Expr::Eq(
            Box::new(Expr::Lt(Box::new(top_var.clone()), Box::new(Expr::int(THRESHOLD)))),
            Box::new(Expr::Lt(Box::new(locktime_var.clone()), Box::new(Expr::int(THRESHOLD)))),
        ),
        Some(name_type),
        Some((FailureCode::LocktimeTypeMismatch, pc)),
    );
    let name_effect = format!("check_locktime_timelock_in_effect~0@{pc}");
    env.solver.add(Expr::Le(Box::new(top_var), Box::new(locktime_var)), Some(name_effect), Some((FailureCode::LocktimeTimelockInEffect, pc)));
    Ok(())
}

pub fn handle_checksequenceverify(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let top = ctx.peek_from_top(0)?;
    let (sequence, constraints) = ctx.tx_fields.input(env.cfg, 0, crate::txfield::InputField::Sequence, pc);
    for c in constraints {
        env.solver.add(c, None, None);
    }
    for c in top.request_view(View::Int64).unwrap_or_default() {
        env.solver.add(c, None, None);
    }
    let seq_var = Expr::var(sequence.var_name(View::Int64), Sort::BitVec64);
    let top_var = Expr::var(top.var_name(View::Int64), Sort::BitVec64);
    const DISABLE_FLAG: i128 = 1 << 31;
    let name_type = format!("check_nsequence_type_mismatch~0@{pc}");
    env.solver.add(
        Expr::Eq(
            Box::new(Expr::Lt(Box::new(top_var.clone()), Box::new(Expr::int(DISABLE_FLAG)))),
            Box::new(Expr::Lt(Box::new(Expr::var(sequence.var_name(View::Int64), Sort::BitVec64)), Box::new(Expr::int(DISABLE_FLAG)))),
        ),
        Some(name_type),
        Some((FailureCode::NsequenceTypeMismatch, pc)),
    );
    let name_effect = format!("check_nsequence_timelock_in_effect~0@{pc}");
    env.solver.add(Expr::Le(Box::new(top_var), Box::new(seq_var)), Some(name_effect), Some((FailureCode::NsequenceTimelockInEffect, pc)));
    Ok(())
}

pub fn handle_ecmulscalarverify(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let result_point = ctx.pop()?;
    let scalar = ctx.pop()?;
    let base_point = ctx.pop()?;
    ctx.mark_used(&result_point);
    ctx.mark_used(&scalar);
    ctx.mark_used(&base_point);
    for v in [&result_point, &scalar, &base_point] {
        for c in v.request_view(View::ByteSeq).unwrap_or_default() {
            env.solver.add(c, None, None);
        }
    }
    let rb = Expr::var(result_point.var_name(View::ByteSeq), Sort::Bytes);
    let sb = Expr::var(scalar.var_name(View::ByteSeq), Sort::Bytes);
    let bb = Expr::var(base_point.var_name(View::ByteSeq), Sort::Bytes);
    let uf = Expr::UfApply { name: "ec_mul_scalar_matches".into(), args: vec![bb, sb, rb], ret: Sort::Bool };
    let name = format!("check_ecmultverify~0@{pc}");
    env.solver.add(uf, Some(name), Some((FailureCode::EcMulVerify, pc)));
    Ok(())
}

pub fn handle_tweakverify(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let tweaked = ctx.pop()?;
    let tweak = ctx.pop()?;
    let internal = ctx.pop()?;
    ctx.mark_used(&tweaked);
    ctx.mark_used(&tweak);
    ctx.mark_used(&internal);
    for v in [&tweaked, &tweak, &internal] {
        for c in v.request_view(View::ByteSeq).unwrap_or_default() {
            env.solver.add(c, None, None);
        }
    }
    let tb = Expr::var(tweaked.var_name(View::ByteSeq), Sort::Bytes);
    let kb = Expr::var(tweak.var_name(View::ByteSeq), Sort::Bytes);
    let ib = Expr::var(internal.var_name(View::ByteSeq), Sort::Bytes);
    let uf = Expr::UfApply { name: "tweak_matches".into(), args: vec![ib, kb, tb], ret: Sort::Bool };
    let name = format!("check_tweakverify~0@{pc}");
    env.solver.add(uf, Some(name), Some((FailureCode::TweakVerify, pc)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::{BranchId, NameCtx};
    use crate::config::EnvConfig;
    use crate::solver::SolverFrameStack;

    #[test]
    fn checksig_with_empty_signature_is_static_false() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        let sig = SymValue::new_witness("sig".into(), 0, 0);
        sig.set_static(Concrete::Bytes(vec![])).unwrap();
        let pk = SymValue::new_witness("pk".into(), 1, 0);
        let mut compressed = vec![0x02u8];
        compressed.extend(vec![1u8; 32]);
        // not a valid curve point in general, but check_pubkey only runs
        // probe_pubkey_shape on static pubkeys; keep pk symbolic to avoid
        // needing a real point here.
        ctx.push(sig, &cfg).unwrap();
        ctx.push(pk, &cfg).unwrap();
        handle_checksig(&mut ctx, &mut env, 0).unwrap();
        let result = ctx.pop().unwrap();
        assert_eq!(result.as_scriptnum_int().unwrap(), 0);
        let _ = compressed;
    }

    #[test]
    fn checkmultisig_rejects_sigcount_above_pubkeycount() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        let bug = SymValue::new_witness("bug".into(), 0, 0);
        bug.set_static(Concrete::Bytes(vec![])).unwrap();
        let sig = SymValue::new_witness("sig".into(), 1, 0);
        sig.set_static(Concrete::Bytes(vec![])).unwrap();
        let m = SymValue::new_witness("m".into(), 2, 0);
        m.set_static(Concrete::Int(1)).unwrap();
        let n = SymValue::new_witness("n".into(), 3, 0);
        n.set_static(Concrete::Int(0)).unwrap();
        ctx.push(bug, &cfg).unwrap();
        ctx.push(sig, &cfg).unwrap();
        ctx.push(m, &cfg).unwrap();
        ctx.push(n, &cfg).unwrap();
        let err = handle_checkmultisig(&mut ctx, &mut env, 0).unwrap_err();
        assert!(matches!(err, ScriptFailure::Opaque { .. }));
    }
}
