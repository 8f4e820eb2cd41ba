//! Transaction introspection family (§4.F, §4.G)
//!
//! Every `INSPECT*` opcode is a thin wrapper around `TxFieldMap`: push the
//! requested field (materializing it and its well-formedness constraints on
//! first access), bump the refcount so later aggregate analysis can see how
//! many times a given input/output was dereferenced, and tag a
//! `data_reference` onto the result so reports render `&in0_amount` instead
//! of a bare witness name.

use crate::context::ExecContext;
use crate::failure::ScriptFailure;
use crate::solver::{Expr, Sort};
use crate::txfield::{InputField, OutputField, TxLevelField};
use crate::value::{Concrete, SymValue, View};

use super::OpEnv;

fn resolve_static_index(ctx: &mut ExecContext, pc: u32) -> Result<u32, ScriptFailure> {
    let idx = ctx.pop()?;
    ctx.mark_used(&idx);
    let n = idx.as_scriptnum_int().map_err(|_| ScriptFailure::opaque(pc, "transaction introspection requires a statically known index"))?;
    if n < 0 {
        return Err(ScriptFailure::opaque(pc, "transaction introspection index must be non-negative"));
    }
    Ok(n as u32)
}

fn push_input_field(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32, index: u32, field: InputField) -> Result<(), ScriptFailure> {
    let (v, constraints) = ctx.tx_fields.input(env.cfg, index, field, pc);
    for c in constraints {
        env.solver.add(c, None, None);
    }
    let dref = format!("in{index}_{field:?}");
    v.set_data_reference(dref.clone());
    ctx.bump_refcount(&dref);
    ctx.push(v, env.cfg)
}

fn push_output_field(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32, index: u32, field: OutputField) -> Result<(), ScriptFailure> {
    let (v, constraints) = ctx.tx_fields.output(env.cfg, index, field, pc);
    for c in constraints {
        env.solver.add(c, None, None);
    }
    let dref = format!("out{index}_{field:?}");
    v.set_data_reference(dref.clone());
    ctx.bump_refcount(&dref);
    ctx.push(v, env.cfg)
}

fn push_tx_level(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32, field: TxLevelField) -> Result<(), ScriptFailure> {
    let (v, constraints) = ctx.tx_fields.tx_level(env.cfg, field, pc);
    for c in constraints {
        env.solver.add(c, None, None);
    }
    let dref = format!("tx_{field:?}");
    v.set_data_reference(dref.clone());
    ctx.bump_refcount(&dref);
    ctx.push(v, env.cfg)
}

/// Outpoint = (txid, vout) concatenated into one 36-byte field; modeled as
/// a single opaque `ByteSeq` witness rather than two separate `TxFieldMap`
/// entries, since nothing in this engine needs to take it apart further.
pub fn handle_inspect_input_outpoint(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let index = resolve_static_index(ctx, pc)?;
    let name = env.fresh_name("INSPECTINPUTOUTPOINT", pc);
    let v = SymValue::new(name, Some("INSPECTINPUTOUTPOINT".into()), Vec::new(), pc);
    let c = v.request_view(View::ByteSeq).unwrap_or_default();
    for e in c {
        env.solver.add(e, None, None);
    }
    let len = Expr::var(v.var_name(View::Length), Sort::Int);
    env.solver.add(Expr::Eq(Box::new(len), Box::new(Expr::int(36))), None, None);
    let dref = format!("in{index}_outpoint");
    v.set_data_reference(dref.clone());
    ctx.bump_refcount(&dref);
    ctx.push(v, env.cfg)
}

pub fn handle_inspect_input_asset(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let index = resolve_static_index(ctx, pc)?;
    push_input_field(ctx, env, pc, index, InputField::Asset)
}

pub fn handle_inspect_input_value(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let index = resolve_static_index(ctx, pc)?;
    push_input_field(ctx, env, pc, index, InputField::Amount)
}

pub fn handle_inspect_input_scriptpubkey(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let index = resolve_static_index(ctx, pc)?;
    push_input_field(ctx, env, pc, index, InputField::ScriptPubKey)
}

pub fn handle_inspect_input_sequence(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let index = resolve_static_index(ctx, pc)?;
    push_input_field(ctx, env, pc, index, InputField::Sequence)
}

pub fn handle_inspect_output_asset(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let index = resolve_static_index(ctx, pc)?;
    push_output_field(ctx, env, pc, index, OutputField::Asset)
}

pub fn handle_inspect_output_value(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let index = resolve_static_index(ctx, pc)?;
    push_output_field(ctx, env, pc, index, OutputField::Amount)
}

pub fn handle_inspect_output_nonce(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let index = resolve_static_index(ctx, pc)?;
    push_output_field(ctx, env, pc, index, OutputField::Nonce)
}

pub fn handle_inspect_output_scriptpubkey(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    let index = resolve_static_index(ctx, pc)?;
    push_output_field(ctx, env, pc, index, OutputField::ScriptPubKey)
}

pub fn handle_inspect_version(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    push_tx_level(ctx, env, pc, TxLevelField::Version)
}

pub fn handle_inspect_locktime(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    push_tx_level(ctx, env, pc, TxLevelField::Locktime)
}

pub fn handle_inspect_num_inputs(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    push_tx_level(ctx, env, pc, TxLevelField::NumInputs)
}

pub fn handle_inspect_num_outputs(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    push_tx_level(ctx, env, pc, TxLevelField::NumOutputs)
}

pub fn handle_inspect_current_input_index(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    push_tx_level(ctx, env, pc, TxLevelField::CurrentInputIndex)
}

pub fn handle_tx_weight(ctx: &mut ExecContext, env: &mut OpEnv, pc: u32) -> Result<(), ScriptFailure> {
    push_tx_level(ctx, env, pc, TxLevelField::Weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::{BranchId, NameCtx};
    use crate::config::EnvConfig;
    use crate::solver::SolverFrameStack;

    fn static_index(n: i128) -> SymValue {
        let v = SymValue::new_witness(format!("idx{n}"), n as u32, 0);
        v.set_static(Concrete::Int(n)).unwrap();
        v
    }

    #[test]
    fn inspect_input_value_tags_data_reference() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        ctx.push(static_index(0), &cfg).unwrap();
        handle_inspect_input_value(&mut ctx, &mut env, 0).unwrap();
        let top = ctx.pop().unwrap();
        assert_eq!(top.data_reference().unwrap(), "in0_Amount");
    }

    #[test]
    fn repeated_inspection_of_same_input_bumps_refcount() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        ctx.push(static_index(2), &cfg).unwrap();
        handle_inspect_input_value(&mut ctx, &mut env, 0).unwrap();
        ctx.pop().unwrap();
        ctx.push(static_index(2), &cfg).unwrap();
        handle_inspect_input_value(&mut ctx, &mut env, 1).unwrap();
        ctx.pop().unwrap();
        assert_eq!(ctx.refcount("in2_Amount"), 2);
    }

    #[test]
    fn inspect_input_outpoint_is_always_36_bytes() {
        let cfg = EnvConfig::default();
        let mut solver = SolverFrameStack::new(&cfg);
        let mut names = NameCtx::new();
        let mut env = OpEnv { cfg: &cfg, solver: &mut solver, names: &mut names, branch: BranchId::default_for_test() };
        let mut ctx = ExecContext::new();
        ctx.push(static_index(0), &cfg).unwrap();
        handle_inspect_input_outpoint(&mut ctx, &mut env, 0).unwrap();
        let top = ctx.pop().unwrap();
        assert_eq!(top.data_reference().unwrap(), "in0_outpoint");
    }
}
