//! Crate root: public surface and the single analysis entry point
//!
//! `scriptsym` is a symbolic tracer for a Bitcoin-family stack script
//! language (base script, SegWit v0, Tapscript, and an Elements-style
//! superset). Parsing source text into a `Vec<Token>` and rendering a
//! `Report` for a human are both external collaborators' jobs; this crate
//! owns everything between those two boundaries — branch forking on
//! unresolved conditionals, SMT-backed feasibility pruning, and the
//! failure taxonomy a path's infeasibility is attributed to.
//!
//! ## Invariants
//!
//! - **No unsafe.** The engine pushes/pops/forks plain data; there is no
//!   reason to reach for `unsafe` anywhere in this crate.
//! - **Single entry point.** [`analyze`] is the only way to run a script;
//!   everything else is public so a front-end can drive the pieces
//!   directly (a REPL stepping one opcode at a time, a plugin inspecting
//!   `ExecContext` mid-run), but a conforming front-end never needs more
//!   than `analyze` plus the types in [`config`], [`token`], and
//!   [`report`].
//! - **Deterministic given (tokens, config, seed).** Branch order,
//!   solver-query order, and report order are all fixed by construction
//!   (`branch.rs`'s append-only arena, `config::EnvConfig::seed` feeding
//!   every shuffle) so two runs of the same script under the same config
//!   produce byte-identical reports.
//!
//! If a script cannot be analyzed for a structural reason (malformed
//! conditionals, a capability this engine doesn't model), the failure mode
//! is a precise [`failure::ScriptFailure`] on the offending path, never a
//! panic.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

/// Run configuration (`EnvConfig`, `SigVersion`, `SolverMode`, `RetryPolicy`).
pub mod config;
/// The failure taxonomy (`FailureCode`, `ScriptFailure`) every infeasible
/// path is attributed to.
pub mod failure;
/// Backend-agnostic SMT IR (`Expr`, `Sort`) and the frame stack that mirrors
/// the branch tree (`SolverFrameStack`, `Backend`, `StubBackend`, the
/// optional `z3-backend`-gated `Z3Backend`).
pub mod solver;
/// Polymorphic symbolic values (`SymValue`, `View`, `Concrete`).
pub mod value;
/// Per-path execution state (`ExecContext`, `CondFrame`, `Enforcement`).
pub mod context;
/// The branch tree (`BranchTree`, `BranchId`, `NameCtx`, `PlaceholderRegistry`).
pub mod branch;
/// Cross-branch post-analysis passes (always-true folding, unused-value
/// folding, unique-enforcement folding, model-value uniqueness probing).
pub mod analysis;
/// Lazily-materialized transaction-introspection fields (`TxFieldMap`).
pub mod txfield;
/// Static constant folding and byte-level codecs shared by opcode handlers
/// (scriptnum, LE32/LE64, hashing, bitmask decomposition).
pub mod staticfold;
/// The token-stream boundary (`Token`, `OpCode`) a front-end parser targets.
pub mod token;
/// The plugin hook surface (`Hooks`, `HookRegistry`) external collaborators
/// implement to extend or override opcode semantics.
pub mod plugin;
/// Report shapes (`Report`, `PathReport`, `ModelValueReport`) a front-end
/// formatter walks.
pub mod report;
/// Opcode handlers and the dispatch loop that drives branch forking.
pub mod opcodes;

pub use config::EnvConfig;
pub use failure::{FailureCode, ScriptFailure};
pub use report::Report;
pub use token::{OpCode, Token};

use analysis::{process_always_true_enforcements, process_unused_values};
use branch::{BranchId, BranchTree};
use plugin::HookRegistry;
use report::{build_report, ModelValueReport};
use solver::SolverFrameStack;

/// Run one script to completion and return its report.
///
/// This is the single canonical entry point: it builds the solver frame
/// stack, drives [`opcodes::dispatch::run`] to explore every branch the
/// script's conditionals fork into, folds the aggregate passes in
/// [`analysis`], and assembles a [`Report`].
///
/// `hooks` may be an empty [`HookRegistry`] — plugins are opt-in.
pub fn analyze(cfg: &EnvConfig, tokens: &[Token], hooks: &mut HookRegistry) -> Report {
    let mut solver = SolverFrameStack::new(cfg);
    hooks.init(cfg);
    let tree = opcodes::dispatch::run(cfg, &mut solver, hooks, tokens);
    let always_true = process_always_true_enforcements(&tree);
    let unused_values = process_unused_values(&tree);
    build_report(
        &tree,
        |id| model_values_for(&tree, id),
        always_true,
        unused_values,
    )
}

fn model_values_for(tree: &BranchTree, id: BranchId) -> Vec<(String, ModelValueReport)> {
    tree.ctx(id).model_values().iter().map(|(name, v)| (name.clone(), ModelValueReport::from(v))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use token::OpCode;

    fn push_num(n: i64) -> Token {
        Token::Push(staticfold::encode_scriptnum(n as i128))
    }

    #[test]
    fn static_addition_script_yields_single_valid_path() {
        let cfg = EnvConfig::default();
        let tokens = vec![push_num(2), push_num(3), Token::Op(OpCode::Add), push_num(5), Token::Op(OpCode::NumEqual)];
        let mut hooks = HookRegistry::new();
        let report = analyze(&cfg, &tokens, &mut hooks);
        assert_eq!(report.paths.len(), 1);
        assert!(report.paths[0].valid);
    }

    #[test]
    fn dynamic_conditional_forks_into_two_reported_paths() {
        let cfg = EnvConfig::default();
        let tokens = vec![
            Token::Placeholder("w".into()),
            Token::Op(OpCode::If),
            push_num(1),
            Token::Op(OpCode::Else),
            push_num(0),
            Token::Op(OpCode::EndIf),
            push_num(1),
            Token::Op(OpCode::Equal),
        ];
        let mut hooks = HookRegistry::new();
        let report = analyze(&cfg, &tokens, &mut hooks);
        assert_eq!(report.paths.len(), 2);
    }

    #[test]
    fn return_opcode_is_reported_as_an_invalid_path() {
        let cfg = EnvConfig::default();
        let tokens = vec![Token::Op(OpCode::Return)];
        let mut hooks = HookRegistry::new();
        let report = analyze(&cfg, &tokens, &mut hooks);
        assert_eq!(report.paths.len(), 1);
        assert!(!report.paths[0].valid);
    }
}
