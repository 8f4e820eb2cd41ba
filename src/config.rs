//! Run configuration (`EnvConfig`)
//!
//! Centralizes every policy flag the engine consults while it steps through
//! a script. This mirrors the reference implementation's `SymEnvironment`
//! (see `examples/original_source/tests/test_scripts.py::FreshEnv`): a
//! single struct threaded through the run rather than scattered globals.
//!
//! `scriptsym` does not parse these from `argv` (the CLI front-end is an
//! external collaborator, spec.md §1) — `EnvConfig` is the typed target such
//! a front-end would populate.

use std::time::Duration;

/// Selects which consensus rule set governs opcode limits and signature
/// encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SigVersion {
    /// Pre-segwit base script.
    #[default]
    Base,
    /// BIP141 segwit v0.
    WitnessV0,
    /// BIP342 tapscript.
    Tapscript,
}

impl SigVersion {
    /// Tapscript lifts the non-tapscript `OP_16`-exceeded opcode counter.
    pub fn counts_ops(self) -> bool {
        !matches!(self, SigVersion::Tapscript)
    }
}

/// Backend selection for the solver frame stack (§4.B / §4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverMode {
    /// Stateful incremental backend: native `push`/`pop`.
    Incremental,
    /// Stateless backend: assert-all, check-once, reshuffled per attempt.
    #[default]
    Reset,
}

/// Retry schedule for solver calls that return `unknown` (§5).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Initial per-call timeout.
    pub timeout: Duration,
    /// Maximum number of attempts before giving up.
    pub max_tries: u32,
    /// Geometric growth factor applied to the timeout after each `unknown`.
    pub multiplier: f64,
    /// Hard ceiling on the (growing) timeout.
    pub cap: Duration,
    /// Exit the whole analysis on a final `unknown` rather than continuing
    /// with the constraint dropped for that subtree.
    pub exit_on_unknown: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(2_000),
            max_tries: 3,
            multiplier: 2.0,
            cap: Duration::from_millis(30_000),
            exit_on_unknown: false,
        }
    }
}

/// All policy/configuration knobs for one analysis run.
///
/// Defaults follow `original_source/tests/test_scripts.py::FreshEnv`, which
/// is the reference's canonical "fresh, mostly-off" configuration.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Consensus rule set.
    pub sigversion: SigVersion,
    /// Treat the script as an Elements-style superset (64-bit arithmetic,
    /// asset/value introspection, `TXWEIGHT`, SHA-256 streaming opcodes).
    pub is_elements: bool,
    /// Whether the SMT backend is consulted at all. When `false`, constraint
    /// generation still happens but feasibility checks degrade to whatever
    /// `StubBackend` can resolve syntactically (no contradiction detection);
    /// anything it can't decide comes back `Unknown` and, per
    /// `RetryPolicy::exit_on_unknown`, is treated as feasible rather than
    /// failed — this is the "solver off" path referenced by SC-1..SC-3 in
    /// spec.md §8.
    pub z3_enabled: bool,
    /// Extract and report concrete model values for witnesses/tx fields on
    /// finalization.
    pub produce_model_values: bool,
    /// Run feasibility checks across `N` worker threads, first `sat` wins.
    pub use_parallel_solving: bool,
    /// Worker count when `use_parallel_solving` is set.
    pub parallel_workers: usize,
    /// 160-bit hashes (`RIPEMD160`/`HASH160`) are modeled as collision-free.
    /// 256-bit hashes are always collision-free regardless of this flag.
    pub assume_no_160bit_hash_collisions: bool,
    /// NULLFAIL: a failing `CHECKSIG`-family check requires an empty
    /// signature.
    pub nullfail_flag: bool,
    /// NULLDUMMY: the `CHECKMULTISIG` "bug byte" must have length zero.
    pub nulldummy_flag: bool,
    /// Reject non-canonical pushes (should have used `OP_0`/`OP_1..OP_16`/
    /// `OP_1NEGATE`).
    pub minimaldata_flag: bool,
    /// `IF`/`NOTIF` condition must be exactly `0` or `1`.
    pub minimalif_flag: bool,
    /// Require low-S signatures.
    pub require_minimal_sig: bool,
    /// Append `@pc` to `canonical_repr` (tag-with-position option, §4.A).
    pub tag_values_with_position: bool,
    /// Sort commutative arithmetic operands deterministically.
    pub deterministic_commutative_order: bool,
    /// Shuffle assertions before each reset-mode solver check.
    pub disable_randomization: bool,
    /// Per-run PRNG seed feeding shuffles and parallel-worker seeds.
    pub seed: u64,
    /// Retry policy for `unknown` solver verdicts.
    pub retry: RetryPolicy,
    /// Maximum byte length of a single stack element.
    pub max_script_element_size: usize,
    /// Maximum number of elements on stack+altstack.
    pub max_stack_size: usize,
    /// Maximum count of "heavy" opcodes (non-tapscript sigversions only).
    pub max_ops_per_script: usize,
    /// Maximum serialized transaction size, used to bound `TXWEIGHT`.
    pub max_tx_size: u64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            sigversion: SigVersion::Base,
            is_elements: false,
            z3_enabled: false,
            produce_model_values: false,
            use_parallel_solving: false,
            parallel_workers: 4,
            assume_no_160bit_hash_collisions: false,
            nullfail_flag: true,
            nulldummy_flag: true,
            minimaldata_flag: true,
            minimalif_flag: true,
            require_minimal_sig: true,
            tag_values_with_position: false,
            deterministic_commutative_order: true,
            disable_randomization: false,
            seed: 0,
            retry: RetryPolicy::default(),
            max_script_element_size: 520,
            max_stack_size: 1_000,
            max_ops_per_script: 201,
            max_tx_size: 4_000_000,
        }
    }
}

impl EnvConfig {
    /// Maximum byte size a scriptnum view may request for the given opcode
    /// family (§4.A `request_view`): 5 for the `ADD`/`SUB`/`1ADD`/`1SUB`/
    /// `CLTV`/`CSV` family, 4 otherwise.
    pub fn scriptnum_max_size_for(&self, wide: bool) -> usize {
        if wide {
            5
        } else {
            4
        }
    }

    /// Weight bound used by `TXWEIGHT` (SC-5): `max_tx_size * 4`.
    pub fn max_tx_weight(&self) -> u64 {
        self.max_tx_size * 4
    }
}
