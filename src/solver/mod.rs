//! Solver frame stack & backend abstraction (§4.C, §5, §9)
//!
//! A stack of assertion frames mirrors the branch tree: `push` starts a new
//! frame (installed when a branch forks), `pop` discards it on backtrack.
//! The *current* frame is what opcode handlers append to via `add`.
//!
//! Two backend strategies are supported, selected by `SolverMode`
//! (`config.rs`):
//! - **Incremental**: the backend's native `push`/`pop` mirror ours 1:1.
//! - **Reset**: on `check`, the backend is reset, the *entire* stack's
//!   assertions are shuffled (unless randomization is disabled) and
//!   re-asserted, then checked once.
//!
//! The actual SMT engine lives behind the `Backend` trait; the `z3-backend`
//! feature wires `Z3Backend` (see `z3_backend.rs`), built on the same
//! `z3::Context`/`z3::Solver` pairing used by the closest architectural
//! analogue in the retrieval pack (the symbolic-EVM engine at
//! `examples/other_examples/19d7be80_...sevm-src-lib.rs.rs`). Without that
//! feature, `StubBackend` answers only what is syntactically decidable
//! (an all-`BoolConst(true)` frame is `Sat`, any `BoolConst(false)` is
//! `Unsat`) and reports `Unknown` otherwise — the "solver off" path
//! exercised by SC-1..SC-3, where `finalize` treats an undecided path as
//! feasible rather than failed unless `RetryPolicy::exit_on_unknown` is set.

mod expr;
#[cfg(feature = "z3-backend")]
mod z3_backend;

pub use expr::{Expr, Sort};

use std::time::Duration;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::config::{EnvConfig, RetryPolicy, SolverMode};
use crate::failure::FailureCode;

/// One assertion recorded in a frame.
#[derive(Debug, Clone)]
pub struct TrackedAssertion {
    pub expr: Expr,
    /// `check_<code>~<N>@<pos>`-shaped tracking name, present when the
    /// backend tracks assertions individually for unsat-core attribution.
    pub tracking_name: Option<String>,
    pub failure_origin: Option<(FailureCode, u32)>,
}

/// One layer of the frame stack.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub assertions: Vec<TrackedAssertion>,
}

/// Requested model values, keyed by solver variable name.
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    pub names: Vec<(String, Sort)>,
}

/// A concrete model value.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelValue {
    Bool(bool),
    Int(i128),
    Bv64(i64),
    Bytes(Vec<u8>),
}

/// Outcome of a `check`.
#[derive(Debug, Clone)]
pub enum CheckOutcome {
    Sat(Vec<(String, ModelValue)>),
    Unsat(Vec<(FailureCode, u32)>),
    Unknown,
}

/// A backend capable of discharging a flat list of assertions.
///
/// Implementors own no cross-call state beyond what `check_once` needs:
/// the reset-mode driver creates a fresh logical session per call.
pub trait Backend: Send {
    fn check_once(
        &mut self,
        assertions: &[TrackedAssertion],
        timeout: Duration,
        model_request: Option<&ModelRequest>,
    ) -> CheckOutcome;
}

/// Backend used when the `z3-backend` feature is not compiled in, or when
/// `EnvConfig::z3_enabled` is `false`. Never contradicts a purely syntactic
/// request: reports `Unknown` for anything it cannot trivially resolve, and
/// `Sat` with no bindings for an empty assertion list.
#[derive(Debug, Default)]
pub struct StubBackend;

impl Backend for StubBackend {
    fn check_once(
        &mut self,
        assertions: &[TrackedAssertion],
        _timeout: Duration,
        _model_request: Option<&ModelRequest>,
    ) -> CheckOutcome {
        if assertions.iter().any(|a| matches!(a.expr, Expr::BoolConst(false))) {
            let codes = assertions
                .iter()
                .filter(|a| matches!(a.expr, Expr::BoolConst(false)))
                .filter_map(|a| a.failure_origin)
                .collect();
            return CheckOutcome::Unsat(codes);
        }
        if assertions.iter().all(|a| matches!(a.expr, Expr::BoolConst(true))) {
            return CheckOutcome::Sat(Vec::new());
        }
        CheckOutcome::Unknown
    }
}

fn make_backend(cfg: &EnvConfig) -> Box<dyn Backend> {
    #[cfg(feature = "z3-backend")]
    {
        if cfg.z3_enabled {
            return Box::new(z3_backend::Z3Backend::new());
        }
    }
    let _ = cfg;
    Box::new(StubBackend)
}

/// The solver frame stack for one execution path.
pub struct SolverFrameStack {
    frames: Vec<Frame>,
    mode: SolverMode,
    retry: RetryPolicy,
    seed: u64,
    disable_randomization: bool,
    backend: Box<dyn Backend>,
    parallel_workers: usize,
    use_parallel: bool,
}

impl SolverFrameStack {
    pub fn new(cfg: &EnvConfig) -> Self {
        Self {
            frames: vec![Frame::default()],
            mode: if cfg.z3_enabled { SolverMode::Incremental } else { SolverMode::Reset },
            retry: cfg.retry,
            seed: cfg.seed,
            disable_randomization: cfg.disable_randomization,
            backend: make_backend(cfg),
            parallel_workers: cfg.parallel_workers.max(1),
            use_parallel: cfg.use_parallel_solving,
        }
    }

    pub fn push(&mut self) {
        self.frames.push(Frame::default());
    }

    pub fn pop(&mut self) {
        self.frames.pop();
        if self.frames.is_empty() {
            self.frames.push(Frame::default());
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Append an assertion to the current (top) frame, de-duplicated by
    /// structural equality across the *entire* stack.
    pub fn add(&mut self, expr: Expr, tracking_name: Option<String>, origin: Option<(FailureCode, u32)>) {
        if self.frames.iter().any(|f| f.assertions.iter().any(|a| a.expr == expr)) {
            return;
        }
        self.frames
            .last_mut()
            .expect("frame stack is never empty")
            .assertions
            .push(TrackedAssertion { expr, tracking_name, failure_origin: origin });
    }

    fn flat_assertions(&self) -> Vec<TrackedAssertion> {
        let mut all: Vec<TrackedAssertion> = self.frames.iter().flat_map(|f| f.assertions.iter().cloned()).collect();
        if !self.disable_randomization && matches!(self.mode, SolverMode::Reset) {
            let mut rng = StdRng::seed_from_u64(self.seed);
            all.shuffle(&mut rng);
        }
        all
    }

    /// Run a feasibility check, retrying `unknown` verdicts with a
    /// geometrically-growing timeout (§5). When `use_parallel_solving` is
    /// set, each attempt fans out across `parallel_workers` differently
    /// seeded backend instances and takes the first decisive verdict.
    pub fn check(&mut self, cfg: &EnvConfig, model_request: Option<&ModelRequest>) -> CheckOutcome {
        let assertions = self.flat_assertions();
        let mut timeout = self.retry.timeout;

        for attempt in 0..self.retry.max_tries {
            let outcome = if self.use_parallel {
                self.check_parallel(cfg, &assertions, timeout, model_request)
            } else {
                self.backend.check_once(&assertions, timeout, model_request)
            };
            match outcome {
                CheckOutcome::Unknown => {
                    let grown = timeout.mul_f64(self.retry.multiplier.max(1.0));
                    timeout = grown.min(self.retry.cap);
                    tracing::debug!(attempt, ?timeout, "solver returned unknown, retrying");
                    continue;
                }
                decisive => return decisive,
            }
        }
        CheckOutcome::Unknown
    }

    fn check_parallel(
        &self,
        cfg: &EnvConfig,
        assertions: &[TrackedAssertion],
        timeout: Duration,
        model_request: Option<&ModelRequest>,
    ) -> CheckOutcome {
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..self.parallel_workers)
                .map(|i| {
                    let seed = self.seed.wrapping_add(i as u64).wrapping_mul(0x9E3779B97F4A7C15);
                    let mut rng = StdRng::seed_from_u64(seed);
                    let mut shuffled = assertions.to_vec();
                    if !self.disable_randomization {
                        shuffled.shuffle(&mut rng);
                    }
                    let mut backend = make_backend(cfg);
                    scope.spawn(move || backend.check_once(&shuffled, timeout, model_request))
                })
                .collect();

            let mut saw_unknown = false;
            for h in handles {
                match h.join().unwrap_or(CheckOutcome::Unknown) {
                    CheckOutcome::Sat(m) => return CheckOutcome::Sat(m),
                    CheckOutcome::Unsat(c) => return CheckOutcome::Unsat(c),
                    CheckOutcome::Unknown => saw_unknown = true,
                }
            }
            let _ = saw_unknown;
            CheckOutcome::Unknown
        })
    }

    /// Save-check-restore probe used for `is_cond_possible` (§4.C) and for
    /// the always-true-in-path VERIFY-family probe (§4.F step 9).
    pub fn is_cond_possible(&mut self, cfg: &EnvConfig, expr: Expr) -> bool {
        self.push();
        self.add(expr, None, None);
        let result = self.check(cfg, None);
        self.pop();
        !matches!(result, CheckOutcome::Unsat(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EnvConfig {
        EnvConfig { z3_enabled: false, ..Default::default() }
    }

    #[test]
    fn push_pop_restores_frame_count() {
        let mut s = SolverFrameStack::new(&cfg());
        assert_eq!(s.depth(), 1);
        s.push();
        s.push();
        assert_eq!(s.depth(), 3);
        s.pop();
        assert_eq!(s.depth(), 2);
    }

    #[test]
    fn stub_backend_detects_literal_contradiction() {
        let mut s = SolverFrameStack::new(&cfg());
        s.add(Expr::BoolConst(false), None, Some((FailureCode::Verify, 3)));
        let out = s.check(&cfg(), None);
        assert!(matches!(out, CheckOutcome::Unsat(codes) if codes == vec![(FailureCode::Verify, 3)]));
    }

    #[test]
    fn stub_backend_is_sat_on_all_true() {
        let mut s = SolverFrameStack::new(&cfg());
        s.add(Expr::BoolConst(true), None, None);
        let out = s.check(&cfg(), None);
        assert!(matches!(out, CheckOutcome::Sat(_)));
    }

    #[test]
    fn dedup_across_frames() {
        let mut s = SolverFrameStack::new(&cfg());
        s.add(Expr::BoolConst(true), None, None);
        s.push();
        s.add(Expr::BoolConst(true), None, None);
        assert_eq!(s.frames[1].assertions.len(), 0);
    }
}
