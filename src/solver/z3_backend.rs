//! Z3-backed `Backend` implementation (feature = "z3-backend").
//!
//! Lowers `Expr` into `z3::ast` nodes inside a fresh `z3::Context` per call
//! (reset-mode discipline: "assert-all, check-once", matching
//! `config::SolverMode::Reset`). Tracked assertions are asserted with
//! `solver.assert_and_track` so an `unsat` result yields a usable core.
//!
//! This mirrors the `z3::Context` / `z3::Solver` pairing used by the
//! symbolic-EVM engine referenced in `solver/mod.rs`'s module docs, adapted
//! from a long-lived incremental solver to a per-call one to match this
//! engine's reset-mode default.

use std::collections::HashMap;
use std::time::Duration;

use z3::ast::{Ast, Bool, Dynamic, Int, BV};
use z3::{Config, Context, FuncDecl, SatResult, Solver, Sort as Z3Sort};

use crate::failure::FailureCode;

use super::{Backend, CheckOutcome, ModelRequest, ModelValue, Sort, TrackedAssertion};
use super::Expr;

#[derive(Debug, Default)]
pub struct Z3Backend;

impl Z3Backend {
    pub fn new() -> Self {
        Z3Backend
    }
}

struct Lowering<'ctx> {
    ctx: &'ctx Context,
    vars: HashMap<String, Dynamic<'ctx>>,
    ufs: HashMap<String, FuncDecl<'ctx>>,
}

impl<'ctx> Lowering<'ctx> {
    fn new(ctx: &'ctx Context) -> Self {
        Self { ctx, vars: HashMap::new(), ufs: HashMap::new() }
    }

    fn sort_of(&self, s: Sort) -> Z3Sort<'ctx> {
        match s {
            Sort::Bool => Z3Sort::bool(self.ctx),
            Sort::Int => Z3Sort::int(self.ctx),
            Sort::BitVec64 => Z3Sort::bitvector(self.ctx, 64),
            // Byte sequences are modeled as (Array Int (BitVec 8)) paired
            // with an explicit Int length variable `<name>__len`, installed
            // by the staticfold/value constraint generators.
            Sort::Bytes => Z3Sort::array(self.ctx, &Z3Sort::int(self.ctx), &Z3Sort::bitvector(self.ctx, 8)),
        }
    }

    fn var(&mut self, name: &str, sort: Sort) -> Dynamic<'ctx> {
        if let Some(v) = self.vars.get(name) {
            return v.clone();
        }
        let v = match sort {
            Sort::Bool => Dynamic::from_ast(&Bool::new_const(self.ctx, name.to_string())),
            Sort::Int => Dynamic::from_ast(&Int::new_const(self.ctx, name.to_string())),
            Sort::BitVec64 => Dynamic::from_ast(&BV::new_const(self.ctx, name.to_string(), 64)),
            Sort::Bytes => {
                let arr_sort = self.sort_of(Sort::Bytes);
                Dynamic::from_ast(&z3::ast::Array::fresh_const(self.ctx, name, arr_sort.domain(), arr_sort.range()))
            }
        };
        self.vars.insert(name.to_string(), v.clone());
        v
    }

    fn uf(&mut self, name: &str, domain: &[Sort], ret: Sort) -> FuncDecl<'ctx> {
        if let Some(f) = self.ufs.get(name) {
            return f.clone();
        }
        let domain_sorts: Vec<Z3Sort> = domain.iter().map(|s| self.sort_of(*s)).collect();
        let domain_refs: Vec<&Z3Sort> = domain_sorts.iter().collect();
        let f = FuncDecl::new(self.ctx, name.to_string(), &domain_refs, &self.sort_of(ret));
        self.ufs.insert(name.to_string(), f.clone());
        f
    }

    fn lower_bool(&mut self, e: &Expr) -> Bool<'ctx> {
        match e {
            Expr::BoolConst(b) => Bool::from_bool(self.ctx, *b),
            Expr::Var(n, Sort::Bool) => self.var(n, Sort::Bool).as_bool().expect("bool var"),
            Expr::Not(a) => self.lower_bool(a).not(),
            Expr::And(xs) => {
                let lowered: Vec<Bool> = xs.iter().map(|x| self.lower_bool(x)).collect();
                let refs: Vec<&Bool> = lowered.iter().collect();
                Bool::and(self.ctx, &refs)
            }
            Expr::Or(xs) => {
                let lowered: Vec<Bool> = xs.iter().map(|x| self.lower_bool(x)).collect();
                let refs: Vec<&Bool> = lowered.iter().collect();
                Bool::or(self.ctx, &refs)
            }
            Expr::Implies(a, b) => self.lower_bool(a).implies(&self.lower_bool(b)),
            Expr::Eq(a, b) => self.lower_dynamic(a)._eq(&self.lower_dynamic(b)),
            Expr::Ite(c, t, e2) => self.lower_bool(c).ite(&self.lower_bool(t), &self.lower_bool(e2)),
            Expr::Lt(a, b) => self.lower_int(a).lt(&self.lower_int(b)),
            Expr::Le(a, b) => self.lower_int(a).le(&self.lower_int(b)),
            Expr::UfApply { name, args, ret: Sort::Bool } => {
                let domain: Vec<Sort> = args.iter().map(|_| Sort::Int).collect();
                let f = self.uf(name, &domain, Sort::Bool);
                let lowered: Vec<Dynamic> = args.iter().map(|a| self.lower_dynamic(a)).collect();
                let refs: Vec<&dyn Ast> = lowered.iter().map(|d| d as &dyn Ast).collect();
                f.apply(&refs).as_bool().expect("uf bool result")
            }
            Expr::ForAll { vars, body } => {
                let bound: Vec<Dynamic> = vars.iter().map(|(n, s)| self.var(n, *s)).collect();
                let bound_refs: Vec<&dyn Ast> = bound.iter().map(|d| d as &dyn Ast).collect();
                let inner = self.lower_bool(body);
                z3::ast::forall_const(self.ctx, &bound_refs, &[], &inner)
            }
            other => panic!("expr {other:?} is not boolean-sorted"),
        }
    }

    fn lower_int(&mut self, e: &Expr) -> Int<'ctx> {
        match e {
            Expr::IntConst(v) => Int::from_i64(self.ctx, *v as i64),
            Expr::Var(n, Sort::Int) => self.var(n, Sort::Int).as_int().expect("int var"),
            Expr::Add(a, b) => Int::add(self.ctx, &[&self.lower_int(a), &self.lower_int(b)]),
            Expr::Sub(a, b) => Int::sub(self.ctx, &[&self.lower_int(a), &self.lower_int(b)]),
            Expr::Mul(a, b) => Int::mul(self.ctx, &[&self.lower_int(a), &self.lower_int(b)]),
            Expr::Div(a, b) => self.lower_int(a).div(&self.lower_int(b)),
            Expr::Neg(a) => self.lower_int(a).unary_minus(),
            Expr::Length(a) => self.lower_int(&Expr::Length(a.clone())),
            Expr::Ite(c, t, e2) => self.lower_bool(c).ite(&self.lower_int(t), &self.lower_int(e2)),
            other => panic!("expr {other:?} is not int-sorted"),
        }
    }

    fn lower_dynamic(&mut self, e: &Expr) -> Dynamic<'ctx> {
        match e {
            Expr::BoolConst(_) | Expr::Not(_) | Expr::And(_) | Expr::Or(_) | Expr::Implies(_, _) | Expr::Lt(_, _) | Expr::Le(_, _) => {
                Dynamic::from_ast(&self.lower_bool(e))
            }
            Expr::IntConst(_) | Expr::Add(_, _) | Expr::Sub(_, _) | Expr::Mul(_, _) | Expr::Div(_, _) | Expr::Neg(_) | Expr::Length(_) => {
                Dynamic::from_ast(&self.lower_int(e))
            }
            Expr::Var(n, s) => self.var(n, *s),
            Expr::Eq(a, b) => Dynamic::from_ast(&self.lower_bool(&Expr::Eq(a.clone(), b.clone()))),
            Expr::Ite(c, t, e2) => {
                let cb = self.lower_bool(c);
                let td = self.lower_dynamic(t);
                let ed = self.lower_dynamic(e2);
                cb.ite(&td, &ed)
            }
            _ => Dynamic::from_ast(&self.lower_int(e)),
        }
    }
}

impl Backend for Z3Backend {
    fn check_once(
        &mut self,
        assertions: &[TrackedAssertion],
        timeout: Duration,
        model_request: Option<&ModelRequest>,
    ) -> CheckOutcome {
        let mut cfg = Config::new();
        cfg.set_timeout_msec(timeout.as_millis() as u64);
        let ctx = Context::new(&cfg);
        let solver = Solver::new(&ctx);
        let mut low = Lowering::new(&ctx);

        for a in assertions {
            let lowered = low.lower_bool(&a.expr);
            if let Some(tn) = &a.tracking_name {
                let tracker = Bool::new_const(&ctx, tn.clone());
                solver.assert_and_track(&lowered, &tracker);
            } else {
                solver.assert(&lowered);
            }
        }

        match solver.check() {
            SatResult::Unsat => {
                let core = solver.get_unsat_core();
                let names: Vec<String> = core.iter().filter_map(|b| b.to_string().split('|').last().map(|s| s.trim_matches('|').to_string())).collect();
                let mut codes: Vec<(FailureCode, u32)> = Vec::new();
                for a in assertions {
                    if let (Some(tn), Some(origin)) = (&a.tracking_name, a.failure_origin) {
                        if names.iter().any(|n| n == tn) {
                            codes.push(origin);
                        }
                    }
                }
                CheckOutcome::Unsat(codes)
            }
            SatResult::Unknown => CheckOutcome::Unknown,
            SatResult::Sat => {
                let model = solver.get_model().expect("sat implies model");
                let mut out = Vec::new();
                if let Some(req) = model_request {
                    for (name, sort) in &req.names {
                        let v = low.var(name, *sort);
                        if let Some(val) = model.eval(&v, true) {
                            if let Some(mv) = dynamic_to_model_value(&val, *sort) {
                                out.push((name.clone(), mv));
                            }
                        }
                    }
                }
                CheckOutcome::Sat(out)
            }
        }
    }
}

fn dynamic_to_model_value(v: &Dynamic, sort: Sort) -> Option<ModelValue> {
    match sort {
        Sort::Bool => v.as_bool().and_then(|b| b.as_bool()).map(ModelValue::Bool),
        Sort::Int => v.as_int().and_then(|i| i.as_i64()).map(|i| ModelValue::Int(i as i128)),
        Sort::BitVec64 => v.as_bv().and_then(|b| b.as_i64()).map(ModelValue::Bv64),
        Sort::Bytes => None,
    }
}
