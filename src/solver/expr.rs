//! Backend-agnostic symbolic expression IR.
//!
//! Every opcode handler builds constraints as `Expr` trees; the solver frame
//! stack (`solver::SolverFrameStack`) is the only place that knows how to
//! hand an `Expr` to a concrete backend (`solver::Backend`). This keeps
//! `value.rs` and `opcodes/*` free of any dependency on the `z3` crate
//! itself, mirroring the teacher's PCS/transcript split: algebra is
//! expressed independently of the thing that eventually serializes or
//! discharges it.

use std::fmt;

/// The sort (type) of a symbolic expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sort {
    Bool,
    /// Unbounded mathematical integer (scriptnum / bitmask domain).
    Int,
    /// Fixed-width 64-bit integer (LE64 / Elements 64-bit arithmetic).
    BitVec64,
    /// Variable-length byte sequence.
    Bytes,
}

/// A backend-agnostic symbolic expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    BoolConst(bool),
    IntConst(i128),
    Bv64Const(i64),
    BytesConst(Vec<u8>),
    /// A named free variable of the given sort (solver identity = name).
    Var(String, Sort),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Implies(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Ite(Box<Expr>, Box<Expr>, Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Le(Box<Expr>, Box<Expr>),
    /// Byte-sequence length, as an `Int`.
    Length(Box<Expr>),
    /// Byte-sequence concatenation.
    Concat(Vec<Expr>),
    /// `base[offset..offset+len]`, all three in byte-space.
    Extract { base: Box<Expr>, offset: Box<Expr>, len: Box<Expr> },
    /// Application of a declared uninterpreted function.
    UfApply { name: String, args: Vec<Expr>, ret: Sort },
    /// Universally-quantified body over freshly-bound variables (used for
    /// the CHECKSIG/EC "known args/result" uniqueness quantifiers and for
    /// hash no-collision assertions).
    ForAll { vars: Vec<(String, Sort)>, body: Box<Expr> },
}

impl Expr {
    pub fn and2(a: Expr, b: Expr) -> Expr {
        Expr::And(vec![a, b])
    }

    pub fn var(name: impl Into<String>, sort: Sort) -> Expr {
        Expr::Var(name.into(), sort)
    }

    pub fn int(v: i128) -> Expr {
        Expr::IntConst(v)
    }

    pub fn bytes(v: Vec<u8>) -> Expr {
        Expr::BytesConst(v)
    }

    pub fn is_true_const(&self) -> Option<bool> {
        match self {
            Expr::BoolConst(b) => Some(*b),
            _ => None,
        }
    }

    /// Free variable names referenced anywhere in this expression (used to
    /// build model-value request maps and to scope `ForAll` fresh names).
    pub fn collect_vars(&self, out: &mut Vec<(String, Sort)>) {
        match self {
            Expr::Var(n, s) => out.push((n.clone(), *s)),
            Expr::Not(a) | Expr::Neg(a) | Expr::Length(a) => a.collect_vars(out),
            Expr::And(xs) | Expr::Or(xs) | Expr::Concat(xs) => {
                for x in xs {
                    x.collect_vars(out);
                }
            }
            Expr::Implies(a, b)
            | Expr::Eq(a, b)
            | Expr::Add(a, b)
            | Expr::Sub(a, b)
            | Expr::Mul(a, b)
            | Expr::Div(a, b)
            | Expr::Lt(a, b)
            | Expr::Le(a, b) => {
                a.collect_vars(out);
                b.collect_vars(out);
            }
            Expr::Ite(c, t, e) => {
                c.collect_vars(out);
                t.collect_vars(out);
                e.collect_vars(out);
            }
            Expr::Extract { base, offset, len } => {
                base.collect_vars(out);
                offset.collect_vars(out);
                len.collect_vars(out);
            }
            Expr::UfApply { args, .. } => {
                for a in args {
                    a.collect_vars(out);
                }
            }
            Expr::ForAll { body, .. } => body.collect_vars(out),
            Expr::BoolConst(_) | Expr::IntConst(_) | Expr::Bv64Const(_) | Expr::BytesConst(_) => {}
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Debug-ish S-expression rendering; used only for diagnostics/logging.
        match self {
            Expr::BoolConst(b) => write!(f, "{b}"),
            Expr::IntConst(i) => write!(f, "{i}"),
            Expr::Bv64Const(i) => write!(f, "{i}i64"),
            Expr::BytesConst(b) => write!(f, "0x{}", hex::encode(b)),
            Expr::Var(n, _) => write!(f, "{n}"),
            Expr::Not(a) => write!(f, "(not {a})"),
            Expr::And(xs) => write!(f, "(and {})", xs.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(" ")),
            Expr::Or(xs) => write!(f, "(or {})", xs.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(" ")),
            Expr::Implies(a, b) => write!(f, "(=> {a} {b})"),
            Expr::Eq(a, b) => write!(f, "(= {a} {b})"),
            Expr::Ite(c, t, e) => write!(f, "(ite {c} {t} {e})"),
            Expr::Add(a, b) => write!(f, "(+ {a} {b})"),
            Expr::Sub(a, b) => write!(f, "(- {a} {b})"),
            Expr::Mul(a, b) => write!(f, "(* {a} {b})"),
            Expr::Div(a, b) => write!(f, "(div {a} {b})"),
            Expr::Neg(a) => write!(f, "(- {a})"),
            Expr::Lt(a, b) => write!(f, "(< {a} {b})"),
            Expr::Le(a, b) => write!(f, "(<= {a} {b})"),
            Expr::Length(a) => write!(f, "(len {a})"),
            Expr::Concat(xs) => write!(f, "(cat {})", xs.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(" ")),
            Expr::Extract { base, offset, len } => write!(f, "(extract {base} {offset} {len})"),
            Expr::UfApply { name, args, .. } => {
                write!(f, "({name} {})", args.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(" "))
            }
            Expr::ForAll { vars, body } => {
                write!(f, "(forall ({}) {body})", vars.iter().map(|(n, _)| n.clone()).collect::<Vec<_>>().join(" "))
            }
        }
    }
}
