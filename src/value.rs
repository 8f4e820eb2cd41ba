//! Value abstraction layer (`SymValue`, §3, §4.A)
//!
//! A `SymValue` is a node that can sit on a stack, an altstack, in a
//! transaction field slot, or as an intermediate argument to another
//! opcode's result. It is conceptually immutable identity: `clone()` copies
//! a handle (`Rc`), never the payload, matching the "cheap cloning on
//! branch" requirement of §9. The handful of fields that *do* mutate after
//! creation (requested views, the constrained-value set, data-reference
//! aliases) live behind a `RefCell` so that shared references across
//! branched contexts observe the same tightening.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use crate::solver::{Expr, Sort};

/// One of the four views a `SymValue` may be asked to materialize (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum View {
    ByteSeq,
    /// Script-number integer view, parameterized by the maximum byte size
    /// the requester allows (4, or 5 for the `ADD`/`SUB`/`1ADD`/`1SUB`/
    /// `CLTV`/`CSV` family).
    ScriptNum { max_size: u8 },
    Int64,
    Length,
}

impl View {
    pub fn sort(self) -> Sort {
        match self {
            View::ByteSeq => Sort::Bytes,
            View::ScriptNum { .. } => Sort::Int,
            View::Int64 => Sort::BitVec64,
            View::Length => Sort::Int,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            View::ByteSeq => "bytes",
            View::ScriptNum { .. } => "scriptnum",
            View::Int64 => "int64",
            View::Length => "len",
        }
    }

    /// Whether `self` and `other` are "the same kind of view" for the
    /// purposes of the idempotency check in `request_view` (a repeated
    /// `ScriptNum` request with a different `max_size` is still the same
    /// view kind; the narrower bound wins).
    fn same_kind(self, other: View) -> bool {
        matches!(
            (self, other),
            (View::ByteSeq, View::ByteSeq)
                | (View::ScriptNum { .. }, View::ScriptNum { .. })
                | (View::Int64, View::Int64)
                | (View::Length, View::Length)
        )
    }
}

/// A single concrete value in a `ConstrainedValue::Values` disjunction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Concrete {
    Bytes(Vec<u8>),
    Int(i128),
    Le64(i64),
}

/// The constrained-value set (§3): either an enumerated set of concrete
/// representations, or an enumerated set of permitted byte sizes. These two
/// kinds are mutually exclusive on one `SymValue`; mutation is always
/// intersection, never widening (§4.A).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstrainedValue {
    Values(BTreeSet<Concrete>),
    Sizes(BTreeSet<usize>),
}

/// Errors raised directly by the value-abstraction layer.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("mixing SCRIPT_NUM and INT64 views on the same value is not allowed")]
    MixedNumericViews,
    #[error("tightening the constrained-value set would make it empty")]
    EmptyIntersection,
    #[error("value is not static")]
    NotStatic,
    #[error("constrained-value kind mismatch (values vs. sizes)")]
    KindMismatch,
}

#[derive(Debug)]
struct SymValueInner {
    unique_name: String,
    name: Option<String>,
    args: Vec<SymValue>,
    src_pc: u32,
    views: BTreeSet<View>,
    constrained_value: Option<ConstrainedValue>,
    data_reference: Option<String>,
    data_reference_aliases: Vec<String>,
    src_witness_no: Option<u32>,
}

/// A polymorphic symbolic value (§3). Cheap to clone: `Clone` is an `Rc`
/// bump, and interior mutability is how view/constraint tightening is
/// observed by every other holder of the same handle.
#[derive(Clone)]
pub struct SymValue(Rc<RefCell<SymValueInner>>);

impl fmt::Debug for SymValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymValue").field("unique_name", &self.0.borrow().unique_name).finish()
    }
}

impl PartialEq for SymValue {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for SymValue {}

impl SymValue {
    /// Construct a fresh leaf or intermediate value. `unique_name` must
    /// already be synthesized by the caller (see `branch::NameCtx`) from
    /// `(opcode, pc, line, creating-branch pc/line, branch index,
    /// intra-pc sequence number)`.
    pub fn new(unique_name: String, name: Option<String>, args: Vec<SymValue>, src_pc: u32) -> Self {
        SymValue(Rc::new(RefCell::new(SymValueInner {
            unique_name,
            name,
            args,
            src_pc,
            views: BTreeSet::new(),
            constrained_value: None,
            data_reference: None,
            data_reference_aliases: Vec::new(),
            src_witness_no: None,
        })))
    }

    /// Construct a witness leaf `witN`.
    pub fn new_witness(unique_name: String, n: u32, src_pc: u32) -> Self {
        let v = Self::new(unique_name, Some(format!("wit{n}")), Vec::new(), src_pc);
        v.0.borrow_mut().src_witness_no = Some(n);
        v
    }

    pub fn unique_name(&self) -> String {
        self.0.borrow().unique_name.clone()
    }

    pub fn name(&self) -> Option<String> {
        self.0.borrow().name.clone()
    }

    pub fn args(&self) -> Vec<SymValue> {
        self.0.borrow().args.clone()
    }

    pub fn src_pc(&self) -> u32 {
        self.0.borrow().src_pc
    }

    pub fn src_witness_no(&self) -> Option<u32> {
        self.0.borrow().src_witness_no
    }

    pub fn set_data_reference(&self, name: impl Into<String>) {
        self.0.borrow_mut().data_reference = Some(name.into());
    }

    pub fn data_reference(&self) -> Option<String> {
        self.0.borrow().data_reference.clone()
    }

    pub fn add_data_reference_alias(&self, name: impl Into<String>) {
        self.0.borrow_mut().data_reference_aliases.push(name.into());
    }

    pub fn views(&self) -> BTreeSet<View> {
        self.0.borrow().views.clone()
    }

    /// The solver variable name for a materialized view (`request_view`
    /// must have been called for this view first).
    pub fn var_name(&self, view: View) -> String {
        format!("{}__{}", self.unique_name(), view.suffix())
    }

    /// Idempotent view request (§4.A). Returns the set of *newly installed*
    /// cross-view linking constraints (empty if the view, or an equivalent
    /// one, was already materialized). Callers add the returned
    /// expressions to the current solver frame with an appropriate failure
    /// origin; `value.rs` itself never touches the frame stack.
    pub fn request_view(&self, view: View) -> Result<Vec<Expr>, ValueError> {
        {
            let inner = self.0.borrow();
            if inner.views.iter().any(|v| v.same_kind(view)) {
                return Ok(Vec::new());
            }
            let mixing_numeric = matches!(view, View::ScriptNum { .. })
                && inner.views.iter().any(|v| matches!(v, View::Int64))
                || matches!(view, View::Int64) && inner.views.iter().any(|v| matches!(v, View::ScriptNum { .. }));
            if mixing_numeric {
                return Err(ValueError::MixedNumericViews);
            }
        }

        let is_static = self.is_static();
        let constraints = crate::staticfold::cross_view_constraints(self, view, is_static);

        self.0.borrow_mut().views.insert(view);
        if let View::ScriptNum { max_size } = view {
            let sizes: BTreeSet<usize> = (0..=max_size as usize).collect();
            let _ = self.set_possible_sizes(sizes);
        }
        Ok(constraints)
    }

    pub fn is_static(&self) -> bool {
        matches!(&self.0.borrow().constrained_value, Some(ConstrainedValue::Values(s)) if s.len() == 1)
    }

    /// Intersect the constrained-value set with `{v}` (§4.A `set_static`).
    pub fn set_static(&self, v: Concrete) -> Result<(), ValueError> {
        let mut set = BTreeSet::new();
        set.insert(v);
        self.set_possible_values(set)
    }

    pub fn set_possible_values(&self, vals: BTreeSet<Concrete>) -> Result<(), ValueError> {
        let mut inner = self.0.borrow_mut();
        let next = match &inner.constrained_value {
            None => vals,
            Some(ConstrainedValue::Values(existing)) => existing.intersection(&vals).cloned().collect(),
            Some(ConstrainedValue::Sizes(_)) => return Err(ValueError::KindMismatch),
        };
        if next.is_empty() {
            return Err(ValueError::EmptyIntersection);
        }
        inner.constrained_value = Some(ConstrainedValue::Values(next));
        Ok(())
    }

    pub fn set_possible_sizes(&self, sizes: BTreeSet<usize>) -> Result<(), ValueError> {
        let mut inner = self.0.borrow_mut();
        let next = match &inner.constrained_value {
            None => sizes,
            Some(ConstrainedValue::Sizes(existing)) => existing.intersection(&sizes).cloned().collect(),
            Some(ConstrainedValue::Values(existing)) => {
                let filtered: BTreeSet<Concrete> = existing
                    .iter()
                    .filter(|c| match c {
                        Concrete::Bytes(b) => sizes.contains(&b.len()),
                        Concrete::Int(_) | Concrete::Le64(_) => true,
                    })
                    .cloned()
                    .collect();
                if filtered.is_empty() {
                    return Err(ValueError::EmptyIntersection);
                }
                inner.constrained_value = Some(ConstrainedValue::Values(filtered));
                return Ok(());
            }
        };
        if next.is_empty() {
            return Err(ValueError::EmptyIntersection);
        }
        inner.constrained_value = Some(ConstrainedValue::Sizes(next));
        Ok(())
    }

    pub fn possible_sizes(&self) -> Option<BTreeSet<usize>> {
        match &self.0.borrow().constrained_value {
            Some(ConstrainedValue::Sizes(s)) => Some(s.clone()),
            Some(ConstrainedValue::Values(vals)) => {
                Some(vals.iter().map(|c| if let Concrete::Bytes(b) = c { b.len() } else { 8 }).collect())
            }
            None => None,
        }
    }

    fn static_concrete(&self) -> Result<Concrete, ValueError> {
        match &self.0.borrow().constrained_value {
            Some(ConstrainedValue::Values(s)) if s.len() == 1 => Ok(s.iter().next().unwrap().clone()),
            _ => Err(ValueError::NotStatic),
        }
    }

    /// Script boolean conversion: "not (all-zero byte-sequence, except
    /// negative-zero)". Valid only when static.
    pub fn as_bool(&self) -> Result<bool, ValueError> {
        let bytes = self.as_bytes()?;
        Ok(bytes.iter().enumerate().any(|(i, &b)| {
            if i + 1 == bytes.len() {
                b != 0 && b != 0x80
            } else {
                b != 0
            }
        }))
    }

    pub fn as_bytes(&self) -> Result<Vec<u8>, ValueError> {
        match self.static_concrete()? {
            Concrete::Bytes(b) => Ok(b),
            Concrete::Int(i) => Ok(crate::staticfold::encode_scriptnum(i)),
            Concrete::Le64(i) => Ok(i.to_le_bytes().to_vec()),
        }
    }

    pub fn as_scriptnum_int(&self) -> Result<i128, ValueError> {
        match self.static_concrete()? {
            Concrete::Int(i) => Ok(i),
            Concrete::Bytes(b) => crate::staticfold::decode_scriptnum(&b, 5).map_err(|_| ValueError::NotStatic),
            Concrete::Le64(i) => Ok(i as i128),
        }
    }

    pub fn as_le64(&self) -> Result<i64, ValueError> {
        match self.static_concrete()? {
            Concrete::Le64(i) => Ok(i),
            Concrete::Int(i) => Ok(i as i64),
            Concrete::Bytes(b) if b.len() == 8 => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&b);
                Ok(i64::from_le_bytes(arr))
            }
            _ => Err(ValueError::NotStatic),
        }
    }

    /// Deterministic string form used to compare two symbolic values across
    /// branches when detecting aliasing (§4.A).
    pub fn canonical_repr(&self, tag_with_position: bool) -> String {
        let base = if self.is_static() {
            match self.static_concrete().unwrap() {
                Concrete::Bytes(b) => format!("0x{}", hex::encode(b)),
                Concrete::Int(i) => i.to_string(),
                Concrete::Le64(i) => format!("le64({i})"),
            }
        } else if let Some(name) = self.name() {
            let args = self.args();
            if args.is_empty() {
                name
            } else {
                let arg_repr: Vec<String> = args.iter().map(|a| a.canonical_repr(tag_with_position)).collect();
                format!("{}({})", name, arg_repr.join(","))
            }
        } else {
            self.unique_name()
        };
        if tag_with_position {
            format!("{base}@{}", self.src_pc())
        } else {
            base
        }
    }

    /// Human-oriented rendering: honors `data_reference` (`&name`), the
    /// special `CAT` display as `a.b`, and the `_%_` placeholder (which,
    /// when the first argument is a static integer, becomes that integer).
    pub fn readable_repr(&self) -> String {
        if let Some(dref) = self.data_reference() {
            return format!("&{dref}");
        }
        if self.is_static() {
            return self.canonical_repr(false);
        }
        let name = self.name().unwrap_or_else(|| self.unique_name());
        let args = self.args();
        if name == "CAT" && args.len() == 2 {
            return format!("{}.{}", args[0].readable_repr(), args[1].readable_repr());
        }
        if name == "_%_" {
            if let Some(first) = args.first() {
                if first.is_static() {
                    if let Ok(i) = first.as_scriptnum_int() {
                        return i.to_string();
                    }
                }
            }
        }
        if args.is_empty() {
            name
        } else {
            let arg_repr: Vec<String> = args.iter().map(|a| a.readable_repr()).collect();
            format!("{}({})", name, arg_repr.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_static_then_widen_fails() {
        let v = SymValue::new("t0".into(), None, vec![], 0);
        v.set_static(Concrete::Int(5)).unwrap();
        let err = v.set_static(Concrete::Int(6)).unwrap_err();
        assert_eq!(err, ValueError::EmptyIntersection);
    }

    #[test]
    fn mixing_scriptnum_and_int64_is_an_error() {
        let v = SymValue::new("t0".into(), None, vec![], 0);
        v.request_view(View::ScriptNum { max_size: 4 }).unwrap();
        let err = v.request_view(View::Int64).unwrap_err();
        assert_eq!(err, ValueError::MixedNumericViews);
    }

    #[test]
    fn repeated_request_view_is_idempotent() {
        let v = SymValue::new("t0".into(), None, vec![], 0);
        let first = v.request_view(View::ByteSeq).unwrap();
        let second = v.request_view(View::ByteSeq).unwrap();
        assert!(!first.is_empty() || second.is_empty());
        assert!(second.is_empty());
    }

    #[test]
    fn as_bool_matches_script_rule() {
        let v = SymValue::new("t0".into(), None, vec![], 0);
        v.set_static(Concrete::Bytes(vec![0x00, 0x80])).unwrap();
        assert!(!v.as_bool().unwrap());
        let v2 = SymValue::new("t1".into(), None, vec![], 0);
        v2.set_static(Concrete::Bytes(vec![0x01])).unwrap();
        assert!(v2.as_bool().unwrap());
    }

    #[test]
    fn canonical_repr_for_op_with_args() {
        let a = SymValue::new("a".into(), Some("wit0".into()), vec![], 0);
        let b = SymValue::new("b".into(), Some("wit1".into()), vec![], 0);
        let sum = SymValue::new("s".into(), Some("ADD".into()), vec![a, b], 1);
        assert_eq!(sum.canonical_repr(false), "ADD(wit0,wit1)");
    }
}
