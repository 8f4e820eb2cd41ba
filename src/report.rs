//! Report shapes consumed by the external report formatter (§1, §4.I)
//!
//! Formatting (text, JSON-to-stdout, whatever a given front-end wants) is
//! out of scope here; this module only defines the `serde`-serializable
//! data a formatter would walk.

use serde::Serialize;

use crate::branch::{BranchId, BranchTree};
use crate::failure::ScriptFailure;
use crate::solver::ModelValue;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum ModelValueReport {
    Bool { value: bool },
    Int { value: i128 },
    Bv64 { value: i64 },
    Bytes { hex: String },
}

impl From<&ModelValue> for ModelValueReport {
    fn from(v: &ModelValue) -> Self {
        match v {
            ModelValue::Bool(b) => ModelValueReport::Bool { value: *b },
            ModelValue::Int(i) => ModelValueReport::Int { value: *i },
            ModelValue::Bv64(i) => ModelValueReport::Bv64 { value: *i },
            ModelValue::Bytes(b) => ModelValueReport::Bytes { hex: hex::encode(b) },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PathReport {
    pub branch: String,
    pub valid: bool,
    pub failure: Option<String>,
    pub model_values: Vec<(String, ModelValueReport)>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct Report {
    pub paths: Vec<PathReport>,
    /// Enforcement descriptions that held on every surviving path.
    pub always_true: Vec<String>,
    /// Declared values never consumed on any surviving path.
    pub unused_values: Vec<String>,
}

fn failure_text(f: &ScriptFailure) -> String {
    f.to_string()
}

/// Assemble a `Report` from a finished branch tree plus whatever aggregate
/// passes the caller already ran (`analysis::process_*`). Per-path model
/// values are supplied by the caller (they require solver access this
/// module deliberately does not have).
pub fn build_report(
    tree: &BranchTree,
    model_values_by_branch: impl Fn(BranchId) -> Vec<(String, ModelValueReport)>,
    always_true: Vec<String>,
    unused_values: Vec<String>,
) -> Report {
    let mut paths = Vec::new();
    for id in tree.walk_branches() {
        if !tree.is_leaf(id) {
            continue;
        }
        let outcome = tree.outcome(id);
        let (valid, failure) = match outcome {
            Some(Ok(())) => (true, None),
            Some(Err(f)) => (false, Some(failure_text(f))),
            None => (false, Some("path did not finalize".to_string())),
        };
        paths.push(PathReport {
            branch: id.to_string(),
            valid,
            failure,
            model_values: if valid { model_values_by_branch(id) } else { Vec::new() },
        });
    }
    Report { paths, always_true, unused_values }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecContext;

    #[test]
    fn build_report_marks_failed_leaf_invalid() {
        let mut tree = BranchTree::new(ExecContext::new());
        let root = tree.root();
        tree.mark_done(root, Err(ScriptFailure::opaque(0, "bad")));
        let report = build_report(&tree, |_| Vec::new(), Vec::new(), Vec::new());
        assert_eq!(report.paths.len(), 1);
        assert!(!report.paths[0].valid);
        assert!(report.paths[0].failure.is_some());
    }
}
