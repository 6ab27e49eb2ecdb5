//! Module: executor::operator
//! Responsibility: immutable plan nodes and their cursor factories.
//! Does not own: runtime state; every call to `cursor` starts a fresh execution.

use crate::{
    db::{context::QueryContext, executor::cursor::CursorBox, schema::RowTypeRef},
    error::InternalError,
};
use std::{fmt, fmt::Write as _, sync::Arc};

///
/// Operator
///
/// Stateless plan node. Built once by a planner, shared freely, and
/// instantiated into a cursor per execution.
///

pub trait Operator: Send + Sync + fmt::Debug {
    fn cursor(&self, context: &Arc<QueryContext>) -> Result<CursorBox, InternalError>;

    /// Row type this operator introduces, if any.
    fn row_type(&self) -> Option<RowTypeRef> {
        None
    }

    fn inputs(&self) -> Vec<&OperatorRef> {
        Vec::new()
    }

    /// One-line description used by plan explanation.
    fn describe(&self) -> String;
}

pub type OperatorRef = Arc<dyn Operator>;

/// Indented, input-first rendering of a plan tree.
#[must_use]
pub fn explain(operator: &dyn Operator) -> String {
    let mut out = String::new();
    explain_into(operator, 0, &mut out);
    out
}

fn explain_into(operator: &dyn Operator, depth: usize, out: &mut String) {
    let _ = writeln!(out, "{:indent$}{}", "", operator.describe(), indent = depth * 2);
    for input in operator.inputs() {
        explain_into(input.as_ref(), depth + 1, out);
    }
}
