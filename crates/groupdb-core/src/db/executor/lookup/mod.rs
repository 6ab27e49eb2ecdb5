//! Module: executor::lookup
//! Responsibility: hierarchical navigation from hkey-bearing input rows.
//! Does not own: storage iteration order (group scans) or pipelining policy
//! beyond the per-cursor lookahead queue.
//! Boundary: lookahead changes latency only; output order equals the
//! synchronous order.

mod ancestor;
mod branch;
mod pipeline;


pub use ancestor::AncestorLookup;
pub use branch::BranchLookup;

use crate::{
    db::{hkey::HKey, row::Row, schema::RowTypeRef},
    error::InternalError,
};

///
/// InputPreservation
///
/// Whether the row that triggered a lookup appears in the output.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum InputPreservation {
    KeepInput,
    #[default]
    DiscardInput,
}

impl InputPreservation {
    #[must_use]
    pub const fn keeps_input(self) -> bool {
        matches!(self, Self::KeepInput)
    }
}

/// Only table rows may be kept in the output of a lookup.
fn check_preservation(
    input_type: &RowTypeRef,
    preservation: InputPreservation,
) -> Result<(), InternalError> {
    if preservation.keeps_input() && !input_type.is_table() {
        return Err(InternalError::plan_invalid(format!(
            "input rows of {input_type} can only be discarded by a lookup"
        )));
    }

    Ok(())
}

fn require_hkey(row: &Row) -> Result<&HKey, InternalError> {
    row.hkey().ok_or_else(|| {
        InternalError::executor_invariant(format!("lookup input {row:?} carries no hkey"))
    })
}
