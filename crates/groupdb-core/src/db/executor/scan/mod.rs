//! Module: executor::scan
//! Responsibility: leaf operators reading rows from storage or literals.
//! Does not own: hierarchical navigation (see `executor::lookup`).

mod group;
mod index;
mod values;


pub use group::{GroupScan, GroupScanRange};
pub use index::IndexScan;
pub use values::ValuesScan;

pub(crate) use group::GroupCursor;
