//! Module: executor::cursor
//! Responsibility: the pull protocol every operator's runtime implements.
//! Does not own: row production; concrete cursors live beside their operators.
//! Boundary: NEVER_OPENED -> ACTIVE <-> IDLE -> DESTROYED, enforced by `CursorLifecycle`.

mod lifecycle;

#[cfg(test)]
mod tests;

pub use lifecycle::CursorState;
pub(crate) use lifecycle::CursorLifecycle;

use crate::{
    db::row::{ColumnSelector, Row},
    error::InternalError,
};
use tracing::warn;

///
/// Cursor
///
/// Stateful runtime of one operator for one execution. Owned by exactly
/// one consumer; composite cursors own their children outright and drive
/// them synchronously from their own `next()`.
///

pub trait Cursor: Send {
    /// Establish the initial position. Valid from `NeverOpened` or `Idle`.
    fn open(&mut self) -> Result<(), InternalError>;

    /// Next row in order, or `None` at end of stream. Repeats `None`
    /// once idle.
    fn next(&mut self) -> Result<Option<Row>, InternalError>;

    /// Reposition so the next row is the first at or after the partial
    /// key formed by the selected leading columns of `row`.
    fn jump(&mut self, row: &Row, selector: ColumnSelector) -> Result<(), InternalError> {
        let _ = (row, selector);
        Err(InternalError::executor_unsupported(
            "cursor does not support jump",
        ))
    }

    fn supports_jump(&self) -> bool {
        false
    }

    /// Release position and buffers; idempotent while open.
    fn close(&mut self) -> Result<(), InternalError>;

    /// Terminal; every later call except `state` fails.
    fn destroy(&mut self);

    fn state(&self) -> CursorState;

    fn is_active(&self) -> bool {
        self.state() == CursorState::Active
    }

    fn is_idle(&self) -> bool {
        self.state() == CursorState::Idle
    }

    fn is_destroyed(&self) -> bool {
        self.state() == CursorState::Destroyed
    }
}

pub type CursorBox = Box<dyn Cursor>;

/// Close a child on an error path; the original error wins.
pub(crate) fn close_quietly(cursor: &mut CursorBox) {
    if let Err(err) = cursor.close() {
        warn!(error = %err, "child cursor failed to close after an earlier error");
    }
}

/// Open, drain and close a cursor.
pub fn collect_rows(cursor: &mut dyn Cursor) -> Result<Vec<Row>, InternalError> {
    cursor.open()?;

    let mut rows = Vec::new();
    loop {
        match cursor.next() {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => break,
            Err(err) => {
                if let Err(close_err) = cursor.close() {
                    warn!(error = %close_err, "cursor failed to close after an earlier error");
                }
                return Err(err);
            }
        }
    }
    cursor.close()?;

    Ok(rows)
}
