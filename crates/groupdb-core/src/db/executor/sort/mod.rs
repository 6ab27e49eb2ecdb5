//! Module: executor::sort
//! Responsibility: materializing sorts over a declared row ordering.
//! Does not own: expression evaluation (see `db::expr`) or ordering
//! declarations (see `db::ordering`).
//! Boundary: input is drained on the first `next()`; output is replayed
//! from memory.

mod limited;
mod tree;


pub use limited::SortInsertionLimited;
pub use tree::SortTree;

use crate::{
    db::{
        context::QueryContext,
        executor::cursor::{Cursor, CursorBox, CursorLifecycle, CursorState, close_quietly},
        ordering::RowOrdering,
        row::Row,
        schema::RowTypeRef,
    },
    error::InternalError,
    value::Value,
};
use std::{collections::VecDeque, sync::Arc};
use tracing::debug;

///
/// DuplicatePolicy
///
/// What a sort does with rows whose sort keys are equal.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DuplicatePolicy {
    /// Keep every row; equal keys stay in arrival order.
    #[default]
    Preserve,

    /// Keep only the first row seen for each sort key.
    Suppress,
}

impl DuplicatePolicy {
    const fn preserves(self) -> bool {
        matches!(self, Self::Preserve)
    }
}

fn check_ordering(ordering: &RowOrdering) -> Result<(), InternalError> {
    if ordering.is_empty() {
        return Err(InternalError::plan_invalid("sort ordering has no columns"));
    }

    Ok(())
}

///
/// SortBuffer
///
/// Strategy-specific row store behind a sort cursor.
///

trait SortBuffer: Send {
    /// Prepare for a new pass. Returning `false` means the pass yields
    /// nothing and the input is not opened.
    fn begin(&mut self, context: &QueryContext) -> Result<bool, InternalError>;

    fn insert(&mut self, key: Vec<Value>, row: Row);

    /// Sorted rows of the pass; leaves the buffer empty.
    fn drain(&mut self) -> Vec<Row>;

    fn clear(&mut self);
}

///
/// SortCursor
///

struct SortCursor<B> {
    name: &'static str,
    context: Arc<QueryContext>,
    input: CursorBox,
    sort_type: RowTypeRef,
    ordering: Arc<RowOrdering>,
    buffer: B,
    output: VecDeque<Row>,
    filled: bool,
    lifecycle: CursorLifecycle,
}

impl<B: SortBuffer> SortCursor<B> {
    fn new(
        name: &'static str,
        context: &Arc<QueryContext>,
        input: CursorBox,
        sort_type: RowTypeRef,
        ordering: Arc<RowOrdering>,
        buffer: B,
    ) -> Self {
        Self {
            name,
            context: context.clone(),
            input,
            sort_type,
            ordering,
            buffer,
            output: VecDeque::new(),
            filled: false,
            lifecycle: CursorLifecycle::new(name),
        }
    }

    fn fill(&mut self) -> Result<(), InternalError> {
        let mut poller = self.context.poller();
        let mut count = 0_usize;
        while let Some(row) = self.input.next()? {
            if !row.is_type(&self.sort_type) {
                return Err(InternalError::incompatible_row(format!(
                    "{row:?} reached a sort of {}",
                    self.sort_type
                )));
            }
            let key = self.ordering.sort_key(&row, &self.context)?;
            self.buffer.insert(key, row);
            count += 1;
            poller.tick(&self.context)?;
        }
        self.input.close()?;
        self.output = self.buffer.drain().into();
        self.filled = true;
        debug!(sort = self.name, input = count, output = self.output.len(), "sort filled");

        Ok(())
    }

    fn pull(&mut self) -> Result<Option<Row>, InternalError> {
        if !self.filled {
            self.fill()?;
        }

        Ok(self.output.pop_front())
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.output.clear();
        self.filled = false;
    }
}

impl<B: SortBuffer> Cursor for SortCursor<B> {
    fn open(&mut self) -> Result<(), InternalError> {
        self.lifecycle.check_openable()?;
        self.reset();
        let runs = self.buffer.begin(&self.context)?;
        if runs {
            self.input.open()?;
            self.lifecycle.set_active();
        } else {
            debug!(sort = self.name, "sort limited to zero rows");
            self.lifecycle.set_active();
            self.lifecycle.set_idle();
        }

        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>, InternalError> {
        self.lifecycle.check_open("next")?;
        if !self.lifecycle.is_active() {
            return Ok(None);
        }
        self.context.check_cancelation()?;

        match self.pull() {
            Ok(Some(row)) => Ok(Some(row)),
            Ok(None) => {
                self.reset();
                self.lifecycle.set_idle();
                Ok(None)
            }
            Err(err) => {
                self.reset();
                close_quietly(&mut self.input);
                self.lifecycle.set_idle();
                Err(err)
            }
        }
    }

    fn close(&mut self) -> Result<(), InternalError> {
        self.lifecycle.check_not_destroyed("close")?;
        if self.lifecycle.state().is_open() {
            self.reset();
            self.input.close()?;
            self.lifecycle.set_idle();
        }

        Ok(())
    }

    fn destroy(&mut self) {
        self.reset();
        self.input.destroy();
        self.lifecycle.set_destroyed();
    }

    fn state(&self) -> CursorState {
        self.lifecycle.state()
    }
}
