//! Module: executor::merge
//! Responsibility: ordered two-input set operators and their skip-scan.
//! Does not own: input ordering; both inputs must already be ordered on the
//! compared fields in the declared directions.
//! Boundary: rows are compared on `[fixed, fixed + n)` of each side, where
//! the leading `fixed` fields are constant within one input.

mod except;
mod hkey_union;
mod intersect;
mod union;

#[cfg(test)]
mod tests;

pub use except::Except;
pub use hkey_union::HKeyUnion;
pub use intersect::{Intersect, IntersectOptions, IntersectOutput};
pub use union::Union;

use crate::{
    db::{
        context::QueryContext,
        direction::Direction,
        executor::cursor::{Cursor, CursorBox, CursorLifecycle, CursorState, close_quietly},
        row::{ColumnSelector, Row},
        schema::RowTypeRef,
    },
    error::InternalError,
    value::{Value, compare_nullable},
};
use std::{cmp::Ordering, sync::Arc};
use tracing::trace;

///
/// ScanMode
///
/// How a merge moves past a run of unmatched rows on one side.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ScanMode {
    /// Seek past the run when the side can seek; otherwise step.
    #[default]
    SkipScan,
    SequentialScan,
}

///
/// MergeKeys
///
/// The trailing `*_ordering_fields` of each side are its ordered fields;
/// the first `directions.len()` of them are compared.
///

#[derive(Clone, Debug)]
pub struct MergeKeys {
    pub left_ordering_fields: usize,
    pub right_ordering_fields: usize,
    pub directions: Vec<Direction>,
}

impl MergeKeys {
    #[must_use]
    pub const fn new(
        left_ordering_fields: usize,
        right_ordering_fields: usize,
        directions: Vec<Direction>,
    ) -> Self {
        Self {
            left_ordering_fields,
            right_ordering_fields,
            directions,
        }
    }

    /// Same ordering on both sides, all compared ascending.
    #[must_use]
    pub fn ascending(ordering_fields: usize, compared: usize) -> Self {
        Self::new(ordering_fields, ordering_fields, vec![Direction::Asc; compared])
    }

    fn validate(&self, left: &RowTypeRef, right: &RowTypeRef) -> Result<(), InternalError> {
        if self.left_ordering_fields > left.nfields() {
            return Err(InternalError::plan_invalid(format!(
                "left ordering fields {} exceed the {} fields of {left}",
                self.left_ordering_fields,
                left.nfields()
            )));
        }
        if self.right_ordering_fields > right.nfields() {
            return Err(InternalError::plan_invalid(format!(
                "right ordering fields {} exceed the {} fields of {right}",
                self.right_ordering_fields,
                right.nfields()
            )));
        }
        let ordering = self.left_ordering_fields.min(self.right_ordering_fields);
        if self.directions.len() > ordering {
            return Err(InternalError::plan_invalid(format!(
                "{} compared fields exceed the {ordering} ordering fields",
                self.directions.len()
            )));
        }

        Ok(())
    }

    fn comparator(&self, left: &RowTypeRef, right: &RowTypeRef) -> KeyComparator {
        KeyComparator {
            left_fixed: left.nfields() - self.left_ordering_fields,
            right_fixed: right.nfields() - self.right_ordering_fields,
            directions: self.directions.clone(),
        }
    }
}

///
/// KeyComparator
///

#[derive(Clone, Debug)]
struct KeyComparator {
    left_fixed: usize,
    right_fixed: usize,
    directions: Vec<Direction>,
}

impl KeyComparator {
    const fn compared(&self) -> usize {
        self.directions.len()
    }

    /// Compare `a` (fields from `a_fixed`) with `b` (from `b_fixed`).
    fn compare_at(&self, a: &Row, a_fixed: usize, b: &Row, b_fixed: usize) -> Ordering {
        for (i, direction) in self.directions.iter().enumerate() {
            let ordering = match (a.value(a_fixed + i), b.value(b_fixed + i)) {
                (Some(x), Some(y)) => compare_nullable(x, y, *direction),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        Ordering::Equal
    }

    /// Compare the current rows of both sides; an exhausted side sorts
    /// after every row.
    fn compare(&self, left: Option<&Row>, right: Option<&Row>) -> Ordering {
        match (left, right) {
            (Some(left), Some(right)) => {
                self.compare_at(left, self.left_fixed, right, self.right_fixed)
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

///
/// MergeSide
///
/// One input of a merge with its current row.
///

struct MergeSide {
    cursor: CursorBox,
    row_type: RowTypeRef,
    fixed: usize,
    current: Option<Row>,
    seekable: bool,
}

impl MergeSide {
    fn new(cursor: CursorBox, row_type: RowTypeRef, fixed: usize) -> Self {
        Self {
            cursor,
            row_type,
            fixed,
            current: None,
            seekable: false,
        }
    }

    /// Skip rows are built from the side's own row type and positioned
    /// by key columns, which only index-ordered inputs can seek on.
    fn open(&mut self, mode: ScanMode) -> Result<(), InternalError> {
        self.cursor.open()?;
        self.seekable = mode == ScanMode::SkipScan
            && self.row_type.is_index()
            && self.cursor.supports_jump();
        if let Err(err) = self.advance() {
            self.close_quietly();
            return Err(err);
        }

        Ok(())
    }

    fn advance(&mut self) -> Result<(), InternalError> {
        self.current = self.cursor.next()?;
        Ok(())
    }

    fn take(&mut self) -> Result<Option<Row>, InternalError> {
        let row = self.current.take();
        self.advance()?;
        Ok(row)
    }

    fn is_exhausted(&self) -> bool {
        self.current.is_none()
    }

    /// Move forward to the first row whose compared fields are at or
    /// past `target`'s fields starting at `target_fixed`. Seeks when
    /// possible and steps otherwise.
    fn skip_to(
        &mut self,
        comparator: &KeyComparator,
        target: &Row,
        target_fixed: usize,
    ) -> Result<(), InternalError> {
        let fixed = self.fixed;
        let behind = |current: &Row| {
            comparator.compare_at(current, fixed, target, target_fixed) == Ordering::Less
        };
        let Some(current) = self.current.as_ref() else {
            return Ok(());
        };
        if !behind(current) {
            return Ok(());
        }

        if self.seekable {
            let skip_row = self.skip_row(current, comparator.compared(), target, target_fixed);
            trace!(side = %self.row_type, skip = ?skip_row, "merge skip-scan jump");
            let selector = ColumnSelector::leading(self.fixed + comparator.compared());
            self.cursor.jump(&skip_row, selector)?;
            return self.advance();
        }

        loop {
            self.advance()?;
            match self.current.as_ref() {
                Some(current) if behind(current) => {}
                _ => return Ok(()),
            }
        }
    }

    /// Own fixed fields, then the target's compared fields, then nulls.
    fn skip_row(&self, current: &Row, compared: usize, target: &Row, target_fixed: usize) -> Row {
        let nfields = self.row_type.nfields();
        let mut values: Vec<Value> = current.values()[..self.fixed].to_vec();
        values.extend(
            (0..compared).map(|i| target.value(target_fixed + i).cloned().unwrap_or_default()),
        );
        values.resize(nfields, Value::Null);

        Row::new(self.row_type.clone(), values, None)
    }

    fn close(&mut self) -> Result<(), InternalError> {
        self.current = None;
        self.cursor.close()
    }

    fn close_quietly(&mut self) {
        self.current = None;
        close_quietly(&mut self.cursor);
    }

    fn destroy(&mut self) {
        self.current = None;
        self.cursor.destroy();
    }
}

///
/// Sides
///

struct Sides {
    left: MergeSide,
    right: MergeSide,
    comparator: KeyComparator,
}

impl Sides {
    fn compare(&self) -> Ordering {
        self.comparator
            .compare(self.left.current.as_ref(), self.right.current.as_ref())
    }

    /// Move the left side up to the right side's current key.
    fn skip_left(&mut self) -> Result<(), InternalError> {
        match self.right.current.as_ref() {
            Some(target) => self.left.skip_to(&self.comparator, target, self.right.fixed),
            None => self.left.advance(),
        }
    }

    /// Move the right side up to the left side's current key.
    fn skip_right(&mut self) -> Result<(), InternalError> {
        match self.left.current.as_ref() {
            Some(target) => self.right.skip_to(&self.comparator, target, self.left.fixed),
            None => self.right.advance(),
        }
    }

    /// Forward both sides to `row`'s key fields starting at `fixed`.
    fn skip_both(&mut self, row: &Row, fixed: usize) -> Result<(), InternalError> {
        self.left.skip_to(&self.comparator, row, fixed)?;
        self.right.skip_to(&self.comparator, row, fixed)
    }

    fn open(&mut self, mode: ScanMode) -> Result<(), InternalError> {
        self.left.open(mode)?;
        // A right side that failed after opening has already closed itself.
        if let Err(err) = self.right.open(mode) {
            self.left.close_quietly();
            return Err(err);
        }

        Ok(())
    }

    fn close(&mut self) -> Result<(), InternalError> {
        let left = self.left.close();
        let right = self.right.close();
        left.and(right)
    }

    fn close_quietly(&mut self) {
        self.left.close_quietly();
        self.right.close_quietly();
    }

    fn destroy(&mut self) {
        self.left.destroy();
        self.right.destroy();
    }
}

///
/// MergeStep
///
/// The algorithm-specific part of a merge cursor.
///

trait MergeStep: Send {
    /// Next output row, or `None` once the merge is complete.
    fn step(&mut self, sides: &mut Sides) -> Result<Option<Row>, InternalError>;

    /// True when no further row can be produced.
    fn finished(&self, sides: &Sides) -> bool;

    /// Field offset of jump rows, which are rows of the output type.
    fn jump_fixed(&self, sides: &Sides) -> usize {
        sides.left.fixed
    }

    /// Drop rows buffered between steps.
    fn reset(&mut self) {}
}

///
/// MergeCursor
///

struct MergeCursor<S> {
    context: Arc<QueryContext>,
    sides: Sides,
    step: S,
    mode: ScanMode,
    lifecycle: CursorLifecycle,
}

impl<S: MergeStep> MergeCursor<S> {
    fn new(
        name: &'static str,
        context: &Arc<QueryContext>,
        left: (CursorBox, RowTypeRef),
        right: (CursorBox, RowTypeRef),
        keys: &MergeKeys,
        mode: ScanMode,
        step: S,
    ) -> Self {
        let comparator = keys.comparator(&left.1, &right.1);
        let sides = Sides {
            left: MergeSide::new(left.0, left.1, comparator.left_fixed),
            right: MergeSide::new(right.0, right.1, comparator.right_fixed),
            comparator,
        };

        Self {
            context: context.clone(),
            sides,
            step,
            mode,
            lifecycle: CursorLifecycle::new(name),
        }
    }

    fn abort(&mut self) {
        self.step.reset();
        self.sides.close_quietly();
        self.lifecycle.set_idle();
    }

    fn pull(&mut self) -> Result<Option<Row>, InternalError> {
        self.context.check_cancelation()?;
        let mut poller = self.context.poller();
        loop {
            if self.step.finished(&self.sides) {
                return Ok(None);
            }
            if let Some(row) = self.step.step(&mut self.sides)? {
                return Ok(Some(row));
            }
            poller.tick(&self.context)?;
        }
    }

    fn settle(&mut self) {
        if self.step.finished(&self.sides) {
            self.lifecycle.set_idle();
        } else {
            self.lifecycle.set_active();
        }
    }
}

impl<S: MergeStep> Cursor for MergeCursor<S> {
    fn open(&mut self) -> Result<(), InternalError> {
        self.lifecycle.check_openable()?;
        self.sides.open(self.mode)?;
        self.step.reset();
        self.lifecycle.set_active();
        self.settle();

        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>, InternalError> {
        self.lifecycle.check_open("next")?;
        if !self.lifecycle.is_active() {
            return Ok(None);
        }

        match self.pull() {
            Ok(Some(row)) => Ok(Some(row)),
            Ok(None) => {
                self.lifecycle.set_idle();
                Ok(None)
            }
            Err(err) => {
                self.abort();
                Err(err)
            }
        }
    }

    /// Forward-only: sides already at or past the key stay where they are.
    fn jump(&mut self, row: &Row, _selector: ColumnSelector) -> Result<(), InternalError> {
        self.lifecycle.check_open("jump")?;
        self.step.reset();
        let fixed = self.step.jump_fixed(&self.sides);
        if let Err(err) = self.sides.skip_both(row, fixed) {
            self.abort();
            return Err(err);
        }
        self.settle();

        Ok(())
    }

    fn supports_jump(&self) -> bool {
        self.sides.left.cursor.supports_jump() && self.sides.right.cursor.supports_jump()
    }

    fn close(&mut self) -> Result<(), InternalError> {
        self.lifecycle.check_not_destroyed("close")?;
        if self.lifecycle.state().is_open() {
            self.step.reset();
            self.sides.close()?;
            self.lifecycle.set_idle();
        }

        Ok(())
    }

    fn destroy(&mut self) {
        self.step.reset();
        self.sides.destroy();
        self.lifecycle.set_destroyed();
    }

    fn state(&self) -> CursorState {
        self.lifecycle.state()
    }
}
