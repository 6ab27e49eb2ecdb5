use crate::{
    db::{
        context::QueryContext,
        direction::Direction,
        executor::{
            cursor::{Cursor, CursorBox, CursorLifecycle, CursorState},
            operator::Operator,
        },
        index_range::{IndexBound, IndexKeyRange},
        row::{ColumnSelector, Row},
        schema::{IndexId, RowTypeRef},
        store::{KeyRange, KeySpace, StoredEntry},
    },
    error::InternalError,
    value::{Value, compare_nullable},
};
use std::{cmp::Ordering, collections::VecDeque, sync::Arc};
use tracing::trace;

///
/// IndexScan
///
/// Index rows inside a key range. One direction per index column; a
/// column without a declared direction takes the last declared one.
/// Uniform directions stream from storage, mixed directions are
/// materialized and sorted when the cursor opens.
///

#[derive(Debug)]
pub struct IndexScan {
    range: IndexKeyRange,
    directions: Vec<Direction>,
}

impl IndexScan {
    #[must_use]
    pub fn new(range: IndexKeyRange, direction: Direction) -> Self {
        Self {
            range,
            directions: vec![direction],
        }
    }

    pub fn with_column_directions(
        range: IndexKeyRange,
        directions: Vec<Direction>,
    ) -> Result<Self, InternalError> {
        if directions.is_empty() {
            return Err(InternalError::plan_invalid(
                "index scan requires at least one column direction",
            ));
        }
        if directions.len() > range.index().nfields() {
            return Err(InternalError::plan_invalid(format!(
                "{} column directions declared for index {} with {} fields",
                directions.len(),
                range.index(),
                range.index().nfields()
            )));
        }

        Ok(Self { range, directions })
    }

    fn uniform_direction(&self) -> Option<Direction> {
        let first = self.directions[0];
        self.directions
            .iter()
            .all(|direction| *direction == first)
            .then_some(first)
    }
}

impl Operator for IndexScan {
    fn cursor(&self, context: &Arc<QueryContext>) -> Result<CursorBox, InternalError> {
        let index = self.range.index().index().ok_or_else(|| {
            InternalError::plan_invalid(format!("{} is not an index", self.range.index()))
        })?;

        Ok(Box::new(IndexCursor {
            context: context.clone(),
            index_id: index.id,
            row_type: self.range.index().clone(),
            base: self.range.clone(),
            current: self.range.clone(),
            streaming: self.uniform_direction(),
            directions: self.directions.clone(),
            lifecycle: CursorLifecycle::new("IndexScan"),
            remaining: KeyRange::full(),
            buffer: VecDeque::new(),
            storage_exhausted: true,
            sorted: Vec::new(),
            position: 0,
        }))
    }

    fn row_type(&self) -> Option<RowTypeRef> {
        Some(self.range.index().clone())
    }

    fn describe(&self) -> String {
        let directions: Vec<&str> = self.directions.iter().map(|d| d.label()).collect();
        format!("IndexScan({} {})", self.range, directions.join(","))
    }
}

///
/// IndexCursor
///

struct IndexCursor {
    context: Arc<QueryContext>,
    index_id: IndexId,
    row_type: RowTypeRef,
    base: IndexKeyRange,
    current: IndexKeyRange,

    /// `Some` when every column shares one direction.
    streaming: Option<Direction>,
    directions: Vec<Direction>,
    lifecycle: CursorLifecycle,

    // streaming state
    remaining: KeyRange,
    buffer: VecDeque<StoredEntry>,
    storage_exhausted: bool,

    // sorted state
    sorted: Vec<Row>,
    position: usize,
}

impl IndexCursor {
    fn to_row(&self, entry: StoredEntry) -> Row {
        Row::new(
            self.row_type.clone(),
            entry.record.values,
            Some(entry.record.hkey),
        )
    }

    fn scan_batch(
        &self,
        range: &KeyRange,
        direction: Direction,
    ) -> Result<Vec<StoredEntry>, InternalError> {
        self.context.store().scan(
            KeySpace::Index(self.index_id),
            range,
            direction,
            self.context.config().scan_batch_size,
        )
    }

    fn restart_streaming(&mut self, direction: Direction) -> Result<(), InternalError> {
        self.remaining = self.current.raw_range();
        self.buffer.clear();
        self.storage_exhausted = false;
        self.refill(direction)
    }

    fn refill(&mut self, direction: Direction) -> Result<(), InternalError> {
        if self.storage_exhausted {
            return Ok(());
        }

        let entries = self.scan_batch(&self.remaining, direction)?;
        if entries.len() < self.context.config().scan_batch_size {
            self.storage_exhausted = true;
        }
        if let Some(last) = entries.last() {
            self.remaining = self.remaining.resume_after(&last.key, direction);
        }
        self.buffer.extend(entries);

        Ok(())
    }

    fn next_streaming(&mut self, direction: Direction) -> Result<Option<Row>, InternalError> {
        let mut poller = self.context.poller();
        loop {
            if self.buffer.is_empty() {
                self.refill(direction)?;
            }
            let Some(entry) = self.buffer.pop_front() else {
                return Ok(None);
            };

            let key = &entry.record.values;
            let (before_start, past_end) = match direction {
                Direction::Asc => (self.current.below_lo(key), self.current.above_hi(key)),
                Direction::Desc => (self.current.above_hi(key), self.current.below_lo(key)),
            };
            if past_end {
                self.buffer.clear();
                self.storage_exhausted = true;
                return Ok(None);
            }
            if before_start {
                poller.tick(&self.context)?;
                continue;
            }

            return Ok(Some(self.to_row(entry)));
        }
    }

    fn materialize(&mut self) -> Result<(), InternalError> {
        let mut remaining = self.base.raw_range();
        let mut rows = Vec::new();
        let mut poller = self.context.poller();
        loop {
            let entries = self.scan_batch(&remaining, Direction::Asc)?;
            let done = entries.len() < self.context.config().scan_batch_size;
            if let Some(last) = entries.last() {
                remaining = remaining.resume_after(&last.key, Direction::Asc);
            }
            for entry in entries {
                poller.tick(&self.context)?;
                if self.base.contains(&entry.record.values) {
                    rows.push(self.to_row(entry));
                }
            }
            if done {
                break;
            }
        }

        rows.sort_by(|a, b| compare_columns(a.values(), b.values(), &self.directions));
        trace!(index = %self.row_type, rows = rows.len(), "mixed-direction index scan sorted");
        self.sorted = rows;
        self.position = 0;

        Ok(())
    }

    fn update_state(&mut self, has_rows: bool) {
        if has_rows {
            self.lifecycle.set_active();
        } else {
            self.lifecycle.set_idle();
        }
    }
}

fn column_direction(directions: &[Direction], column: usize) -> Direction {
    directions
        .get(column)
        .or_else(|| directions.last())
        .copied()
        .unwrap_or_default()
}

/// Compare two key prefixes column by column under per-column directions.
fn compare_columns(left: &[Value], right: &[Value], directions: &[Direction]) -> Ordering {
    for (column, (a, b)) in left.iter().zip(right).enumerate() {
        let ordering = compare_nullable(a, b, column_direction(directions, column));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

impl Cursor for IndexCursor {
    fn open(&mut self) -> Result<(), InternalError> {
        self.lifecycle.check_openable()?;
        self.lifecycle.set_active();
        self.current = self.base.clone();
        trace!(range = %self.base, "index scan open");

        let has_rows = match self.streaming {
            Some(direction) => {
                self.restart_streaming(direction)?;
                !self.buffer.is_empty()
            }
            None => {
                self.materialize()?;
                !self.sorted.is_empty()
            }
        };
        self.update_state(has_rows);

        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>, InternalError> {
        self.lifecycle.check_open("next")?;
        if !self.lifecycle.is_active() {
            return Ok(None);
        }
        self.context.check_cancelation()?;

        let row = match self.streaming {
            Some(direction) => self.next_streaming(direction)?,
            None => {
                let row = self.sorted.get(self.position).cloned();
                self.position += 1;
                row
            }
        };
        if row.is_none() {
            self.lifecycle.set_idle();
        }

        Ok(row)
    }

    /// Reposition to the first row at or after the selected key prefix in
    /// scan order, never outside the original range.
    fn jump(&mut self, row: &Row, selector: ColumnSelector) -> Result<(), InternalError> {
        self.lifecycle.check_open("jump")?;
        let target = IndexBound::from_row(row, selector);
        trace!(index = %self.row_type, %target, "index scan jump");

        let has_rows = match self.streaming {
            Some(direction) => {
                self.current = match direction {
                    Direction::Asc if !self.base.below_lo(target.values()) => {
                        self.base.restart_at_lo(target)
                    }
                    Direction::Desc if !self.base.above_hi(target.values()) => {
                        self.base.restart_at_hi(target)
                    }
                    _ => self.base.clone(),
                };
                self.restart_streaming(direction)?;
                !self.buffer.is_empty()
            }
            None => {
                let key = target.values();
                let directions = &self.directions;
                self.position = self.sorted.partition_point(|candidate| {
                    compare_columns(candidate.values(), key, directions) == Ordering::Less
                });
                self.position < self.sorted.len()
            }
        };
        self.update_state(has_rows);

        Ok(())
    }

    fn supports_jump(&self) -> bool {
        true
    }

    fn close(&mut self) -> Result<(), InternalError> {
        self.lifecycle.check_not_destroyed("close")?;
        self.buffer.clear();
        self.storage_exhausted = true;
        self.sorted.clear();
        self.position = 0;
        self.lifecycle.set_idle();

        Ok(())
    }

    fn destroy(&mut self) {
        self.buffer.clear();
        self.sorted.clear();
        self.lifecycle.set_destroyed();
    }

    fn state(&self) -> CursorState {
        self.lifecycle.state()
    }
}
