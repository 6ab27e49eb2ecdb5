use crate::{
    db::{
        context::QueryContext,
        direction::Direction,
        executor::{
            cursor::{Cursor, CursorBox, CursorLifecycle, CursorState},
            operator::Operator,
        },
        hkey::{HKey, codec},
        row::{ColumnSelector, Row},
        schema::GroupRef,
        store::{KeyRange, KeySpace, RawKey, StoredEntry},
    },
    error::InternalError,
};
use std::{collections::VecDeque, fmt, ops::Bound, sync::Arc};
use tracing::trace;

///
/// GroupScanRange
///
/// Which part of a group a scan covers. Range bounds compare whole
/// hkeys, so an inclusive upper bound admits that row but not its
/// descendants.
///

#[derive(Clone, Debug)]
pub enum GroupScanRange {
    Full,
    Row { hkey: HKey, deep: bool },
    Range { lower: Bound<HKey>, upper: Bound<HKey> },
}

impl GroupScanRange {
    fn raw(&self) -> KeyRange {
        match self {
            Self::Full => KeyRange::full(),
            Self::Row { hkey, deep } => {
                let encoded = hkey.encode();
                let upper = if *deep {
                    Bound::Excluded(RawKey::new(codec::prefix_upper_bound(&encoded)))
                } else {
                    Bound::Included(RawKey::new(encoded.clone()))
                };
                KeyRange::new(Bound::Included(RawKey::new(encoded)), upper)
            }
            Self::Range { lower, upper } => {
                KeyRange::new(encode_bound(lower), encode_bound(upper))
            }
        }
    }
}

fn encode_bound(bound: &Bound<HKey>) -> Bound<RawKey> {
    match bound {
        Bound::Included(hkey) => Bound::Included(RawKey::from_hkey(hkey)),
        Bound::Excluded(hkey) => Bound::Excluded(RawKey::from_hkey(hkey)),
        Bound::Unbounded => Bound::Unbounded,
    }
}

impl fmt::Display for GroupScanRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.write_str("full"),
            Self::Row { hkey, deep: true } => write!(f, "subtree {hkey}"),
            Self::Row { hkey, deep: false } => write!(f, "row {hkey}"),
            Self::Range { lower, upper } => write!(f, "range {lower:?}..{upper:?}"),
        }
    }
}

///
/// GroupScan
///
/// Every row of one group in hkey order, optionally restricted.
///

#[derive(Debug)]
pub struct GroupScan {
    group: GroupRef,
    range: GroupScanRange,
}

impl GroupScan {
    #[must_use]
    pub const fn full(group: GroupRef) -> Self {
        Self {
            group,
            range: GroupScanRange::Full,
        }
    }

    /// One row, optionally with its whole descendant subtree.
    #[must_use]
    pub const fn row(group: GroupRef, hkey: HKey, deep: bool) -> Self {
        Self {
            group,
            range: GroupScanRange::Row { hkey, deep },
        }
    }

    #[must_use]
    pub const fn range(group: GroupRef, lower: Bound<HKey>, upper: Bound<HKey>) -> Self {
        Self {
            group,
            range: GroupScanRange::Range { lower, upper },
        }
    }
}

impl Operator for GroupScan {
    fn cursor(&self, context: &Arc<QueryContext>) -> Result<CursorBox, InternalError> {
        Ok(Box::new(GroupCursor::new(
            context.clone(),
            self.group.clone(),
            self.range.clone(),
        )))
    }

    fn describe(&self) -> String {
        format!("GroupScan({}, {})", self.group.name(), self.range)
    }
}

///
/// GroupCursor
///
/// Batched forward iteration over the group key space. Branch lookups
/// run one per input row.
///

pub(crate) struct GroupCursor {
    context: Arc<QueryContext>,
    group: GroupRef,
    range: GroupScanRange,
    lifecycle: CursorLifecycle,
    remaining: KeyRange,
    buffer: VecDeque<StoredEntry>,
    storage_exhausted: bool,
}

impl GroupCursor {
    pub(crate) fn new(context: Arc<QueryContext>, group: GroupRef, range: GroupScanRange) -> Self {
        Self {
            context,
            group,
            range,
            lifecycle: CursorLifecycle::new("GroupScan"),
            remaining: KeyRange::full(),
            buffer: VecDeque::new(),
            storage_exhausted: true,
        }
    }

    fn space(&self) -> KeySpace {
        KeySpace::Group(self.group.root())
    }

    fn reposition(&mut self, remaining: KeyRange) -> Result<(), InternalError> {
        self.remaining = remaining;
        self.buffer.clear();
        self.storage_exhausted = false;
        self.refill()?;

        if self.buffer.is_empty() {
            self.lifecycle.set_idle();
        } else {
            self.lifecycle.set_active();
        }

        Ok(())
    }

    fn refill(&mut self) -> Result<(), InternalError> {
        if self.storage_exhausted {
            return Ok(());
        }

        let batch = self.context.config().scan_batch_size;
        let entries = self
            .context
            .store()
            .scan(self.space(), &self.remaining, Direction::Asc, batch)?;
        if entries.len() < batch {
            self.storage_exhausted = true;
        }
        if let Some(last) = entries.last() {
            self.remaining = self.remaining.resume_after(&last.key, Direction::Asc);
        }
        self.buffer.extend(entries);

        Ok(())
    }

    fn to_row(&self, entry: StoredEntry) -> Result<Row, InternalError> {
        let row_type = self.group.table_type(entry.record.table).ok_or_else(|| {
            InternalError::store_corruption(format!(
                "group {} holds a row of unknown table {}",
                self.group.name(),
                entry.record.table
            ))
        })?;

        Ok(Row::new(
            row_type.clone(),
            entry.record.values,
            Some(entry.record.hkey),
        ))
    }
}

impl Cursor for GroupCursor {
    fn open(&mut self) -> Result<(), InternalError> {
        self.lifecycle.check_openable()?;
        self.lifecycle.set_active();
        trace!(group = self.group.name(), range = %self.range, "group scan open");

        self.reposition(self.range.raw())
    }

    fn next(&mut self) -> Result<Option<Row>, InternalError> {
        self.lifecycle.check_open("next")?;
        if !self.lifecycle.is_active() {
            return Ok(None);
        }
        self.context.check_cancelation()?;

        if self.buffer.is_empty() {
            self.refill()?;
        }
        match self.buffer.pop_front() {
            Some(entry) => self.to_row(entry).map(Some),
            None => {
                self.lifecycle.set_idle();
                Ok(None)
            }
        }
    }

    /// The next row is the first whose hkey is strictly greater than
    /// `row`'s, so the jump row's own descendants come first.
    fn jump(&mut self, row: &Row, _selector: ColumnSelector) -> Result<(), InternalError> {
        self.lifecycle.check_open("jump")?;
        let hkey = row.hkey().ok_or_else(|| {
            InternalError::executor_invariant(format!("GroupScan: jump target {row:?} has no hkey"))
        })?;
        trace!(group = self.group.name(), %hkey, "group scan jump");

        let base = self.range.raw();
        let target = RawKey::from_hkey(hkey);
        let lower = match &base.lower {
            Bound::Included(start) | Bound::Excluded(start) if *start > target => {
                base.lower.clone()
            }
            _ => Bound::Excluded(target),
        };

        self.reposition(KeyRange::new(lower, base.upper))
    }

    fn supports_jump(&self) -> bool {
        true
    }

    fn close(&mut self) -> Result<(), InternalError> {
        self.lifecycle.check_not_destroyed("close")?;
        self.buffer.clear();
        self.storage_exhausted = true;
        self.lifecycle.set_idle();

        Ok(())
    }

    fn destroy(&mut self) {
        self.buffer.clear();
        self.lifecycle.set_destroyed();
    }

    fn state(&self) -> CursorState {
        self.lifecycle.state()
    }
}
