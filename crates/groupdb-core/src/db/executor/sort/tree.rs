use crate::{
    db::{
        context::QueryContext,
        executor::{
            cursor::CursorBox,
            operator::{Operator, OperatorRef},
            sort::{DuplicatePolicy, SortBuffer, SortCursor, check_ordering},
        },
        ordering::RowOrdering,
        row::Row,
        schema::RowTypeRef,
    },
    error::InternalError,
    value::Value,
};
use std::{cmp::Ordering, collections::BTreeMap, sync::Arc};

///
/// SortTree
///
/// Full materialized sort. Rows are kept in an ordered tree keyed by the
/// evaluated sort key and arrival sequence, so equal keys replay in
/// input order.
///

#[derive(Debug)]
pub struct SortTree {
    input: OperatorRef,
    sort_type: RowTypeRef,
    ordering: Arc<RowOrdering>,
    duplicates: DuplicatePolicy,
}

impl SortTree {
    pub fn new(
        input: OperatorRef,
        sort_type: RowTypeRef,
        ordering: RowOrdering,
        duplicates: DuplicatePolicy,
    ) -> Result<Self, InternalError> {
        check_ordering(&ordering)?;

        Ok(Self {
            input,
            sort_type,
            ordering: Arc::new(ordering),
            duplicates,
        })
    }
}

impl Operator for SortTree {
    fn cursor(&self, context: &Arc<QueryContext>) -> Result<CursorBox, InternalError> {
        let buffer = TreeBuffer {
            ordering: self.ordering.clone(),
            duplicates: self.duplicates,
            sequence: 0,
            rows: BTreeMap::new(),
        };

        Ok(Box::new(SortCursor::new(
            "SortTree",
            context,
            self.input.cursor(context)?,
            self.sort_type.clone(),
            self.ordering.clone(),
            buffer,
        )))
    }

    fn row_type(&self) -> Option<RowTypeRef> {
        Some(self.sort_type.clone())
    }

    fn inputs(&self) -> Vec<&OperatorRef> {
        vec![&self.input]
    }

    fn describe(&self) -> String {
        format!(
            "SortTree({}, {}, {:?})",
            self.sort_type, self.ordering, self.duplicates
        )
    }
}

///
/// TreeKey
///

struct TreeKey {
    values: Vec<Value>,
    sequence: u64,
    ordering: Arc<RowOrdering>,
}

impl Ord for TreeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ordering
            .compare_keys(&self.values, &other.values)
            .then(self.sequence.cmp(&other.sequence))
    }
}

impl PartialOrd for TreeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TreeKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TreeKey {}

struct TreeBuffer {
    ordering: Arc<RowOrdering>,
    duplicates: DuplicatePolicy,
    sequence: u64,
    rows: BTreeMap<TreeKey, Row>,
}

impl SortBuffer for TreeBuffer {
    fn begin(&mut self, _context: &QueryContext) -> Result<bool, InternalError> {
        self.sequence = 0;
        Ok(true)
    }

    /// Suppressed duplicates share sequence 0, so the first row seen for
    /// a key holds its slot.
    fn insert(&mut self, values: Vec<Value>, row: Row) {
        let sequence = if self.duplicates.preserves() {
            self.sequence += 1;
            self.sequence
        } else {
            0
        };
        let key = TreeKey {
            values,
            sequence,
            ordering: self.ordering.clone(),
        };
        self.rows.entry(key).or_insert(row);
    }

    fn drain(&mut self) -> Vec<Row> {
        std::mem::take(&mut self.rows).into_values().collect()
    }

    fn clear(&mut self) {
        self.rows.clear();
    }
}
