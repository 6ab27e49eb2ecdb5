use crate::{
    db::{
        context::QueryContext,
        executor::{
            cursor::CursorBox,
            kernel::LimitBound,
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
use std::{cmp::Ordering, sync::Arc};

///
/// SortInsertionLimited
///
/// Keeps the best `limit` rows under the ordering. A later row that ties
/// with a kept row never displaces it.
///

#[derive(Debug)]
pub struct SortInsertionLimited {
    input: OperatorRef,
    sort_type: RowTypeRef,
    ordering: Arc<RowOrdering>,
    duplicates: DuplicatePolicy,
    limit: LimitBound,
}

impl SortInsertionLimited {
    pub fn new(
        input: OperatorRef,
        sort_type: RowTypeRef,
        ordering: RowOrdering,
        duplicates: DuplicatePolicy,
        limit: LimitBound,
    ) -> Result<Self, InternalError> {
        check_ordering(&ordering)?;
        limit.check_literal("sort limit")?;

        Ok(Self {
            input,
            sort_type,
            ordering: Arc::new(ordering),
            duplicates,
            limit,
        })
    }
}

impl Operator for SortInsertionLimited {
    fn cursor(&self, context: &Arc<QueryContext>) -> Result<CursorBox, InternalError> {
        let buffer = LimitedBuffer {
            ordering: self.ordering.clone(),
            duplicates: self.duplicates,
            limit_bound: self.limit,
            limit: 0,
            kept: Vec::new(),
        };

        Ok(Box::new(SortCursor::new(
            "SortInsertionLimited",
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
            "SortInsertionLimited({}, {}, limit {}, {:?})",
            self.sort_type, self.ordering, self.limit, self.duplicates
        )
    }
}

///
/// LimitedBuffer
///
/// Sorted vector of at most `limit` entries; insertion places a row
/// after every entry that does not sort above it.
///

struct LimitedBuffer {
    ordering: Arc<RowOrdering>,
    duplicates: DuplicatePolicy,
    limit_bound: LimitBound,
    limit: usize,
    kept: Vec<(Vec<Value>, Row)>,
}

impl SortBuffer for LimitedBuffer {
    fn begin(&mut self, context: &QueryContext) -> Result<bool, InternalError> {
        self.limit = self
            .limit_bound
            .resolve("sort limit", context)?
            .unwrap_or(usize::MAX);

        Ok(self.limit > 0)
    }

    fn insert(&mut self, key: Vec<Value>, row: Row) {
        let position = self.kept.partition_point(|(kept, _)| {
            self.ordering.compare_keys(kept, &key) != Ordering::Greater
        });
        if !self.duplicates.preserves()
            && position > 0
            && self.ordering.compare_keys(&self.kept[position - 1].0, &key) == Ordering::Equal
        {
            return;
        }
        if position >= self.limit {
            return;
        }

        self.kept.insert(position, (key, row));
        self.kept.truncate(self.limit);
    }

    fn drain(&mut self) -> Vec<Row> {
        self.kept.drain(..).map(|(_, row)| row).collect()
    }

    fn clear(&mut self) {
        self.kept.clear();
    }
}
