//! Module: db::ordering
//! Responsibility: sort-key declarations shared by sorts and ordered merges.
//! Does not own: sort algorithms (see `db::executor::sort`).

use crate::{
    db::{context::QueryContext, direction::Direction, expr::Evaluator, row::Row},
    error::InternalError,
    value::{Value, compare_nullable},
};
use std::{cmp::Ordering, fmt, sync::Arc};

///
/// SortColumn
///

#[derive(Clone, Debug)]
pub struct SortColumn {
    pub expression: Arc<dyn Evaluator>,
    pub direction: Direction,
}

///
/// RowOrdering
///
/// Ordered list of (expression, direction) pairs. Directions are taken
/// as declared, never inferred from the data.
///

#[derive(Clone, Debug, Default)]
pub struct RowOrdering {
    columns: Vec<SortColumn>,
}

impl RowOrdering {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn append(mut self, expression: impl Evaluator + 'static, direction: Direction) -> Self {
        self.columns.push(SortColumn {
            expression: Arc::new(expression),
            direction,
        });
        self
    }

    #[must_use]
    pub fn asc(self, expression: impl Evaluator + 'static) -> Self {
        self.append(expression, Direction::Asc)
    }

    #[must_use]
    pub fn desc(self, expression: impl Evaluator + 'static) -> Self {
        self.append(expression, Direction::Desc)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    #[must_use]
    pub fn columns(&self) -> &[SortColumn] {
        &self.columns
    }

    #[must_use]
    pub fn direction(&self, column: usize) -> Option<Direction> {
        self.columns.get(column).map(|column| column.direction)
    }

    /// Evaluate every sort expression against `row`.
    pub fn sort_key(&self, row: &Row, context: &QueryContext) -> Result<Vec<Value>, InternalError> {
        self.columns
            .iter()
            .map(|column| column.expression.evaluate(row, context))
            .collect()
    }

    /// Compare two evaluated keys column by column under the declared
    /// directions. `NULL` sorts low in ascending columns.
    #[must_use]
    pub fn compare_keys(&self, left: &[Value], right: &[Value]) -> Ordering {
        for ((column, a), b) in self.columns.iter().zip(left).zip(right) {
            let ordering = compare_nullable(a, b, column.direction);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        Ordering::Equal
    }
}

impl fmt::Display for RowOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{:?} {}", column.expression, column.direction.label())?;
        }
        f.write_str(")")
    }
}
