//! Module: db::index_range
//! Responsibility: validated index key ranges and their raw storage envelope.
//! Does not own: iteration (see `db::executor::scan::index`).
//! Boundary: malformed ranges fail here, at construction, never at scan time.

use crate::{
    db::{
        hkey::codec,
        row::{ColumnSelector, Row},
        schema::RowTypeRef,
        store::{KeyRange, RawKey},
    },
    error::InternalError,
    value::{Value, canonical_cmp},
};
use std::{cmp::Ordering, fmt, ops::Bound};

///
/// NullMode
///
/// How a `NULL` in a bound's last column is read: as the value `NULL`
/// (`IsNull`) or as "this column is unrestricted" (`Unbounded`).
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum NullMode {
    #[default]
    IsNull,
    Unbounded,
}

///
/// IndexBound
///

#[derive(Clone, Debug)]
pub struct IndexBound {
    values: Vec<Value>,
    null_mode: NullMode,
}

impl IndexBound {
    #[must_use]
    pub const fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            null_mode: NullMode::IsNull,
        }
    }

    /// Bound on the leading `selector` columns of `row`.
    #[must_use]
    pub fn from_row(row: &Row, selector: ColumnSelector) -> Self {
        Self::new(selector.select(row).to_vec())
    }

    #[must_use]
    pub const fn with_null_mode(mut self, null_mode: NullMode) -> Self {
        self.null_mode = null_mode;
        self
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub const fn null_mode(&self) -> NullMode {
        self.null_mode
    }

    fn has_unbounded_tail(&self) -> bool {
        self.null_mode == NullMode::Unbounded && self.values.last().is_some_and(Value::is_null)
    }

    fn ends_with_null(&self) -> bool {
        self.values.last().is_some_and(Value::is_null)
    }

    /// Columns that actually restrict the range.
    fn effective(&self) -> &[Value] {
        if self.has_unbounded_tail() {
            &self.values[..self.values.len() - 1]
        } else {
            &self.values
        }
    }

    fn encoded_prefix(&self) -> Vec<u8> {
        let mut out = Vec::new();
        codec::encode_values(self.effective(), &mut out);
        out
    }

    fn compare_key(&self, key: &[Value]) -> Ordering {
        for (key_value, bound_value) in key.iter().zip(self.effective()) {
            let ordering = canonical_cmp(key_value, bound_value);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        Ordering::Equal
    }
}

impl fmt::Display for IndexBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(")")
    }
}

///
/// IndexKeyRange
///
/// Low/high partial keys over the leading columns of an index row plus
/// their inclusiveness. Either side may be absent. Bounds are expressed
/// in ascending index order regardless of scan direction.
///

#[derive(Clone, Debug)]
pub struct IndexKeyRange {
    index: RowTypeRef,
    lo: Option<IndexBound>,
    lo_inclusive: bool,
    hi: Option<IndexBound>,
    hi_inclusive: bool,
}

impl IndexKeyRange {
    pub fn unbounded(index: &RowTypeRef) -> Result<Self, InternalError> {
        Self::bounded(index, None, false, None, false)
    }

    pub fn starting_at(
        index: &RowTypeRef,
        lo: IndexBound,
        inclusive: bool,
    ) -> Result<Self, InternalError> {
        Self::bounded(index, Some(lo), inclusive, None, false)
    }

    pub fn ending_at(
        index: &RowTypeRef,
        hi: IndexBound,
        inclusive: bool,
    ) -> Result<Self, InternalError> {
        Self::bounded(index, None, false, Some(hi), inclusive)
    }

    /// Inclusive equality range on the leading columns.
    pub fn equal_to(index: &RowTypeRef, key: Vec<Value>) -> Result<Self, InternalError> {
        let bound = IndexBound::new(key);
        Self::bounded(index, Some(bound.clone()), true, Some(bound), true)
    }

    pub fn bounded(
        index: &RowTypeRef,
        lo: Option<IndexBound>,
        lo_inclusive: bool,
        hi: Option<IndexBound>,
        hi_inclusive: bool,
    ) -> Result<Self, InternalError> {
        let range = Self {
            index: index.clone(),
            lo,
            lo_inclusive,
            hi,
            hi_inclusive,
        };
        range.validate()?;

        Ok(range)
    }

    fn validate(&self) -> Result<(), InternalError> {
        if !self.index.is_index() {
            return Err(InternalError::plan_invalid(format!(
                "index key range requires an index row type, got {}",
                self.index
            )));
        }

        for bound in self.lo.iter().chain(&self.hi) {
            if bound.column_count() > self.index.nfields() {
                return Err(InternalError::plan_invalid(format!(
                    "bound {bound} has more columns than index {}",
                    self.index
                )));
            }
            if bound.null_mode == NullMode::Unbounded {
                let leading = &bound.values[..bound.values.len().saturating_sub(1)];
                if leading.iter().any(Value::is_null) {
                    return Err(InternalError::plan_invalid(format!(
                        "bound {bound}: an unbounded null may only be the last bound column"
                    )));
                }
            }
        }

        // An inclusive upper bound of NULL would have to both restrict and
        // not restrict the column, unless the range is exactly IS NULL.
        if let Some(hi) = &self.hi
            && self.hi_inclusive
            && hi.null_mode == NullMode::IsNull
            && hi.ends_with_null()
        {
            let is_null_range = self.lo_inclusive
                && self
                    .lo
                    .as_ref()
                    .is_some_and(|lo| lo.null_mode == NullMode::IsNull && lo.ends_with_null());
            if !is_null_range {
                return Err(InternalError::plan_invalid(format!(
                    "bad null ordering: inclusive upper bound {hi} on index {}",
                    self.index
                )));
            }
        }

        Ok(())
    }

    #[must_use]
    pub const fn index(&self) -> &RowTypeRef {
        &self.index
    }

    #[must_use]
    pub const fn lo(&self) -> Option<&IndexBound> {
        self.lo.as_ref()
    }

    #[must_use]
    pub const fn hi(&self) -> Option<&IndexBound> {
        self.hi.as_ref()
    }

    /// True when `key` sorts below the low bound.
    #[must_use]
    pub fn below_lo(&self, key: &[Value]) -> bool {
        self.lo.as_ref().is_some_and(|lo| match lo.compare_key(key) {
            Ordering::Less => true,
            Ordering::Equal => !self.lo_inclusive,
            Ordering::Greater => false,
        })
    }

    /// True when `key` sorts above the high bound.
    #[must_use]
    pub fn above_hi(&self, key: &[Value]) -> bool {
        self.hi.as_ref().is_some_and(|hi| match hi.compare_key(key) {
            Ordering::Greater => true,
            Ordering::Equal => !self.hi_inclusive,
            Ordering::Less => false,
        })
    }

    #[must_use]
    pub fn contains(&self, key: &[Value]) -> bool {
        !self.below_lo(key) && !self.above_hi(key)
    }

    /// Same range with a replaced, inclusive low bound.
    #[must_use]
    pub(crate) fn restart_at_lo(&self, lo: IndexBound) -> Self {
        Self {
            lo: Some(lo),
            lo_inclusive: true,
            ..self.clone()
        }
    }

    /// Same range with a replaced, inclusive high bound.
    #[must_use]
    pub(crate) fn restart_at_hi(&self, hi: IndexBound) -> Self {
        Self {
            hi: Some(hi),
            hi_inclusive: true,
            ..self.clone()
        }
    }

    /// Conservative raw-key envelope; exact bounds are applied per row.
    #[must_use]
    pub(crate) fn raw_range(&self) -> KeyRange {
        let lower = self
            .lo
            .as_ref()
            .map(IndexBound::encoded_prefix)
            .filter(|prefix| !prefix.is_empty())
            .map_or(Bound::Unbounded, |prefix| Bound::Included(RawKey::new(prefix)));
        let upper = self
            .hi
            .as_ref()
            .map(IndexBound::encoded_prefix)
            .filter(|prefix| !prefix.is_empty())
            .map_or(Bound::Unbounded, |prefix| {
                Bound::Included(RawKey::new(codec::prefix_upper_bound(&prefix)))
            });

        KeyRange::new(lower, upper)
    }
}

impl fmt::Display for IndexKeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.lo_inclusive { "[" } else { "(" };
        let close = if self.hi_inclusive { "]" } else { ")" };
        let lo = self.lo.as_ref().map_or_else(|| "-inf".to_string(), ToString::to_string);
        let hi = self.hi.as_ref().map_or_else(|| "+inf".to_string(), ToString::to_string);

        write!(f, "{}{open}{lo}, {hi}{close}", self.index)
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture_schema;

    fn order_salesman_index() -> RowTypeRef {
        fixture_schema()
            .index("order_salesman")
            .expect("fixture index should exist")
    }

    fn key(values: &[Value]) -> Vec<Value> {
        values.to_vec()
    }

    #[test]
    fn inclusive_range_contains_its_endpoints() {
        let index = order_salesman_index();
        let range = IndexKeyRange::bounded(
            &index,
            Some(IndexBound::new(vec!["jack".into()])),
            true,
            Some(IndexBound::new(vec!["tom".into()])),
            true,
        )
        .expect("valid range should build");

        assert!(range.contains(&key(&["jack".into(), Value::Int(1), Value::Int(11)])));
        assert!(range.contains(&key(&["tom".into(), Value::Int(2), Value::Int(21)])));
        assert!(range.below_lo(&key(&["adam".into(), Value::Int(1), Value::Int(12)])));
        assert!(range.above_hi(&key(&["zoe".into(), Value::Int(1), Value::Int(12)])));
    }

    #[test]
    fn exclusive_bounds_reject_equal_prefixes() {
        let index = order_salesman_index();
        let range = IndexKeyRange::bounded(
            &index,
            Some(IndexBound::new(vec!["jack".into()])),
            false,
            Some(IndexBound::new(vec!["tom".into()])),
            false,
        )
        .expect("valid range should build");

        assert!(range.below_lo(&key(&["jack".into(), Value::Int(1), Value::Int(11)])));
        assert!(range.above_hi(&key(&["tom".into(), Value::Int(1), Value::Int(11)])));
        assert!(range.contains(&key(&["kim".into(), Value::Int(1), Value::Int(11)])));
    }

    #[test]
    fn inclusive_null_upper_bound_is_rejected_at_construction() {
        let index = order_salesman_index();
        let err = IndexKeyRange::ending_at(&index, IndexBound::new(vec![Value::Null]), true)
            .expect_err("<= NULL should be rejected");

        assert!(err.is_invalid_argument());
        assert!(err.message.contains("bad null ordering"));
    }

    #[test]
    fn is_null_equality_range_is_accepted() {
        let index = order_salesman_index();
        let range = IndexKeyRange::equal_to(&index, vec![Value::Null])
            .expect("IS NULL range should build");

        assert!(range.contains(&key(&[Value::Null, Value::Int(1), Value::Int(11)])));
        assert!(!range.contains(&key(&["jack".into(), Value::Int(1), Value::Int(11)])));
    }

    #[test]
    fn unbounded_null_only_allowed_in_last_column() {
        let index = order_salesman_index();
        let bad = IndexBound::new(vec![Value::Null, Value::Int(1)]).with_null_mode(NullMode::Unbounded);
        let err = IndexKeyRange::starting_at(&index, bad, true)
            .expect_err("leading unbounded null should be rejected");
        assert!(err.is_invalid_argument());

        let good = IndexBound::new(vec!["jack".into(), Value::Null]).with_null_mode(NullMode::Unbounded);
        let range = IndexKeyRange::ending_at(&index, good, true)
            .expect("trailing unbounded null should be accepted");
        assert!(range.contains(&key(&["jack".into(), Value::Int(9), Value::Int(99)])));
        assert!(range.above_hi(&key(&["kim".into(), Value::Int(1), Value::Int(11)])));
    }

    #[test]
    fn range_over_table_type_is_rejected() {
        let table = fixture_schema().table("customer").expect("fixture table");
        let err = IndexKeyRange::unbounded(&table).expect_err("table type is not an index");

        assert!(err.is_invalid_argument());
    }
}
