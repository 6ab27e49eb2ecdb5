//! Module: db::row
//! Responsibility: the immutable row handle produced and consumed by cursors.
//! Does not own: field evaluation beyond positional access (see `db::expr`).
//! Boundary: rows are copy-on-read; a `Row` stays valid after its cursor advances.

#[cfg(test)]
mod tests;

use crate::{
    db::{hkey::HKey, schema::RowTypeRef},
    value::Value,
};
use std::{fmt, sync::Arc};

///
/// Row
///
/// Typed tuple plus the hkey of the stored row it came from (index and
/// table rows carry one; literal rows do not). Cloning is a reference
/// count bump.
///

#[derive(Clone)]
pub struct Row {
    inner: Arc<RowInner>,
}

struct RowInner {
    row_type: RowTypeRef,
    values: Vec<Value>,
    hkey: Option<HKey>,
}

impl Row {
    #[must_use]
    pub fn new(row_type: RowTypeRef, values: Vec<Value>, hkey: Option<HKey>) -> Self {
        debug_assert_eq!(
            values.len(),
            row_type.nfields(),
            "row of {row_type} built with the wrong field count"
        );

        Self {
            inner: Arc::new(RowInner {
                row_type,
                values,
                hkey,
            }),
        }
    }

    #[must_use]
    pub fn row_type(&self) -> &RowTypeRef {
        &self.inner.row_type
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.inner.values
    }

    #[must_use]
    pub fn value(&self, field: usize) -> Option<&Value> {
        self.inner.values.get(field)
    }

    #[must_use]
    pub fn nfields(&self) -> usize {
        self.inner.values.len()
    }

    #[must_use]
    pub fn hkey(&self) -> Option<&HKey> {
        self.inner.hkey.as_ref()
    }

    #[must_use]
    pub fn is_type(&self, row_type: &RowTypeRef) -> bool {
        self.inner.row_type == *row_type
    }

    /// True when this row's hkey is a strict ancestor of `other`'s.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        match (self.hkey(), other.hkey()) {
            (Some(mine), Some(theirs)) => mine.is_ancestor_of(theirs),
            _ => false,
        }
    }

    /// Same type and values under a different hkey.
    #[must_use]
    pub fn with_hkey(&self, hkey: Option<HKey>) -> Self {
        Self::new(self.inner.row_type.clone(), self.inner.values.clone(), hkey)
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.inner.row_type.name())?;
        for (i, value) in self.inner.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(")")?;
        if let Some(hkey) = &self.inner.hkey {
            write!(f, " @ {hkey}")?;
        }

        Ok(())
    }
}

///
/// ColumnSelector
///
/// Marks the leading columns of a row that a partial key binds, as used
/// by `jump` targets and index bounds.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ColumnSelector {
    leading: usize,
}

impl ColumnSelector {
    #[must_use]
    pub const fn leading(count: usize) -> Self {
        Self { leading: count }
    }

    #[must_use]
    pub const fn len(self) -> usize {
        self.leading
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.leading == 0
    }

    #[must_use]
    pub const fn selects(self, column: usize) -> bool {
        column < self.leading
    }

    /// The bound prefix of `row`, clipped to the row's width.
    #[must_use]
    pub fn select(self, row: &Row) -> &[Value] {
        let values = row.values();
        &values[..self.leading.min(values.len())]
    }
}
