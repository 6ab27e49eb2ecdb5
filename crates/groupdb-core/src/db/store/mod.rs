//! Module: db::store
//! Responsibility: the storage capability consumed by scans, lookups and writes.
//! Does not own: page layout, locking or durability of a real engine.
//! Boundary: everything above this module sees ordered byte keys and typed records.

mod memory;
mod stats;


pub use memory::MemoryStore;
pub use stats::TableStatusRegistry;

use crate::{
    db::{
        direction::Direction,
        hkey::HKey,
        schema::{IndexId, Ordinal},
    },
    error::InternalError,
    value::Value,
};
use derive_more::Deref;
use std::{cmp::Ordering, fmt, ops::Bound};

///
/// RawKey
///
/// Encoded, order-preserving physical key.
///

#[derive(Clone, Debug, Default, Deref, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RawKey(Vec<u8>);

impl RawKey {
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn from_hkey(hkey: &HKey) -> Self {
        Self(hkey.encode())
    }
}

///
/// KeySpace
///
/// Independent ordered key spaces: one per group, one per table's
/// primary key, one per index.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum KeySpace {
    Group(Ordinal),
    PrimaryKey(Ordinal),
    Index(IndexId),
}

impl fmt::Display for KeySpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group(root) => write!(f, "group:{root}"),
            Self::PrimaryKey(table) => write!(f, "pk:{table}"),
            Self::Index(index) => write!(f, "index:{index}"),
        }
    }
}

///
/// StoredRecord
///
/// Typed payload stored under a raw key. For group and primary-key
/// spaces `values` are the table row; for index spaces they are the
/// index row (key columns then hkey values).
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoredRecord {
    pub table: Ordinal,
    pub hkey: HKey,
    pub values: Vec<Value>,
}

///
/// StoredEntry
///

#[derive(Clone, Debug)]
pub struct StoredEntry {
    pub key: RawKey,
    pub record: StoredRecord,
}

///
/// KeyRange
///
/// Raw-key interval for one storage scan.
///

#[derive(Clone, Debug)]
pub struct KeyRange {
    pub lower: Bound<RawKey>,
    pub upper: Bound<RawKey>,
}

impl KeyRange {
    #[must_use]
    pub const fn full() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    #[must_use]
    pub const fn new(lower: Bound<RawKey>, upper: Bound<RawKey>) -> Self {
        Self { lower, upper }
    }

    /// True when no key can satisfy both bounds.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let (Some((lower, lower_inclusive)), Some((upper, upper_inclusive))) =
            (bound_parts(&self.lower), bound_parts(&self.upper))
        else {
            return false;
        };

        match lower.cmp(upper) {
            Ordering::Greater => true,
            Ordering::Equal => !(lower_inclusive && upper_inclusive),
            Ordering::Less => false,
        }
    }

    /// The remainder of this range after `key` has been consumed while
    /// scanning in `direction`.
    #[must_use]
    pub fn resume_after(&self, key: &RawKey, direction: Direction) -> Self {
        match direction {
            Direction::Asc => Self::new(Bound::Excluded(key.clone()), self.upper.clone()),
            Direction::Desc => Self::new(self.lower.clone(), Bound::Excluded(key.clone())),
        }
    }
}

const fn bound_parts(bound: &Bound<RawKey>) -> Option<(&RawKey, bool)> {
    match bound {
        Bound::Included(key) => Some((key, true)),
        Bound::Excluded(key) => Some((key, false)),
        Bound::Unbounded => None,
    }
}

///
/// StorageAdapter
///
/// Ordered key-value capability behind every physical operator. Reads may
/// run concurrently from lookahead tasks; writes happen only inside a
/// transaction opened by the caller driving the plan.
///

pub trait StorageAdapter: Send + Sync + fmt::Debug {
    /// Up to `limit` entries of `range` in `direction` order.
    fn scan(
        &self,
        space: KeySpace,
        range: &KeyRange,
        direction: Direction,
        limit: usize,
    ) -> Result<Vec<StoredEntry>, InternalError>;

    fn get(&self, space: KeySpace, key: &RawKey) -> Result<Option<StoredRecord>, InternalError>;

    fn put(&self, space: KeySpace, key: RawKey, record: StoredRecord) -> Result<(), InternalError>;

    /// Remove `key`, returning whether it was present.
    fn remove(&self, space: KeySpace, key: &RawKey) -> Result<bool, InternalError>;

    fn begin_transaction(&self) -> Result<(), InternalError>;

    fn commit_transaction(&self) -> Result<(), InternalError>;

    fn rollback_transaction(&self) -> Result<(), InternalError>;

    fn in_transaction(&self) -> bool;

    /// Maintained per-table row counts; weakly consistent.
    fn table_status(&self) -> &TableStatusRegistry;
}
