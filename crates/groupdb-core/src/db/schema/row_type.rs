use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

///
/// Ordinal
///
/// Physical position of a table inside its group. Ordinals are assigned
/// depth-first, so sibling tables compare in storage order.
///

#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct Ordinal(u16);

impl Ordinal {
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }
}

///
/// RowTypeId
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RowTypeId(u32);

impl RowTypeId {
    pub(crate) const fn new(value: u32) -> Self {
        Self(value)
    }
}

///
/// IndexId
///

#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct IndexId(u16);

impl IndexId {
    pub(crate) const fn new(value: u16) -> Self {
        Self(value)
    }
}

///
/// HKeyLevel
///
/// One ancestor level of a table's hkey: the level's table and how many
/// primary-key values its segment carries.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HKeyLevel {
    pub ordinal: Ordinal,
    pub key_len: usize,
}

///
/// TableDescriptor
///

#[derive(Clone, Debug)]
pub struct TableDescriptor {
    pub ordinal: Ordinal,
    pub group: Ordinal,
    pub parent: Option<Ordinal>,
    pub depth: usize,
    pub columns: Vec<String>,
    pub primary_key: Vec<usize>,

    /// Columns holding the parent's primary key, in parent pk order.
    pub parent_join: Vec<usize>,

    /// Root-to-self hkey layout; `hkey_layout.len() == depth + 1`.
    pub hkey_layout: Vec<HKeyLevel>,
}

impl TableDescriptor {
    /// Ordinals on the path from the group root down to this table.
    pub fn path(&self) -> impl Iterator<Item = Ordinal> + '_ {
        self.hkey_layout.iter().map(|level| level.ordinal)
    }

    /// True when `other` is a strict ancestor of this table.
    #[must_use]
    pub fn has_ancestor(&self, other: Ordinal) -> bool {
        other != self.ordinal && self.path().any(|ordinal| ordinal == other)
    }

    #[must_use]
    pub fn hkey_value_count(&self) -> usize {
        self.hkey_layout.iter().map(|level| level.key_len).sum()
    }

    #[must_use]
    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }
}

///
/// IndexDescriptor
///
/// Index rows are laid out as the indexed key columns followed by every
/// hkey value of the indexed row, root level first.
///

#[derive(Clone, Debug)]
pub struct IndexDescriptor {
    pub id: IndexId,
    pub table: Ordinal,
    pub group: Ordinal,
    pub key_columns: Vec<usize>,
    pub hkey_layout: Vec<HKeyLevel>,
}

impl IndexDescriptor {
    #[must_use]
    pub const fn key_len(&self) -> usize {
        self.key_columns.len()
    }

    #[must_use]
    pub fn hkey_value_count(&self) -> usize {
        self.hkey_layout.iter().map(|level| level.key_len).sum()
    }
}

///
/// RowTypeKind
///
/// Closed family of row shapes that can flow through one cursor stream.
///

#[derive(Clone, Debug)]
pub enum RowTypeKind {
    Table(TableDescriptor),
    Index(IndexDescriptor),
    Flattened {
        parent: RowTypeRef,
        child: RowTypeRef,
    },
    Product {
        left: RowTypeRef,
        right: RowTypeRef,
        branch: Ordinal,
    },
    HKey {
        table: Ordinal,
    },
    Values,
}

pub type RowTypeRef = Arc<RowType>;

///
/// RowType
///
/// Immutable descriptor shared by every row of one shape. Equality and
/// hashing use the schema-assigned id only.
///

pub struct RowType {
    id: RowTypeId,
    name: String,
    nfields: usize,
    kind: RowTypeKind,
}

impl RowType {
    pub(crate) fn new(id: RowTypeId, name: String, nfields: usize, kind: RowTypeKind) -> Self {
        Self {
            id,
            name,
            nfields,
            kind,
        }
    }

    #[must_use]
    pub const fn id(&self) -> RowTypeId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn nfields(&self) -> usize {
        self.nfields
    }

    #[must_use]
    pub const fn kind(&self) -> &RowTypeKind {
        &self.kind
    }

    #[must_use]
    pub const fn table(&self) -> Option<&TableDescriptor> {
        match &self.kind {
            RowTypeKind::Table(table) => Some(table),
            _ => None,
        }
    }

    #[must_use]
    pub const fn index(&self) -> Option<&IndexDescriptor> {
        match &self.kind {
            RowTypeKind::Index(index) => Some(index),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_table(&self) -> bool {
        matches!(self.kind, RowTypeKind::Table(_))
    }

    #[must_use]
    pub const fn is_index(&self) -> bool {
        matches!(self.kind, RowTypeKind::Index(_))
    }

    /// Table whose hkey rows of this type carry, if any.
    #[must_use]
    pub fn hkey_table(&self) -> Option<Ordinal> {
        match &self.kind {
            RowTypeKind::Table(table) => Some(table.ordinal),
            RowTypeKind::Index(index) => Some(index.table),
            RowTypeKind::Flattened { child, .. } => child.hkey_table(),
            RowTypeKind::Product { left, .. } => left.hkey_table(),
            RowTypeKind::HKey { table } => Some(*table),
            RowTypeKind::Values => None,
        }
    }

    /// True when `other` is this type, or (for flattened and product
    /// types) one of the types it was assembled from.
    #[must_use]
    pub fn contains_type(&self, other: &RowType) -> bool {
        if self == other {
            return true;
        }

        match &self.kind {
            RowTypeKind::Flattened { parent, child } => {
                parent.contains_type(other) || child.contains_type(other)
            }
            RowTypeKind::Product { left, right, .. } => {
                left.contains_type(other) || right.contains_type(other)
            }
            _ => false,
        }
    }
}

impl PartialEq for RowType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RowType {}

impl Hash for RowType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for RowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

impl fmt::Display for RowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
