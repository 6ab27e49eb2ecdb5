//! Module: db::schema
//! Responsibility: row-type descriptors, group layout and derived-type minting.
//! Does not own: DDL or catalog persistence; schemas are built once and shared.
//! Boundary: operators receive `RowTypeRef`s and never mutate them.

mod builder;
mod row_type;


pub use builder::SchemaBuilder;
pub use row_type::{
    HKeyLevel, IndexDescriptor, IndexId, Ordinal, RowType, RowTypeId, RowTypeKind, RowTypeRef,
    TableDescriptor,
};

use crate::error::InternalError;
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering as AtomicOrdering},
    },
};

pub type GroupRef = Arc<Group>;

///
/// Group
///
/// A root table and all of its descendants, stored together in hkey order.
///

#[derive(Debug)]
pub struct Group {
    name: String,
    root: Ordinal,
    tables: Vec<RowTypeRef>,
}

impl Group {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn root(&self) -> Ordinal {
        self.root
    }

    /// Table types of this group in ordinal order.
    #[must_use]
    pub fn tables(&self) -> &[RowTypeRef] {
        &self.tables
    }

    #[must_use]
    pub fn table_type(&self, ordinal: Ordinal) -> Option<&RowTypeRef> {
        self.tables
            .iter()
            .find(|row_type| row_type.hkey_table() == Some(ordinal))
    }

    #[must_use]
    pub fn contains(&self, ordinal: Ordinal) -> bool {
        self.table_type(ordinal).is_some()
    }

    fn descriptor(&self, ordinal: Ordinal) -> Option<&TableDescriptor> {
        self.table_type(ordinal).and_then(|row_type| row_type.table())
    }

    #[must_use]
    pub fn depth(&self, ordinal: Ordinal) -> Option<usize> {
        self.descriptor(ordinal).map(|table| table.depth)
    }

    /// True when `ancestor` is a strict ancestor of `descendant`.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: Ordinal, descendant: Ordinal) -> bool {
        self.descriptor(descendant)
            .is_some_and(|table| table.has_ancestor(ancestor))
    }

    #[must_use]
    pub fn is_parent(&self, parent: Ordinal, child: Ordinal) -> bool {
        self.descriptor(child)
            .is_some_and(|table| table.parent == Some(parent))
    }

    /// Deepest table that is an ancestor of (or equal to) both tables.
    #[must_use]
    pub fn common_ancestor(&self, left: Ordinal, right: Ordinal) -> Option<Ordinal> {
        let left = self.descriptor(left)?;
        let right = self.descriptor(right)?;

        left.path()
            .zip(right.path())
            .take_while(|(a, b)| a == b)
            .last()
            .map(|(ordinal, _)| ordinal)
    }

    /// Ancestor of `table` sitting directly below `ancestor`.
    #[must_use]
    pub fn child_on_path(&self, ancestor: Ordinal, table: Ordinal) -> Option<Ordinal> {
        let depth = self.depth(ancestor)?;
        let table = self.descriptor(table)?;

        table.hkey_layout.get(depth + 1).map(|level| level.ordinal)
    }
}

///
/// DerivedKey
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
enum DerivedKey {
    Flattened(RowTypeId, RowTypeId),
    Product(RowTypeId, RowTypeId, Ordinal),
    HKey(Ordinal),
}

///
/// Schema
///
/// Immutable table and index catalog plus a cache of derived row types
/// minted while plans are built.
///

#[derive(Debug)]
pub struct Schema {
    groups: Vec<GroupRef>,
    tables: Vec<RowTypeRef>,
    indexes: Vec<RowTypeRef>,
    next_type_id: AtomicU32,
    derived: Mutex<HashMap<DerivedKey, RowTypeRef>>,
}

impl Schema {
    pub(crate) fn new(
        groups: Vec<GroupRef>,
        tables: Vec<RowTypeRef>,
        indexes: Vec<RowTypeRef>,
        next_type_id: u32,
    ) -> Self {
        Self {
            groups,
            tables,
            indexes,
            next_type_id: AtomicU32::new(next_type_id),
            derived: Mutex::new(HashMap::new()),
        }
    }

    pub fn table(&self, name: &str) -> Result<RowTypeRef, InternalError> {
        self.tables
            .iter()
            .find(|row_type| row_type.name() == name)
            .cloned()
            .ok_or_else(|| InternalError::plan_invalid(format!("unknown table: {name}")))
    }

    pub fn index(&self, name: &str) -> Result<RowTypeRef, InternalError> {
        self.indexes
            .iter()
            .find(|row_type| row_type.name() == name)
            .cloned()
            .ok_or_else(|| InternalError::plan_invalid(format!("unknown index: {name}")))
    }

    pub fn group(&self, name: &str) -> Result<GroupRef, InternalError> {
        self.groups
            .iter()
            .find(|group| group.name() == name)
            .cloned()
            .ok_or_else(|| InternalError::plan_invalid(format!("unknown group: {name}")))
    }

    #[must_use]
    pub fn group_of(&self, table: Ordinal) -> Option<GroupRef> {
        self.groups.iter().find(|group| group.contains(table)).cloned()
    }

    #[must_use]
    pub fn table_by_ordinal(&self, ordinal: Ordinal) -> Option<&RowTypeRef> {
        self.tables
            .iter()
            .find(|row_type| row_type.hkey_table() == Some(ordinal))
    }

    #[must_use]
    pub fn indexes_on(&self, table: Ordinal) -> Vec<RowTypeRef> {
        self.indexes
            .iter()
            .filter(|row_type| row_type.hkey_table() == Some(table))
            .cloned()
            .collect()
    }

    fn mint_id(&self) -> RowTypeId {
        RowTypeId::new(self.next_type_id.fetch_add(1, AtomicOrdering::Relaxed))
    }

    fn derived_or_insert(
        &self,
        key: DerivedKey,
        build: impl FnOnce(RowTypeId) -> RowType,
    ) -> Result<RowTypeRef, InternalError> {
        let mut derived = self
            .derived
            .lock()
            .map_err(|_| InternalError::executor_internal("schema derived-type cache poisoned"))?;

        if let Some(existing) = derived.get(&key) {
            return Ok(existing.clone());
        }

        let row_type = Arc::new(build(self.mint_id()));
        derived.insert(key, row_type.clone());

        Ok(row_type)
    }

    /// Row type produced by flattening `parent` rows with rows of their
    /// immediate child table.
    pub fn flattened_type(
        &self,
        parent: &RowTypeRef,
        child: &RowTypeRef,
    ) -> Result<RowTypeRef, InternalError> {
        let (Some(parent_table), Some(child_table)) = (parent.hkey_table(), child.hkey_table())
        else {
            return Err(InternalError::plan_invalid(format!(
                "flatten requires hkey-bearing types, got {parent} and {child}"
            )));
        };
        let group = self.group_of(child_table).ok_or_else(|| {
            InternalError::plan_invalid(format!("{child} does not belong to a group"))
        })?;
        if !group.is_parent(parent_table, child_table) {
            return Err(InternalError::plan_invalid(format!(
                "{parent} is not the parent of {child}"
            )));
        }

        let key = DerivedKey::Flattened(parent.id(), child.id());
        self.derived_or_insert(key, |id| {
            RowType::new(
                id,
                format!("flatten({parent}, {child})"),
                parent.nfields() + child.nfields(),
                RowTypeKind::Flattened {
                    parent: parent.clone(),
                    child: child.clone(),
                },
            )
        })
    }

    /// Row type produced by crossing two branches that share `branch` as
    /// their closest common table.
    pub fn product_type(
        &self,
        left: &RowTypeRef,
        right: &RowTypeRef,
        branch: Ordinal,
    ) -> Result<RowTypeRef, InternalError> {
        let (Some(left_table), Some(right_table)) = (left.hkey_table(), right.hkey_table()) else {
            return Err(InternalError::plan_invalid(format!(
                "product requires hkey-bearing types, got {left} and {right}"
            )));
        };
        let group = self.group_of(branch).ok_or_else(|| {
            InternalError::plan_invalid(format!("branch table {branch} does not exist"))
        })?;
        let branch_is_ancestor = |table: Ordinal| table == branch || group.is_ancestor(branch, table);
        if !branch_is_ancestor(left_table) || !branch_is_ancestor(right_table) {
            return Err(InternalError::plan_invalid(format!(
                "{left} and {right} do not share branch table {branch}"
            )));
        }

        let key = DerivedKey::Product(left.id(), right.id(), branch);
        self.derived_or_insert(key, |id| {
            RowType::new(
                id,
                format!("product({left}, {right})"),
                left.nfields() + right.nfields(),
                RowTypeKind::Product {
                    left: left.clone(),
                    right: right.clone(),
                    branch,
                },
            )
        })
    }

    /// Row type whose rows carry only an hkey of `table`; fields are the
    /// hkey values.
    pub fn hkey_type(&self, table: Ordinal) -> Result<RowTypeRef, InternalError> {
        let descriptor = self
            .table_by_ordinal(table)
            .and_then(|row_type| row_type.table())
            .ok_or_else(|| InternalError::plan_invalid(format!("unknown table ordinal {table}")))?;
        let nfields = descriptor.hkey_value_count();
        let name = format!("hkey({})", self.table_by_ordinal(table).map_or("?", |t| t.name()));

        self.derived_or_insert(DerivedKey::HKey(table), |id| {
            RowType::new(id, name, nfields, RowTypeKind::HKey { table })
        })
    }

    /// Fresh row type for literal rows.
    #[must_use]
    pub fn values_type(&self, name: &str, nfields: usize) -> RowTypeRef {
        Arc::new(RowType::new(
            self.mint_id(),
            name.to_string(),
            nfields,
            RowTypeKind::Values,
        ))
    }
}
