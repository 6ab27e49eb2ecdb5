//! Module: db::write
//! Responsibility: turn table-row mutations into group, primary-key and index entries.
//! Does not own: transaction boundaries; callers begin and commit around writes.
//! Boundary: the only code that computes hkeys for new rows.

#[cfg(test)]
mod tests;

use crate::{
    db::{
        hkey::{HKey, codec},
        row::Row,
        schema::{IndexDescriptor, RowTypeRef, Schema, TableDescriptor},
        store::{KeySpace, RawKey, StorageAdapter, StoredRecord},
    },
    error::InternalError,
    value::Value,
};
use tracing::trace;

///
/// RowWriter
///
/// Maintains every physical entry of a table row: the group record keyed
/// by hkey, the primary-key entry used to resolve children's parents,
/// and one entry per secondary index.
///

pub struct RowWriter<'a> {
    schema: &'a Schema,
    store: &'a dyn StorageAdapter,
}

impl<'a> RowWriter<'a> {
    #[must_use]
    pub const fn new(schema: &'a Schema, store: &'a dyn StorageAdapter) -> Self {
        Self { schema, store }
    }

    pub fn insert(&self, row_type: &RowTypeRef, values: Vec<Value>) -> Result<Row, InternalError> {
        let table = table_descriptor(row_type)?;
        check_width(row_type, &values)?;

        let pk_key = primary_key(table, &values);
        if self
            .store
            .get(KeySpace::PrimaryKey(table.ordinal), &pk_key)?
            .is_some()
        {
            return Err(InternalError::store_conflict(
                row_type.name(),
                key_values(table, &values),
            ));
        }

        let hkey = self.compute_hkey(table, &values)?;
        let record = StoredRecord {
            table: table.ordinal,
            hkey: hkey.clone(),
            values: values.clone(),
        };
        self.store.put(
            KeySpace::Group(table.group),
            RawKey::from_hkey(&hkey),
            record.clone(),
        )?;
        self.store
            .put(KeySpace::PrimaryKey(table.ordinal), pk_key, record)?;
        self.write_index_entries(table, &values, &hkey)?;
        trace!(table = row_type.name(), %hkey, "row inserted");

        Ok(Row::new(row_type.clone(), values, Some(hkey)))
    }

    /// Remove a stored table row; returns whether it was present.
    pub fn delete(&self, row: &Row) -> Result<bool, InternalError> {
        let table = table_descriptor(row.row_type())?;
        let hkey = row.hkey().ok_or_else(|| {
            InternalError::executor_invariant(format!("cannot delete {row:?} without an hkey"))
        })?;

        let existed = self
            .store
            .remove(KeySpace::Group(table.group), &RawKey::from_hkey(hkey))?;
        if !existed {
            return Ok(false);
        }
        self.store.remove(
            KeySpace::PrimaryKey(table.ordinal),
            &primary_key(table, row.values()),
        )?;
        for index in self.schema.indexes_on(table.ordinal) {
            if let Some(index) = index.index() {
                let (key, _) = index_entry(index, row.values(), hkey);
                self.store.remove(KeySpace::Index(index.id), &key)?;
            }
        }
        trace!(table = row.row_type().name(), %hkey, "row deleted");

        Ok(true)
    }

    /// Replace a stored row's values. A changed primary key or parent
    /// reference moves the row to a new hkey.
    pub fn update(&self, old: &Row, values: Vec<Value>) -> Result<Row, InternalError> {
        let row_type = old.row_type().clone();
        let table = table_descriptor(&row_type)?;
        check_width(&row_type, &values)?;

        let moved = table
            .primary_key
            .iter()
            .chain(&table.parent_join)
            .any(|&column| old.values().get(column) != values.get(column));
        if moved {
            self.delete(old)?;
            return self.insert(&row_type, values);
        }

        let hkey = old.hkey().cloned().ok_or_else(|| {
            InternalError::executor_invariant(format!("cannot update {old:?} without an hkey"))
        })?;
        for index in self.schema.indexes_on(table.ordinal) {
            if let Some(index) = index.index() {
                let (key, _) = index_entry(index, old.values(), &hkey);
                self.store.remove(KeySpace::Index(index.id), &key)?;
            }
        }

        let record = StoredRecord {
            table: table.ordinal,
            hkey: hkey.clone(),
            values: values.clone(),
        };
        self.store.put(
            KeySpace::Group(table.group),
            RawKey::from_hkey(&hkey),
            record.clone(),
        )?;
        self.store.put(
            KeySpace::PrimaryKey(table.ordinal),
            primary_key(table, &values),
            record,
        )?;
        self.write_index_entries(table, &values, &hkey)?;

        Ok(Row::new(row_type, values, Some(hkey)))
    }

    /// Resolve the parent through its primary key. A missing parent yields
    /// an orphan hkey: the parent segment comes from the join columns and
    /// higher levels are null.
    pub fn compute_hkey(
        &self,
        table: &TableDescriptor,
        values: &[Value],
    ) -> Result<HKey, InternalError> {
        let own_key = key_values(table, values);
        let Some(parent_ordinal) = table.parent else {
            return Ok(HKey::root(table.ordinal, own_key));
        };

        let join_values: Vec<Value> = table
            .parent_join
            .iter()
            .map(|&column| values[column].clone())
            .collect();
        let mut encoded = Vec::new();
        codec::encode_values(&join_values, &mut encoded);

        let parent = self
            .store
            .get(KeySpace::PrimaryKey(parent_ordinal), &RawKey::new(encoded))?;
        if let Some(parent) = parent {
            return Ok(parent.hkey.child(table.ordinal, own_key));
        }

        let mut orphan = HKey::default();
        for level in &table.hkey_layout[..table.depth - 1] {
            orphan = orphan
                .extend_with_ordinal(level.ordinal)
                .extend_with_nulls(level.key_len);
        }
        let orphan = orphan
            .child(parent_ordinal, join_values)
            .child(table.ordinal, own_key);
        trace!(table = %table.ordinal, hkey = %orphan, "orphan row");

        Ok(orphan)
    }

    fn write_index_entries(
        &self,
        table: &TableDescriptor,
        values: &[Value],
        hkey: &HKey,
    ) -> Result<(), InternalError> {
        for index in self.schema.indexes_on(table.ordinal) {
            if let Some(index) = index.index() {
                let (key, index_values) = index_entry(index, values, hkey);
                self.store.put(
                    KeySpace::Index(index.id),
                    key,
                    StoredRecord {
                        table: table.ordinal,
                        hkey: hkey.clone(),
                        values: index_values,
                    },
                )?;
            }
        }

        Ok(())
    }
}

fn table_descriptor(row_type: &RowTypeRef) -> Result<&TableDescriptor, InternalError> {
    row_type.table().ok_or_else(|| {
        InternalError::plan_invalid(format!("{row_type} is not a table row type"))
    })
}

fn check_width(row_type: &RowTypeRef, values: &[Value]) -> Result<(), InternalError> {
    if values.len() != row_type.nfields() {
        return Err(InternalError::plan_invalid(format!(
            "{row_type} expects {} values, got {}",
            row_type.nfields(),
            values.len()
        )));
    }

    Ok(())
}

fn key_values(table: &TableDescriptor, values: &[Value]) -> Vec<Value> {
    table
        .primary_key
        .iter()
        .map(|&column| values[column].clone())
        .collect()
}

fn primary_key(table: &TableDescriptor, values: &[Value]) -> RawKey {
    let mut encoded = Vec::new();
    codec::encode_values(&key_values(table, values), &mut encoded);
    RawKey::new(encoded)
}

/// Index row (key columns then hkey values) and its raw key. The raw key
/// encodes the index row values in order.
pub(crate) fn index_entry(
    index: &IndexDescriptor,
    values: &[Value],
    hkey: &HKey,
) -> (RawKey, Vec<Value>) {
    let mut index_values: Vec<Value> = index
        .key_columns
        .iter()
        .map(|&column| values[column].clone())
        .collect();
    index_values.extend(hkey.values().cloned());

    let mut encoded = Vec::new();
    codec::encode_values(&index_values, &mut encoded);

    (RawKey::new(encoded), index_values)
}
