use crate::{db::schema::Ordinal, error::InternalError};
use std::{collections::BTreeMap, sync::RwLock};
use tracing::trace;

///
/// TableStatusRegistry
///
/// Row counts per table, published when a transaction commits. Readers
/// get whatever was last published: counts can lag behind or run ahead
/// of what a concurrent transaction observes, and are never part of the
/// transactional row stream.
///

#[derive(Debug, Default)]
pub struct TableStatusRegistry {
    counts: RwLock<BTreeMap<Ordinal, u64>>,
}

impl TableStatusRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self, table: Ordinal) -> Result<u64, InternalError> {
        let counts = self
            .counts
            .read()
            .map_err(|_| InternalError::store_internal("table status registry poisoned"))?;
        let count = counts.get(&table).copied().unwrap_or(0);
        trace!(%table, count, "table status read");

        Ok(count)
    }

    /// Apply a signed change; counts saturate at zero.
    pub fn apply_delta(&self, table: Ordinal, delta: i64) -> Result<(), InternalError> {
        let mut counts = self
            .counts
            .write()
            .map_err(|_| InternalError::store_internal("table status registry poisoned"))?;
        let entry = counts.entry(table).or_insert(0);
        *entry = if delta.is_negative() {
            entry.saturating_sub(delta.unsigned_abs())
        } else {
            entry.saturating_add(delta.unsigned_abs())
        };

        Ok(())
    }
}
