use crate::{
    db::{
        direction::Direction,
        schema::Ordinal,
        store::{
            KeyRange, KeySpace, RawKey, StorageAdapter, StoredEntry, StoredRecord,
            TableStatusRegistry,
        },
    },
    error::InternalError,
};
use std::{
    collections::BTreeMap,
    ops::Bound,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use tracing::debug;

type Space = BTreeMap<RawKey, StoredRecord>;
type Spaces = BTreeMap<KeySpace, Space>;

#[derive(Debug, Default)]
struct StoreState {
    committed: Spaces,

    /// Copy of `committed` taken at `begin`, mutated in place and
    /// published on commit.
    working: Option<Spaces>,
    pending_counts: BTreeMap<Ordinal, i64>,
}

impl StoreState {
    fn view(&self) -> &Spaces {
        self.working.as_ref().unwrap_or(&self.committed)
    }
}

///
/// MemoryStore
///
/// In-memory `StorageAdapter` backed by one `BTreeMap` per key space.
/// The store has a single writer session: while a transaction is open,
/// every reader sees its working set, and rollback restores the last
/// committed state. Table status only counts committed rows.
///

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
    statistics: TableStatusRegistry,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>, InternalError> {
        self.state
            .read()
            .map_err(|_| InternalError::store_internal("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>, InternalError> {
        self.state
            .write()
            .map_err(|_| InternalError::store_internal("memory store lock poisoned"))
    }

    /// Number of entries in one key space, as seen by the current view.
    pub fn entry_count(&self, space: KeySpace) -> Result<usize, InternalError> {
        Ok(self.read()?.view().get(&space).map_or(0, BTreeMap::len))
    }
}

fn as_ref_bound(bound: &Bound<RawKey>) -> Bound<&RawKey> {
    match bound {
        Bound::Included(key) => Bound::Included(key),
        Bound::Excluded(key) => Bound::Excluded(key),
        Bound::Unbounded => Bound::Unbounded,
    }
}

fn working_space<'a>(
    state: &'a mut StoreState,
    space: KeySpace,
) -> Result<(&'a mut Space, &'a mut BTreeMap<Ordinal, i64>), InternalError> {
    let StoreState {
        working,
        pending_counts,
        ..
    } = state;
    let working = working
        .as_mut()
        .ok_or_else(|| InternalError::store_invariant("write outside of a transaction"))?;

    Ok((working.entry(space).or_default(), pending_counts))
}

impl StorageAdapter for MemoryStore {
    fn scan(
        &self,
        space: KeySpace,
        range: &KeyRange,
        direction: Direction,
        limit: usize,
    ) -> Result<Vec<StoredEntry>, InternalError> {
        if limit == 0 || range.is_empty() {
            return Ok(Vec::new());
        }

        let state = self.read()?;
        let Some(entries) = state.view().get(&space) else {
            return Ok(Vec::new());
        };

        let bounds = (as_ref_bound(&range.lower), as_ref_bound(&range.upper));
        let to_entry = |(key, record): (&RawKey, &StoredRecord)| StoredEntry {
            key: key.clone(),
            record: record.clone(),
        };
        let out = match direction {
            Direction::Asc => entries.range(bounds).take(limit).map(to_entry).collect(),
            Direction::Desc => entries
                .range(bounds)
                .rev()
                .take(limit)
                .map(to_entry)
                .collect(),
        };

        Ok(out)
    }

    fn get(&self, space: KeySpace, key: &RawKey) -> Result<Option<StoredRecord>, InternalError> {
        let state = self.read()?;

        Ok(state
            .view()
            .get(&space)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    fn put(&self, space: KeySpace, key: RawKey, record: StoredRecord) -> Result<(), InternalError> {
        let mut state = self.write()?;
        let (entries, pending_counts) = working_space(&mut state, space)?;

        let table = record.table;
        let replaced = entries.insert(key, record).is_some();
        if matches!(space, KeySpace::Group(_)) && !replaced {
            *pending_counts.entry(table).or_insert(0) += 1;
        }

        Ok(())
    }

    fn remove(&self, space: KeySpace, key: &RawKey) -> Result<bool, InternalError> {
        let mut state = self.write()?;
        let (entries, pending_counts) = working_space(&mut state, space)?;

        let Some(record) = entries.remove(key) else {
            return Ok(false);
        };
        if matches!(space, KeySpace::Group(_)) {
            *pending_counts.entry(record.table).or_insert(0) -= 1;
        }

        Ok(true)
    }

    fn begin_transaction(&self) -> Result<(), InternalError> {
        let mut state = self.write()?;
        if state.working.is_some() {
            return Err(InternalError::store_invariant("transaction already active"));
        }
        state.working = Some(state.committed.clone());
        debug!("memory store transaction started");

        Ok(())
    }

    fn commit_transaction(&self) -> Result<(), InternalError> {
        let mut state = self.write()?;
        let working = state
            .working
            .take()
            .ok_or_else(|| InternalError::store_invariant("commit without a transaction"))?;
        state.committed = working;
        let deltas = std::mem::take(&mut state.pending_counts);
        drop(state);

        for (table, delta) in deltas {
            self.statistics.apply_delta(table, delta)?;
        }
        debug!("memory store transaction committed");

        Ok(())
    }

    fn rollback_transaction(&self) -> Result<(), InternalError> {
        let mut state = self.write()?;
        if state.working.take().is_none() {
            return Err(InternalError::store_invariant("rollback without a transaction"));
        }
        state.pending_counts.clear();
        debug!("memory store transaction rolled back");

        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.state
            .read()
            .map(|state| state.working.is_some())
            .unwrap_or(false)
    }

    fn table_status(&self) -> &TableStatusRegistry {
        &self.statistics
    }
}
