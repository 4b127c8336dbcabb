//! In-process store, used by tests and by embedders without a database

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use ordinal_api::{OrderedRecord, Scope};
use ordinal_core::{compare_entities, sort_entities};

use crate::storage::backend::{OrderStore, ScopeTxn};
use crate::storage::types::{Result, StoreError};

#[derive(Default)]
struct MemoryState {
    /// Vec order is insertion order, which doubles as the fallback order
    scopes: HashMap<Scope, Vec<OrderedRecord>>,
    key_writes: usize,
}

/// Mutex-guarded map of scopes.
///
/// Units write in place and keep an undo log: previous keys of rewritten rows
/// plus the row count before any insert. A failed unit (and every `read`)
/// replays the log, so the cost of a unit is proportional to what it wrote,
/// not to the size of the scope.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Database("memory store mutex poisoned".to_string()))
    }

    /// Insert a record directly, bypassing ordering logic (seeding legacy data)
    pub fn insert(&self, scope: &Scope, id: &str, key: Option<&str>) -> Result<()> {
        let mut state = self.lock()?;
        let rows = state.scopes.entry(scope.clone()).or_default();
        MemoryTxn::new(scope, rows).insert(id, key)
    }

    /// Delete a record; its key is never reused
    pub fn remove(&self, scope: &Scope, id: &str) -> Result<bool> {
        let mut state = self.lock()?;
        let Some(rows) = state.scopes.get_mut(scope) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|r| r.id != id);
        Ok(rows.len() != before)
    }

    pub fn get(&self, scope: &Scope, id: &str) -> Result<Option<OrderedRecord>> {
        let state = self.lock()?;
        Ok(state
            .scopes
            .get(scope)
            .and_then(|rows| rows.iter().find(|r| r.id == id).cloned()))
    }

    /// Number of successful key writes across all scopes since creation
    pub fn key_writes(&self) -> usize {
        self.lock().map(|s| s.key_writes).unwrap_or(0)
    }
}

struct MemoryTxn<'a> {
    scope: &'a Scope,
    rows: &'a mut Vec<OrderedRecord>,
    key_writes: usize,
    len_before: usize,
    /// (row index, key before the write), oldest first
    undo: Vec<(usize, Option<String>)>,
}

impl<'a> MemoryTxn<'a> {
    fn new(scope: &'a Scope, rows: &'a mut Vec<OrderedRecord>) -> Self {
        Self {
            scope,
            len_before: rows.len(),
            rows,
            key_writes: 0,
            undo: Vec::new(),
        }
    }

    /// Put the rows back the way they were when the unit started
    fn roll_back(self) {
        for (index, previous) in self.undo.into_iter().rev() {
            self.rows[index].sort_key = previous;
        }
        self.rows.truncate(self.len_before);
    }

    fn keyed<'r>(
        &'r self,
        exclude_id: Option<&'r str>,
    ) -> impl Iterator<Item = &'r OrderedRecord> + 'r {
        self.rows
            .iter()
            .filter(move |r| r.sort_key.is_some() && Some(r.id.as_str()) != exclude_id)
    }
}

impl ScopeTxn for MemoryTxn<'_> {
    fn find_min_key(&mut self, exclude_id: Option<&str>) -> Result<Option<OrderedRecord>> {
        Ok(self.keyed(exclude_id).min_by(|a, b| compare_entities(*a, *b)).cloned())
    }

    fn find_max_key(&mut self, exclude_id: Option<&str>) -> Result<Option<OrderedRecord>> {
        Ok(self.keyed(exclude_id).max_by(|a, b| compare_entities(*a, *b)).cloned())
    }

    fn find_by_key_greater_than(
        &mut self,
        key: &str,
        exclude_id: Option<&str>,
    ) -> Result<Option<OrderedRecord>> {
        Ok(self
            .keyed(exclude_id)
            .filter(|r| r.sort_key.as_deref() > Some(key))
            .min_by(|a, b| compare_entities(*a, *b))
            .cloned())
    }

    fn find_by_id(&mut self, id: &str) -> Result<Option<OrderedRecord>> {
        Ok(self.rows.iter().find(|r| r.id == id).cloned())
    }

    fn find_unkeyed(&mut self) -> Result<Vec<OrderedRecord>> {
        Ok(self
            .rows
            .iter()
            .filter(|r| r.sort_key.is_none())
            .cloned()
            .collect())
    }

    fn write_key(&mut self, id: &str, key: &str) -> Result<bool> {
        match self.rows.iter().position(|r| r.id == id) {
            Some(index) => {
                let previous = self.rows[index].sort_key.replace(key.to_string());
                self.undo.push((index, previous));
                self.key_writes += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn insert(&mut self, id: &str, key: Option<&str>) -> Result<()> {
        if self.rows.iter().any(|r| r.id == id) {
            return Err(StoreError::DuplicateId {
                scope: self.scope.to_string(),
                id: id.to_string(),
            });
        }
        self.rows
            .push(OrderedRecord::new(id, key.map(|k| k.to_string())));
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn atomically<R, E, F>(&self, scope: &Scope, f: F) -> std::result::Result<R, E>
    where
        F: FnOnce(&mut dyn ScopeTxn) -> std::result::Result<R, E> + Send + 'static,
        R: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        let mut state = self.lock()?;
        let MemoryState { scopes, key_writes } = &mut *state;
        let rows = scopes.entry(scope.clone()).or_default();

        let mut txn = MemoryTxn::new(scope, rows);
        let result = f(&mut txn);

        if result.is_ok() {
            *key_writes += txn.key_writes;
        } else {
            txn.roll_back();
        }
        result
    }

    async fn read<R, E, F>(&self, scope: &Scope, f: F) -> std::result::Result<R, E>
    where
        F: FnOnce(&mut dyn ScopeTxn) -> std::result::Result<R, E> + Send + 'static,
        R: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        let mut state = self.lock()?;
        let rows = state.scopes.entry(scope.clone()).or_default();

        let mut txn = MemoryTxn::new(scope, rows);
        let result = f(&mut txn);
        txn.roll_back();
        result
    }

    async fn list_ordered(&self, scope: &Scope) -> Result<Vec<OrderedRecord>> {
        let state = self.lock()?;
        let mut rows = state.scopes.get(scope).cloned().unwrap_or_default();
        sort_entities(&mut rows);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope::new("list")
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert(&scope(), "a", Some("a")).unwrap();
        store.insert(&scope(), "m", Some("m")).unwrap();
        store.insert(&scope(), "z", Some("z")).unwrap();
        store.insert(&scope(), "n1", None).unwrap();
        store.insert(&scope(), "n2", None).unwrap();
        store
    }

    #[tokio::test]
    async fn test_range_queries_skip_excluded_and_unkeyed() {
        let store = seeded();
        let (min, succ, max, unkeyed) = store
            .atomically(&scope(), |txn| {
                Ok::<_, StoreError>((
                    txn.find_min_key(Some("a"))?,
                    txn.find_by_key_greater_than("a", None)?,
                    txn.find_max_key(None)?,
                    txn.find_unkeyed()?,
                ))
            })
            .await
            .unwrap();

        assert_eq!(min.unwrap().id, "m");
        assert_eq!(succ.unwrap().id, "m");
        assert_eq!(max.unwrap().id, "z");
        let ids: Vec<_> = unkeyed.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, ["n1", "n2"]);
    }

    #[tokio::test]
    async fn test_failed_unit_leaves_no_writes() {
        let store = seeded();
        let result = store
            .atomically(&scope(), |txn| {
                txn.write_key("a", "b")?;
                Err::<(), _>(StoreError::Busy("simulated".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(store.get(&scope(), "a").unwrap().unwrap().sort_key.as_deref(), Some("a"));
        assert_eq!(store.key_writes(), 0);
    }

    #[tokio::test]
    async fn test_failed_unit_undoes_inserts_and_repeated_writes() {
        let store = seeded();
        let result = store
            .atomically(&scope(), |txn| {
                txn.write_key("n1", "b")?;
                txn.write_key("n1", "c")?;
                txn.insert("fresh", None)?;
                txn.write_key("fresh", "d")?;
                txn.write_key("a", "e")?;
                Err::<(), _>(StoreError::Busy("simulated".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(store.get(&scope(), "n1").unwrap(), Some(OrderedRecord::unkeyed("n1")));
        assert_eq!(store.get(&scope(), "a").unwrap(), Some(OrderedRecord::keyed("a", "a")));
        assert!(store.get(&scope(), "fresh").unwrap().is_none());
        assert_eq!(store.list_ordered(&scope()).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_read_discards_writes() {
        let store = seeded();
        let written = store
            .read(&scope(), |txn| txn.write_key("n1", "b"))
            .await
            .unwrap();

        assert!(written);
        assert_eq!(store.get(&scope(), "n1").unwrap(), Some(OrderedRecord::unkeyed("n1")));
        assert_eq!(store.key_writes(), 0);
    }

    #[tokio::test]
    async fn test_list_orders_nulls_last() {
        let store = seeded();
        let ids: Vec<_> = store
            .list_ordered(&scope())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, ["a", "m", "z", "n1", "n2"]);
    }

    #[test]
    fn test_duplicate_insert_is_rejected() {
        let store = seeded();
        let err = store.insert(&scope(), "a", None).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId { .. }));
    }

    #[test]
    fn test_scopes_are_independent() {
        let store = seeded();
        assert!(store.get(&Scope::new("other"), "a").unwrap().is_none());
        assert!(!store.remove(&Scope::new("other"), "a").unwrap());
        assert!(store.remove(&scope(), "a").unwrap());
    }
}
