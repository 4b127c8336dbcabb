//! Entry points the CRUD/HTTP layer calls for sortable collections

use std::sync::Arc;

use ordinal_api::{ErrorPayload, OrderedRecord, ReorderRequest, ReorderResponse, Scope};
use ordinal_core::sort_entities;

use crate::config::EngineConfig;
use crate::core::{ensure_ordered, NeighborResolver};
use crate::error::ReorderError;
use crate::storage::OrderStore;

pub struct ReorderService<S> {
    store: Arc<S>,
    resolver: NeighborResolver<S>,
    engine: EngineConfig,
}

impl<S: OrderStore> ReorderService<S> {
    pub fn new(store: Arc<S>, engine: EngineConfig) -> Self {
        Self {
            resolver: NeighborResolver::new(Arc::clone(&store), engine.clone()),
            store,
            engine,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Persist a drag-and-drop move and return the key it produced
    ///
    /// # Arguments
    /// * `scope` - Scope the moved record belongs to
    /// * `request` - Moved record and the record it should follow
    pub async fn reorder(
        &self,
        scope: &Scope,
        request: ReorderRequest,
    ) -> Result<ReorderResponse, ReorderError> {
        let resolved = self
            .resolver
            .resolve_new_key(
                scope,
                &request.moved_item_id,
                request.after_item_id.as_deref(),
            )
            .await?;
        Ok(ReorderResponse {
            sort_key: resolved.sort_key,
        })
    }

    /// Same as [`reorder`](Self::reorder) with the error already shaped for the wire
    pub async fn handle(
        &self,
        scope: &Scope,
        request: ReorderRequest,
    ) -> Result<ReorderResponse, ErrorPayload> {
        self.reorder(scope, request).await.map_err(|e| {
            if e.is_retryable() {
                tracing::warn!("[ReorderService] retryable failure in {}: {}", scope, e);
            } else {
                tracing::error!("[ReorderService] reorder failed in {}: {}", scope, e);
            }
            e.to_payload()
        })
    }

    /// Backfill missing keys, then return the scope in display order.
    ///
    /// Every read of a sortable view goes through here so that the next
    /// reorder always has a real key to anchor against.
    pub async fn list_for_sorting(&self, scope: &Scope) -> Result<Vec<OrderedRecord>, ReorderError> {
        ensure_ordered(self.store.as_ref(), scope, &self.engine.alphabet).await?;
        let mut records = self.store.list_ordered(scope).await?;
        // stores already order this way; unkeyed stragglers from a racing
        // insert still must not break the sort
        sort_entities(&mut records);
        Ok(records)
    }

    /// Create a record at the end of its scope
    pub async fn create_at_tail(&self, scope: &Scope, id: &str) -> Result<OrderedRecord, ReorderError> {
        let alphabet = self.engine.alphabet.clone();
        let id = id.to_string();

        let record = self
            .store
            .atomically(scope, move |txn| {
                let tail = txn.find_max_key(None)?;
                let key = alphabet.last_key(tail.as_ref().and_then(|r| r.sort_key.as_deref()))?;
                txn.insert(&id, Some(key.as_str()))?;
                Ok::<_, ReorderError>(OrderedRecord::keyed(id, key))
            })
            .await?;

        tracing::debug!("[ReorderService] created {} at {} in {}", record.id, key_str(&record), scope);
        Ok(record)
    }

    /// Seed an empty scope with `ids` in the given order
    pub async fn seed(&self, scope: &Scope, ids: &[String]) -> Result<Vec<OrderedRecord>, ReorderError> {
        let keys = self.engine.alphabet.initial_key_batch(ids.len());
        let ids = ids.to_vec();

        self.store
            .atomically(scope, move |txn| {
                if txn.find_max_key(None)?.is_some() || !txn.find_unkeyed()?.is_empty() {
                    return Err(ReorderError::InvalidRequest(
                        "only an empty scope can be seeded".to_string(),
                    ));
                }
                let mut records = Vec::with_capacity(ids.len());
                for (id, key) in ids.into_iter().zip(keys) {
                    txn.insert(&id, Some(key.as_str()))?;
                    records.push(OrderedRecord::keyed(id, key));
                }
                Ok(records)
            })
            .await
    }
}

fn key_str(record: &OrderedRecord) -> &str {
    record.sort_key.as_deref().unwrap_or("<none>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use ordinal_api::ErrorKind;

    fn service() -> ReorderService<MemoryStore> {
        ReorderService::new(Arc::new(MemoryStore::new()), EngineConfig::default())
    }

    fn scope() -> Scope {
        Scope::new("todo")
    }

    fn ids(records: &[OrderedRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_created_records_append_in_order() {
        let service = service();
        for id in ["a", "b", "c"] {
            service.create_at_tail(&scope(), id).await.unwrap();
        }
        let records = service.list_for_sorting(&scope()).await.unwrap();
        assert_eq!(ids(&records), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_reorder_round_trip() {
        let service = service();
        let seeded: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        service.seed(&scope(), &seeded).await.unwrap();

        let response = service
            .reorder(&scope(), ReorderRequest::after("d", "a"))
            .await
            .unwrap();

        let records = service.list_for_sorting(&scope()).await.unwrap();
        assert_eq!(ids(&records), ["a", "d", "b", "c"]);
        assert_eq!(records[1].sort_key.as_deref(), Some(response.sort_key.as_str()));
    }

    #[tokio::test]
    async fn test_only_the_moved_row_is_written() {
        let service = service();
        let seeded: Vec<String> = (0..10).map(|i| format!("r{i}")).collect();
        service.seed(&scope(), &seeded).await.unwrap();
        let before = service.store().key_writes();

        service
            .reorder(&scope(), ReorderRequest::to_front("r7"))
            .await
            .unwrap();

        assert_eq!(service.store().key_writes(), before + 1);
    }

    #[tokio::test]
    async fn test_seeding_a_populated_scope_is_rejected() {
        let service = service();
        service.create_at_tail(&scope(), "a").await.unwrap();
        let err = service
            .seed(&scope(), &["b".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn test_handle_shapes_errors_for_the_wire() {
        let service = service();
        let payload = service
            .handle(&scope(), ReorderRequest::to_front("ghost"))
            .await
            .unwrap_err();
        assert_eq!(payload.kind, ErrorKind::WriteConflict);
        assert!(payload.retryable);
    }

    #[tokio::test]
    async fn test_duplicate_create_is_an_invalid_request() {
        let service = service();
        service.create_at_tail(&scope(), "a").await.unwrap();
        let err = service.create_at_tail(&scope(), "a").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }
}
