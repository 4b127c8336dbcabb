//! Server-side placement of a moved record
//!
//! The client only says "put X after Y". Which record really follows Y is
//! looked up here, against the whole scope, because the client may be showing
//! a filtered or paginated slice of it.

use std::sync::Arc;

use ordinal_api::{OrderedRecord, Scope};
use ordinal_core::Alphabet;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::ReorderError;
use crate::storage::{OrderStore, ScopeTxn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMove {
    pub sort_key: String,
    /// The requested anchor no longer existed and the record went to the front
    pub anchor_fallback: bool,
}

pub struct NeighborResolver<S> {
    store: Arc<S>,
    engine: EngineConfig,
}

impl<S: OrderStore> NeighborResolver<S> {
    pub fn new(store: Arc<S>, engine: EngineConfig) -> Self {
        Self { store, engine }
    }

    /// Compute and persist the key placing `moving_id` directly after `after_id`
    /// (`None` = front of the scope).
    ///
    /// The neighbor reads and the key write run as one atomic unit.
    ///
    /// # Arguments
    /// * `scope` - Scope both records live in
    /// * `moving_id` - Record being moved
    /// * `after_id` - Record it now follows; a missing anchor is treated as `None`
    ///
    /// # Returns
    /// The persisted key with the neighbors it was computed from
    pub async fn resolve_new_key(
        &self,
        scope: &Scope,
        moving_id: &str,
        after_id: Option<&str>,
    ) -> Result<ResolvedMove, ReorderError> {
        if after_id == Some(moving_id) {
            return Err(ReorderError::InvalidRequest(format!(
                "record {} cannot be moved after itself",
                moving_id
            )));
        }

        let alphabet = self.engine.alphabet.clone();
        let moving = moving_id.to_string();
        let after = after_id.map(str::to_string);

        let resolved = self
            .store
            .atomically(scope, move |txn| {
                resolve_in_txn(txn, &alphabet, &moving, after.as_deref())
            })
            .await
            .inspect_err(|e| {
                if let ReorderError::Key(_) = e {
                    tracing::error!("[NeighborResolver] key generation failed in {}: {}", scope, e);
                }
            })?;

        if resolved.anchor_fallback {
            tracing::warn!(
                "[NeighborResolver] anchor {:?} not found in {}, moved {} to front",
                after_id,
                scope,
                moving_id
            );
        }
        if resolved.sort_key.len() > self.engine.key_length_warning {
            tracing::warn!(
                "[NeighborResolver] key for {} in {} has grown to {} symbols",
                moving_id,
                scope,
                resolved.sort_key.len()
            );
        }
        tracing::debug!(
            "[NeighborResolver] {} -> {} (after {:?}) in {}",
            moving_id,
            resolved.sort_key,
            after_id,
            scope
        );

        Ok(resolved)
    }
}

fn resolve_in_txn(
    txn: &mut dyn ScopeTxn,
    alphabet: &Alphabet,
    moving_id: &str,
    after_id: Option<&str>,
) -> Result<ResolvedMove, ReorderError> {
    if txn.find_by_id(moving_id)?.is_none() {
        return Err(ReorderError::write_conflict(
            moving_id,
            "record no longer exists",
        ));
    }

    let anchor = match after_id {
        Some(id) => txn.find_by_id(id)?,
        None => None,
    };
    let anchor_fallback = after_id.is_some() && anchor.is_none();

    let sort_key = match anchor {
        None => {
            let first = txn.find_min_key(Some(moving_id))?;
            alphabet.first_key(key_of(&first))?
        }
        Some(OrderedRecord {
            sort_key: Some(anchor_key),
            ..
        }) => {
            let successor = txn.find_by_key_greater_than(&anchor_key, Some(moving_id))?;
            alphabet.key_between(Some(anchor_key.as_str()), key_of(&successor))?
        }
        Some(OrderedRecord { sort_key: None, .. }) => {
            // Unkeyed records sort after every keyed one, so "after" an
            // unkeyed anchor is the tail of the keyed order.
            let last = txn.find_max_key(Some(moving_id))?;
            alphabet.last_key(key_of(&last))?
        }
    };

    if !txn.write_key(moving_id, &sort_key)? {
        return Err(ReorderError::write_conflict(
            moving_id,
            "record disappeared before its key was written",
        ));
    }

    Ok(ResolvedMove {
        sort_key,
        anchor_fallback,
    })
}

fn key_of(record: &Option<OrderedRecord>) -> Option<&str> {
    record.as_ref().and_then(|r| r.sort_key.as_deref())
}
