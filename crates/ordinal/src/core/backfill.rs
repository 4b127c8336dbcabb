//! Lazy key assignment for records that predate ordering
//!
//! Unkeyed records get tail keys in their fallback (creation) order the first
//! time a sortable view of their scope is read. They land after every record
//! that already had a key; no attempt is made to interleave them.

use ordinal_api::Scope;
use ordinal_core::Alphabet;
use serde::Serialize;

use crate::error::ReorderError;
use crate::storage::{OrderStore, StoreError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    /// Rows that received a key
    pub assigned: usize,
    /// Rows deleted or keyed by someone else between the read and the write
    pub skipped: usize,
}

/// Give every unkeyed record in `scope` a key.
///
/// One read-only unit collects the candidates, then each row is written in
/// its own atomic unit. A crash halfway leaves a valid prefix keyed and the next call
/// picks up the rest. Rows keyed concurrently (by a reorder or a racing
/// backfill) are left alone.
///
/// # Returns
/// How many rows were keyed and how many were skipped
pub async fn ensure_ordered<S: OrderStore>(
    store: &S,
    scope: &Scope,
    alphabet: &Alphabet,
) -> Result<BackfillReport, ReorderError> {
    let (mut tail, candidates) = store
        .read(scope, |txn| {
            let tail = txn.find_max_key(None)?.and_then(|r| r.sort_key);
            Ok::<_, StoreError>((tail, txn.find_unkeyed()?))
        })
        .await?;

    let mut report = BackfillReport::default();
    if candidates.is_empty() {
        return Ok(report);
    }

    tracing::debug!(
        "[ensure_ordered] backfilling {} unkeyed records in {}",
        candidates.len(),
        scope
    );

    for record in candidates {
        let key = alphabet.last_key(tail.as_deref())?;
        let id = record.id;
        let new_key = key.clone();

        let written = store
            .atomically(scope, move |txn| match txn.find_by_id(&id)? {
                Some(current) if current.sort_key.is_none() => txn.write_key(&id, &new_key),
                _ => Ok(false),
            })
            .await?;

        if written {
            report.assigned += 1;
            tail = Some(key);
        } else {
            report.skipped += 1;
        }
    }

    tracing::info!(
        "[ensure_ordered] {}: assigned {} keys, skipped {}",
        scope,
        report.assigned,
        report.skipped
    );
    Ok(report)
}
