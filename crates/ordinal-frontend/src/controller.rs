//! Optimistic reorder state machine for one rendered list
//!
//! `Idle -> Reordering -> Committed | RolledBack`. The two terminal phases
//! behave like `Idle`: the next drop starts a new cycle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ordinal_api::{OrderedRecord, ReorderRequest};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::transport::{ReorderTransport, TransportError};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Anything a view can render in a reorderable list
pub trait ListItem: Clone + Send + 'static {
    fn id(&self) -> &str;
}

impl ListItem for OrderedRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderPhase {
    Idle,
    Reordering,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderEvent {
    Started {
        moved_item_id: String,
        after_item_id: Option<String>,
    },
    Committed {
        moved_item_id: String,
        sort_key: String,
    },
    RolledBack {
        moved_item_id: String,
        error: TransportError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderOutcome {
    /// Dropped where it was picked up; nothing was sent
    Unchanged,
    Committed { sort_key: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("Another reorder is still being saved")]
    ReorderInFlight,

    #[error("Index {index} is out of range for a list of {len} items")]
    IndexOutOfRange { index: usize, len: usize },

    /// Persistence failed and the list was restored
    #[error(transparent)]
    Transport(#[from] TransportError),
}

struct ControllerState<T> {
    items: Vec<T>,
    phase: ReorderPhase,
}

fn lock_state<T>(state: &Mutex<ControllerState<T>>) -> MutexGuard<'_, ControllerState<T>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A spliced list waiting for the server.
///
/// Dropping it without `commit` or `roll_back` (the drop future was cancelled)
/// restores the snapshot as if the transport had failed with `Cancelled`.
struct PendingReorder<T> {
    state: Arc<Mutex<ControllerState<T>>>,
    events: broadcast::Sender<ReorderEvent>,
    moved_item_id: String,
    snapshot: Option<Vec<T>>,
}

impl<T> PendingReorder<T> {
    fn commit(mut self, sort_key: &str) {
        self.snapshot = None;
        lock_state(&self.state).phase = ReorderPhase::Committed;
        let _ = self.events.send(ReorderEvent::Committed {
            moved_item_id: self.moved_item_id.clone(),
            sort_key: sort_key.to_string(),
        });
    }

    fn roll_back(mut self, error: TransportError) {
        if let Some(snapshot) = self.snapshot.take() {
            self.restore(snapshot, error);
        }
    }

    fn restore(&self, snapshot: Vec<T>, error: TransportError) {
        {
            let mut state = lock_state(&self.state);
            state.items = snapshot;
            state.phase = ReorderPhase::RolledBack;
        }
        tracing::warn!(
            "[ReorderController] rolled back move of {}: {}",
            self.moved_item_id,
            error
        );
        let _ = self.events.send(ReorderEvent::RolledBack {
            moved_item_id: self.moved_item_id.clone(),
            error,
        });
    }
}

impl<T> Drop for PendingReorder<T> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.restore(snapshot, TransportError::Cancelled);
        }
    }
}

/// Cloneable handle; clones share the same list and in-flight flag.
pub struct ReorderController<T> {
    state: Arc<Mutex<ControllerState<T>>>,
    transport: Arc<dyn ReorderTransport>,
    events: broadcast::Sender<ReorderEvent>,
}

impl<T> Clone for ReorderController<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            transport: Arc::clone(&self.transport),
            events: self.events.clone(),
        }
    }
}

impl<T: ListItem> ReorderController<T> {
    pub fn new(items: Vec<T>, transport: Arc<dyn ReorderTransport>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(ControllerState {
                items,
                phase: ReorderPhase::Idle,
            })),
            transport,
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState<T>> {
        lock_state(&self.state)
    }

    pub fn items(&self) -> Vec<T> {
        self.lock().items.clone()
    }

    pub fn phase(&self) -> ReorderPhase {
        self.lock().phase
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReorderEvent> {
        self.events.subscribe()
    }

    /// Replace the list with a fresh server read.
    ///
    /// Refused while a reorder is pending, since its rollback snapshot would
    /// otherwise resurrect the stale list.
    pub fn set_items(&self, items: Vec<T>) -> Result<(), ControllerError> {
        let mut state = self.lock();
        if state.phase == ReorderPhase::Reordering {
            return Err(ControllerError::ReorderInFlight);
        }
        state.items = items;
        state.phase = ReorderPhase::Idle;
        Ok(())
    }

    /// Handle a drop from `old_index` to `new_index` of the rendered list.
    ///
    /// The list is spliced before the transport is called. The anchor sent to
    /// the server is whatever now sits right before the moved item locally.
    ///
    /// # Arguments
    /// * `old_index` - Position the item was picked up from
    /// * `new_index` - Position it was dropped at, in the list after removal
    ///
    /// # Returns
    /// The key the server assigned, or `Unchanged` for a drop in place. On a
    /// transport error, and when the returned future is dropped before it
    /// completes, the list is restored to its state before the drop.
    pub async fn on_drag_end(
        &self,
        old_index: usize,
        new_index: usize,
    ) -> Result<ReorderOutcome, ControllerError> {
        let (request, pending) = {
            let mut state = self.lock();
            if state.phase == ReorderPhase::Reordering {
                tracing::debug!("[ReorderController] drop ignored, reorder in flight");
                return Err(ControllerError::ReorderInFlight);
            }

            let len = state.items.len();
            for index in [old_index, new_index] {
                if index >= len {
                    return Err(ControllerError::IndexOutOfRange { index, len });
                }
            }
            if old_index == new_index {
                return Ok(ReorderOutcome::Unchanged);
            }

            let snapshot = state.items.clone();
            let item = state.items.remove(old_index);
            state.items.insert(new_index, item);

            let moved_item_id = state.items[new_index].id().to_string();
            let after_item_id = new_index
                .checked_sub(1)
                .map(|prev| state.items[prev].id().to_string());
            state.phase = ReorderPhase::Reordering;

            let pending = PendingReorder {
                state: Arc::clone(&self.state),
                events: self.events.clone(),
                moved_item_id: moved_item_id.clone(),
                snapshot: Some(snapshot),
            };
            (ReorderRequest::new(moved_item_id, after_item_id), pending)
        };

        tracing::debug!(
            "[ReorderController] moving {} after {:?}",
            request.moved_item_id,
            request.after_item_id
        );
        self.emit(ReorderEvent::Started {
            moved_item_id: request.moved_item_id.clone(),
            after_item_id: request.after_item_id.clone(),
        });

        match self.transport.persist(request).await {
            Ok(response) => {
                pending.commit(&response.sort_key);
                Ok(ReorderOutcome::Committed {
                    sort_key: response.sort_key,
                })
            }
            Err(error) => {
                pending.roll_back(error.clone());
                Err(ControllerError::Transport(error))
            }
        }
    }

    fn emit(&self, event: ReorderEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ordinal_api::{ErrorKind, ErrorPayload, ReorderResponse};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Card(&'static str);

    impl ListItem for Card {
        fn id(&self) -> &str {
            self.0
        }
    }

    fn cards(ids: &[&'static str]) -> Vec<Card> {
        ids.iter().copied().map(Card).collect()
    }

    fn ids(controller: &ReorderController<Card>) -> Vec<&'static str> {
        controller.items().into_iter().map(|c| c.0).collect()
    }

    /// Records every request and answers according to `fail`, optionally
    /// waiting for `release` first.
    #[derive(Default)]
    struct ScriptedTransport {
        calls: Mutex<Vec<ReorderRequest>>,
        fail: bool,
        release: Option<Arc<Notify>>,
        count: AtomicUsize,
    }

    impl ScriptedTransport {
        fn calls(&self) -> Vec<ReorderRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReorderTransport for ScriptedTransport {
        async fn persist(&self, request: ReorderRequest) -> Result<ReorderResponse, TransportError> {
            self.calls.lock().unwrap().push(request);
            let n = self.count.fetch_add(1, Ordering::SeqCst);
            if let Some(release) = &self.release {
                release.notified().await;
            }
            if self.fail {
                Err(TransportError::Rejected(ErrorPayload::new(
                    ErrorKind::WriteConflict,
                    "record no longer exists",
                )))
            } else {
                Ok(ReorderResponse {
                    sort_key: format!("k{n}"),
                })
            }
        }
    }

    #[tokio::test]
    async fn test_successful_drop_keeps_the_optimistic_order() {
        let transport = Arc::new(ScriptedTransport::default());
        let controller = ReorderController::new(cards(&["a", "b", "c", "d"]), transport.clone());

        let outcome = controller.on_drag_end(3, 1).await.unwrap();

        assert_eq!(outcome, ReorderOutcome::Committed { sort_key: "k0".into() });
        assert_eq!(ids(&controller), ["a", "d", "b", "c"]);
        assert_eq!(controller.phase(), ReorderPhase::Committed);
        assert_eq!(transport.calls(), vec![ReorderRequest::after("d", "a")]);
    }

    #[tokio::test]
    async fn test_drop_at_front_sends_no_anchor() {
        let transport = Arc::new(ScriptedTransport::default());
        let controller = ReorderController::new(cards(&["a", "b", "c"]), transport.clone());

        controller.on_drag_end(2, 0).await.unwrap();

        assert_eq!(ids(&controller), ["c", "a", "b"]);
        assert_eq!(transport.calls(), vec![ReorderRequest::to_front("c")]);
    }

    #[tokio::test]
    async fn test_moving_down_anchors_on_the_item_it_passed() {
        let transport = Arc::new(ScriptedTransport::default());
        let controller = ReorderController::new(cards(&["a", "b", "c", "d"]), transport.clone());

        controller.on_drag_end(0, 2).await.unwrap();

        assert_eq!(ids(&controller), ["b", "c", "a", "d"]);
        assert_eq!(transport.calls(), vec![ReorderRequest::after("a", "c")]);
    }

    #[tokio::test]
    async fn test_failure_restores_the_exact_snapshot() {
        let transport = Arc::new(ScriptedTransport {
            fail: true,
            ..Default::default()
        });
        let before = cards(&["a", "b", "c", "d"]);
        let controller = ReorderController::new(before.clone(), transport);
        let mut events = controller.subscribe();

        let err = controller.on_drag_end(0, 3).await.unwrap_err();

        assert!(matches!(err, ControllerError::Transport(ref e) if e.is_retryable()));
        assert_eq!(controller.items(), before);
        assert_eq!(controller.phase(), ReorderPhase::RolledBack);

        assert!(matches!(events.recv().await.unwrap(), ReorderEvent::Started { .. }));
        assert!(matches!(
            events.recv().await.unwrap(),
            ReorderEvent::RolledBack { ref moved_item_id, .. } if moved_item_id == "a"
        ));
    }

    #[tokio::test]
    async fn test_second_drop_while_pending_is_rejected() {
        let release = Arc::new(Notify::new());
        let transport = Arc::new(ScriptedTransport {
            release: Some(Arc::clone(&release)),
            ..Default::default()
        });
        let controller = ReorderController::new(cards(&["a", "b", "c"]), transport.clone());
        let mut events = controller.subscribe();

        let pending = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.on_drag_end(2, 0).await })
        };
        // wait until the first drop has been spliced and sent
        assert!(matches!(events.recv().await.unwrap(), ReorderEvent::Started { .. }));
        assert_eq!(controller.phase(), ReorderPhase::Reordering);
        assert_eq!(ids(&controller), ["c", "a", "b"]);

        let err = controller.on_drag_end(1, 2).await.unwrap_err();
        assert_eq!(err, ControllerError::ReorderInFlight);
        assert_eq!(
            controller.set_items(cards(&["x"])),
            Err(ControllerError::ReorderInFlight)
        );

        release.notify_one();
        pending.await.unwrap().unwrap();

        assert_eq!(transport.calls().len(), 1);
        assert_eq!(ids(&controller), ["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_cancelled_drop_rolls_back_and_unlocks_the_list() {
        // never released: the server never answers
        let transport = Arc::new(ScriptedTransport {
            release: Some(Arc::new(Notify::new())),
            ..Default::default()
        });
        let controller = ReorderController::new(cards(&["a", "b", "c"]), transport.clone());
        let mut events = controller.subscribe();

        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            controller.on_drag_end(2, 0),
        )
        .await;

        assert!(timed_out.is_err());
        assert_eq!(ids(&controller), ["a", "b", "c"]);
        assert_eq!(controller.phase(), ReorderPhase::RolledBack);
        assert!(matches!(events.recv().await.unwrap(), ReorderEvent::Started { .. }));
        assert_eq!(
            events.recv().await.unwrap(),
            ReorderEvent::RolledBack {
                moved_item_id: "c".to_string(),
                error: TransportError::Cancelled,
            }
        );

        // the list is usable again
        controller.set_items(cards(&["b", "a"])).unwrap();
        assert_eq!(ids(&controller), ["b", "a"]);
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_aborted_task_rolls_back() {
        let transport = Arc::new(ScriptedTransport {
            release: Some(Arc::new(Notify::new())),
            ..Default::default()
        });
        let controller = ReorderController::new(cards(&["a", "b", "c"]), transport);
        let mut events = controller.subscribe();

        let task = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.on_drag_end(0, 2).await })
        };
        assert!(matches!(events.recv().await.unwrap(), ReorderEvent::Started { .. }));
        assert_eq!(ids(&controller), ["b", "c", "a"]);

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert_eq!(ids(&controller), ["a", "b", "c"]);
        assert_ne!(controller.phase(), ReorderPhase::Reordering);
    }

    #[tokio::test]
    async fn test_same_index_is_a_noop() {
        let transport = Arc::new(ScriptedTransport::default());
        let controller = ReorderController::new(cards(&["a", "b"]), transport.clone());

        assert_eq!(
            controller.on_drag_end(1, 1).await.unwrap(),
            ReorderOutcome::Unchanged
        );
        assert!(transport.calls().is_empty());
        assert_eq!(controller.phase(), ReorderPhase::Idle);
    }

    #[tokio::test]
    async fn test_out_of_range_is_rejected_before_splicing() {
        let transport = Arc::new(ScriptedTransport::default());
        let controller = ReorderController::new(cards(&["a", "b"]), transport.clone());

        let err = controller.on_drag_end(0, 5).await.unwrap_err();

        assert_eq!(err, ControllerError::IndexOutOfRange { index: 5, len: 2 });
        assert_eq!(ids(&controller), ["a", "b"]);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rolled_back_list_accepts_the_next_drop() {
        let failing = Arc::new(ScriptedTransport {
            fail: true,
            ..Default::default()
        });
        let controller = ReorderController::new(cards(&["a", "b", "c"]), failing);
        controller.on_drag_end(0, 1).await.unwrap_err();

        controller.set_items(cards(&["a", "c"])).unwrap();
        assert_eq!(controller.phase(), ReorderPhase::Idle);
        assert_eq!(ids(&controller), ["a", "c"]);
    }
}
