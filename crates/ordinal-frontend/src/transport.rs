//! How a reorder reaches the server

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ordinal::storage::OrderStore;
use ordinal::ReorderService;
use ordinal_api::{ErrorPayload, ReorderRequest, ReorderResponse, Scope};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The server answered with an error body
    #[error("Reorder rejected: {0}")]
    Rejected(ErrorPayload),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Reorder request timed out")]
    Timeout,

    /// The caller stopped waiting before an answer arrived
    #[error("Reorder request was cancelled")]
    Cancelled,
}

impl TransportError {
    /// Whether the user may simply try the same drag again
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Rejected(payload) => payload.retryable,
            TransportError::Network(_) | TransportError::Timeout | TransportError::Cancelled => true,
        }
    }
}

/// Persistence call for one list. An HTTP client implements this in a real app.
#[async_trait]
pub trait ReorderTransport: Send + Sync {
    async fn persist(&self, request: ReorderRequest) -> Result<ReorderResponse, TransportError>;
}

#[async_trait]
impl<T: ReorderTransport + ?Sized> ReorderTransport for Arc<T> {
    async fn persist(&self, request: ReorderRequest) -> Result<ReorderResponse, TransportError> {
        (**self).persist(request).await
    }
}

/// Calls a `ReorderService` in the same process, for one scope
pub struct LocalTransport<S> {
    service: Arc<ReorderService<S>>,
    scope: Scope,
}

impl<S: OrderStore> LocalTransport<S> {
    pub fn new(service: Arc<ReorderService<S>>, scope: Scope) -> Self {
        Self { service, scope }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

#[async_trait]
impl<S: OrderStore> ReorderTransport for LocalTransport<S> {
    async fn persist(&self, request: ReorderRequest) -> Result<ReorderResponse, TransportError> {
        self.service
            .handle(&self.scope, request)
            .await
            .map_err(TransportError::Rejected)
    }
}

/// Bounds another transport's calls with a deadline
pub struct TimeoutTransport<T> {
    inner: T,
    timeout: Duration,
}

impl<T: ReorderTransport> TimeoutTransport<T> {
    pub fn new(inner: T, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<T: ReorderTransport> ReorderTransport for TimeoutTransport<T> {
    async fn persist(&self, request: ReorderRequest) -> Result<ReorderResponse, TransportError> {
        match tokio::time::timeout(self.timeout, self.inner.persist(request)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("[TimeoutTransport] no response within {:?}", self.timeout);
                Err(TransportError::Timeout)
            }
        }
    }
}
