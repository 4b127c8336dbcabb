//! Shared types between the reorder server and its clients
//!
//! Types in this crate are serialized across the transport boundary, so they
//! carry only what the other side needs: adjacency for a move, the resulting
//! key, or a structured error.

pub mod record;
pub mod reorder;

pub use record::{OrderedRecord, Scope};
pub use reorder::{ErrorKind, ErrorPayload, ReorderRequest, ReorderResponse};
