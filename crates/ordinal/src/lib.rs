//! Server side of drag-and-drop reordering.
//!
//! `core` resolves where a moved record lands and backfills legacy rows,
//! `storage` holds the store abstraction with its SQLite and in-memory
//! implementations, and `api` is what request handlers call.

pub mod api;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;
pub mod telemetry;

pub use api::ReorderService;
pub use config::{ConfigError, EngineConfig, OrdinalConfig};
pub use error::ReorderError;
