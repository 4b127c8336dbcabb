pub mod backend;
pub mod memory;
pub mod sql_utils;
pub mod sqlite;
pub mod types;

pub use backend::{OrderStore, ScopeTxn};
pub use memory::MemoryStore;
pub use sql_utils::{validate_identifier, TableLayout};
pub use sqlite::{SqliteStore, DEFAULT_BUSY_TIMEOUT};
pub use types::{Result, StoreError};
