//! Order keys for drag-and-drop reorderable collections
//!
//! This crate is pure and does no I/O:
//! - `fractional_index`: the key algebra (`key_between`) and the first/last/initial helpers
//! - `ordering`: how records with optional keys are ordered for display

pub mod fractional_index;
pub mod ordering;

pub use fractional_index::{
    first_key, initial_key, initial_key_batch, key_between, last_key, Alphabet, KeyError,
    BASE62_SYMBOLS, DEFAULT_KEY_LENGTH_WARNING,
};
pub use ordering::{compare_entities, sort_entities, SortableEntity};
