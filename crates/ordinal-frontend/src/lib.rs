//! Client half of drag-and-drop reordering
//!
//! `ReorderController` owns the list a view renders. It applies a drop
//! optimistically, persists it through a `ReorderTransport` and restores the
//! pre-drop list if persistence fails.

pub mod controller;
pub mod transport;

pub use controller::{
    ControllerError, ListItem, ReorderController, ReorderEvent, ReorderOutcome, ReorderPhase,
};
pub use transport::{LocalTransport, ReorderTransport, TimeoutTransport, TransportError};
