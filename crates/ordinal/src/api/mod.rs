pub mod reorder_service;

pub use reorder_service::ReorderService;
