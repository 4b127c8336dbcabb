pub mod backfill;
pub mod resolver;

pub use backfill::{ensure_ordered, BackfillReport};
pub use resolver::{NeighborResolver, ResolvedMove};
