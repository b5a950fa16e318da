//! Domain layer: graph ordering and message shapes.

pub mod messages;
pub mod topological_sort;

pub use messages::{DataType, FetchRequest, SendContent, SendPayload};
pub use topological_sort::TopologicalSort;
