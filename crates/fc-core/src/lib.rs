pub mod graph;
pub mod id;
pub mod layout;
pub mod model;
pub mod operation;

pub use graph::{FlowGraph, GraphError};
pub use id::NodeId;
pub use layout::{LayoutConfig, compute_next_position, compute_next_position_with, is_measured_height};
pub use model::*;
pub use operation::{FieldError, OperationConfig, OperationType};
