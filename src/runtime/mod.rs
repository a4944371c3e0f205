mod builder;
mod graph;
mod router;

pub use builder::GraphBuilder;
pub use graph::{Graph, GraphReport};
pub use router::MessageRouter;
