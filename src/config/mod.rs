mod graph;
mod model;
mod regst;

pub use graph::{ConsumedSpec, GraphSpec, TaskKindSpec, TaskSpec};
pub use model::{DistributionSpec, ModelSaveSpec, OptimizerSpec, ParamGenSpec};
pub use regst::{BlobSpec, RegstDescSpec};
