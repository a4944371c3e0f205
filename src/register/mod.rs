mod blob;
mod pool;
mod regst;

pub use blob::{Blob, BlobMap};
pub use pool::{RegstPool, SlotState};
pub use regst::{Regst, RegstId};

/// Identifies an actor inside a task graph.
pub type ActorId = u64;

/// Identifies a register descriptor, the logical channel between a producer and its consumers.
pub type RegstDescId = u64;
