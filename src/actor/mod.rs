mod actor_core;
mod comp_actor;
mod msg;
mod snapshot;
mod variant;
pub mod variants;

pub use actor_core::{ActorCore, NaiveConsumed};
pub use comp_actor::{ActorState, ActorSummary, CompActor};
pub use msg::{ActorCmd, ActorMsg, Envelope};
pub use snapshot::{Snapshot, SnapshotStore};
pub use variant::ActorVariant;
