use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::register::{ActorId, RegstDescId};

/// The layout of one blob inside every register of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobSpec {
    pub name: String,
    pub shape: Vec<usize>,
}

/// A register descriptor as produced by an actor.
///
/// `capacity` is the amount of registers allocated for the descriptor, and thus the
/// maximum amount the producer can have in flight before it stalls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegstDescSpec {
    pub desc_id: RegstDescId,
    pub name: String,
    pub capacity: NonZeroUsize,
    #[serde(default)]
    pub consumers: Vec<ActorId>,
    pub blobs: Vec<BlobSpec>,
}
