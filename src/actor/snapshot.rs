use std::sync::Arc;

use parking_lot::Mutex;

use crate::register::{ActorId, BlobMap};

/// The contents of a forward model register as received by a checkpoint actor.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub producer: ActorId,
    pub batch_id: u64,
    pub piece_id: i64,
    pub blobs: BlobMap,
}

/// Where checkpoint actors keep the forward models they receive.
///
/// Clones share the same storage, so the graph can hand one to each checkpoint actor
/// and read the snapshots once the run is over.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    snapshots: Arc<Mutex<Vec<Snapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, snapshot: Snapshot) {
        self.snapshots.lock().push(snapshot);
    }

    pub fn len(&self) -> usize {
        self.snapshots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.lock().is_empty()
    }

    /// Every snapshot in arrival order.
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.snapshots.lock().clone()
    }

    /// The most recent snapshot sent by `producer`.
    pub fn latest(&self, producer: ActorId) -> Option<Snapshot> {
        self.snapshots
            .lock()
            .iter()
            .rev()
            .find(|snapshot| snapshot.producer == producer)
            .cloned()
    }
}
