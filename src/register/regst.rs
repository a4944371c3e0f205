use std::sync::Arc;

use super::{ActorId, Blob, BlobMap, RegstDescId};

/// Locates a register inside its producer's pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegstId {
    pub desc_id: RegstDescId,
    pub slot: usize,
}

/// A reference counted handle to a register, a block of named blobs exchanged between actors.
///
/// Cloning a `Regst` shares the payload, it never copies it. The payload can only be
/// written through a handle that is the sole reference to it, so a register that any
/// consumer still holds can't be overwritten by its producer.
#[derive(Debug, Clone)]
pub struct Regst {
    id: RegstId,
    producer: ActorId,
    piece_id: i64,
    model_version_id: Option<u64>,
    blobs: Arc<BlobMap>,
}

impl Regst {
    pub(super) fn new(id: RegstId, producer: ActorId, blobs: BlobMap) -> Self {
        Self {
            id,
            producer,
            piece_id: -1,
            model_version_id: None,
            blobs: Arc::new(blobs),
        }
    }

    pub fn id(&self) -> RegstId {
        self.id
    }

    pub fn desc_id(&self) -> RegstDescId {
        self.id.desc_id
    }

    /// The actor owning the pool this register must be returned to.
    pub fn producer(&self) -> ActorId {
        self.producer
    }

    /// The step that produced the current contents, `-1` if none did yet.
    pub fn piece_id(&self) -> i64 {
        self.piece_id
    }

    pub fn set_piece_id(&mut self, piece_id: i64) {
        self.piece_id = piece_id;
    }

    pub fn model_version_id(&self) -> Option<u64> {
        self.model_version_id
    }

    pub fn set_model_version_id(&mut self, model_version_id: Option<u64>) {
        self.model_version_id = model_version_id;
    }

    pub fn blob(&self, name: &str) -> Option<&Blob> {
        self.blobs.get(name)
    }

    pub fn blobs(&self) -> &BlobMap {
        &self.blobs
    }

    /// Gives write access to the payload.
    ///
    /// # Returns
    /// `None` while any other handle to this register is alive.
    pub fn blobs_mut(&mut self) -> Option<&mut BlobMap> {
        Arc::get_mut(&mut self.blobs)
    }

    /// Whether both handles point to the same payload.
    pub fn shares_storage(&self, other: &Regst) -> bool {
        Arc::ptr_eq(&self.blobs, &other.blobs)
    }
}
