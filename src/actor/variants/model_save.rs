use log::info;

use crate::{
    Result,
    actor::{ActorCore, ActorVariant, Snapshot, SnapshotStore},
};

/// The checkpoint actor, copies every forward model it receives into a `SnapshotStore`.
///
/// A forward model register is only borrowed, it goes back to the forward actor right
/// after its contents are stored.
#[derive(Debug)]
pub struct ModelSaveActor {
    store: SnapshotStore,
}

impl ModelSaveActor {
    pub fn new(store: SnapshotStore) -> Self {
        Self { store }
    }
}

impl ActorVariant for ModelSaveActor {
    fn kind(&self) -> &'static str {
        "model_save"
    }

    fn act(&mut self, core: &mut ActorCore) -> Result<()> {
        let snapshots = core
            .naive_readable_fronts()
            .map(|regst| {
                let batch_id = regst.model_version_id().ok_or_else(|| {
                    core.violation(format!(
                        "forward model of actor {} carries no batch id",
                        regst.producer()
                    ))
                })?;

                Ok(Snapshot {
                    producer: regst.producer(),
                    batch_id,
                    piece_id: regst.piece_id(),
                    blobs: regst.blobs().clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        for snapshot in snapshots {
            info!(
                actor_id = core.id(),
                producer = snapshot.producer,
                batch_id = snapshot.batch_id;
                "saved forward model"
            );
            self.store.push(snapshot);
        }

        core.return_cur_naive_readable();
        core.count_act();
        Ok(())
    }
}
