use log::{error, info};
use tokio::task::JoinSet;

use super::MessageRouter;
use crate::{
    ActorErr, Result,
    actor::{ActorCmd, ActorSummary, CompActor, SnapshotStore},
    register::ActorId,
};

/// What a graph run reports once every actor exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphReport {
    /// One summary per actor, sorted by id.
    pub actors: Vec<ActorSummary>,
}

impl GraphReport {
    pub fn act_count(&self, actor_id: ActorId) -> Option<u64> {
        self.actors
            .iter()
            .find(|summary| summary.actor_id == actor_id)
            .map(|summary| summary.act_count)
    }
}

/// A set of built actors ready to run together.
pub struct Graph {
    actors: Vec<CompActor>,
    snapshots: SnapshotStore,
}

impl Graph {
    pub(super) fn new(actors: Vec<CompActor>, snapshots: SnapshotStore) -> Self {
        Self { actors, snapshots }
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// The store the checkpoint actors of this graph write to.
    pub fn snapshots(&self) -> SnapshotStore {
        self.snapshots.clone()
    }

    /// Spawns one task per actor, starts them and waits for all of them to exit.
    ///
    /// The first actor failure aborts every other actor.
    ///
    /// # Returns
    /// The report of the run, or the error of the first actor that failed.
    pub async fn run(self) -> Result<GraphReport> {
        let (router, mut mailboxes) = MessageRouter::new(self.actors.iter().map(CompActor::id));
        let mut tasks = JoinSet::new();

        for actor in self.actors {
            let id = actor.id();
            let mailbox = mailboxes.remove(&id).ok_or(ActorErr::UnknownActor(id))?;
            tasks.spawn(actor.run(mailbox, router.clone()));
        }

        router.broadcast(ActorCmd::InitModel)?;
        info!("graph started");

        let mut summaries = Vec::with_capacity(tasks.len());
        while let Some(res) = tasks.join_next().await {
            let err = match res {
                Ok(Ok(summary)) => {
                    summaries.push(summary);
                    continue;
                }
                Ok(Err(e)) => e,
                Err(e) => ActorErr::Aborted(e.to_string()),
            };

            error!("aborting graph: {err}");
            tasks.abort_all();
            return Err(err);
        }

        summaries.sort_by_key(|summary| summary.actor_id);
        info!("graph finished");

        Ok(GraphReport { actors: summaries })
    }
}
