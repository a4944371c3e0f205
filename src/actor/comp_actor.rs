use log::{debug, info, warn};
use tokio::{sync::mpsc::UnboundedReceiver, task};

use super::{ActorCmd, ActorCore, ActorMsg, ActorVariant, Envelope};
use crate::{
    ActorErr, Result,
    register::{ActorId, Regst},
    runtime::MessageRouter,
};

/// The lifecycle of a compute actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    /// Waiting for `InitModel` and for the variant's bindings, inputs are buffered.
    Initializing,
    /// Firing whenever every input and output is available.
    Normal,
    /// Every input ended, waiting for the outstanding registers to come back.
    Zombie,
    Exited,
}

/// What an actor reports once it exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorSummary {
    pub actor_id: ActorId,
    pub name: String,
    pub kind: &'static str,
    pub act_count: u64,
}

/// Drives a variant through the actor lifecycle, one message at a time.
///
/// Handlers never block and never wait on another actor, every effect on the rest of
/// the graph is a message left in the core's outbox.
pub struct CompActor {
    core: ActorCore,
    variant: Box<dyn ActorVariant>,
    state: ActorState,
    init_requested: bool,
}

impl CompActor {
    pub fn new(core: ActorCore, variant: Box<dyn ActorVariant>) -> Self {
        Self {
            core,
            variant,
            state: ActorState::Initializing,
            init_requested: false,
        }
    }

    pub fn id(&self) -> ActorId {
        self.core.id()
    }

    pub fn state(&self) -> ActorState {
        self.state
    }

    pub fn core(&self) -> &ActorCore {
        &self.core
    }

    pub fn kind(&self) -> &'static str {
        self.variant.kind()
    }

    /// Handles a single message and fires as many times as possible afterwards.
    ///
    /// # Returns
    /// The state the actor is left in, or the error that makes it fail.
    pub fn handle(&mut self, msg: ActorMsg) -> Result<ActorState> {
        match self.state {
            ActorState::Exited => {
                return Err(self.core.violation(format!(
                    "received {} after exiting",
                    msg.kind()
                )));
            }
            ActorState::Zombie => self.handle_zombie(msg)?,
            ActorState::Initializing | ActorState::Normal => self.handle_active(msg)?,
        }

        Ok(self.state)
    }

    /// Whether the next act can run right now.
    pub fn is_ready_to_act(&self) -> bool {
        self.state == ActorState::Normal
            && self.core.is_naive_read_ready()
            && self.core.is_naive_write_ready()
            && self.variant.custom_read_ready(&self.core)
            && self.variant.custom_write_ready(&self.core)
    }

    pub fn drain_outbox(&mut self) -> Vec<Envelope> {
        self.core.drain_outbox()
    }

    pub fn summary(&self) -> ActorSummary {
        ActorSummary {
            actor_id: self.core.id(),
            name: self.core.name().to_string(),
            kind: self.variant.kind(),
            act_count: self.core.act_count(),
        }
    }

    fn handle_active(&mut self, msg: ActorMsg) -> Result<()> {
        match msg {
            ActorMsg::Regst(regst) => self.on_regst_arrived(regst)?,
            ActorMsg::ReturnRegst(regst) => self.variant.on_regst_returned(&mut self.core, regst)?,
            ActorMsg::Eord { desc_id } => self.core.mark_eord(desc_id)?,
            ActorMsg::Cmd(ActorCmd::InitModel) => {
                if self.init_requested {
                    return Err(self.core.violation("second init model command"));
                }
                self.init_requested = true;
            }
            ActorMsg::Cmd(cmd) => self.variant.on_cmd(&mut self.core, cmd)?,
        }

        if self.state == ActorState::Initializing {
            if !self.init_requested || !self.variant.try_init(&mut self.core)? {
                return Ok(());
            }

            debug!(actor_id = self.id(); "initialized");
            self.state = ActorState::Normal;
        }

        while self.is_ready_to_act() {
            self.variant.act(&mut self.core)?;
        }

        if self.variant.is_exhausted(&self.core) {
            self.enter_zombie()?;
        }

        Ok(())
    }

    fn on_regst_arrived(&mut self, regst: Regst) -> Result<()> {
        let desc_id = regst.desc_id();

        if self.core.is_naive_consumed(desc_id) {
            self.core.push_naive_readable(regst)
        } else if self.core.is_consumed(desc_id) {
            self.variant.on_custom_regst_arrived(&mut self.core, regst)
        } else {
            Err(self
                .core
                .violation(format!("register of unknown descriptor {desc_id}")))
        }
    }

    fn enter_zombie(&mut self) -> Result<()> {
        self.variant.return_custom_regsts(&mut self.core)?;
        self.core.send_eord_for_all_produced();
        self.state = ActorState::Zombie;
        debug!(actor_id = self.id(), acts = self.core.act_count(); "winding down");

        self.try_exit();
        Ok(())
    }

    fn handle_zombie(&mut self, msg: ActorMsg) -> Result<()> {
        match msg {
            ActorMsg::Regst(regst) => {
                if !self.core.is_consumed(regst.desc_id()) {
                    return Err(self.core.violation(format!(
                        "register of unknown descriptor {}",
                        regst.desc_id()
                    )));
                }
                self.core.return_regst(regst);
            }
            ActorMsg::ReturnRegst(regst) => self.core.release_returned(regst)?,
            ActorMsg::Eord { desc_id } => self.core.mark_eord(desc_id)?,
            ActorMsg::Cmd(cmd) => {
                warn!(actor_id = self.id(); "ignoring {cmd:?} while winding down");
            }
        }

        self.try_exit();
        Ok(())
    }

    fn try_exit(&mut self) {
        if self.core.all_consumed_eord() && self.core.all_produced_idle() {
            self.state = ActorState::Exited;
        }
    }

    /// Receives and handles messages until the actor exits.
    ///
    /// Handlers are CPU bound, they run through `block_in_place` and therefore need
    /// the multi threaded runtime.
    ///
    /// # Arguments
    /// * `mailbox` - The receiving end of this actor's mailbox.
    /// * `router` - Delivers the messages this actor sends.
    ///
    /// # Returns
    /// The actor's summary, or the error that made it fail.
    pub async fn run(
        mut self,
        mut mailbox: UnboundedReceiver<ActorMsg>,
        router: MessageRouter,
    ) -> Result<ActorSummary> {
        let id = self.id();
        debug!(actor_id = id, kind = self.kind(); "actor started");

        while let Some(msg) = mailbox.recv().await {
            let state = task::block_in_place(|| self.handle(msg))?;

            for Envelope { dst, msg } in self.drain_outbox() {
                router.deliver(dst, msg)?;
            }

            if state == ActorState::Exited {
                let summary = self.summary();
                info!(actor_id = id, acts = summary.act_count; "actor exited");
                return Ok(summary);
            }
        }

        Err(ActorErr::MailboxClosed(id))
    }
}
