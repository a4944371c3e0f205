use std::{collections::HashMap, sync::Arc};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::{
    ActorErr, Result,
    actor::{ActorCmd, ActorMsg},
    register::ActorId,
};

/// Delivers messages to actor mailboxes.
///
/// Mailboxes are unbounded, so delivering never blocks the sender. Messages from one
/// sender to one receiver arrive in the order they were sent.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    mailboxes: Arc<HashMap<ActorId, UnboundedSender<ActorMsg>>>,
}

impl MessageRouter {
    /// Creates a new `MessageRouter` and one mailbox per actor.
    ///
    /// # Arguments
    /// * `actors` - The ids of every actor in the graph.
    ///
    /// # Returns
    /// The router and the receiving end of each mailbox.
    pub fn new<I>(actors: I) -> (Self, HashMap<ActorId, UnboundedReceiver<ActorMsg>>)
    where
        I: IntoIterator<Item = ActorId>,
    {
        let mut mailboxes = HashMap::new();
        let mut receivers = HashMap::new();

        for id in actors {
            let (tx, rx) = unbounded_channel();
            mailboxes.insert(id, tx);
            receivers.insert(id, rx);
        }

        let router = Self {
            mailboxes: Arc::new(mailboxes),
        };

        (router, receivers)
    }

    /// Sends `msg` to the mailbox of `dst`.
    ///
    /// # Returns
    /// An error if `dst` is unknown or its mailbox was dropped.
    pub fn deliver(&self, dst: ActorId, msg: ActorMsg) -> Result<()> {
        let mailbox = self.mailboxes.get(&dst).ok_or(ActorErr::UnknownActor(dst))?;
        mailbox.send(msg).map_err(|_| ActorErr::MailboxClosed(dst))
    }

    /// Sends `cmd` to every actor.
    pub fn broadcast(&self, cmd: ActorCmd) -> Result<()> {
        self.mailboxes
            .keys()
            .try_for_each(|&dst| self.deliver(dst, ActorMsg::Cmd(cmd)))
    }
}
