use std::{error::Error, fmt, io};

use crate::{kernel::KernelErr, register::ActorId};

/// The crate's result type.
pub type Result<T> = std::result::Result<T, ActorErr>;

/// Failures that stop an actor or prevent a graph from being built.
///
/// Running out of free registers is not listed here, it is the normal
/// backpressure signal and never leaves the actor.
#[derive(Debug)]
pub enum ActorErr {
    ProtocolViolation {
        actor: ActorId,
        detail: String,
    },
    KernelFailure {
        actor: ActorId,
        source: KernelErr,
    },
    UninitializedBinding {
        actor: ActorId,
        binding: &'static str,
    },
    UnknownActor(ActorId),
    MailboxClosed(ActorId),
    InvalidGraph(String),
    Aborted(String),
    Io(io::Error),
}

impl fmt::Display for ActorErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorErr::ProtocolViolation { actor, detail } => {
                write!(f, "protocol violation in actor {actor}: {detail}")
            }
            ActorErr::KernelFailure { actor, source } => {
                write!(f, "kernel failure in actor {actor}: {source}")
            }
            ActorErr::UninitializedBinding { actor, binding } => {
                write!(f, "actor {actor} tried to act without its {binding} binding")
            }
            ActorErr::UnknownActor(id) => write!(f, "no mailbox registered for actor {id}"),
            ActorErr::MailboxClosed(id) => write!(f, "the mailbox of actor {id} is closed"),
            ActorErr::InvalidGraph(detail) => write!(f, "invalid task graph: {detail}"),
            ActorErr::Aborted(detail) => write!(f, "actor task aborted: {detail}"),
            ActorErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for ActorErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ActorErr::KernelFailure { source, .. } => Some(source),
            ActorErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ActorErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ActorErr {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidGraph(value.to_string())
    }
}
