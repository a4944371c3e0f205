use crate::register::{ActorId, Regst, RegstDescId};

/// Control commands that aren't tied to a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorCmd {
    /// Sent once to every actor when the graph starts.
    InitModel,
    /// Sent by a forward actor to its const buffer consumers after sharing the buffer.
    ConstBufInitDone,
}

/// The messages exchanged between actors.
#[derive(Debug)]
pub enum ActorMsg {
    /// A producer hands a register to one of its consumers.
    Regst(Regst),
    /// A consumer is done reading a register and gives it back to its producer.
    ReturnRegst(Regst),
    /// The producer of `desc_id` won't send any more registers of it.
    Eord { desc_id: RegstDescId },
    Cmd(ActorCmd),
}

impl ActorMsg {
    pub fn kind(&self) -> &'static str {
        match self {
            ActorMsg::Regst(_) => "regst",
            ActorMsg::ReturnRegst(_) => "return_regst",
            ActorMsg::Eord { .. } => "eord",
            ActorMsg::Cmd(ActorCmd::InitModel) => "init_model",
            ActorMsg::Cmd(ActorCmd::ConstBufInitDone) => "const_buf_init_done",
        }
    }
}

/// A message together with the actor it's addressed to.
#[derive(Debug)]
pub struct Envelope {
    pub dst: ActorId,
    pub msg: ActorMsg,
}
