use crate::{
    Result,
    actor::{ActorCore, ActorVariant},
};

/// Has no inputs, fires once for each piece id in `0..pieces`.
#[derive(Debug)]
pub struct SourceActor {
    pieces: u64,
    next_piece: u64,
}

impl SourceActor {
    pub fn new(pieces: u64) -> Self {
        Self {
            pieces,
            next_piece: 0,
        }
    }
}

impl ActorVariant for SourceActor {
    fn kind(&self) -> &'static str {
        "source"
    }

    fn custom_read_ready(&self, _core: &ActorCore) -> bool {
        self.next_piece < self.pieces
    }

    fn act(&mut self, core: &mut ActorCore) -> Result<()> {
        core.naive_act(self.next_piece as i64, &[], &mut [], None)?;
        self.next_piece += 1;
        Ok(())
    }

    fn is_exhausted(&self, _core: &ActorCore) -> bool {
        self.next_piece == self.pieces
    }
}
