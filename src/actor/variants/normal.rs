use crate::{
    Result,
    actor::{ActorCore, ActorVariant},
};

/// Fires once per piece, every input and output is naive.
#[derive(Debug, Default)]
pub struct NormalActor;

impl ActorVariant for NormalActor {
    fn kind(&self) -> &'static str {
        "normal"
    }

    fn act(&mut self, core: &mut ActorCore) -> Result<()> {
        let piece_id = core.first_naive_piece_id();
        core.naive_act(piece_id, &[], &mut [], None)
    }
}
