use super::{ActorCmd, ActorCore, NaiveConsumed};
use crate::{Result, register::Regst};

/// The hooks that make a compute actor behave like a specific kind of actor.
///
/// One driver, `CompActor`, owns the state machine and calls these hooks. Everything that
/// isn't overridden behaves like a plain actor whose inputs and outputs are all naive.
pub trait ActorVariant: Send {
    fn kind(&self) -> &'static str;

    fn naive_consumed(&self) -> NaiveConsumed {
        NaiveConsumed::All
    }

    /// The produced descriptors the variant acquires and dispatches itself.
    fn custom_produced(&self) -> &'static [&'static str] {
        &[]
    }

    /// Called after `InitModel` and then after every message until it returns `true`.
    fn try_init(&mut self, _core: &mut ActorCore) -> Result<bool> {
        Ok(true)
    }

    fn on_custom_regst_arrived(&mut self, core: &mut ActorCore, regst: Regst) -> Result<()> {
        Err(core.violation(format!(
            "unexpected register of descriptor {}",
            regst.desc_id()
        )))
    }

    fn on_cmd(&mut self, core: &mut ActorCore, cmd: ActorCmd) -> Result<()> {
        Err(core.violation(format!("unexpected command {cmd:?}")))
    }

    fn custom_read_ready(&self, _core: &ActorCore) -> bool {
        true
    }

    fn custom_write_ready(&self, _core: &ActorCore) -> bool {
        true
    }

    /// Fires once, the driver only calls it when the actor is ready to act.
    fn act(&mut self, core: &mut ActorCore) -> Result<()>;

    fn on_regst_returned(&mut self, core: &mut ActorCore, regst: Regst) -> Result<()> {
        core.release_returned(regst)
    }

    /// Whether the actor won't ever fire again.
    fn is_exhausted(&self, core: &ActorCore) -> bool {
        core.is_naive_eord()
    }

    /// Gives back every custom register the variant still holds, right before winding down.
    fn return_custom_regsts(&mut self, _core: &mut ActorCore) -> Result<()> {
        Ok(())
    }
}
