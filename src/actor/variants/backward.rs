use crate::{
    Result,
    actor::{ActorCmd, ActorCore, ActorVariant, NaiveConsumed},
    register::Regst,
};

/// Runs the backward pass of a forward actor.
///
/// Every consumed descriptor is naive except `const_buf`, the buffer computed by the
/// forward actor at init. The actor doesn't fire until it holds that buffer and the
/// forward actor confirmed it's initialised.
#[derive(Debug, Default)]
pub struct BackwardActor {
    const_buf: Option<Regst>,
    const_buf_ready: bool,
}

impl BackwardActor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ActorVariant for BackwardActor {
    fn kind(&self) -> &'static str {
        "backward"
    }

    fn naive_consumed(&self) -> NaiveConsumed {
        NaiveConsumed::AllExcept(&["const_buf"])
    }

    fn on_custom_regst_arrived(&mut self, core: &mut ActorCore, regst: Regst) -> Result<()> {
        if core.consumed_desc_id("const_buf") != Some(regst.desc_id()) {
            return Err(core.violation(format!(
                "unexpected register of descriptor {}",
                regst.desc_id()
            )));
        }

        if self.const_buf.is_some() {
            return Err(core.violation("received a second const buffer"));
        }

        self.const_buf = Some(regst);
        Ok(())
    }

    fn on_cmd(&mut self, core: &mut ActorCore, cmd: ActorCmd) -> Result<()> {
        match cmd {
            ActorCmd::ConstBufInitDone if self.const_buf.is_none() => {
                Err(core.violation("const buffer init done before the const buffer"))
            }
            ActorCmd::ConstBufInitDone if self.const_buf_ready => {
                Err(core.violation("second const buffer init done"))
            }
            ActorCmd::ConstBufInitDone => {
                self.const_buf_ready = true;
                Ok(())
            }
            cmd => Err(core.violation(format!("unexpected command {cmd:?}"))),
        }
    }

    fn custom_read_ready(&self, core: &ActorCore) -> bool {
        core.consumed_desc_id("const_buf").is_none()
            || (self.const_buf.is_some() && self.const_buf_ready)
    }

    fn act(&mut self, core: &mut ActorCore) -> Result<()> {
        let piece_id = core.first_naive_piece_id();
        let version = core.first_naive_model_version_id();
        let inputs: Vec<&Regst> = self.const_buf.iter().collect();

        core.naive_act(piece_id, &inputs, &mut [], version)
    }

    fn return_custom_regsts(&mut self, core: &mut ActorCore) -> Result<()> {
        if let Some(const_buf) = self.const_buf.take() {
            core.return_regst(const_buf);
        }

        Ok(())
    }
}
