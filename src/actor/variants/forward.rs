use log::{debug, info};

use crate::{
    Result,
    actor::{ActorCmd, ActorCore, ActorVariant, NaiveConsumed},
    config::ModelSaveSpec,
    register::{BlobMap, Regst, RegstDescId},
};

/// Runs the forward pass of a model it doesn't own.
///
/// Consumes the data register `in` the naive way and the `model` and `const_model`
/// registers as bindings that stay across acts. It produces a constant buffer, computed
/// once at init and shared with the backward actors, and a forward model written by
/// every act and periodically handed to a checkpoint actor.
#[derive(Debug, Default)]
pub struct ForwardActor {
    model_save: Option<ModelSaveSpec>,
    model: Option<Regst>,
    const_model: Option<Regst>,
    const_buf: Option<Regst>,
    forward_model: Option<Regst>,
    forward_model_seed: Option<BlobMap>,
}

impl ForwardActor {
    /// Creates a new `ForwardActor`.
    ///
    /// # Arguments
    /// * `model_save` - When to hand the forward model to the checkpoint actors, if ever.
    pub fn new(model_save: Option<ModelSaveSpec>) -> Self {
        Self {
            model_save,
            ..Default::default()
        }
    }

    fn model_version_id(&self) -> Option<u64> {
        self.model.as_ref().and_then(Regst::model_version_id)
    }

    fn acquire_custom(core: &mut ActorCore, name: &str) -> Result<Option<Regst>> {
        let Some(desc_id) = core.produced_desc_id(name) else {
            return Ok(None);
        };

        match core.acquire(desc_id) {
            Some(regst) => Ok(Some(regst)),
            None => Err(core.violation(format!("no free `{name}` register at init"))),
        }
    }

    /// Hands the current forward model to the checkpoint actors, then takes the next one.
    fn save_forward_model(&mut self, core: &mut ActorCore, piece_id: i64, batch_id: u64) -> Result<()> {
        let Some(mut regst) = self.forward_model.take() else {
            return Err(core.violation("saving a forward model that isn't held"));
        };

        let seed = regst.blobs().clone();
        regst.set_piece_id(piece_id);
        regst.set_model_version_id(Some(batch_id));
        core.dispatch_produced(regst, false)?;
        info!(actor_id = core.id(), batch_id = batch_id; "forward model sent to checkpoint");

        self.forward_model_seed = Some(seed);
        self.acquire_forward_model(core)
    }

    /// Takes a free forward model register and seeds it with the last dispatched contents.
    ///
    /// Leaves the actor stalled if every register is still being checkpointed.
    fn acquire_forward_model(&mut self, core: &mut ActorCore) -> Result<()> {
        let Some(desc_id) = core.produced_desc_id("forward_model") else {
            return Ok(());
        };

        let Some(mut regst) = core.acquire(desc_id) else {
            debug!(actor_id = core.id(); "waiting for a forward model register");
            return Ok(());
        };

        if let Some(seed) = self.forward_model_seed.take() {
            let Some(blobs) = regst.blobs_mut() else {
                return Err(core.violation("acquired a forward model that is still shared"));
            };
            *blobs = seed;
        }

        self.forward_model = Some(regst);
        Ok(())
    }

    fn is_forward_model(core: &ActorCore, desc_id: RegstDescId) -> bool {
        core.produced_desc_id("forward_model") == Some(desc_id)
    }
}

impl ActorVariant for ForwardActor {
    fn kind(&self) -> &'static str {
        "forward"
    }

    fn naive_consumed(&self) -> NaiveConsumed {
        NaiveConsumed::Only(&["in"])
    }

    fn custom_produced(&self) -> &'static [&'static str] {
        &["const_buf", "forward_model"]
    }

    fn on_custom_regst_arrived(&mut self, core: &mut ActorCore, regst: Regst) -> Result<()> {
        let desc_id = Some(regst.desc_id());

        if desc_id == core.consumed_desc_id("model") {
            debug!(
                actor_id = core.id(),
                version = regst.model_version_id().unwrap_or_default();
                "model updated"
            );

            if let Some(old) = self.model.replace(regst) {
                core.return_regst(old);
            }

            return Ok(());
        }

        if desc_id == core.consumed_desc_id("const_model") {
            if self.const_model.is_some() {
                return Err(core.violation("received a second const model"));
            }

            self.const_model = Some(regst);
            return Ok(());
        }

        Err(core.violation(format!(
            "unexpected register of descriptor {}",
            regst.desc_id()
        )))
    }

    fn try_init(&mut self, core: &mut ActorCore) -> Result<bool> {
        let model_missing = core.consumed_desc_id("model").is_some() && self.model.is_none();
        let const_model_missing =
            core.consumed_desc_id("const_model").is_some() && self.const_model.is_none();

        if model_missing || const_model_missing {
            return Ok(false);
        }

        let mut const_buf = Self::acquire_custom(core, "const_buf")?;
        let mut forward_model = Self::acquire_custom(core, "forward_model")?;

        let inputs: Vec<&Regst> = self.model.iter().chain(&self.const_model).collect();
        let mut outputs: Vec<&mut Regst> = const_buf.iter_mut().chain(forward_model.iter_mut()).collect();
        core.init_model_and_const_buf(self.model_version_id(), &inputs, &mut outputs)?;

        self.forward_model = forward_model;

        if let Some(buf) = const_buf {
            let desc_id = buf.desc_id();
            self.const_buf = core.dispatch_produced(buf, true)?;
            core.send_cmd_to_consumers(desc_id, ActorCmd::ConstBufInitDone);
        }

        Ok(true)
    }

    fn custom_read_ready(&self, core: &ActorCore) -> bool {
        let model_ready = core.consumed_desc_id("model").is_none() || self.model.is_some();
        let const_model_ready =
            core.consumed_desc_id("const_model").is_none() || self.const_model.is_some();
        let const_buf_ready = core.produced_desc_id("const_buf").is_none() || self.const_buf.is_some();

        model_ready && const_model_ready && const_buf_ready
    }

    fn custom_write_ready(&self, core: &ActorCore) -> bool {
        core.produced_desc_id("forward_model").is_none() || self.forward_model.is_some()
    }

    fn act(&mut self, core: &mut ActorCore) -> Result<()> {
        let piece_id = core.first_naive_piece_id();
        let version = self.model_version_id();

        let inputs: Vec<&Regst> = self
            .model
            .iter()
            .chain(&self.const_model)
            .chain(&self.const_buf)
            .collect();
        let mut outputs: Vec<&mut Regst> = self.forward_model.iter_mut().collect();
        core.naive_act(piece_id, &inputs, &mut outputs, version)?;

        if let Some(batch_id) = self.model_save.and_then(|save| save.batch_to_save(piece_id)) {
            self.save_forward_model(core, piece_id, batch_id)?;
        }

        Ok(())
    }

    fn on_regst_returned(&mut self, core: &mut ActorCore, regst: Regst) -> Result<()> {
        let desc_id = regst.desc_id();
        core.release_returned(regst)?;

        if self.forward_model.is_none() && Self::is_forward_model(core, desc_id) {
            self.acquire_forward_model(core)?;
        }

        Ok(())
    }

    fn return_custom_regsts(&mut self, core: &mut ActorCore) -> Result<()> {
        if let Some(model) = self.model.take() {
            core.return_regst(model);
        }

        if let Some(const_model) = self.const_model.take() {
            core.return_regst(const_model);
        }

        if let Some(const_buf) = self.const_buf.take() {
            core.release_returned(const_buf)?;
        }

        if let Some(forward_model) = self.forward_model.take() {
            core.reclaim(forward_model)?;
        }

        self.forward_model_seed = None;
        Ok(())
    }
}
