use std::collections::BTreeMap;

use log::{info, warn};

use crate::{
    ActorErr, Result,
    actor::{ActorCore, ActorVariant, NaiveConsumed},
    kernel::KernelErr,
    optimization::Optimizer,
};

/// One model blob owned by the model update actor.
pub struct ModelBlob {
    values: Vec<f32>,
    diff_sum: Vec<f32>,
    optimizer: Box<dyn Optimizer>,
}

impl ModelBlob {
    /// Creates a new `ModelBlob`.
    ///
    /// # Arguments
    /// * `values` - The values of version 0.
    /// * `optimizer` - The update rule of this blob.
    pub fn new(values: Vec<f32>, optimizer: Box<dyn Optimizer>) -> Self {
        Self {
            diff_sum: vec![0.; values.len()],
            values,
            optimizer,
        }
    }
}

/// Owns the model and publishes a new version of it after every batch.
///
/// Consumes `model_diff` registers, each holding a `<name>_diff` blob for every model
/// blob `<name>`. The diffs of `pieces_per_batch` pieces are averaged and applied by the
/// blob's optimizer, then the new version is sent on the produced `model` descriptor.
pub struct ModelUpdateActor {
    blobs: BTreeMap<String, ModelBlob>,
    pieces_per_batch: u64,
    accumulated: u64,
    next_version: u64,
}

impl ModelUpdateActor {
    pub fn new(blobs: BTreeMap<String, ModelBlob>, pieces_per_batch: u64) -> Self {
        Self {
            blobs,
            pieces_per_batch,
            accumulated: 0,
            next_version: 0,
        }
    }

    fn publish(&mut self, core: &mut ActorCore, piece_id: i64) -> Result<()> {
        let Some(desc_id) = core.produced_desc_id("model") else {
            return Err(core.violation("model update actor doesn't produce `model`"));
        };

        let Some(mut regst) = core.acquire(desc_id) else {
            return Err(core.violation("published a model without a free register"));
        };

        let Some(regst_blobs) = regst.blobs_mut() else {
            return Err(core.violation("acquired a model register that is still shared"));
        };

        for (name, blob) in &self.blobs {
            let Some(out) = regst_blobs.get_mut(name) else {
                return Err(kernel_failure(core, KernelErr::MissingBlob { name: name.clone() }));
            };

            if out.len() != blob.values.len() {
                let err = KernelErr::SizeMismatch {
                    got: blob.values.len(),
                    expected: out.len(),
                };
                return Err(kernel_failure(core, err));
            }

            out.data_mut().copy_from_slice(&blob.values);
        }

        let version = self.next_version;
        regst.set_piece_id(piece_id);
        regst.set_model_version_id(Some(version));
        core.dispatch_produced(regst, false)?;
        self.next_version += 1;

        info!(actor_id = core.id(), version = version; "published model");
        Ok(())
    }

    fn apply_batch(&mut self, core: &ActorCore) -> Result<()> {
        let scale = 1. / self.pieces_per_batch as f32;

        for blob in self.blobs.values_mut() {
            blob.diff_sum.iter_mut().for_each(|d| *d *= scale);
            blob.optimizer
                .step(&blob.diff_sum, &mut blob.values)
                .map_err(|e| kernel_failure(core, e.into()))?;
            blob.diff_sum.fill(0.);
        }

        self.accumulated = 0;
        Ok(())
    }

    fn closes_batch(&self) -> bool {
        self.accumulated + 1 == self.pieces_per_batch
    }
}

fn kernel_failure(core: &ActorCore, source: KernelErr) -> ActorErr {
    ActorErr::KernelFailure {
        actor: core.id(),
        source,
    }
}

impl ActorVariant for ModelUpdateActor {
    fn kind(&self) -> &'static str {
        "model_update"
    }

    fn naive_consumed(&self) -> NaiveConsumed {
        NaiveConsumed::Only(&["model_diff"])
    }

    fn custom_produced(&self) -> &'static [&'static str] {
        &["model"]
    }

    fn try_init(&mut self, core: &mut ActorCore) -> Result<bool> {
        self.publish(core, -1)?;
        Ok(true)
    }

    fn custom_write_ready(&self, core: &ActorCore) -> bool {
        if !self.closes_batch() {
            return true;
        }

        core.produced_desc_id("model")
            .and_then(|desc_id| core.pool(desc_id))
            .is_some_and(|pool| pool.has_free())
    }

    fn act(&mut self, core: &mut ActorCore) -> Result<()> {
        let Some(diff) = core.cur_naive_readable("model_diff") else {
            return Err(core.violation("acted without a model diff"));
        };

        let piece_id = diff.piece_id();
        for (name, blob) in self.blobs.iter_mut() {
            let diff_name = format!("{name}_diff");
            let Some(diff_blob) = diff.blob(&diff_name) else {
                return Err(kernel_failure(core, KernelErr::MissingBlob { name: diff_name }));
            };

            if diff_blob.len() != blob.diff_sum.len() {
                let err = KernelErr::SizeMismatch {
                    got: diff_blob.len(),
                    expected: blob.diff_sum.len(),
                };
                return Err(kernel_failure(core, err));
            }

            for (sum, d) in blob.diff_sum.iter_mut().zip(diff_blob.data()) {
                *sum += d;
            }
        }

        core.return_cur_naive_readable();
        core.count_act();

        if self.closes_batch() {
            self.apply_batch(core)?;
            self.publish(core, piece_id)?;
        } else {
            self.accumulated += 1;
        }

        Ok(())
    }

    fn return_custom_regsts(&mut self, core: &mut ActorCore) -> Result<()> {
        if self.accumulated > 0 {
            warn!(
                actor_id = core.id(),
                pieces = self.accumulated;
                "dropping the diffs of an incomplete batch"
            );
        }

        Ok(())
    }
}
