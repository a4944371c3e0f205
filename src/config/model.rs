use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

/// The specification for the distribution of a `RandParamGen`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionSpec {
    Uniform { low: f32, high: f32 },
    UniformInclusive { low: f32, high: f32 },
    XavierUniform { fan_in: usize, fan_out: usize },
    LecunUniform { fan_in: usize },
    Normal { mean: f32, std_dev: f32 },
    Kaiming { fan_in: usize },
    Xavier { fan_in: usize, fan_out: usize },
    Lecun { fan_in: usize },
}

/// How the initial version of a model blob is generated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamGenSpec {
    Const { value: f32 },
    Rand { distribution: DistributionSpec },
}

/// The specification for the `Optimizer` trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerSpec {
    Adam {
        learning_rate: f32,
        beta1: f32,
        beta2: f32,
        epsilon: f32,
    },
    GradientDescent {
        learning_rate: f32,
    },
    GradientDescentWithMomentum {
        learning_rate: f32,
        momentum: f32,
    },
}

/// The cadence at which a forward actor hands its forward model to the checkpoint actor.
///
/// A piece closes a batch when `(piece_id + 1) % pieces_per_batch == 0`, and the forward
/// model is saved after every `batches_per_save` closed batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSaveSpec {
    pub pieces_per_batch: NonZeroU64,
    pub batches_per_save: NonZeroU64,
}

impl ModelSaveSpec {
    /// Decides whether the forward model must be saved after `piece_id`.
    ///
    /// # Returns
    /// The batch id to stamp on the saved model, or `None` if no save is due.
    pub fn batch_to_save(&self, piece_id: i64) -> Option<u64> {
        let piece_id = u64::try_from(piece_id).ok()?;
        let pieces = self.pieces_per_batch.get();

        if (piece_id + 1) % pieces != 0 {
            return None;
        }

        let batch_id = piece_id / pieces;
        ((batch_id + 1) % self.batches_per_save.get() == 0).then_some(batch_id)
    }
}
