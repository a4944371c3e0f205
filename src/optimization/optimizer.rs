use super::{Adam, GradientDescent, GradientDescentWithMomentum, Result};
use crate::config::OptimizerSpec;

/// Defines how a model blob moves given the averaged diff of a batch.
pub trait Optimizer: Send {
    /// Applies one update step to `model`.
    ///
    /// # Arguments
    /// * `diff` - The averaged diff of the batch.
    /// * `model` - The model blob values to update in place.
    ///
    /// # Returns
    /// An error if `diff` and `model` have different sizes.
    fn step(&mut self, diff: &[f32], model: &mut [f32]) -> Result<()>;
}

/// Creates the optimizer described by `spec` for a blob of `len` values.
pub fn optimizer_from_spec(spec: OptimizerSpec, len: usize) -> Box<dyn Optimizer> {
    match spec {
        OptimizerSpec::GradientDescent { learning_rate } => {
            Box::new(GradientDescent::new(learning_rate))
        }
        OptimizerSpec::GradientDescentWithMomentum {
            learning_rate,
            momentum,
        } => Box::new(GradientDescentWithMomentum::new(len, learning_rate, momentum)),
        OptimizerSpec::Adam {
            learning_rate,
            beta1,
            beta2,
            epsilon,
        } => Box::new(Adam::new(len, learning_rate, beta1, beta2, epsilon)),
    }
}
