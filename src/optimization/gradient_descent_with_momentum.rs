use super::{Optimizer, Result, error::check_len};

/// Gradient descent where each step keeps a fraction of the previous one.
#[derive(Debug)]
pub struct GradientDescentWithMomentum {
    learning_rate: f32,
    momentum: f32,
    velocity: Box<[f32]>,
}

impl GradientDescentWithMomentum {
    /// Creates a new `GradientDescentWithMomentum` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of values of the model blob.
    /// * `learning_rate` - The factor applied to every step.
    /// * `momentum` - The fraction of the previous velocity that's kept.
    pub fn new(len: usize, learning_rate: f32, momentum: f32) -> Self {
        Self {
            learning_rate,
            momentum,
            velocity: vec![0.; len].into_boxed_slice(),
        }
    }
}

impl Optimizer for GradientDescentWithMomentum {
    fn step(&mut self, diff: &[f32], model: &mut [f32]) -> Result<()> {
        check_len(diff, model)?;
        check_len(diff, &self.velocity)?;

        for ((m, d), v) in model.iter_mut().zip(diff).zip(self.velocity.iter_mut()) {
            *v = self.momentum * *v + d;
            *m -= self.learning_rate * *v;
        }

        Ok(())
    }
}
