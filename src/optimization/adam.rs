use super::{Optimizer, Result, error::check_len};

/// Adam, with bias corrected first and second moments.
#[derive(Debug)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    beta1_pow: f32,
    beta2_pow: f32,
    first: Box<[f32]>,
    second: Box<[f32]>,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of values of the model blob.
    /// * `learning_rate` - The factor applied to every step.
    /// * `beta1`, `beta2` - The decay of the first and second moment estimates.
    /// * `epsilon` - Keeps the denominator away from zero.
    ///
    /// # Returns
    /// A new `Adam` instance with zeroed moments.
    pub fn new(len: usize, learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            beta1_pow: 1.,
            beta2_pow: 1.,
            first: vec![0.; len].into_boxed_slice(),
            second: vec![0.; len].into_boxed_slice(),
        }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, diff: &[f32], model: &mut [f32]) -> Result<()> {
        check_len(diff, model)?;
        check_len(diff, &self.first)?;

        let (b1, b2, eps) = (self.beta1, self.beta2, self.epsilon);
        self.beta1_pow *= b1;
        self.beta2_pow *= b2;

        let step_size = self.learning_rate * (1. - self.beta2_pow).sqrt() / (1. - self.beta1_pow);

        let moments = self.first.iter_mut().zip(self.second.iter_mut());
        for ((m, d), (first, second)) in model.iter_mut().zip(diff).zip(moments) {
            *first = b1 * *first + (1. - b1) * d;
            *second = b2 * *second + (1. - b2) * d * d;
            *m -= step_size * *first / (second.sqrt() + eps);
        }

        Ok(())
    }
}
