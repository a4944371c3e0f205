use super::{Optimizer, Result, error::check_len};

#[derive(Debug)]
pub struct GradientDescent {
    learning_rate: f32,
}

impl GradientDescent {
    pub fn new(learning_rate: f32) -> Self {
        Self { learning_rate }
    }
}

impl Optimizer for GradientDescent {
    fn step(&mut self, diff: &[f32], model: &mut [f32]) -> Result<()> {
        check_len(diff, model)?;

        model
            .iter_mut()
            .zip(diff)
            .for_each(|(m, d)| *m -= self.learning_rate * d);

        Ok(())
    }
}
