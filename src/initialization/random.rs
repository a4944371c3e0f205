use std::{cell::RefCell, rc::Rc};

use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use super::{ParamGen, Result};
use crate::config::DistributionSpec;

/// Draws the values of a model blob from a probability distribution.
///
/// Every blob of a model shares the same `rng`, so a seeded model update task always
/// starts from the same version 0.
pub struct RandParamGen<R: Rng, D: Distribution<f32>> {
    rng: Rc<RefCell<R>>,
    distribution: D,
}

impl<R: Rng, D: Distribution<f32>> RandParamGen<R, D> {
    pub fn new(rng: Rc<RefCell<R>>, distribution: D) -> Self {
        Self { rng, distribution }
    }
}

impl<R: Rng, D: Distribution<f32>> ParamGen for RandParamGen<R, D> {
    fn fill(&mut self, values: &mut [f32]) {
        let mut rng = self.rng.borrow_mut();
        values
            .iter_mut()
            .for_each(|v| *v = self.distribution.sample(&mut *rng));
    }
}

/// Builds the random generator described by `spec`.
///
/// # Arguments
/// * `rng` - The shared random stream.
/// * `spec` - The distribution and its parameters.
///
/// # Returns
/// A `RandErr` if the distribution parameters are invalid.
pub fn rand_param_gen<R: Rng + 'static>(
    rng: Rc<RefCell<R>>,
    spec: DistributionSpec,
) -> Result<Box<dyn ParamGen>> {
    let uniform = |low: f32, high: f32| -> Result<Box<dyn ParamGen>> {
        let distribution = Uniform::new(low, high)?;
        Ok(Box::new(RandParamGen::new(rng.clone(), distribution)))
    };

    let normal = |mean: f32, std_dev: f32| -> Result<Box<dyn ParamGen>> {
        let distribution = Normal::new(mean, std_dev)?;
        Ok(Box::new(RandParamGen::new(rng.clone(), distribution)))
    };

    match spec {
        DistributionSpec::Uniform { low, high } => uniform(low, high),
        DistributionSpec::UniformInclusive { low, high } => {
            let distribution = Uniform::new_inclusive(low, high)?;
            Ok(Box::new(RandParamGen::new(rng.clone(), distribution)))
        }
        DistributionSpec::XavierUniform { fan_in, fan_out } => {
            let range = (6. / (fan_in + fan_out) as f32).sqrt();
            uniform(-range, range)
        }
        DistributionSpec::LecunUniform { fan_in } => {
            let range = (3. / fan_in as f32).sqrt();
            uniform(-range, range)
        }
        DistributionSpec::Normal { mean, std_dev } => normal(mean, std_dev),
        DistributionSpec::Kaiming { fan_in } => normal(0., (2. / fan_in as f32).sqrt()),
        DistributionSpec::Xavier { fan_in, fan_out } => {
            normal(0., (2. / (fan_in + fan_out) as f32).sqrt())
        }
        DistributionSpec::Lecun { fan_in } => normal(0., (1. / fan_in as f32).sqrt()),
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn seeded_rng() -> Rc<RefCell<StdRng>> {
        Rc::new(RefCell::new(StdRng::seed_from_u64(42)))
    }

    #[test]
    fn uniform_stays_in_range() {
        let spec = DistributionSpec::Uniform {
            low: -1.,
            high: 1.,
        };

        let mut values: [f32; 100] = [2.; 100];
        rand_param_gen(seeded_rng(), spec).unwrap().fill(&mut values);

        assert!(values.iter().all(|v| (-1. ..1.).contains(v)));
    }

    #[test]
    fn same_seed_same_values() {
        let spec = DistributionSpec::Kaiming { fan_in: 4 };

        let (mut a, mut b): ([f32; 8], [f32; 8]) = ([0.; 8], [0.; 8]);
        rand_param_gen(seeded_rng(), spec).unwrap().fill(&mut a);
        rand_param_gen(seeded_rng(), spec).unwrap().fill(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn generators_share_the_stream() {
        let rng = seeded_rng();
        let spec = DistributionSpec::Normal {
            mean: 0.,
            std_dev: 1.,
        };

        let (mut a, mut b): ([f32; 4], [f32; 4]) = ([0.; 4], [0.; 4]);
        rand_param_gen(rng.clone(), spec).unwrap().fill(&mut a);
        rand_param_gen(rng, spec).unwrap().fill(&mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn invalid_range() {
        let spec = DistributionSpec::Uniform { low: 1., high: 0. };
        assert!(rand_param_gen(seeded_rng(), spec).is_err());
    }
}
