use rayon::prelude::*;
use serde::Deserialize;
use serde_json::Value;

use crate::kernel::{Kernel, KernelCtx, KernelErr, KernelIo, parse_attrs};

#[derive(Debug, Deserialize)]
#[serde(default)]
struct AffineConf {
    const_scale: f32,
    momentum: f32,
}

impl Default for AffineConf {
    fn default() -> Self {
        Self {
            const_scale: 1.,
            momentum: 0.9,
        }
    }
}

/// `y = (x · weight) ⊙ scale`, row by row.
///
/// Inputs `x` `[rows, k]` and `weight` `[k, n]`, the constant buffer blob `scale` `[n]`
/// is optional. When a `moving_mean` output `[n]` is bound it's updated with the mean of
/// the rows of `y`, which is the state a forward actor hands to its checkpoint actor.
#[derive(Debug)]
pub struct Affine {
    conf: AffineConf,
}

pub fn create(attrs: &Value) -> Result<Box<dyn Kernel>, KernelErr> {
    let conf: AffineConf = parse_attrs("affine", attrs)?;

    if !(0. ..=1.).contains(&conf.momentum) {
        return Err(KernelErr::InvalidConf {
            op_type: "affine".to_string(),
            detail: format!("momentum {} is out of [0, 1]", conf.momentum),
        });
    }

    Ok(Box::new(Affine { conf }))
}

impl Kernel for Affine {
    fn compute(&self, _ctx: &KernelCtx, io: &mut KernelIo<'_>) -> Result<(), KernelErr> {
        let x = io.input("x")?;
        let weight = io.input("weight")?;
        let (rows, k) = x.rows_cols("x")?;
        let (_, n) = weight.rows_cols("weight")?;
        weight.check_shape("weight", &[k, n])?;

        let scale = if io.has_input("scale") {
            let scale = io.input("scale")?;
            scale.check_shape("scale", &[n])?;
            Some(scale.data())
        } else {
            None
        };

        let y = io.output("y")?;
        y.check_shape("y", &[rows, n])?;

        let (x, weight) = (x.data(), weight.data());
        y.data_mut()
            .par_chunks_mut(n)
            .enumerate()
            .for_each(|(r, row)| {
                let x_row = &x[r * k..(r + 1) * k];

                for (j, out) in row.iter_mut().enumerate() {
                    let dot: f32 = x_row
                        .iter()
                        .enumerate()
                        .map(|(i, xi)| xi * weight[i * n + j])
                        .sum();

                    *out = dot * scale.map_or(1., |s| s[j]);
                }
            });

        if !io.has_output("moving_mean") {
            return Ok(());
        }

        let mut means = vec![0.; n];
        for row in io.output("y")?.data().chunks(n) {
            for (mean, v) in means.iter_mut().zip(row) {
                *mean += v / rows as f32;
            }
        }

        let mu = self.conf.momentum;
        let moving_mean = io.output("moving_mean")?;
        moving_mean.check_shape("moving_mean", &[n])?;
        for (m, mean) in moving_mean.data_mut().iter_mut().zip(means) {
            *m = mu * *m + (1. - mu) * mean;
        }

        Ok(())
    }

    fn init_model_and_const_buf(
        &self,
        _ctx: &KernelCtx,
        io: &mut KernelIo<'_>,
    ) -> Result<(), KernelErr> {
        if io.has_output("scale") {
            io.output("scale")?.fill(self.conf.const_scale);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::register::Blob;

    const CTX: KernelCtx = KernelCtx {
        piece_id: 0,
        random_seed: 0,
        model_version_id: Some(0),
    };

    #[test]
    fn scaled_product() {
        let kernel = create(&json!({ "momentum": 0.5 })).unwrap();

        let x = Blob::from_vec(&[2, 2], vec![1., 2., 3., 4.]).unwrap();
        let weight = Blob::from_vec(&[2, 1], vec![1., 1.]).unwrap();
        let scale = Blob::from_vec(&[1], vec![2.]).unwrap();
        let mut y = Blob::zeros(&[2, 1]);
        let mut moving_mean = Blob::zeros(&[1]);

        let mut io = KernelIo::new();
        io.bind_input("x", &x).unwrap();
        io.bind_input("weight", &weight).unwrap();
        io.bind_input("scale", &scale).unwrap();
        io.bind_output("y", &mut y).unwrap();
        io.bind_output("moving_mean", &mut moving_mean).unwrap();
        kernel.compute(&CTX, &mut io).unwrap();
        drop(io);

        assert_eq!(y.data(), [6., 14.]);
        assert_eq!(moving_mean.data(), [5.]);
    }

    #[test]
    fn rejects_mismatched_weight() {
        let kernel = create(&Value::Null).unwrap();

        let x = Blob::zeros(&[2, 3]);
        let weight = Blob::zeros(&[2, 2]);
        let mut y = Blob::zeros(&[2, 2]);

        let mut io = KernelIo::new();
        io.bind_input("x", &x).unwrap();
        io.bind_input("weight", &weight).unwrap();
        io.bind_output("y", &mut y).unwrap();

        let err = kernel.compute(&CTX, &mut io).unwrap_err();
        assert!(matches!(err, KernelErr::ShapeMismatch { blob, .. } if blob == "weight"));
    }

    #[test]
    fn fills_const_buf() {
        let kernel = create(&json!({ "const_scale": 0.5 })).unwrap();
        let mut scale = Blob::zeros(&[3]);

        let mut io = KernelIo::new();
        io.bind_output("scale", &mut scale).unwrap();
        kernel.init_model_and_const_buf(&CTX, &mut io).unwrap();
        drop(io);

        assert_eq!(scale.data(), [0.5; 3]);
    }
}
