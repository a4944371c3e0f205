use rayon::prelude::*;
use serde::Deserialize;
use serde_json::Value;

use crate::kernel::{Kernel, KernelCtx, KernelErr, KernelIo, parse_attrs};

#[derive(Debug, Deserialize)]
#[serde(default)]
struct AffineGradConf {
    out_diff: String,
}

impl Default for AffineGradConf {
    fn default() -> Self {
        Self {
            out_diff: "y".to_string(),
        }
    }
}

/// The weight gradient of `affine`: `weight_diff = xᵀ · (dy ⊙ scale)`.
///
/// `dy` is read from the blob named by the `out_diff` attribute, the forward output by default.
#[derive(Debug)]
pub struct AffineGrad {
    conf: AffineGradConf,
}

pub fn create(attrs: &Value) -> Result<Box<dyn Kernel>, KernelErr> {
    let conf = parse_attrs("affine_grad", attrs)?;
    Ok(Box::new(AffineGrad { conf }))
}

impl Kernel for AffineGrad {
    fn compute(&self, _ctx: &KernelCtx, io: &mut KernelIo<'_>) -> Result<(), KernelErr> {
        let x = io.input("x")?;
        let dy = io.input(&self.conf.out_diff)?;
        let (rows, k) = x.rows_cols("x")?;
        let (_, n) = dy.rows_cols(&self.conf.out_diff)?;
        dy.check_shape(&self.conf.out_diff, &[rows, n])?;

        let scale = if io.has_input("scale") {
            let scale = io.input("scale")?;
            scale.check_shape("scale", &[n])?;
            Some(scale.data())
        } else {
            None
        };

        let weight_diff = io.output("weight_diff")?;
        weight_diff.check_shape("weight_diff", &[k, n])?;

        let (x, dy) = (x.data(), dy.data());
        weight_diff
            .data_mut()
            .par_chunks_mut(n)
            .enumerate()
            .for_each(|(i, row)| {
                for (j, out) in row.iter_mut().enumerate() {
                    let s = scale.map_or(1., |s| s[j]);
                    *out = (0..rows).map(|r| x[r * k + i] * dy[r * n + j] * s).sum();
                }
            });

        Ok(())
    }
}
