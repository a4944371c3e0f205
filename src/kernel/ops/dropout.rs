use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Deserialize;
use serde_json::Value;

use crate::kernel::{Kernel, KernelCtx, KernelErr, KernelIo, parse_attrs};

const PIECE_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DropoutConf {
    rate: f32,
    input: String,
    output: String,
}

impl Default for DropoutConf {
    fn default() -> Self {
        Self {
            rate: 0.5,
            input: "x".to_string(),
            output: "y".to_string(),
        }
    }
}

/// Zeroes each value with probability `rate` and scales the kept ones by `1 / (1 - rate)`.
///
/// The random stream is derived from the task's seed and the piece id, so an act is
/// reproducible. If a `mask` output is bound it receives `1` for kept values and `0`
/// for dropped ones.
#[derive(Debug)]
pub struct Dropout {
    conf: DropoutConf,
}

pub fn create(attrs: &Value) -> Result<Box<dyn Kernel>, KernelErr> {
    let conf: DropoutConf = parse_attrs("dropout", attrs)?;

    if !(0. ..1.).contains(&conf.rate) {
        return Err(KernelErr::InvalidConf {
            op_type: "dropout".to_string(),
            detail: format!("rate {} is out of [0, 1)", conf.rate),
        });
    }

    Ok(Box::new(Dropout { conf }))
}

impl Kernel for Dropout {
    fn compute(&self, ctx: &KernelCtx, io: &mut KernelIo<'_>) -> Result<(), KernelErr> {
        let rate = self.conf.rate;
        let seed = ctx.random_seed ^ (ctx.piece_id as u64).wrapping_mul(PIECE_MIX);
        let mut rng = StdRng::seed_from_u64(seed);

        let x = io.input(&self.conf.input)?;
        let keep: Vec<bool> = (0..x.len()).map(|_| rng.random::<f32>() >= rate).collect();

        let y = io.output(&self.conf.output)?;
        y.check_shape(&self.conf.output, x.shape())?;

        let kept_scale = 1. / (1. - rate);
        for ((out, v), kept) in y.data_mut().iter_mut().zip(x.data()).zip(&keep) {
            *out = if *kept { v * kept_scale } else { 0. };
        }

        if io.has_output("mask") {
            let mask = io.output("mask")?;
            mask.check_shape("mask", x.shape())?;

            for (m, kept) in mask.data_mut().iter_mut().zip(keep) {
                *m = kept as u8 as f32;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::register::Blob;

    fn run(kernel: &dyn Kernel, piece_id: i64, seed: u64) -> Vec<f32> {
        let x = Blob::from_vec(&[16], vec![1.; 16]).unwrap();
        let mut y = Blob::zeros(&[16]);

        let ctx = KernelCtx {
            piece_id,
            random_seed: seed,
            model_version_id: None,
        };

        let mut io = KernelIo::new();
        io.bind_input("x", &x).unwrap();
        io.bind_output("y", &mut y).unwrap();
        kernel.compute(&ctx, &mut io).unwrap();
        drop(io);

        y.data().to_vec()
    }

    #[test]
    fn reproducible_per_piece() {
        let kernel = create(&json!({ "rate": 0.5 })).unwrap();

        assert_eq!(run(kernel.as_ref(), 3, 11), run(kernel.as_ref(), 3, 11));
        assert!(
            run(kernel.as_ref(), 3, 11)
                .iter()
                .all(|&v| v == 0. || v == 2.)
        );
    }

    #[test]
    fn zero_rate_keeps_everything() {
        let kernel = create(&json!({ "rate": 0.0 })).unwrap();
        assert_eq!(run(kernel.as_ref(), 0, 1), vec![1.; 16]);
    }

    #[test]
    fn rejects_full_rate() {
        assert!(create(&json!({ "rate": 1.0 })).is_err());
    }
}
