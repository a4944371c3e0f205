use serde::Deserialize;
use serde_json::Value;

use crate::kernel::{Kernel, KernelCtx, KernelErr, KernelIo, parse_attrs};

#[derive(Debug, Deserialize)]
#[serde(default)]
struct FeedConf {
    output: String,
    modulo: usize,
    scale: f32,
}

impl Default for FeedConf {
    fn default() -> Self {
        Self {
            output: "x".to_string(),
            modulo: 7,
            scale: 0.1,
        }
    }
}

/// Writes deterministic synthetic samples that depend on the piece id.
#[derive(Debug)]
pub struct Feed {
    conf: FeedConf,
}

pub fn create(attrs: &Value) -> Result<Box<dyn Kernel>, KernelErr> {
    let conf: FeedConf = parse_attrs("feed", attrs)?;

    if conf.modulo == 0 {
        return Err(KernelErr::InvalidConf {
            op_type: "feed".to_string(),
            detail: "modulo must be positive".to_string(),
        });
    }

    Ok(Box::new(Feed { conf }))
}

impl Kernel for Feed {
    fn compute(&self, ctx: &KernelCtx, io: &mut KernelIo<'_>) -> Result<(), KernelErr> {
        let FeedConf { modulo, scale, .. } = self.conf;
        let piece = ctx.piece_id.max(0) as usize;

        let out = io.output(&self.conf.output)?;
        for (i, v) in out.data_mut().iter_mut().enumerate() {
            *v = ((piece + i) % modulo) as f32 * scale;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::Blob;

    #[test]
    fn depends_on_piece() {
        let kernel = create(&Value::Null).unwrap();
        let mut x = Blob::zeros(&[3]);

        let ctx = KernelCtx {
            piece_id: 6,
            random_seed: 0,
            model_version_id: None,
        };

        let mut io = KernelIo::new();
        io.bind_output("x", &mut x).unwrap();
        kernel.compute(&ctx, &mut io).unwrap();
        drop(io);

        let expected = [6. * 0.1, 0., 0.1];
        for (got, want) in x.data().iter().zip(expected) {
            assert!((got - want).abs() < 1e-6);
        }
    }
}
