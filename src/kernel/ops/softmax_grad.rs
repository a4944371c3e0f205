use serde::Deserialize;
use serde_json::Value;

use super::transpose::{inverse_perm, transpose};
use crate::{
    kernel::{Kernel, KernelCtx, KernelErr, KernelIo, parse_attrs},
    register::Blob,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SoftmaxGradConf {
    /// Moves the softmax axis innermost before computing, and back afterwards.
    perm: Option<Vec<usize>>,
}

/// The gradient of a softmax over the innermost axis:
/// `dx = (dy - Σ_j dy_j · y_j) ⊙ y`.
///
/// Inputs `y` and `dy`, outputs `dx` and the per row scratch `sum`. With a `perm`
/// attribute the kernel also needs the scratch outputs `transpose_y`, `transpose_dy`
/// and `transpose_dx`.
///
/// `dx` is used as scratch space for the products before it receives the result, so
/// whatever it held on entry is lost even if the kernel later fails.
#[derive(Debug)]
pub struct SoftmaxGrad {
    perm: Option<Vec<usize>>,
}

pub fn create(attrs: &Value) -> Result<Box<dyn Kernel>, KernelErr> {
    let conf: SoftmaxGradConf = parse_attrs("softmax_grad", attrs)?;
    Ok(Box::new(SoftmaxGrad { perm: conf.perm }))
}

impl Kernel for SoftmaxGrad {
    fn compute(&self, _ctx: &KernelCtx, io: &mut KernelIo<'_>) -> Result<(), KernelErr> {
        let y = io.input("y")?;
        let dy = io.input("dy")?;
        dy.check_shape("dy", y.shape())?;

        let Some(perm) = &self.perm else {
            let [dx, sum] = io.outputs_many(["dx", "sum"])?;
            return compute_diff(y, dy, sum, dx);
        };

        let [t_y, t_dy, t_dx, sum, dx] =
            io.outputs_many(["transpose_y", "transpose_dy", "transpose_dx", "sum", "dx"])?;

        transpose(y, t_y, perm)?;
        transpose(dy, t_dy, perm)?;
        compute_diff(t_y, t_dy, sum, t_dx)?;
        transpose(t_dx, dx, &inverse_perm(perm))
    }
}

fn compute_diff(y: &Blob, dy: &Blob, sum: &mut Blob, dx: &mut Blob) -> Result<(), KernelErr> {
    let (rows, cols) = y.rows_cols("y")?;
    dx.check_shape("dx", y.shape())?;
    sum.check_shape("sum", &[rows])?;

    let (y, dy) = (y.data(), dy.data());
    let tmp = dx.data_mut();

    for ((t, yv), dyv) in tmp.iter_mut().zip(y).zip(dy) {
        *t = yv * dyv;
    }

    for (s, row) in sum.data_mut().iter_mut().zip(tmp.chunks(cols)) {
        *s = row.iter().sum();
    }

    tmp.copy_from_slice(dy);

    for ((row, s), y_row) in tmp
        .chunks_mut(cols)
        .zip(sum.data())
        .zip(y.chunks(cols))
    {
        for (v, yv) in row.iter_mut().zip(y_row) {
            *v = (*v - s) * yv;
        }
    }

    Ok(())
}
