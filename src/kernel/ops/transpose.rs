use serde::Deserialize;
use serde_json::Value;

use crate::{
    kernel::{Kernel, KernelCtx, KernelErr, KernelIo, parse_attrs},
    register::Blob,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TransposeConf {
    perm: Vec<usize>,
    input: Option<String>,
    output: Option<String>,
}

/// Permutes the axes of a blob, output axis `d` is input axis `perm[d]`.
#[derive(Debug)]
pub struct Transpose {
    perm: Vec<usize>,
    input: String,
    output: String,
}

pub fn create(attrs: &Value) -> Result<Box<dyn Kernel>, KernelErr> {
    let conf: TransposeConf = parse_attrs("transpose", attrs)?;
    check_perm(&conf.perm, conf.perm.len())?;

    Ok(Box::new(Transpose {
        perm: conf.perm,
        input: conf.input.unwrap_or_else(|| "x".to_string()),
        output: conf.output.unwrap_or_else(|| "y".to_string()),
    }))
}

impl Kernel for Transpose {
    fn compute(&self, _ctx: &KernelCtx, io: &mut KernelIo<'_>) -> Result<(), KernelErr> {
        let src = io.input(&self.input)?;
        transpose(src, io.output(&self.output)?, &self.perm)
    }
}

/// Writes `src` into `dst` with its axes permuted by `perm`.
///
/// # Returns
/// A `KernelErr` if `perm` isn't a permutation of the axes of `src` or if `dst`
/// doesn't have the permuted shape.
pub fn transpose(src: &Blob, dst: &mut Blob, perm: &[usize]) -> Result<(), KernelErr> {
    let src_shape = src.shape();
    check_perm(perm, src_shape.len())?;

    let dst_shape: Vec<usize> = perm.iter().map(|&axis| src_shape[axis]).collect();
    dst.check_shape("transpose output", &dst_shape)?;

    let mut src_strides = vec![1; src_shape.len()];
    for axis in (0..src_shape.len().saturating_sub(1)).rev() {
        src_strides[axis] = src_strides[axis + 1] * src_shape[axis + 1];
    }

    let src_data = src.data();
    let mut coords = vec![0; dst_shape.len()];

    for out in dst.data_mut().iter_mut() {
        let offset: usize = coords
            .iter()
            .zip(perm)
            .map(|(coord, &axis)| coord * src_strides[axis])
            .sum();

        *out = src_data[offset];

        for axis in (0..coords.len()).rev() {
            coords[axis] += 1;
            if coords[axis] < dst_shape[axis] {
                break;
            }
            coords[axis] = 0;
        }
    }

    Ok(())
}

/// The permutation undoing `perm`.
pub fn inverse_perm(perm: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0; perm.len()];
    for (i, &axis) in perm.iter().enumerate() {
        inverse[axis] = i;
    }
    inverse
}

fn check_perm(perm: &[usize], ndim: usize) -> Result<(), KernelErr> {
    let mut sorted = perm.to_vec();
    sorted.sort_unstable();

    if sorted.len() != ndim || sorted.iter().enumerate().any(|(i, &axis)| i != axis) {
        return Err(KernelErr::InvalidConf {
            op_type: "transpose".to_string(),
            detail: format!("{perm:?} is not a permutation of {ndim} axes"),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix() {
        let src = Blob::from_vec(&[2, 3], vec![1., 2., 3., 4., 5., 6.]).unwrap();
        let mut dst = Blob::zeros(&[3, 2]);

        transpose(&src, &mut dst, &[1, 0]).unwrap();
        assert_eq!(dst.data(), [1., 4., 2., 5., 3., 6.]);
    }

    #[test]
    fn three_axes_round_trip() {
        let values: Vec<f32> = (0..24).map(|v| v as f32).collect();
        let src = Blob::from_vec(&[2, 3, 4], values).unwrap();
        let perm = [2, 0, 1];

        let mut permuted = Blob::zeros(&[4, 2, 3]);
        transpose(&src, &mut permuted, &perm).unwrap();
        assert_eq!(permuted.data()[1], 4.);

        let mut back = Blob::zeros(&[2, 3, 4]);
        transpose(&permuted, &mut back, &inverse_perm(&perm)).unwrap();
        assert_eq!(back, src);
    }

    #[test]
    fn rejects_bad_perm() {
        let src = Blob::zeros(&[2, 2]);
        let mut dst = Blob::zeros(&[2, 2]);

        assert!(transpose(&src, &mut dst, &[0, 0]).is_err());
        assert!(transpose(&src, &mut dst, &[0]).is_err());
    }
}
