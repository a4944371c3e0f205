//! The built in kernels.
//!
//! They exist to move realistic data through the actors, their numerics are kept simple.

pub mod affine;
pub mod affine_grad;
pub mod dropout;
pub mod feed;
pub mod identity;
pub mod softmax_grad;
pub mod transpose;
