use std::{error::Error, fmt};

use crate::{optimization::SizeMismatchErr, register::RegstId};

/// Failures raised while creating or running a kernel.
#[derive(Debug)]
pub enum KernelErr {
    MissingBlob {
        name: String,
    },
    ShapeMismatch {
        blob: String,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    SizeMismatch {
        got: usize,
        expected: usize,
    },
    /// A blob with a zero sized dimension reached a kernel that needs rows.
    EmptyBlob {
        blob: String,
        shape: Vec<usize>,
    },
    /// An output register is still referenced by a reader and can't be written.
    SharedOutput {
        regst: RegstId,
    },
    /// Two bound blobs, or two requested outputs, share a name.
    DuplicateBlob {
        name: String,
    },
    InvalidConf {
        op_type: String,
        detail: String,
    },
    UnknownOp(String),
    DuplicateOp(String),
}

impl fmt::Display for KernelErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelErr::MissingBlob { name } => write!(f, "blob `{name}` is not bound"),
            KernelErr::ShapeMismatch {
                blob,
                got,
                expected,
            } => write!(f, "blob `{blob}` has shape {got:?}, expected {expected:?}"),
            KernelErr::SizeMismatch { got, expected } => {
                write!(f, "got {got} values, expected {expected}")
            }
            KernelErr::EmptyBlob { blob, shape } => {
                write!(f, "blob `{blob}` has an empty dimension in {shape:?}")
            }
            KernelErr::SharedOutput { regst } => {
                write!(f, "output register {regst:?} is still shared with a reader")
            }
            KernelErr::DuplicateBlob { name } => write!(f, "blob `{name}` is bound twice"),
            KernelErr::InvalidConf { op_type, detail } => {
                write!(f, "invalid attributes for `{op_type}`: {detail}")
            }
            KernelErr::UnknownOp(op_type) => write!(f, "no kernel registered for `{op_type}`"),
            KernelErr::DuplicateOp(op_type) => {
                write!(f, "a kernel for `{op_type}` is already registered")
            }
        }
    }
}

impl Error for KernelErr {}

impl From<SizeMismatchErr> for KernelErr {
    fn from(value: SizeMismatchErr) -> Self {
        let SizeMismatchErr { got, expected } = value;
        Self::SizeMismatch { got, expected }
    }
}
