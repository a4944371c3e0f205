use std::collections::BTreeMap;

use crate::kernel::KernelErr;

/// Named blobs held by a single register.
pub type BlobMap = BTreeMap<String, Blob>;

/// A dense block of tensor storage with its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    shape: Vec<usize>,
    data: Box<[f32]>,
}

impl Blob {
    /// Creates a new zero filled `Blob`.
    ///
    /// # Arguments
    /// * `shape` - The dimensions of the blob, an empty shape holds a single scalar.
    ///
    /// # Returns
    /// A new `Blob` instance.
    pub fn zeros(shape: &[usize]) -> Self {
        let len = shape.iter().product();

        Self {
            shape: shape.to_vec(),
            data: vec![0.; len].into_boxed_slice(),
        }
    }

    /// Creates a new `Blob` from existing values.
    ///
    /// # Arguments
    /// * `shape` - The dimensions of the blob.
    /// * `data` - The values in row major order.
    ///
    /// # Returns
    /// A new `Blob` or a `KernelErr::SizeMismatch` if `data` doesn't fill `shape`.
    pub fn from_vec(shape: &[usize], data: Vec<f32>) -> Result<Self, KernelErr> {
        let expected: usize = shape.iter().product();

        if data.len() != expected {
            return Err(KernelErr::SizeMismatch {
                got: data.len(),
                expected,
            });
        }

        Ok(Self {
            shape: shape.to_vec(),
            data: data.into_boxed_slice(),
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Splits the shape into a `(rows, cols)` pair where `cols` is the innermost dimension.
    ///
    /// # Arguments
    /// * `name` - The blob name reported on error.
    ///
    /// # Returns
    /// A `KernelErr::EmptyBlob` if any dimension is zero.
    pub fn rows_cols(&self, name: &str) -> Result<(usize, usize), KernelErr> {
        if self.shape.contains(&0) {
            return Err(KernelErr::EmptyBlob {
                blob: name.to_string(),
                shape: self.shape.clone(),
            });
        }

        Ok(match self.shape.split_last() {
            Some((&cols, rest)) => (rest.iter().product(), cols),
            None => (1, 1),
        })
    }

    /// Fails unless this blob has exactly the `expected` shape.
    ///
    /// # Arguments
    /// * `name` - The blob name reported on error.
    /// * `expected` - The required shape.
    pub fn check_shape(&self, name: &str, expected: &[usize]) -> Result<(), KernelErr> {
        if self.shape != expected {
            return Err(KernelErr::ShapeMismatch {
                blob: name.to_string(),
                got: self.shape.clone(),
                expected: expected.to_vec(),
            });
        }

        Ok(())
    }

    /// Copies the values of `other` into this blob.
    ///
    /// # Returns
    /// A `KernelErr::SizeMismatch` if both blobs have a different amount of values.
    pub fn copy_from(&mut self, other: &Blob) -> Result<(), KernelErr> {
        if self.len() != other.len() {
            return Err(KernelErr::SizeMismatch {
                got: other.len(),
                expected: self.len(),
            });
        }

        self.data.copy_from_slice(&other.data);
        Ok(())
    }

    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }
}
