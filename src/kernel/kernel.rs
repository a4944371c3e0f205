use std::collections::BTreeMap;

use super::KernelErr;
use crate::register::{Blob, Regst};

/// The per act information a kernel may depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelCtx {
    pub piece_id: i64,
    pub random_seed: u64,
    pub model_version_id: Option<u64>,
}

/// The computation an actor runs every time it fires.
///
/// A kernel only ever sees blobs by name, it doesn't know which register, or which
/// actor, they belong to.
pub trait Kernel: Send {
    /// Reads the bound inputs and writes the bound outputs.
    ///
    /// # Arguments
    /// * `ctx` - The piece being computed.
    /// * `io` - The blobs bound for this act.
    ///
    /// # Returns
    /// A `KernelErr` if a blob is missing or has the wrong shape.
    fn compute(&self, ctx: &KernelCtx, io: &mut KernelIo<'_>) -> Result<(), KernelErr>;

    /// Fills the model and the constant buffer before the first act.
    ///
    /// Most kernels hold neither, so the default does nothing.
    fn init_model_and_const_buf(
        &self,
        _ctx: &KernelCtx,
        _io: &mut KernelIo<'_>,
    ) -> Result<(), KernelErr> {
        Ok(())
    }
}

/// The named blobs bound to a single kernel invocation.
///
/// Inputs are shared and read only, outputs are exclusive. Binding a register as an
/// output fails while any reader still holds it.
#[derive(Debug, Default)]
pub struct KernelIo<'a> {
    inputs: BTreeMap<&'a str, &'a Blob>,
    outputs: BTreeMap<&'a str, &'a mut Blob>,
}

impl<'a> KernelIo<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_input(&mut self, name: &'a str, blob: &'a Blob) -> Result<(), KernelErr> {
        if self.inputs.insert(name, blob).is_some() {
            return Err(KernelErr::DuplicateBlob {
                name: name.to_string(),
            });
        }

        Ok(())
    }

    pub fn bind_output(&mut self, name: &'a str, blob: &'a mut Blob) -> Result<(), KernelErr> {
        if self.outputs.insert(name, blob).is_some() {
            return Err(KernelErr::DuplicateBlob {
                name: name.to_string(),
            });
        }

        Ok(())
    }

    /// Binds every blob of `regst` as an input.
    pub fn bind_regst(&mut self, regst: &'a Regst) -> Result<(), KernelErr> {
        regst
            .blobs()
            .iter()
            .try_for_each(|(name, blob)| self.bind_input(name, blob))
    }

    /// Binds every blob of `regst` as an output.
    ///
    /// # Returns
    /// A `KernelErr::SharedOutput` if another handle to the register is still alive.
    pub fn bind_regst_mut(&mut self, regst: &'a mut Regst) -> Result<(), KernelErr> {
        let id = regst.id();
        let blobs = regst
            .blobs_mut()
            .ok_or(KernelErr::SharedOutput { regst: id })?;

        blobs
            .iter_mut()
            .try_for_each(|(name, blob)| self.bind_output(name, blob))
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.contains_key(name)
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.contains_key(name)
    }

    pub fn input(&self, name: &str) -> Result<&'a Blob, KernelErr> {
        self.inputs
            .get(name)
            .copied()
            .ok_or_else(|| KernelErr::MissingBlob {
                name: name.to_string(),
            })
    }

    pub fn output(&mut self, name: &str) -> Result<&mut Blob, KernelErr> {
        self.outputs
            .get_mut(name)
            .map(|blob| &mut **blob)
            .ok_or_else(|| KernelErr::MissingBlob {
                name: name.to_string(),
            })
    }

    /// Hands out several distinct output blobs at once.
    ///
    /// # Arguments
    /// * `names` - The outputs to borrow, in the order they are returned.
    ///
    /// # Returns
    /// The blobs, a `KernelErr::DuplicateBlob` if a name is repeated or a
    /// `KernelErr::MissingBlob` if one isn't bound.
    pub fn outputs_many<const N: usize>(
        &mut self,
        names: [&str; N],
    ) -> Result<[&mut Blob; N], KernelErr> {
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(KernelErr::DuplicateBlob {
                    name: name.to_string(),
                });
            }
        }

        let mut found: [Option<&mut Blob>; N] = std::array::from_fn(|_| None);
        for (key, blob) in self.outputs.iter_mut() {
            if let Some(pos) = names.iter().position(|name| name == key) {
                found[pos] = Some(&mut **blob);
            }
        }

        let mut blobs = Vec::with_capacity(N);
        for (name, blob) in names.iter().zip(found) {
            blobs.push(blob.ok_or_else(|| KernelErr::MissingBlob {
                name: name.to_string(),
            })?);
        }

        blobs.try_into().map_err(|blobs: Vec<_>| KernelErr::SizeMismatch {
            got: blobs.len(),
            expected: N,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outputs_many_returns_requested_order() {
        let mut a = Blob::zeros(&[1]);
        let mut b = Blob::zeros(&[2]);

        let mut io = KernelIo::new();
        io.bind_output("a", &mut a).unwrap();
        io.bind_output("b", &mut b).unwrap();

        let [out_b, out_a] = io.outputs_many(["b", "a"]).unwrap();
        out_b.fill(2.);
        out_a.fill(1.);

        drop(io);
        assert_eq!(a.data(), [1.]);
        assert_eq!(b.data(), [2., 2.]);
    }

    #[test]
    fn outputs_many_rejects_duplicates() {
        let mut a = Blob::zeros(&[1]);

        let mut io = KernelIo::new();
        io.bind_output("a", &mut a).unwrap();

        let err = io.outputs_many(["a", "a"]).unwrap_err();
        assert!(matches!(err, KernelErr::DuplicateBlob { .. }));
    }

    #[test]
    fn missing_blob_is_named() {
        let io = KernelIo::new();
        let err = io.input("x").unwrap_err();
        assert!(matches!(err, KernelErr::MissingBlob { name } if name == "x"));
    }

    #[test]
    fn duplicate_binding_is_rejected() {
        let x = Blob::zeros(&[1]);
        let other = Blob::zeros(&[1]);

        let mut io = KernelIo::new();
        io.bind_input("x", &x).unwrap();
        assert!(io.bind_input("x", &other).is_err());
    }
}
