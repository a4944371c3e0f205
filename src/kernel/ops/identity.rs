use serde::Deserialize;
use serde_json::Value;

use crate::kernel::{Kernel, KernelCtx, KernelErr, KernelIo, parse_attrs};

#[derive(Debug, Deserialize)]
#[serde(default)]
struct IdentityConf {
    input: String,
    output: String,
}

impl Default for IdentityConf {
    fn default() -> Self {
        Self {
            input: "x".to_string(),
            output: "y".to_string(),
        }
    }
}

/// Copies one blob into another of the same size.
#[derive(Debug)]
pub struct Identity {
    conf: IdentityConf,
}

pub fn create(attrs: &Value) -> Result<Box<dyn Kernel>, KernelErr> {
    let conf = parse_attrs("identity", attrs)?;
    Ok(Box::new(Identity { conf }))
}

impl Kernel for Identity {
    fn compute(&self, _ctx: &KernelCtx, io: &mut KernelIo<'_>) -> Result<(), KernelErr> {
        let input = io.input(&self.conf.input)?;
        io.output(&self.conf.output)?.copy_from(input)
    }
}
