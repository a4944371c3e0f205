use std::collections::HashMap;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use super::{Kernel, KernelErr, ops};

/// Builds a kernel from its op specific attributes.
pub type KernelCreator = fn(&Value) -> Result<Box<dyn Kernel>, KernelErr>;

/// Which kernel a task runs and how it's configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelConf {
    pub op_type: String,
    #[serde(default)]
    pub attrs: Value,
}

/// Maps op types to kernel creators.
///
/// The registry is filled before any graph is built and is only read afterwards.
#[derive(Debug, Default)]
pub struct KernelRegistry {
    creators: HashMap<String, KernelCreator>,
}

impl KernelRegistry {
    /// Creates a new empty `KernelRegistry`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `KernelRegistry` holding every built in op.
    pub fn with_default_kernels() -> Self {
        let mut registry = Self::new();

        let builtin: [(&str, KernelCreator); 7] = [
            ("feed", ops::feed::create),
            ("identity", ops::identity::create),
            ("affine", ops::affine::create),
            ("affine_grad", ops::affine_grad::create),
            ("dropout", ops::dropout::create),
            ("transpose", ops::transpose::create),
            ("softmax_grad", ops::softmax_grad::create),
        ];

        for (op_type, creator) in builtin {
            registry.creators.insert(op_type.to_string(), creator);
        }

        registry
    }

    /// Adds a creator for `op_type`.
    ///
    /// # Returns
    /// A `KernelErr::DuplicateOp` if the op type is already taken.
    pub fn register(&mut self, op_type: &str, creator: KernelCreator) -> Result<(), KernelErr> {
        if self.creators.contains_key(op_type) {
            return Err(KernelErr::DuplicateOp(op_type.to_string()));
        }

        self.creators.insert(op_type.to_string(), creator);
        Ok(())
    }

    /// Instantiates the kernel described by `conf`.
    pub fn create(&self, conf: &KernelConf) -> Result<Box<dyn Kernel>, KernelErr> {
        let creator = self
            .creators
            .get(&conf.op_type)
            .ok_or_else(|| KernelErr::UnknownOp(conf.op_type.clone()))?;

        creator(&conf.attrs)
    }
}

/// Deserializes the attributes of `op_type`, missing attributes take their defaults.
pub(crate) fn parse_attrs<T>(op_type: &str, attrs: &Value) -> Result<T, KernelErr>
where
    T: DeserializeOwned + Default,
{
    if attrs.is_null() {
        return Ok(T::default());
    }

    T::deserialize(attrs).map_err(|e| KernelErr::InvalidConf {
        op_type: op_type.to_string(),
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn unknown_op() {
        let registry = KernelRegistry::with_default_kernels();
        let conf = KernelConf {
            op_type: "conv".to_string(),
            attrs: Value::Null,
        };

        assert!(matches!(registry.create(&conf), Err(KernelErr::UnknownOp(_))));
    }

    #[test]
    fn duplicate_registration() {
        let mut registry = KernelRegistry::with_default_kernels();
        let err = registry.register("identity", ops::identity::create).unwrap_err();
        assert!(matches!(err, KernelErr::DuplicateOp(_)));

        registry.register("copy", ops::identity::create).unwrap();
        let conf = KernelConf {
            op_type: "copy".to_string(),
            attrs: Value::Null,
        };
        assert!(registry.create(&conf).is_ok());
    }

    #[test]
    fn bad_attrs_are_reported() {
        let registry = KernelRegistry::with_default_kernels();
        let conf = KernelConf {
            op_type: "dropout".to_string(),
            attrs: json!({ "rate": "half" }),
        };

        assert!(matches!(
            registry.create(&conf),
            Err(KernelErr::InvalidConf { .. })
        ));
    }
}
