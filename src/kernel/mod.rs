mod error;
mod kernel;
pub mod ops;
mod registry;

pub use error::KernelErr;
pub use kernel::{Kernel, KernelCtx, KernelIo};
pub use registry::{KernelConf, KernelCreator, KernelRegistry};
pub(crate) use registry::parse_attrs;
