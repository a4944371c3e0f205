mod backward;
mod forward;
mod model_save;
mod model_update;
mod normal;
mod source;

pub use backward::BackwardActor;
pub use forward::ForwardActor;
pub use model_save::ModelSaveActor;
pub use model_update::{ModelBlob, ModelUpdateActor};
pub use normal::NormalActor;
pub use source::SourceActor;
