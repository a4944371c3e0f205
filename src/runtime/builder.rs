use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    rc::Rc,
};

use log::debug;
use rand::{SeedableRng, rngs::StdRng};

use super::Graph;
use crate::{
    ActorErr, Result,
    actor::{
        ActorCore, ActorVariant, CompActor, SnapshotStore,
        variants::{
            BackwardActor, ForwardActor, ModelBlob, ModelSaveActor, ModelUpdateActor, NormalActor,
            SourceActor,
        },
    },
    config::{GraphSpec, OptimizerSpec, ParamGenSpec, TaskKindSpec, TaskSpec},
    initialization::{ConstParamGen, ParamGen, rand_param_gen},
    kernel::{Kernel, KernelRegistry},
    optimization::optimizer_from_spec,
};

/// Builds `Graph`s given a task graph specification.
///
/// Kernels are looked up in the registry the builder was created with, which must
/// already hold every op type the graph uses.
pub struct GraphBuilder<'a> {
    registry: &'a KernelRegistry,
}

impl<'a> GraphBuilder<'a> {
    /// Creates a new `GraphBuilder`.
    ///
    /// # Arguments
    /// * `registry` - Where the kernels of every task are created from.
    pub fn new(registry: &'a KernelRegistry) -> Self {
        Self { registry }
    }

    /// Builds every actor of `spec`.
    ///
    /// # Returns
    /// A new `Graph` ready to run, or the first construction error.
    pub fn build(&self, spec: &GraphSpec) -> Result<Graph> {
        spec.validate()?;

        let snapshots = SnapshotStore::new();
        let actors = spec
            .tasks
            .iter()
            .map(|task| self.build_actor(task, &snapshots))
            .collect::<Result<Vec<_>>>()?;

        Ok(Graph::new(actors, snapshots))
    }

    /// Builds the actor running `task`.
    ///
    /// # Arguments
    /// * `task` - The task to run.
    /// * `snapshots` - Where checkpoint actors store what they receive.
    pub fn build_actor(&self, task: &TaskSpec, snapshots: &SnapshotStore) -> Result<CompActor> {
        let kernel = self.resolve_kernel(task)?;
        let variant = self.resolve_variant(task, snapshots)?;
        self.check_names(task, variant.as_ref(), kernel.is_some())?;

        let core = ActorCore::new(
            task,
            kernel,
            variant.naive_consumed(),
            variant.custom_produced(),
        );

        debug!(actor_id = task.actor_id, kind = variant.kind(); "built actor");
        Ok(CompActor::new(core, variant))
    }

    fn resolve_kernel(&self, task: &TaskSpec) -> Result<Option<Box<dyn Kernel>>> {
        let Some(conf) = &task.kernel else {
            return Ok(None);
        };

        self.registry
            .create(conf)
            .map(Some)
            .map_err(|source| ActorErr::KernelFailure {
                actor: task.actor_id,
                source,
            })
    }

    fn resolve_variant(
        &self,
        task: &TaskSpec,
        snapshots: &SnapshotStore,
    ) -> Result<Box<dyn ActorVariant>> {
        let variant: Box<dyn ActorVariant> = match &task.kind {
            TaskKindSpec::Normal => Box::new(NormalActor),
            TaskKindSpec::Source { pieces } => Box::new(SourceActor::new(*pieces)),
            TaskKindSpec::Forward { model_save } => Box::new(ForwardActor::new(*model_save)),
            TaskKindSpec::Backward => Box::new(BackwardActor::new()),
            TaskKindSpec::ModelUpdate {
                optimizer,
                pieces_per_batch,
                init,
            } => {
                let blobs = self.resolve_model(task, *optimizer, init)?;
                Box::new(ModelUpdateActor::new(blobs, pieces_per_batch.get()))
            }
            TaskKindSpec::ModelSave => Box::new(ModelSaveActor::new(snapshots.clone())),
        };

        Ok(variant)
    }

    /// Generates a random number generator given (or not) a seed.
    fn generate_rng(&self, seed: Option<u64>) -> Rc<RefCell<StdRng>> {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Rc::new(RefCell::new(rng))
    }

    /// Resolves the first version of every blob of the produced `model` descriptor.
    ///
    /// # Arguments
    /// * `task` - A model update task.
    /// * `optimizer` - The update rule shared by every blob.
    /// * `init` - The generator of each blob, blobs without one start at zero.
    fn resolve_model(
        &self,
        task: &TaskSpec,
        optimizer: OptimizerSpec,
        init: &BTreeMap<String, ParamGenSpec>,
    ) -> Result<BTreeMap<String, ModelBlob>> {
        let Some(desc) = task.produced.iter().find(|desc| desc.name == "model") else {
            return invalid(task, "a model update task must produce `model`".to_string());
        };

        if let Some(name) = init
            .keys()
            .find(|name| !desc.blobs.iter().any(|blob| &blob.name == *name))
        {
            return invalid(task, format!("initializer for unknown model blob `{name}`"));
        }

        let rng = self.generate_rng(task.random_seed);
        let mut blobs = BTreeMap::new();

        for blob in &desc.blobs {
            let len = blob.shape.iter().product();

            let mut values = vec![0.; len];

            let param_gen: Option<Box<dyn ParamGen>> = match init.get(&blob.name) {
                Some(ParamGenSpec::Const { value }) => Some(Box::new(ConstParamGen::new(*value))),
                Some(ParamGenSpec::Rand { distribution }) => Some(
                    rand_param_gen(rng.clone(), *distribution)
                        .or_else(|e| invalid(task, format!("blob `{}`: {e}", blob.name)))?,
                ),
                None => None,
            };

            if let Some(mut param_gen) = param_gen {
                param_gen.fill(&mut values);
            }

            let model_blob = ModelBlob::new(values, optimizer_from_spec(optimizer, len));
            blobs.insert(blob.name.clone(), model_blob);
        }

        Ok(blobs)
    }

    /// Checks that the task declares every descriptor its variant relies on.
    fn check_names(&self, task: &TaskSpec, variant: &dyn ActorVariant, has_kernel: bool) -> Result<()> {
        let consumed: HashMap<_, _> = task
            .consumed
            .iter()
            .map(|c| (c.name.as_str(), c.desc_id))
            .collect();
        let produces = |name: &str| task.produced.iter().any(|desc| desc.name == name);

        let needs_kernel = !matches!(
            task.kind,
            TaskKindSpec::ModelUpdate { .. } | TaskKindSpec::ModelSave
        );

        if needs_kernel && !has_kernel {
            return invalid(task, format!("{} tasks need a kernel", variant.kind()));
        }

        match &task.kind {
            TaskKindSpec::Source { .. } if !consumed.is_empty() => {
                invalid(task, "a source task can't consume registers".to_string())
            }
            TaskKindSpec::Normal | TaskKindSpec::Backward | TaskKindSpec::ModelSave
                if consumed.is_empty() =>
            {
                invalid(task, format!("{} tasks must consume a register", variant.kind()))
            }
            TaskKindSpec::Forward { .. } if !consumed.contains_key("in") => {
                invalid(task, "a forward task must consume `in`".to_string())
            }
            TaskKindSpec::Forward {
                model_save: Some(_),
            } if !produces("forward_model") => invalid(
                task,
                "saving the forward model needs a produced `forward_model`".to_string(),
            ),
            TaskKindSpec::ModelUpdate { .. } if !consumed.contains_key("model_diff") => {
                invalid(task, "a model update task must consume `model_diff`".to_string())
            }
            _ => Ok(()),
        }
    }
}

fn invalid<T>(task: &TaskSpec, detail: String) -> Result<T> {
    Err(ActorErr::InvalidGraph(format!(
        "task {} ({}): {detail}",
        task.actor_id, task.name
    )))
}
