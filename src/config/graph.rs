use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fs,
    num::NonZeroU64,
    path::Path,
};

use serde::{Deserialize, Serialize};

use super::{ModelSaveSpec, OptimizerSpec, ParamGenSpec, RegstDescSpec};
use crate::{
    ActorErr, Result,
    kernel::KernelConf,
    register::{ActorId, RegstDescId},
};

/// Which actor variant runs a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKindSpec {
    Normal,
    Source {
        pieces: u64,
    },
    Forward {
        #[serde(default)]
        model_save: Option<ModelSaveSpec>,
    },
    Backward,
    ModelUpdate {
        optimizer: OptimizerSpec,
        pieces_per_batch: NonZeroU64,
        init: BTreeMap<String, ParamGenSpec>,
    },
    ModelSave,
}

/// A register descriptor read by a task, addressed by the name the task knows it by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumedSpec {
    pub name: String,
    pub desc_id: RegstDescId,
}

/// Everything an actor needs to know about itself at construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub actor_id: ActorId,
    pub name: String,
    pub kind: TaskKindSpec,
    #[serde(default)]
    pub kernel: Option<KernelConf>,
    #[serde(default)]
    pub consumed: Vec<ConsumedSpec>,
    #[serde(default)]
    pub produced: Vec<RegstDescSpec>,
    #[serde(default)]
    pub random_seed: Option<u64>,
}

/// A complete task graph, one task per actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSpec {
    pub tasks: Vec<TaskSpec>,
}

impl GraphSpec {
    /// Parses and validates a graph from its json representation.
    pub fn from_json(json: &str) -> Result<Self> {
        let spec: Self = serde_json::from_str(json)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Reads, parses and validates a graph from a json file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Checks that producers and consumers agree on every register descriptor.
    ///
    /// # Returns
    /// An `ActorErr::InvalidGraph` describing the first inconsistency found.
    pub fn validate(&self) -> Result<()> {
        let mut tasks = HashMap::new();
        for task in &self.tasks {
            if tasks.insert(task.actor_id, task).is_some() {
                return invalid(format!("actor {} is declared twice", task.actor_id));
            }
        }

        let mut producers = HashMap::new();
        for task in &self.tasks {
            unique_names(task, task.consumed.iter().map(|c| c.name.as_str()))?;
            unique_names(task, task.produced.iter().map(|p| p.name.as_str()))?;

            for desc in &task.produced {
                if producers.insert(desc.desc_id, task.actor_id).is_some() {
                    return invalid(format!("register descriptor {} is declared twice", desc.desc_id));
                }

                if let Some(blob) = desc.blobs.iter().find(|blob| blob.shape.contains(&0)) {
                    return invalid(format!(
                        "blob `{}` of descriptor {} has an empty dimension in {:?}",
                        blob.name, desc.desc_id, blob.shape
                    ));
                }

                for consumer in &desc.consumers {
                    let Some(consumer_task) = tasks.get(consumer) else {
                        return invalid(format!(
                            "descriptor {} is consumed by unknown actor {consumer}",
                            desc.desc_id
                        ));
                    };

                    if !consumer_task.consumed.iter().any(|c| c.desc_id == desc.desc_id) {
                        return invalid(format!(
                            "actor {consumer} is listed as consumer of descriptor {} but doesn't consume it",
                            desc.desc_id
                        ));
                    }
                }
            }
        }

        for task in &self.tasks {
            for consumed in &task.consumed {
                let listed = self
                    .tasks
                    .iter()
                    .flat_map(|t| &t.produced)
                    .find(|desc| desc.desc_id == consumed.desc_id)
                    .is_some_and(|desc| desc.consumers.contains(&task.actor_id));

                if !listed {
                    return invalid(format!(
                        "actor {} consumes descriptor {} which no producer sends to it",
                        task.actor_id, consumed.desc_id
                    ));
                }
            }
        }

        self.validate_model_capacity()
    }

    /// A forward actor holds its model until the next version arrives, so the model
    /// update actor needs a second register to publish that version into.
    fn validate_model_capacity(&self) -> Result<()> {
        let forward_models = self
            .tasks
            .iter()
            .filter(|task| matches!(task.kind, TaskKindSpec::Forward { .. }))
            .flat_map(|task| task.consumed.iter().filter(|c| c.name == "model"));

        for consumed in forward_models {
            let Some(desc) = self
                .tasks
                .iter()
                .flat_map(|t| &t.produced)
                .find(|desc| desc.desc_id == consumed.desc_id)
            else {
                continue;
            };

            if desc.capacity.get() < 2 {
                return invalid(format!(
                    "model descriptor {} is read by a forward actor and needs a capacity of at least 2, got {}",
                    desc.desc_id, desc.capacity
                ));
            }
        }

        Ok(())
    }
}

fn unique_names<'a, I>(task: &TaskSpec, names: I) -> Result<()>
where
    I: Iterator<Item = &'a str>,
{
    let mut seen = HashSet::new();

    for name in names {
        if !seen.insert(name) {
            return invalid(format!("actor {} uses the name `{name}` twice", task.actor_id));
        }
    }

    Ok(())
}

fn invalid<T>(detail: String) -> Result<T> {
    Err(ActorErr::InvalidGraph(detail))
}
