use std::env;

use anyhow::Context;
use log::{info, warn};
use tokio::signal;

use regst_actor::{config::GraphSpec, kernel::KernelRegistry, runtime::GraphBuilder};

const DEMO_GRAPH: &str = include_str!("../demos/train_affine.json");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let spec = match env::args().nth(1) {
        Some(path) => {
            info!("loading task graph from {path}");
            GraphSpec::from_path(&path).with_context(|| format!("failed to load {path}"))?
        }
        None => {
            info!("no task graph given, running the affine training demo");
            GraphSpec::from_json(DEMO_GRAPH).context("invalid demo graph")?
        }
    };

    let registry = KernelRegistry::with_default_kernels();
    let graph = GraphBuilder::new(&registry).build(&spec)?;
    let snapshots = graph.snapshots();

    let report = tokio::select! {
        report = graph.run() => report?,
        _ = signal::ctrl_c() => {
            warn!("interrupted, aborting graph");
            return Ok(());
        }
    };

    for summary in &report.actors {
        info!(
            "actor {} ({} {}) fired {} times",
            summary.actor_id, summary.kind, summary.name, summary.act_count
        );
    }

    for snapshot in snapshots.snapshots() {
        info!(
            "snapshot of actor {} for batch {} at piece {}: {:?}",
            snapshot.producer, snapshot.batch_id, snapshot.piece_id, snapshot.blobs
        );
    }

    Ok(())
}
