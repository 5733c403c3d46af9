use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::api::cluster::{load_config, RuntimeConfig};
use crate::api::error::{Error, Result};
use crate::api::runtime::{PartitionId, WorkerId};
use crate::dag::PhysicalPlan;
use crate::message::{LocalMessageEnvironment, MessageEnvironment, NetworkMessageEnvironment};
use crate::runtime::logger::init_log;
use crate::runtime::master::{BlockManagerMaster, JobStateManager};
use crate::runtime::worker::BlockManagerWorker;
use crate::runtime::ClusterMode;

/// Load the runtime config, install logging and start a cluster.
pub fn bootstrap(config_path: PathBuf, worker_ids: Vec<WorkerId>) -> Result<Cluster> {
    let config = load_config(config_path)?;
    init_log(
        &config.cluster_mode,
        Path::new(config.work_dir.as_str()),
        config.log_level.as_str(),
    )?;
    Cluster::start(config, worker_ids)
}

/// The master side registries plus the block managers of a set of workers
/// sharing one message environment.
#[derive(Debug)]
pub struct Cluster {
    config: RuntimeConfig,
    master: Arc<BlockManagerMaster>,
    message_environment: Arc<dyn MessageEnvironment>,
    workers: Vec<Arc<BlockManagerWorker>>,
}

impl Cluster {
    pub fn start(config: RuntimeConfig, worker_ids: Vec<WorkerId>) -> Result<Self> {
        if worker_ids.is_empty() {
            return Err(Error::Config("a cluster needs at least one worker".to_string()));
        }

        let message_environment: Arc<dyn MessageEnvironment> = match config.cluster_mode {
            ClusterMode::Local => Arc::new(LocalMessageEnvironment::new()),
            ClusterMode::Standalone => Arc::new(NetworkMessageEnvironment::new(
                config.network_bind_ip.as_str(),
            )?),
        };
        let master = Arc::new(BlockManagerMaster::new());

        let mut workers = Vec::with_capacity(worker_ids.len());
        for worker_id in worker_ids {
            let worker_config = config.worker_config(worker_id);
            workers.push(BlockManagerWorker::new(
                worker_config,
                master.clone(),
                message_environment.clone(),
            )?);
        }

        info!(
            "{} cluster started with {} workers",
            config.cluster_mode,
            workers.len()
        );
        Ok(Cluster {
            config,
            master,
            message_environment,
            workers,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn master(&self) -> &Arc<BlockManagerMaster> {
        &self.master
    }

    pub fn message_environment(&self) -> &Arc<dyn MessageEnvironment> {
        &self.message_environment
    }

    pub fn workers(&self) -> &Vec<Arc<BlockManagerWorker>> {
        &self.workers
    }

    pub fn worker(&self, worker_id: &WorkerId) -> Option<Arc<BlockManagerWorker>> {
        self.workers
            .iter()
            .find(|worker| worker.worker_id().eq(worker_id))
            .cloned()
    }

    /// Declare the plan's partitions and start tracking it.
    pub fn submit(&self, plan: PhysicalPlan) -> Result<JobStateManager> {
        info!("submit job {}", plan.id());
        JobStateManager::new(
            Arc::new(plan),
            self.master.as_ref(),
            self.config.max_schedule_attempt,
        )
    }

    /// Take a worker out of the cluster. The partitions it owned are
    /// returned so their producers can be scheduled again.
    pub fn remove_worker(&mut self, worker_id: &WorkerId) -> Result<Vec<PartitionId>> {
        let position = self
            .workers
            .iter()
            .position(|worker| worker.worker_id().eq(worker_id))
            .ok_or_else(|| Error::UnknownWorker(worker_id.clone()))?;

        let worker = self.workers.remove(position);
        worker.shutdown();
        Ok(self.master.remove_worker(worker_id))
    }

    pub fn shutdown(self) {
        for worker in &self.workers {
            worker.shutdown();
        }
        info!("cluster shutdown");
    }
}
