use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};

use crate::api::error::{Error, Result};
use crate::api::runtime::{EdgeId, PartitionId, WorkerId};

#[derive(Copy, Clone, Serialize, Deserialize, Debug, Eq, PartialEq)]
pub enum PartitionState {
    InProgress,
    Committed,
    Removed,
}

#[derive(Clone, Debug)]
struct PartitionMeta {
    state: PartitionState,
    owner: Option<WorkerId>,
    size: Option<u64>,
}

impl PartitionMeta {
    fn in_progress() -> Self {
        PartitionMeta {
            state: PartitionState::InProgress,
            owner: None,
            size: None,
        }
    }
}

/// Answer of a location query.
#[derive(Clone, Serialize, Deserialize, Debug, Eq, PartialEq)]
pub enum PartitionLocation {
    /// never declared
    Unknown,
    /// declared, but not committed yet
    Pending,
    Committed {
        worker_id: WorkerId,
        /// serialized size, when the owning store knows it
        size: Option<u64>,
    },
    Removed,
}

/// Process-wide registry of partition existence, location and state.
///
/// Entries live in a sharded concurrent map; a commit holds the entry's write
/// lock while it checks and flips the state, so the first committer wins and a
/// lookup issued after `commit` returned always sees the committed entry.
#[derive(Debug, Default)]
pub struct BlockManagerMaster {
    workers: DashSet<WorkerId>,
    partitions: DashMap<PartitionId, PartitionMeta>,
}

impl BlockManagerMaster {
    pub fn new() -> Self {
        BlockManagerMaster {
            workers: DashSet::new(),
            partitions: DashMap::new(),
        }
    }

    pub fn add_new_worker(&self, worker_id: WorkerId) {
        info!("add new worker {}", worker_id);
        self.workers.insert(worker_id);
    }

    pub fn contains_worker(&self, worker_id: &WorkerId) -> bool {
        self.workers.contains(worker_id)
    }

    pub fn workers(&self) -> Vec<WorkerId> {
        let mut workers: Vec<WorkerId> = self.workers.iter().map(|w| w.key().clone()).collect();
        workers.sort();
        workers
    }

    /// Forget a lost worker. Every partition it owned becomes REMOVED and is
    /// returned, so that the scheduler can recompute the producers.
    pub fn remove_worker(&self, worker_id: &WorkerId) -> Vec<PartitionId> {
        self.workers.remove(worker_id);

        let mut removed = Vec::new();
        for mut entry in self.partitions.iter_mut() {
            let owned = entry
                .owner
                .as_ref()
                .map(|owner| owner.eq(worker_id))
                .unwrap_or(false);
            if owned && entry.state == PartitionState::Committed {
                entry.state = PartitionState::Removed;
                removed.push(entry.key().clone());
            }
        }

        info!(
            "worker {} lost, {} partitions removed",
            worker_id,
            removed.len()
        );
        removed
    }

    /// Declare a partition before any producer writes it. Declaring a pending
    /// partition again is a no-op and a removed one is re-armed for a retry.
    pub fn initialize_state(
        &self,
        edge_id: &EdgeId,
        producer_index: u32,
        consumer_index: Option<u32>,
    ) -> Result<PartitionId> {
        let partition_id = match consumer_index {
            Some(consumer_index) => {
                PartitionId::with_consumer(edge_id.clone(), producer_index, consumer_index)
            }
            None => PartitionId::new(edge_id.clone(), producer_index),
        };

        match self.partitions.entry(partition_id.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(PartitionMeta::in_progress());
            }
            Entry::Occupied(mut entry) => {
                let state = entry.get().state;
                match state {
                    PartitionState::InProgress => {}
                    PartitionState::Removed => {
                        debug!("re-arm removed partition {}", partition_id);
                        entry.insert(PartitionMeta::in_progress());
                    }
                    PartitionState::Committed => {
                        return Err(Error::PartitionAlreadyCommitted(partition_id));
                    }
                }
            }
        }

        Ok(partition_id)
    }

    pub fn commit(
        &self,
        partition_id: &PartitionId,
        worker_id: &WorkerId,
        size: Option<u64>,
    ) -> Result<()> {
        if !self.workers.contains(worker_id) {
            return Err(Error::UnknownWorker(worker_id.clone()));
        }

        let mut meta = self
            .partitions
            .get_mut(partition_id)
            .ok_or_else(|| Error::UnknownPartition(partition_id.clone()))?;
        let state = meta.state;
        match state {
            PartitionState::InProgress => {
                meta.state = PartitionState::Committed;
                meta.owner = Some(worker_id.clone());
                meta.size = size;
            }
            PartitionState::Committed => {
                warn!(
                    "reject commit of {} from {}, already committed by {:?}",
                    partition_id, worker_id, meta.owner
                );
                return Err(Error::PartitionAlreadyCommitted(partition_id.clone()));
            }
            PartitionState::Removed => {
                return Err(Error::PartitionRemoved(partition_id.clone()));
            }
        }

        metrics::counter!("partition.commit", 1);
        debug!("{} committed {}, size={:?}", worker_id, partition_id, size);
        Ok(())
    }

    pub fn lookup(&self, partition_id: &PartitionId) -> PartitionLocation {
        match self.partitions.get(partition_id) {
            Some(meta) => match (meta.state, meta.owner.as_ref()) {
                (PartitionState::Committed, Some(worker_id)) => PartitionLocation::Committed {
                    worker_id: worker_id.clone(),
                    size: meta.size,
                },
                (PartitionState::Removed, _) => PartitionLocation::Removed,
                _ => PartitionLocation::Pending,
            },
            None => PartitionLocation::Unknown,
        }
    }

    /// The owning worker of a committed partition, or the typed reason why
    /// it cannot be read.
    pub fn get_location(&self, partition_id: &PartitionId) -> Result<WorkerId> {
        match self.lookup(partition_id) {
            PartitionLocation::Committed { worker_id, .. } => Ok(worker_id),
            PartitionLocation::Pending => Err(Error::PartitionPending(partition_id.clone())),
            PartitionLocation::Removed => Err(Error::PartitionRemoved(partition_id.clone())),
            PartitionLocation::Unknown => Err(Error::UnknownPartition(partition_id.clone())),
        }
    }

    pub fn get_state(&self, partition_id: &PartitionId) -> Option<PartitionState> {
        self.partitions.get(partition_id).map(|meta| meta.state)
    }

    /// Mark the partition REMOVED. Returns false when it was already removed
    /// or never declared.
    pub fn remove(&self, partition_id: &PartitionId) -> bool {
        match self.partitions.get_mut(partition_id) {
            Some(mut meta) if meta.state != PartitionState::Removed => {
                meta.state = PartitionState::Removed;
                debug!("partition {} removed", partition_id);
                true
            }
            _ => false,
        }
    }
}
