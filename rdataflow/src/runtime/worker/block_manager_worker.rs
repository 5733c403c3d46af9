use std::sync::Arc;

use dashmap::DashMap;

use crate::api::attribute::{EdgeAttributes, StoreKind};
use crate::api::cluster::WorkerConfig;
use crate::api::coder::Coder;
use crate::api::element::Element;
use crate::api::error::{Error, Result};
use crate::api::runtime::{EdgeId, PartitionId, WorkerId};
use crate::message::{BlockFetchHandler, BlockFetchRequest, BlockFetchResponse, MessageEnvironment};
use crate::runtime::master::BlockManagerMaster;
use crate::storage::block::Block;
use crate::storage::{PartitionStore, PartitionStoreWrap, TaggedElements};

/// How a worker stores and encodes the partitions of one edge.
#[derive(Clone, Debug)]
struct EdgeBinding {
    coder: Arc<dyn Coder>,
    store: StoreKind,
}

/// Per-worker endpoint of the block manager.
///
/// Writes go to the local store selected by the edge, then commit to the
/// master. Reads of partitions owned by another worker go through the
/// message environment.
#[derive(Debug)]
pub struct BlockManagerWorker {
    worker_id: WorkerId,
    master: Arc<BlockManagerMaster>,
    message_environment: Arc<dyn MessageEnvironment>,

    memory_store: PartitionStoreWrap,
    file_store: PartitionStoreWrap,

    edges: DashMap<EdgeId, EdgeBinding>,
}

impl BlockManagerWorker {
    /// Create the worker's stores, register it with the master and open its
    /// mailbox.
    pub fn new(
        config: WorkerConfig,
        master: Arc<BlockManagerMaster>,
        message_environment: Arc<dyn MessageEnvironment>,
    ) -> Result<Arc<Self>> {
        let memory_store =
            PartitionStoreWrap::new(StoreKind::Memory, config.file_directory.clone(), config.block_size)?;
        let file_store =
            PartitionStoreWrap::new(StoreKind::LocalFile, config.file_directory, config.block_size)?;

        let worker = Arc::new(BlockManagerWorker {
            worker_id: config.worker_id,
            master,
            message_environment,
            memory_store,
            file_store,
            edges: DashMap::new(),
        });

        let handler: Arc<dyn BlockFetchHandler> = worker.clone();
        worker
            .message_environment
            .register_handler(&worker.worker_id, Arc::downgrade(&handler))?;
        worker.master.add_new_worker(worker.worker_id.clone());

        Ok(worker)
    }

    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    pub fn master(&self) -> &Arc<BlockManagerMaster> {
        &self.master
    }

    /// Bind the coder and store of an edge. Rebinding with other attributes
    /// replaces the binding.
    pub fn register_edge(&self, edge_id: &EdgeId, attributes: &EdgeAttributes) {
        let binding = EdgeBinding {
            coder: attributes.coder.create(),
            store: attributes.store,
        };
        self.edges.insert(edge_id.clone(), binding);
    }

    /// Persist `elements` as one partition and commit it. Returns the
    /// serialized size when the store knows it.
    pub fn put_data_as_partition(
        &self,
        partition_id: &PartitionId,
        elements: Vec<Element>,
    ) -> Result<Option<u64>> {
        let binding = self.binding(partition_id)?;
        let store = self.store(binding.store);

        let size = store.put_data_as_partition(partition_id, binding.coder.as_ref(), elements)?;
        self.commit(partition_id, store, size)
    }

    /// Persist each sub-sequence as exactly one block tagged with its
    /// destination index, then commit.
    pub fn put_sorted_data_as_partition(
        &self,
        partition_id: &PartitionId,
        sorted_elements: Vec<TaggedElements>,
    ) -> Result<Option<u64>> {
        let binding = self.binding(partition_id)?;
        let store = self.store(binding.store);

        let size =
            store.put_sorted_data_as_partition(partition_id, binding.coder.as_ref(), sorted_elements)?;
        self.commit(partition_id, store, size)
    }

    /// Local read. `None` when this worker does not hold the partition.
    pub fn get_partition(&self, partition_id: &PartitionId) -> Result<Option<Vec<Element>>> {
        let binding = self.binding(partition_id)?;
        self.store(binding.store)
            .get_partition(partition_id, binding.coder.as_ref())
    }

    /// Local read of the blocks tagged within `[hash_range_start, hash_range_end)`.
    pub fn retrieve_data_from_partition(
        &self,
        partition_id: &PartitionId,
        hash_range_start: u32,
        hash_range_end: u32,
    ) -> Result<Option<Vec<Element>>> {
        let binding = self.binding(partition_id)?;
        self.store(binding.store).retrieve_data_from_partition(
            partition_id,
            binding.coder.as_ref(),
            hash_range_start,
            hash_range_end,
        )
    }

    /// Read a committed partition wherever it lives. The owner is resolved
    /// through the master; failures are reported, never retried here.
    pub fn fetch_partition(
        &self,
        partition_id: &PartitionId,
        hash_range: Option<(u32, u32)>,
    ) -> Result<Vec<Element>> {
        let owner = self.master.get_location(partition_id)?;

        if owner.eq(&self.worker_id) {
            let local = match hash_range {
                Some((start, end)) => self.retrieve_data_from_partition(partition_id, start, end)?,
                None => self.get_partition(partition_id)?,
            };
            return local.ok_or_else(|| Error::PartitionNotFound(partition_id.clone()));
        }

        let binding = self.binding(partition_id)?;
        let request = BlockFetchRequest::new(partition_id.clone(), hash_range);
        let response = self.message_environment.fetch(&owner, request)?;
        metrics::counter!("partition.fetch.remote", 1);

        match response {
            BlockFetchResponse::Found(blocks) => {
                let mut elements = Vec::new();
                for block in &blocks {
                    elements.extend(block.decode(binding.coder.as_ref())?);
                }
                debug!(
                    "{} fetched {} elements of {} from {}",
                    self.worker_id,
                    elements.len(),
                    partition_id,
                    owner
                );
                Ok(elements)
            }
            BlockFetchResponse::NotFound => Err(Error::PartitionNotFound(partition_id.clone())),
            BlockFetchResponse::Error(message) => Err(Error::Transport(format!(
                "fetch {} from {} failed. {}",
                partition_id, owner, message
            ))),
        }
    }

    /// Delete the local copy and mark the partition removed at the master.
    /// Returns whether this worker held it.
    pub fn remove_partition(&self, partition_id: &PartitionId) -> Result<bool> {
        let existed = match self.edges.get(partition_id.edge_id()) {
            Some(binding) => self.store(binding.store).remove_partition(partition_id)?,
            None => false,
        };
        if existed {
            self.master.remove(partition_id);
            info!("{} removed partition {}", self.worker_id, partition_id);
        }
        Ok(existed)
    }

    /// Close the mailbox. Partitions stay on disk until removed.
    pub fn shutdown(&self) {
        self.message_environment.unregister_handler(&self.worker_id);
        info!("worker {} shutdown", self.worker_id);
    }

    fn commit(
        &self,
        partition_id: &PartitionId,
        store: &PartitionStoreWrap,
        size: Option<u64>,
    ) -> Result<Option<u64>> {
        match self.master.commit(partition_id, &self.worker_id, size) {
            Ok(()) => Ok(size),
            Err(e) => {
                warn!(
                    "{} failed to commit {}, drop the local copy. {}",
                    self.worker_id, partition_id, e
                );
                if let Err(remove_error) = store.remove_partition(partition_id) {
                    error!(
                        "{} failed to drop {}. {}",
                        self.worker_id, partition_id, remove_error
                    );
                }
                Err(e)
            }
        }
    }

    fn local_blocks(
        &self,
        partition_id: &PartitionId,
        hash_range: Option<(u32, u32)>,
    ) -> Result<Option<Vec<Block>>> {
        match self.edges.get(partition_id.edge_id()) {
            Some(binding) => self.store(binding.store).get_blocks(
                partition_id,
                binding.coder.as_ref(),
                hash_range,
            ),
            None => Ok(None),
        }
    }

    fn binding(&self, partition_id: &PartitionId) -> Result<EdgeBinding> {
        self.edges
            .get(partition_id.edge_id())
            .map(|binding| binding.value().clone())
            .ok_or_else(|| {
                Error::UnknownEntity(format!(
                    "edge {} is not registered at {}",
                    partition_id.edge_id(),
                    self.worker_id
                ))
            })
    }

    fn store(&self, store: StoreKind) -> &PartitionStoreWrap {
        match store {
            StoreKind::Memory => &self.memory_store,
            StoreKind::LocalFile => &self.file_store,
        }
    }
}

impl BlockFetchHandler for BlockManagerWorker {
    fn on_fetch(&self, request: BlockFetchRequest) -> BlockFetchResponse {
        match self.local_blocks(&request.partition_id, request.hash_range) {
            Ok(Some(blocks)) => BlockFetchResponse::Found(blocks),
            Ok(None) => BlockFetchResponse::NotFound,
            Err(e) => {
                error!(
                    "{} failed to serve {}. {}",
                    self.worker_id, request.partition_id, e
                );
                BlockFetchResponse::Error(e.to_string())
            }
        }
    }
}
