//! Per-worker partition stores.

use std::path::PathBuf;

use crate::api::attribute::StoreKind;
use crate::api::coder::Coder;
use crate::api::element::Element;
use crate::api::error::Result;
use crate::api::runtime::PartitionId;
use crate::storage::block::Block;
use crate::storage::local_file_store::LocalFileStore;
use crate::storage::memory_store::MemoryStore;

pub mod block;
pub mod local_file_store;
pub mod memory_store;

/// Elements of one destination (hash range tag) of a sorted partition.
pub type TaggedElements = (u32, Vec<Element>);

/// Write-once storage of partitions. Writing an id that is present is an
/// error; readers get `None` for an id the store does not hold.
pub trait PartitionStore {
    /// Persist `elements` as one partition and return the serialized size
    /// when the store has one.
    fn put_data_as_partition(
        &self,
        partition_id: &PartitionId,
        coder: &dyn Coder,
        elements: Vec<Element>,
    ) -> Result<Option<u64>>;

    /// Persist every sub-sequence as exactly one block tagged with its
    /// destination index.
    fn put_sorted_data_as_partition(
        &self,
        partition_id: &PartitionId,
        coder: &dyn Coder,
        sorted_elements: Vec<TaggedElements>,
    ) -> Result<Option<u64>>;

    fn get_partition(
        &self,
        partition_id: &PartitionId,
        coder: &dyn Coder,
    ) -> Result<Option<Vec<Element>>>;

    /// Elements of the blocks tagged within `[hash_range_start, hash_range_end)`.
    fn retrieve_data_from_partition(
        &self,
        partition_id: &PartitionId,
        coder: &dyn Coder,
        hash_range_start: u32,
        hash_range_end: u32,
    ) -> Result<Option<Vec<Element>>>;

    /// Serialized blocks for a remote reader, optionally limited to a hash range.
    fn get_blocks(
        &self,
        partition_id: &PartitionId,
        coder: &dyn Coder,
        hash_range: Option<(u32, u32)>,
    ) -> Result<Option<Vec<Block>>>;

    /// Delete the backing storage. Returns whether the partition existed.
    fn remove_partition(&self, partition_id: &PartitionId) -> Result<bool>;

    fn contains(&self, partition_id: &PartitionId) -> bool;
}

#[derive(Debug)]
pub enum PartitionStoreWrap {
    MemoryStore(MemoryStore),
    LocalFileStore(LocalFileStore),
}

impl PartitionStoreWrap {
    pub fn new(store: StoreKind, file_directory: PathBuf, block_size: usize) -> Result<Self> {
        match store {
            StoreKind::Memory => Ok(PartitionStoreWrap::MemoryStore(MemoryStore::new())),
            StoreKind::LocalFile => Ok(PartitionStoreWrap::LocalFileStore(LocalFileStore::new(
                file_directory,
                block_size,
            )?)),
        }
    }

    pub fn kind(&self) -> StoreKind {
        match self {
            PartitionStoreWrap::MemoryStore(_) => StoreKind::Memory,
            PartitionStoreWrap::LocalFileStore(_) => StoreKind::LocalFile,
        }
    }
}

impl PartitionStore for PartitionStoreWrap {
    fn put_data_as_partition(
        &self,
        partition_id: &PartitionId,
        coder: &dyn Coder,
        elements: Vec<Element>,
    ) -> Result<Option<u64>> {
        match self {
            PartitionStoreWrap::MemoryStore(store) => {
                store.put_data_as_partition(partition_id, coder, elements)
            }
            PartitionStoreWrap::LocalFileStore(store) => {
                store.put_data_as_partition(partition_id, coder, elements)
            }
        }
    }

    fn put_sorted_data_as_partition(
        &self,
        partition_id: &PartitionId,
        coder: &dyn Coder,
        sorted_elements: Vec<TaggedElements>,
    ) -> Result<Option<u64>> {
        match self {
            PartitionStoreWrap::MemoryStore(store) => {
                store.put_sorted_data_as_partition(partition_id, coder, sorted_elements)
            }
            PartitionStoreWrap::LocalFileStore(store) => {
                store.put_sorted_data_as_partition(partition_id, coder, sorted_elements)
            }
        }
    }

    fn get_partition(
        &self,
        partition_id: &PartitionId,
        coder: &dyn Coder,
    ) -> Result<Option<Vec<Element>>> {
        match self {
            PartitionStoreWrap::MemoryStore(store) => store.get_partition(partition_id, coder),
            PartitionStoreWrap::LocalFileStore(store) => store.get_partition(partition_id, coder),
        }
    }

    fn retrieve_data_from_partition(
        &self,
        partition_id: &PartitionId,
        coder: &dyn Coder,
        hash_range_start: u32,
        hash_range_end: u32,
    ) -> Result<Option<Vec<Element>>> {
        match self {
            PartitionStoreWrap::MemoryStore(store) => store.retrieve_data_from_partition(
                partition_id,
                coder,
                hash_range_start,
                hash_range_end,
            ),
            PartitionStoreWrap::LocalFileStore(store) => store.retrieve_data_from_partition(
                partition_id,
                coder,
                hash_range_start,
                hash_range_end,
            ),
        }
    }

    fn get_blocks(
        &self,
        partition_id: &PartitionId,
        coder: &dyn Coder,
        hash_range: Option<(u32, u32)>,
    ) -> Result<Option<Vec<Block>>> {
        match self {
            PartitionStoreWrap::MemoryStore(store) => {
                store.get_blocks(partition_id, coder, hash_range)
            }
            PartitionStoreWrap::LocalFileStore(store) => {
                store.get_blocks(partition_id, coder, hash_range)
            }
        }
    }

    fn remove_partition(&self, partition_id: &PartitionId) -> Result<bool> {
        match self {
            PartitionStoreWrap::MemoryStore(store) => store.remove_partition(partition_id),
            PartitionStoreWrap::LocalFileStore(store) => store.remove_partition(partition_id),
        }
    }

    fn contains(&self, partition_id: &PartitionId) -> bool {
        match self {
            PartitionStoreWrap::MemoryStore(store) => store.contains(partition_id),
            PartitionStoreWrap::LocalFileStore(store) => store.contains(partition_id),
        }
    }
}
