use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::api::coder::Coder;
use crate::api::element::Element;
use crate::api::error::{Error, Result};
use crate::api::runtime::PartitionId;
use crate::storage::block::{Block, UNTAGGED};
use crate::storage::{PartitionStore, TaggedElements};

/// Keeps the elements themselves; the coder is only needed when a remote
/// reader asks for serialized blocks.
#[derive(Debug, Default)]
pub struct MemoryStore {
    partitions: DashMap<PartitionId, Arc<Vec<TaggedElements>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            partitions: DashMap::new(),
        }
    }

    fn put(&self, partition_id: &PartitionId, sorted_elements: Vec<TaggedElements>) -> Result<()> {
        match self.partitions.entry(partition_id.clone()) {
            Entry::Occupied(_) => Err(Error::PartitionAlreadyExists(partition_id.clone())),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(sorted_elements));
                Ok(())
            }
        }
    }

    fn get(&self, partition_id: &PartitionId) -> Option<Arc<Vec<TaggedElements>>> {
        self.partitions.get(partition_id).map(|p| p.value().clone())
    }

    fn collect(
        &self,
        partition_id: &PartitionId,
        hash_range: Option<(u32, u32)>,
    ) -> Option<Vec<Element>> {
        self.get(partition_id).map(|partition| {
            partition
                .iter()
                .filter(|(tag, _)| in_range(*tag, hash_range))
                .flat_map(|(_, elements)| elements.iter().cloned())
                .collect()
        })
    }
}

fn in_range(tag: u32, hash_range: Option<(u32, u32)>) -> bool {
    match hash_range {
        Some((start, end)) => tag >= start && tag < end,
        None => true,
    }
}

impl PartitionStore for MemoryStore {
    fn put_data_as_partition(
        &self,
        partition_id: &PartitionId,
        _coder: &dyn Coder,
        elements: Vec<Element>,
    ) -> Result<Option<u64>> {
        self.put(partition_id, vec![(UNTAGGED, elements)])?;
        Ok(None)
    }

    fn put_sorted_data_as_partition(
        &self,
        partition_id: &PartitionId,
        _coder: &dyn Coder,
        sorted_elements: Vec<TaggedElements>,
    ) -> Result<Option<u64>> {
        self.put(partition_id, sorted_elements)?;
        Ok(None)
    }

    fn get_partition(
        &self,
        partition_id: &PartitionId,
        _coder: &dyn Coder,
    ) -> Result<Option<Vec<Element>>> {
        Ok(self.collect(partition_id, None))
    }

    fn retrieve_data_from_partition(
        &self,
        partition_id: &PartitionId,
        _coder: &dyn Coder,
        hash_range_start: u32,
        hash_range_end: u32,
    ) -> Result<Option<Vec<Element>>> {
        Ok(self.collect(partition_id, Some((hash_range_start, hash_range_end))))
    }

    fn get_blocks(
        &self,
        partition_id: &PartitionId,
        coder: &dyn Coder,
        hash_range: Option<(u32, u32)>,
    ) -> Result<Option<Vec<Block>>> {
        match self.get(partition_id) {
            Some(partition) => {
                let mut blocks = Vec::with_capacity(partition.len());
                for (tag, elements) in partition.iter() {
                    if in_range(*tag, hash_range) {
                        blocks.push(Block::encode(*tag, coder, elements.as_slice())?);
                    }
                }
                Ok(Some(blocks))
            }
            None => Ok(None),
        }
    }

    fn remove_partition(&self, partition_id: &PartitionId) -> Result<bool> {
        Ok(self.partitions.remove(partition_id).is_some())
    }

    fn contains(&self, partition_id: &PartitionId) -> bool {
        self.partitions.contains_key(partition_id)
    }
}
