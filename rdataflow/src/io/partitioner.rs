use crate::api::attribute::PartitionerKind;
use crate::api::element::Element;
use crate::api::error::Result;
use crate::utils::hash::hash_code;

/// Decides the destination index of a scatter-gather element.
pub trait Partitioner {
    fn partition(&mut self, element: &Element, num_partitions: u32) -> Result<u32>;
}

/// murmur3 of the binary key encoding, so equal keys always meet at the
/// same destination.
#[derive(Debug, Default)]
pub struct HashPartitioner;

impl Partitioner for HashPartitioner {
    fn partition(&mut self, element: &Element, num_partitions: u32) -> Result<u32> {
        let key = element.key_bytes();
        let hash = hash_code(key.as_ref())?;
        Ok(hash % num_partitions)
    }
}

#[derive(Debug, Default)]
pub struct RoundRobinPartitioner {
    next: u32,
}

impl RoundRobinPartitioner {
    /// Producers start at different offsets so that small outputs do not all
    /// land on destination 0.
    pub fn with_offset(offset: u32) -> Self {
        RoundRobinPartitioner { next: offset }
    }
}

impl Partitioner for RoundRobinPartitioner {
    fn partition(&mut self, _element: &Element, num_partitions: u32) -> Result<u32> {
        let index = self.next % num_partitions;
        self.next = index + 1;
        Ok(index)
    }
}

#[derive(Debug)]
pub enum PartitionerWrap {
    Hash(HashPartitioner),
    RoundRobin(RoundRobinPartitioner),
}

impl PartitionerWrap {
    pub fn new(kind: PartitionerKind, src_task_index: u32) -> Self {
        match kind {
            PartitionerKind::Hash => PartitionerWrap::Hash(HashPartitioner),
            PartitionerKind::RoundRobin => {
                PartitionerWrap::RoundRobin(RoundRobinPartitioner::with_offset(src_task_index))
            }
        }
    }
}

impl Partitioner for PartitionerWrap {
    fn partition(&mut self, element: &Element, num_partitions: u32) -> Result<u32> {
        match self {
            PartitionerWrap::Hash(partitioner) => partitioner.partition(element, num_partitions),
            PartitionerWrap::RoundRobin(partitioner) => {
                partitioner.partition(element, num_partitions)
            }
        }
    }
}
