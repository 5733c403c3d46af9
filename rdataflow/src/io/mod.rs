//! Task-side endpoints of an edge. The communication pattern and shuffle
//! layout decide which partition ids a producer writes and a consumer reads.

use crate::api::attribute::{CommunicationPattern, EdgeAttributes, ShuffleLayout};
use crate::api::runtime::{EdgeId, PartitionId};

pub mod input_reader;
pub mod output_writer;
pub mod partitioner;

pub use input_reader::{InputReader, ReadIter};
pub use output_writer::OutputWriter;

/// One partition (or one hash range of it) a consumer has to read.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FetchTarget {
    pub partition_id: PartitionId,
    pub hash_range: Option<(u32, u32)>,
}

impl FetchTarget {
    fn whole(partition_id: PartitionId) -> Self {
        FetchTarget {
            partition_id,
            hash_range: None,
        }
    }
}

/// Partitions written by producer `src_task_index` of an edge.
pub fn output_partition_ids(
    edge_id: &EdgeId,
    attributes: &EdgeAttributes,
    src_task_index: u32,
    dst_parallelism: u32,
) -> Vec<PartitionId> {
    match attributes.comm_pattern {
        CommunicationPattern::OneToOne | CommunicationPattern::Broadcast => {
            vec![PartitionId::new(edge_id.clone(), src_task_index)]
        }
        CommunicationPattern::ScatterGather => match attributes.shuffle_layout {
            ShuffleLayout::PerDestination => (0..dst_parallelism)
                .map(|dst_task_index| {
                    PartitionId::with_consumer(edge_id.clone(), src_task_index, dst_task_index)
                })
                .collect(),
            ShuffleLayout::HashRanged => vec![PartitionId::new(edge_id.clone(), src_task_index)],
        },
    }
}

/// What consumer `dst_task_index` of an edge reads, in producer order.
pub fn input_fetch_targets(
    edge_id: &EdgeId,
    attributes: &EdgeAttributes,
    dst_task_index: u32,
    src_parallelism: u32,
) -> Vec<FetchTarget> {
    match attributes.comm_pattern {
        CommunicationPattern::OneToOne => vec![FetchTarget::whole(PartitionId::new(
            edge_id.clone(),
            dst_task_index,
        ))],
        CommunicationPattern::Broadcast => (0..src_parallelism)
            .map(|src_task_index| {
                FetchTarget::whole(PartitionId::new(edge_id.clone(), src_task_index))
            })
            .collect(),
        CommunicationPattern::ScatterGather => match attributes.shuffle_layout {
            ShuffleLayout::PerDestination => (0..src_parallelism)
                .map(|src_task_index| {
                    FetchTarget::whole(PartitionId::with_consumer(
                        edge_id.clone(),
                        src_task_index,
                        dst_task_index,
                    ))
                })
                .collect(),
            ShuffleLayout::HashRanged => (0..src_parallelism)
                .map(|src_task_index| FetchTarget {
                    partition_id: PartitionId::new(edge_id.clone(), src_task_index),
                    hash_range: Some((dst_task_index, dst_task_index + 1)),
                })
                .collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use crate::api::attribute::{CommunicationPattern, EdgeAttributes, ShuffleLayout};
    use crate::api::runtime::{EdgeId, PartitionId};
    use crate::io::{input_fetch_targets, output_partition_ids};

    #[test]
    pub fn partition_ids_test() {
        let edge_id = EdgeId::from("Edge-0");

        let one_to_one = EdgeAttributes::new(CommunicationPattern::OneToOne);
        assert_eq!(
            output_partition_ids(&edge_id, &one_to_one, 2, 5),
            vec![PartitionId::new(edge_id.clone(), 2)]
        );
        let targets = input_fetch_targets(&edge_id, &one_to_one, 2, 5);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].partition_id, PartitionId::new(edge_id.clone(), 2));

        let broadcast = EdgeAttributes::new(CommunicationPattern::Broadcast);
        assert_eq!(output_partition_ids(&edge_id, &broadcast, 1, 5).len(), 1);
        assert_eq!(input_fetch_targets(&edge_id, &broadcast, 4, 3).len(), 3);

        let shuffle = EdgeAttributes::new(CommunicationPattern::ScatterGather);
        let written = output_partition_ids(&edge_id, &shuffle, 1, 3);
        assert_eq!(
            written,
            (0..3)
                .map(|j| PartitionId::with_consumer(edge_id.clone(), 1, j))
                .collect::<Vec<PartitionId>>()
        );
        let targets = input_fetch_targets(&edge_id, &shuffle, 2, 4);
        assert!(targets
            .iter()
            .all(|t| t.partition_id.consumer_index() == Some(2) && t.hash_range.is_none()));

        let hash_ranged = shuffle.with_shuffle_layout(ShuffleLayout::HashRanged);
        assert_eq!(output_partition_ids(&edge_id, &hash_ranged, 1, 3).len(), 1);
        let targets = input_fetch_targets(&edge_id, &hash_ranged, 2, 4);
        assert_eq!(targets.len(), 4);
        assert!(targets.iter().all(|t| t.hash_range == Some((2, 3))));
    }
}
