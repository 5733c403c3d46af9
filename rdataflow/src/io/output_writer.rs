use std::sync::Arc;

use crate::api::attribute::{CommunicationPattern, EdgeAttributes, ShuffleLayout, VertexAttributes};
use crate::api::element::Element;
use crate::api::error::{Error, Result};
use crate::api::runtime::{EdgeId, PartitionId};
use crate::io::partitioner::{Partitioner, PartitionerWrap};
use crate::runtime::worker::BlockManagerWorker;

/// Producer side of an edge for one task.
///
/// Elements are buffered per destination and persisted by `close`, which
/// returns only after every partition is stored and committed.
pub struct OutputWriter {
    edge_id: EdgeId,
    src_task_index: u32,
    dst_vertex_attributes: VertexAttributes,
    attributes: EdgeAttributes,
    block_manager_worker: Arc<BlockManagerWorker>,

    partitioner: PartitionerWrap,
    buffers: Vec<Vec<Element>>,
}

impl OutputWriter {
    pub fn new(
        edge_id: EdgeId,
        src_task_index: u32,
        dst_vertex_attributes: VertexAttributes,
        attributes: EdgeAttributes,
        block_manager_worker: Arc<BlockManagerWorker>,
    ) -> Result<Self> {
        let buffer_count = match attributes.comm_pattern {
            CommunicationPattern::ScatterGather => {
                if dst_vertex_attributes.parallelism == 0 {
                    return Err(Error::Config(format!(
                        "scatter-gather edge {} has no destination",
                        edge_id
                    )));
                }
                dst_vertex_attributes.parallelism as usize
            }
            _ => 1,
        };

        block_manager_worker.register_edge(&edge_id, &attributes);
        let partitioner = PartitionerWrap::new(attributes.partitioner, src_task_index);

        Ok(OutputWriter {
            edge_id,
            src_task_index,
            dst_vertex_attributes,
            attributes,
            block_manager_worker,
            partitioner,
            buffers: vec![Vec::new(); buffer_count],
        })
    }

    pub fn edge_id(&self) -> &EdgeId {
        &self.edge_id
    }

    pub fn write(&mut self, element: Element) -> Result<()> {
        let index = match self.attributes.comm_pattern {
            CommunicationPattern::ScatterGather => self
                .partitioner
                .partition(&element, self.dst_vertex_attributes.parallelism)?
                as usize,
            _ => 0,
        };
        self.buffers[index].push(element);
        Ok(())
    }

    pub fn write_all<I>(&mut self, elements: I) -> Result<()>
    where
        I: IntoIterator<Item = Element>,
    {
        for element in elements {
            self.write(element)?;
        }
        Ok(())
    }

    /// Persist and commit the task's partitions. Returns the total serialized
    /// size when the edge's store reports one.
    pub fn close(self) -> Result<Option<u64>> {
        let OutputWriter {
            edge_id,
            src_task_index,
            attributes,
            block_manager_worker,
            buffers,
            ..
        } = self;

        let mut sizes = Vec::with_capacity(buffers.len());
        match (attributes.comm_pattern, attributes.shuffle_layout) {
            (CommunicationPattern::ScatterGather, ShuffleLayout::PerDestination) => {
                for (dst_task_index, elements) in buffers.into_iter().enumerate() {
                    let partition_id = PartitionId::with_consumer(
                        edge_id.clone(),
                        src_task_index,
                        dst_task_index as u32,
                    );
                    sizes.push(block_manager_worker.put_data_as_partition(&partition_id, elements)?);
                }
            }
            (CommunicationPattern::ScatterGather, ShuffleLayout::HashRanged) => {
                let partition_id = PartitionId::new(edge_id.clone(), src_task_index);
                let sorted_elements = buffers
                    .into_iter()
                    .enumerate()
                    .map(|(dst_task_index, elements)| (dst_task_index as u32, elements))
                    .collect();
                sizes.push(
                    block_manager_worker
                        .put_sorted_data_as_partition(&partition_id, sorted_elements)?,
                );
            }
            _ => {
                let partition_id = PartitionId::new(edge_id.clone(), src_task_index);
                let elements = buffers.into_iter().flatten().collect();
                sizes.push(block_manager_worker.put_data_as_partition(&partition_id, elements)?);
            }
        }

        let total = sizes
            .into_iter()
            .fold(None, |total: Option<u64>, size| match (total, size) {
                (Some(total), Some(size)) => Some(total + size),
                (None, size) => size,
                (total, None) => total,
            });
        debug!(
            "task {} of {} closed, size={:?}",
            src_task_index, edge_id, total
        );
        Ok(total)
    }
}
