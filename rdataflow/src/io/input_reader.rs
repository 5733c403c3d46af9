use std::collections::VecDeque;
use std::sync::Arc;

use crate::api::attribute::{EdgeAttributes, VertexAttributes};
use crate::api::element::Element;
use crate::api::error::Result;
use crate::api::runtime::EdgeId;
use crate::io::{input_fetch_targets, FetchTarget};
use crate::runtime::worker::BlockManagerWorker;

/// Consumer side of an edge for one task.
pub struct InputReader {
    edge_id: EdgeId,
    dst_task_index: u32,
    src_vertex_attributes: VertexAttributes,
    attributes: EdgeAttributes,
    block_manager_worker: Arc<BlockManagerWorker>,
}

impl InputReader {
    pub fn new(
        edge_id: EdgeId,
        dst_task_index: u32,
        src_vertex_attributes: VertexAttributes,
        attributes: EdgeAttributes,
        block_manager_worker: Arc<BlockManagerWorker>,
    ) -> Self {
        block_manager_worker.register_edge(&edge_id, &attributes);
        InputReader {
            edge_id,
            dst_task_index,
            src_vertex_attributes,
            attributes,
            block_manager_worker,
        }
    }

    pub fn edge_id(&self) -> &EdgeId {
        &self.edge_id
    }

    pub fn fetch_targets(&self) -> Vec<FetchTarget> {
        input_fetch_targets(
            &self.edge_id,
            &self.attributes,
            self.dst_task_index,
            self.src_vertex_attributes.parallelism,
        )
    }

    /// A lazy single-pass sequence over every element the task consumes.
    /// Partitions are fetched one at a time as the sequence advances; reading
    /// again fetches again.
    pub fn read(&self) -> ReadIter {
        ReadIter {
            block_manager_worker: self.block_manager_worker.clone(),
            targets: self.fetch_targets().into(),
            current: Vec::new().into_iter(),
            failed: false,
        }
    }
}

/// Yields the elements of each fetch target in turn. A failed fetch is
/// yielded once as an error and ends the sequence.
pub struct ReadIter {
    block_manager_worker: Arc<BlockManagerWorker>,
    targets: VecDeque<FetchTarget>,
    current: std::vec::IntoIter<Element>,
    failed: bool,
}

impl Iterator for ReadIter {
    type Item = Result<Element>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            if let Some(element) = self.current.next() {
                return Some(Ok(element));
            }

            let target = self.targets.pop_front()?;
            match self
                .block_manager_worker
                .fetch_partition(&target.partition_id, target.hash_range)
            {
                Ok(elements) => self.current = elements.into_iter(),
                Err(e) => {
                    warn!("read {} failed. {}", target.partition_id, e);
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::api::attribute::{
        CommunicationPattern, EdgeAttributes, PartitionerKind, ShuffleLayout, StoreKind,
        VertexAttributes,
    };
    use crate::api::cluster::WorkerConfig;
    use crate::api::coder::CoderKind;
    use crate::api::element::Element;
    use crate::api::error::Error;
    use crate::api::runtime::{EdgeId, WorkerId};
    use crate::io::{output_partition_ids, InputReader, OutputWriter};
    use crate::message::{LocalMessageEnvironment, MessageEnvironment, NetworkMessageEnvironment};
    use crate::runtime::master::BlockManagerMaster;
    use crate::runtime::worker::BlockManagerWorker;

    const PARALLELISM: u32 = 10;

    struct Fixture {
        _dir: tempfile::TempDir,
        master: Arc<BlockManagerMaster>,
        workers: Vec<Arc<BlockManagerWorker>>,
    }

    impl Fixture {
        fn new(environment: Arc<dyn MessageEnvironment>, worker_count: usize) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let master = Arc::new(BlockManagerMaster::new());
            let workers = (0..worker_count)
                .map(|i| {
                    let worker_id = WorkerId(format!("worker-{}", uuid::Uuid::new_v4()));
                    let config =
                        WorkerConfig::new(worker_id, dir.path().join(format!("w{}", i)))
                            .with_block_size(128);
                    BlockManagerWorker::new(config, master.clone(), environment.clone()).unwrap()
                })
                .collect();
            Fixture {
                _dir: dir,
                master,
                workers,
            }
        }

        fn local(worker_count: usize) -> Self {
            Fixture::new(Arc::new(LocalMessageEnvironment::new()), worker_count)
        }

        /// Producers run on worker 0; consumers on the last worker.
        fn transfer(&self, edge_id: &EdgeId, attributes: &EdgeAttributes) -> Vec<Vec<Element>> {
            for src_task_index in 0..PARALLELISM {
                for partition_id in
                    output_partition_ids(edge_id, attributes, src_task_index, PARALLELISM)
                {
                    self.master
                        .initialize_state(
                            partition_id.edge_id(),
                            partition_id.producer_index(),
                            partition_id.consumer_index(),
                        )
                        .unwrap();
                }
            }

            for src_task_index in 0..PARALLELISM {
                let mut writer = OutputWriter::new(
                    edge_id.clone(),
                    src_task_index,
                    VertexAttributes::new(PARALLELISM),
                    attributes.clone(),
                    self.workers[0].clone(),
                )
                .unwrap();
                writer.write_all(produce()).unwrap();
                writer.close().unwrap();
            }

            let consumer = self.workers[self.workers.len() - 1].clone();
            (0..PARALLELISM)
                .map(|dst_task_index| {
                    let reader = InputReader::new(
                        edge_id.clone(),
                        dst_task_index,
                        VertexAttributes::new(PARALLELISM),
                        attributes.clone(),
                        consumer.clone(),
                    );
                    reader.read().map(|element| element.unwrap()).collect()
                })
                .collect()
        }
    }

    /// integers 0..9 keyed by themselves
    fn produce() -> Vec<Element> {
        (0..10).map(|i| Element::with_key(i, i)).collect()
    }

    fn sorted(mut elements: Vec<Element>) -> Vec<Element> {
        elements.sort();
        elements
    }

    fn all_produced() -> Vec<Element> {
        sorted((0..PARALLELISM).flat_map(|_| produce()).collect())
    }

    fn check_shuffle(read: Vec<Vec<Element>>) {
        // a key meets exactly one consumer
        for (j, elements) in read.iter().enumerate() {
            for (k, others) in read.iter().enumerate() {
                if j != k {
                    assert!(elements.iter().all(|e| !others.contains(e)));
                }
            }
        }
        assert_eq!(sorted(read.into_iter().flatten().collect()), all_produced());
    }

    #[test]
    pub fn one_to_one_test() {
        for worker_count in vec![1, 2] {
            let fixture = Fixture::local(worker_count);
            let edge_id = EdgeId::from("Edge-0");
            let attributes = EdgeAttributes::new(CommunicationPattern::OneToOne);

            let read = fixture.transfer(&edge_id, &attributes);
            for elements in &read {
                assert_eq!(elements, &produce());
            }
            assert_eq!(sorted(read.into_iter().flatten().collect()), all_produced());
        }
    }

    #[test]
    pub fn broadcast_test() {
        for worker_count in vec![1, 2] {
            let fixture = Fixture::local(worker_count);
            let edge_id = EdgeId::from("Edge-0");
            let attributes = EdgeAttributes::new(CommunicationPattern::Broadcast)
                .with_store(StoreKind::LocalFile);

            // every consumer sees everything
            for elements in fixture.transfer(&edge_id, &attributes) {
                assert_eq!(sorted(elements), all_produced());
            }
        }
    }

    #[test]
    pub fn scatter_gather_test() {
        for worker_count in vec![1, 2] {
            let fixture = Fixture::local(worker_count);
            let edge_id = EdgeId::from("Edge-0");
            let attributes = EdgeAttributes::new(CommunicationPattern::ScatterGather);
            check_shuffle(fixture.transfer(&edge_id, &attributes));
        }
    }

    #[test]
    pub fn scatter_gather_file_store_test() {
        for layout in vec![ShuffleLayout::PerDestination, ShuffleLayout::HashRanged] {
            let fixture = Fixture::local(2);
            let edge_id = EdgeId::from("Edge-0");
            let attributes = EdgeAttributes::new(CommunicationPattern::ScatterGather)
                .with_store(StoreKind::LocalFile)
                .with_coder(CoderKind::Json)
                .with_shuffle_layout(layout);
            check_shuffle(fixture.transfer(&edge_id, &attributes));
        }
    }

    #[test]
    pub fn hash_ranged_memory_test() {
        let fixture = Fixture::local(2);
        let edge_id = EdgeId::from("Edge-0");
        let attributes = EdgeAttributes::new(CommunicationPattern::ScatterGather)
            .with_shuffle_layout(ShuffleLayout::HashRanged);
        check_shuffle(fixture.transfer(&edge_id, &attributes));
    }

    #[test]
    pub fn round_robin_test() {
        let fixture = Fixture::local(2);
        let edge_id = EdgeId::from("Edge-0");
        let attributes = EdgeAttributes::new(CommunicationPattern::ScatterGather)
            .with_partitioner(PartitionerKind::RoundRobin);

        let read = fixture.transfer(&edge_id, &attributes);
        // 100 elements spread evenly over 10 consumers
        assert!(read.iter().all(|elements| elements.len() == 10));
        assert_eq!(sorted(read.into_iter().flatten().collect()), all_produced());
    }

    #[test]
    pub fn network_transfer_test() {
        let environment = Arc::new(NetworkMessageEnvironment::new("127.0.0.1").unwrap());
        let fixture = Fixture::new(environment, 2);
        let edge_id = EdgeId::from("Edge-0");
        let attributes = EdgeAttributes::new(CommunicationPattern::ScatterGather)
            .with_store(StoreKind::LocalFile)
            .with_shuffle_layout(ShuffleLayout::HashRanged);
        check_shuffle(fixture.transfer(&edge_id, &attributes));
    }

    #[test]
    pub fn underscore_edge_id_test() {
        let environments: Vec<Arc<dyn MessageEnvironment>> = vec![
            Arc::new(LocalMessageEnvironment::new()),
            Arc::new(NetworkMessageEnvironment::new("127.0.0.1").unwrap()),
        ];
        for environment in environments {
            let fixture = Fixture::new(environment, 2);
            let edge_id = EdgeId::from("map_1");

            let one_to_one = EdgeAttributes::new(CommunicationPattern::OneToOne);
            for elements in fixture.transfer(&edge_id, &one_to_one) {
                assert_eq!(elements, produce());
            }

            let edge_id = EdgeId::from("reduce_1");
            let shuffle = EdgeAttributes::new(CommunicationPattern::ScatterGather)
                .with_store(StoreKind::LocalFile);
            check_shuffle(fixture.transfer(&edge_id, &shuffle));
        }
    }

    #[test]
    pub fn read_pending_test() {
        let fixture = Fixture::local(1);
        let edge_id = EdgeId::from("Edge-0");
        let attributes = EdgeAttributes::new(CommunicationPattern::Broadcast);
        fixture.master.initialize_state(&edge_id, 0, None).unwrap();
        fixture.master.initialize_state(&edge_id, 1, None).unwrap();

        let mut writer = OutputWriter::new(
            edge_id.clone(),
            0,
            VertexAttributes::new(1),
            attributes.clone(),
            fixture.workers[0].clone(),
        )
        .unwrap();
        writer.write_all(produce()).unwrap();
        writer.close().unwrap();

        // producer 1 never ran: its elements are missing and the error ends the read
        let reader = InputReader::new(
            edge_id,
            0,
            VertexAttributes::new(2),
            attributes,
            fixture.workers[0].clone(),
        );
        let read: Vec<_> = reader.read().collect();
        assert_eq!(read.len(), 11);
        assert!(read[..10].iter().all(|e| e.is_ok()));
        match &read[10] {
            Err(Error::PartitionPending(_)) => {}
            rt => panic!("unexpected {:?}", rt),
        }
    }
}
