use std::convert::TryFrom;
use std::sync::Weak;

use bytes::BytesMut;
use dashmap::DashMap;

use crate::api::error::{Error, Result};
use crate::api::runtime::WorkerId;
use crate::message::{BlockFetchHandler, BlockFetchRequest, BlockFetchResponse, MessageEnvironment};

/// In-process mailboxes. Requests still travel as frames so that a local
/// cluster exercises the same codec as a networked one.
#[derive(Default)]
pub struct LocalMessageEnvironment {
    handlers: DashMap<WorkerId, Weak<dyn BlockFetchHandler>>,
}

impl LocalMessageEnvironment {
    pub fn new() -> Self {
        LocalMessageEnvironment {
            handlers: DashMap::new(),
        }
    }
}

impl std::fmt::Debug for LocalMessageEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let workers: Vec<WorkerId> = self.handlers.iter().map(|e| e.key().clone()).collect();
        f.debug_struct("LocalMessageEnvironment")
            .field("workers", &workers)
            .finish()
    }
}

impl MessageEnvironment for LocalMessageEnvironment {
    fn register_handler(
        &self,
        worker_id: &WorkerId,
        handler: Weak<dyn BlockFetchHandler>,
    ) -> Result<()> {
        if self.handlers.insert(worker_id.clone(), handler).is_some() {
            warn!("replace the mailbox of worker {}", worker_id);
        }
        Ok(())
    }

    fn unregister_handler(&self, worker_id: &WorkerId) {
        self.handlers.remove(worker_id);
    }

    fn fetch(
        &self,
        worker_id: &WorkerId,
        request: BlockFetchRequest,
    ) -> Result<BlockFetchResponse> {
        let handler = self
            .handlers
            .get(worker_id)
            .and_then(|handler| handler.value().upgrade())
            .ok_or_else(|| Error::Transport(format!("worker {} is unreachable", worker_id)))?;

        let request_frame: BytesMut = request.into();
        let request = BlockFetchRequest::try_from(request_frame)?;

        let response_frame: BytesMut = handler.on_fetch(request).into();
        BlockFetchResponse::try_from(response_frame)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;

    use crate::api::error::Error;
    use crate::api::runtime::{EdgeId, PartitionId, WorkerId};
    use crate::message::local::LocalMessageEnvironment;
    use crate::message::{
        BlockFetchHandler, BlockFetchRequest, BlockFetchResponse, MessageEnvironment,
    };
    use crate::storage::block::Block;

    struct EchoHandler;

    impl BlockFetchHandler for EchoHandler {
        fn on_fetch(&self, request: BlockFetchRequest) -> BlockFetchResponse {
            match request.hash_range {
                Some((start, _)) => BlockFetchResponse::Found(vec![Block::new(
                    start,
                    1,
                    Bytes::from(request.partition_id.to_string()),
                )]),
                None => BlockFetchResponse::NotFound,
            }
        }
    }

    #[test]
    pub fn local_fetch_test() {
        let environment = LocalMessageEnvironment::new();
        let worker_id = WorkerId::from("worker-0");
        let handler: Arc<dyn BlockFetchHandler> = Arc::new(EchoHandler);
        environment
            .register_handler(&worker_id, Arc::downgrade(&handler))
            .unwrap();

        let partition_id = PartitionId::new(EdgeId::from("Edge-0"), 1);
        let response = environment
            .fetch(
                &worker_id,
                BlockFetchRequest::new(partition_id.clone(), Some((2, 3))),
            )
            .unwrap();
        assert_eq!(
            response,
            BlockFetchResponse::Found(vec![Block::new(2, 1, Bytes::from("Edge-0_1"))])
        );

        let response = environment
            .fetch(&worker_id, BlockFetchRequest::new(partition_id.clone(), None))
            .unwrap();
        assert_eq!(response, BlockFetchResponse::NotFound);

        // a dropped worker stops answering
        drop(handler);
        match environment.fetch(&worker_id, BlockFetchRequest::new(partition_id, None)) {
            Err(Error::Transport(_)) => {}
            rt => panic!("unexpected {:?}", rt),
        }
    }
}
