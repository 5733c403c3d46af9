use std::convert::TryFrom;
use std::net::SocketAddr;
use std::sync::Weak;

use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{BytesCodec, FramedWrite};

use crate::api::error::{Error, Result};
use crate::api::runtime::WorkerId;
use crate::message::network::new_framed_read;
use crate::message::{BlockFetchHandler, BlockFetchRequest, BlockFetchResponse};

#[derive(Clone)]
pub(crate) struct Server {
    worker_id: WorkerId,
    handler: Weak<dyn BlockFetchHandler>,
}

impl Server {
    pub fn new(worker_id: WorkerId, handler: Weak<dyn BlockFetchHandler>) -> Self {
        Server { worker_id, handler }
    }

    pub async fn session_accept(self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((socket, remote_addr)) => {
                    debug!(
                        "worker {} accepted connection from {}",
                        self.worker_id, remote_addr
                    );
                    tokio::spawn(self.clone().session_process(socket, remote_addr));
                }
                Err(e) => {
                    error!("worker {} accept error. {}", self.worker_id, e);
                    return;
                }
            }
        }
    }

    async fn session_process(self, socket: TcpStream, remote_addr: SocketAddr) {
        match self.session_process0(socket).await {
            Ok(_) => {}
            Err(e) => {
                error!(
                    "session process error, remote address: {}. {}",
                    remote_addr, e
                );
            }
        }
    }

    async fn session_process0(&self, mut socket: TcpStream) -> Result<()> {
        let (read_half, write_half) = socket.split();
        let mut framed_write = FramedWrite::new(write_half, BytesCodec::new());
        let mut framed_read = new_framed_read(read_half);

        while let Some(message) = framed_read.next().await {
            let bytes = message
                .map_err(|e| Error::Transport(format!("socket closed with error. {}", e)))?;
            let request = BlockFetchRequest::try_from(bytes)?;

            let response: BytesMut = self.handle(request).await.into();
            framed_write.send(response.freeze()).await?;
        }

        Ok(())
    }

    async fn handle(&self, request: BlockFetchRequest) -> BlockFetchResponse {
        let handler = match self.handler.upgrade() {
            Some(handler) => handler,
            None => {
                return BlockFetchResponse::Error(format!(
                    "worker {} is shut down",
                    self.worker_id
                ))
            }
        };

        // stores do blocking file io
        match tokio::task::spawn_blocking(move || handler.on_fetch(request)).await {
            Ok(response) => response,
            Err(e) => BlockFetchResponse::Error(format!("fetch handler failed. {}", e)),
        }
    }
}
