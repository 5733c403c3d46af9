use std::net::SocketAddr;
use std::sync::Weak;
use std::time::Duration;

use dashmap::DashMap;
use tokio::io::AsyncRead;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, LengthDelimitedCodec};

use crate::api::error::{Error, Result};
use crate::api::runtime::WorkerId;
use crate::message::network::server::Server;
use crate::message::{BlockFetchHandler, BlockFetchRequest, BlockFetchResponse, MessageEnvironment};
use crate::utils::thread::async_runtime;

pub(crate) mod client;
pub(crate) mod server;

const MAX_FRAME_LENGTH: usize = 1024 * 1024 * 1024;
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Reads `[u32 length][body]` frames and keeps the length header, the
/// message codec checks it again.
pub(crate) fn new_framed_read<R: AsyncRead>(read: R) -> FramedRead<R, LengthDelimitedCodec> {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .num_skip(0)
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_read(read)
}

struct Mailbox {
    addr: SocketAddr,
    server_task: Option<JoinHandle<()>>,
}

/// Mailboxes served over TCP. Each registered worker gets its own listener;
/// every fetch opens a short connection to the owner's listener.
pub struct NetworkMessageEnvironment {
    bind_ip: String,
    fetch_timeout: Duration,
    mailboxes: DashMap<WorkerId, Mailbox>,
    runtime: tokio::runtime::Runtime,
}

impl NetworkMessageEnvironment {
    pub fn new(bind_ip: &str) -> Result<Self> {
        let runtime = async_runtime("message")?;
        Ok(NetworkMessageEnvironment {
            bind_ip: bind_ip.to_string(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            mailboxes: DashMap::new(),
            runtime,
        })
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Address of a locally registered mailbox.
    pub fn local_addr(&self, worker_id: &WorkerId) -> Option<SocketAddr> {
        self.mailboxes.get(worker_id).map(|mailbox| mailbox.addr)
    }

    /// Make a worker served by another process reachable.
    pub fn add_remote(&self, worker_id: &WorkerId, addr: SocketAddr) {
        info!("add remote worker {} at {}", worker_id, addr);
        self.mailboxes.insert(
            worker_id.clone(),
            Mailbox {
                addr,
                server_task: None,
            },
        );
    }

    fn address(&self, worker_id: &WorkerId) -> Result<SocketAddr> {
        self.local_addr(worker_id)
            .ok_or_else(|| Error::Transport(format!("worker {} is unreachable", worker_id)))
    }
}

impl std::fmt::Debug for NetworkMessageEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mailboxes: Vec<(WorkerId, SocketAddr)> = self
            .mailboxes
            .iter()
            .map(|e| (e.key().clone(), e.value().addr))
            .collect();
        f.debug_struct("NetworkMessageEnvironment")
            .field("bind_ip", &self.bind_ip)
            .field("mailboxes", &mailboxes)
            .finish()
    }
}

impl MessageEnvironment for NetworkMessageEnvironment {
    fn register_handler(
        &self,
        worker_id: &WorkerId,
        handler: Weak<dyn BlockFetchHandler>,
    ) -> Result<()> {
        let address = format!("{}:0", self.bind_ip);
        let listener = self
            .runtime
            .block_on(async { TcpListener::bind(address.as_str()).await })?;
        let addr = listener.local_addr()?;
        info!("worker {} mailbox listening on: {}", worker_id, addr);

        let server = Server::new(worker_id.clone(), handler);
        let server_task = self.runtime.spawn(server.session_accept(listener));

        let previous = self.mailboxes.insert(
            worker_id.clone(),
            Mailbox {
                addr,
                server_task: Some(server_task),
            },
        );
        if let Some(Mailbox {
            server_task: Some(task),
            ..
        }) = previous
        {
            warn!("replace the mailbox of worker {}", worker_id);
            task.abort();
        }

        Ok(())
    }

    fn unregister_handler(&self, worker_id: &WorkerId) {
        if let Some((_, mailbox)) = self.mailboxes.remove(worker_id) {
            if let Some(task) = mailbox.server_task {
                task.abort();
            }
            info!("worker {} mailbox closed", worker_id);
        }
    }

    fn fetch(
        &self,
        worker_id: &WorkerId,
        request: BlockFetchRequest,
    ) -> Result<BlockFetchResponse> {
        let addr = self.address(worker_id)?;
        let fetch_timeout = self.fetch_timeout;

        let rt = self.runtime.block_on(async move {
            tokio::time::timeout(fetch_timeout, client::fetch(addr, request)).await
        });
        match rt {
            Ok(response) => response,
            Err(_) => Err(Error::Transport(format!(
                "fetch from worker {} at {} timeout",
                worker_id, addr
            ))),
        }
    }
}
