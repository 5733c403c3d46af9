//! Addressable worker mailboxes carrying block fetch requests.

use std::convert::TryFrom;
use std::fmt::Debug;
use std::sync::Weak;

use bytes::{Buf, BufMut, BytesMut};

use crate::api::element::{read_sized, read_u32, read_u8};
use crate::api::error::{Error, Result};
use crate::api::runtime::{EdgeId, PartitionId, WorkerId};
use crate::storage::block::Block;

pub mod local;
pub mod network;

pub use local::LocalMessageEnvironment;
pub use network::NetworkMessageEnvironment;

const HEADER_LEN: usize = 4;

/// Serves block fetch requests addressed to one worker.
pub trait BlockFetchHandler: Send + Sync {
    fn on_fetch(&self, request: BlockFetchRequest) -> BlockFetchResponse;
}

/// Request/response transport between workers. Every call is a synchronous
/// RPC from the caller's point of view.
pub trait MessageEnvironment: Send + Sync + Debug {
    /// Open the mailbox of `worker_id`. The handler is held weakly, a dropped
    /// worker simply stops answering.
    fn register_handler(
        &self,
        worker_id: &WorkerId,
        handler: Weak<dyn BlockFetchHandler>,
    ) -> Result<()>;

    fn unregister_handler(&self, worker_id: &WorkerId);

    fn fetch(&self, worker_id: &WorkerId, request: BlockFetchRequest)
        -> Result<BlockFetchResponse>;
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BlockFetchRequest {
    pub partition_id: PartitionId,
    /// `[start, end)` of block tags, the whole partition when absent
    pub hash_range: Option<(u32, u32)>,
}

impl BlockFetchRequest {
    pub fn new(partition_id: PartitionId, hash_range: Option<(u32, u32)>) -> Self {
        BlockFetchRequest {
            partition_id,
            hash_range,
        }
    }
}

/// `[u32 edge id length][edge id][u32 producer][u8 has consumer][u32 consumer]
/// [u8 has range][u32 start][u32 end]`
impl Into<BytesMut> for BlockFetchRequest {
    fn into(self) -> BytesMut {
        let edge_id = self.partition_id.edge_id().as_str().as_bytes();
        let body_len = 4 + edge_id.len() + 4 + 1 + 4 + 1 + 8;

        let mut buffer = BytesMut::with_capacity(HEADER_LEN + body_len);
        buffer.put_u32(body_len as u32);
        buffer.put_u32(edge_id.len() as u32);
        buffer.put_slice(edge_id);
        buffer.put_u32(self.partition_id.producer_index());
        match self.partition_id.consumer_index() {
            Some(consumer_index) => {
                buffer.put_u8(1);
                buffer.put_u32(consumer_index);
            }
            None => {
                buffer.put_u8(0);
                buffer.put_u32(0);
            }
        }
        match self.hash_range {
            Some((start, end)) => {
                buffer.put_u8(1);
                buffer.put_u32(start);
                buffer.put_u32(end);
            }
            None => {
                buffer.put_u8(0);
                buffer.put_u64(0);
            }
        }

        buffer
    }
}

impl TryFrom<BytesMut> for BlockFetchRequest {
    type Error = Error;

    fn try_from(buffer: BytesMut) -> Result<Self> {
        let mut body = frame_body(buffer)?;

        let raw_edge_id = read_sized(&mut body)?;
        let edge_id = std::str::from_utf8(raw_edge_id.as_ref())
            .map_err(|e| Error::Codec(format!("illegal edge id. {}", e)))?;
        let producer_index = read_u32(&mut body)?;
        let has_consumer = read_u8(&mut body)?;
        let consumer_index = read_u32(&mut body)?;
        let partition_id = match has_consumer {
            0 => PartitionId::new(EdgeId::from(edge_id), producer_index),
            1 => PartitionId::with_consumer(EdgeId::from(edge_id), producer_index, consumer_index),
            flag => return Err(Error::Codec(format!("illegal consumer flag {}", flag))),
        };

        let has_range = read_u8(&mut body)?;
        let start = read_u32(&mut body)?;
        let end = read_u32(&mut body)?;
        let hash_range = match has_range {
            0 => None,
            1 => Some((start, end)),
            flag => return Err(Error::Codec(format!("illegal range flag {}", flag))),
        };

        if body.has_remaining() {
            return Err(Error::Codec(format!(
                "{} trailing bytes after fetch request",
                body.remaining()
            )));
        }

        Ok(BlockFetchRequest {
            partition_id,
            hash_range,
        })
    }
}

/// Response code
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ResponseCode {
    /// unknown code
    Unknown = 0,
    /// the blocks follow
    Ok = 1,
    /// the worker does not hold the partition
    NotFound = 2,
    /// the worker failed to read the partition, a message follows
    Error = 3,
}

impl From<u8> for ResponseCode {
    fn from(v: u8) -> Self {
        match v {
            1 => ResponseCode::Ok,
            2 => ResponseCode::NotFound,
            3 => ResponseCode::Error,
            _ => ResponseCode::Unknown,
        }
    }
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseCode::Ok => write!(f, "OK"),
            ResponseCode::NotFound => write!(f, "NotFound"),
            ResponseCode::Error => write!(f, "Error"),
            ResponseCode::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BlockFetchResponse {
    Found(Vec<Block>),
    NotFound,
    Error(String),
}

impl BlockFetchResponse {
    pub fn code(&self) -> ResponseCode {
        match self {
            BlockFetchResponse::Found(_) => ResponseCode::Ok,
            BlockFetchResponse::NotFound => ResponseCode::NotFound,
            BlockFetchResponse::Error(_) => ResponseCode::Error,
        }
    }
}

impl Into<BytesMut> for BlockFetchResponse {
    fn into(self) -> BytesMut {
        let code = self.code();
        let mut buffer = BytesMut::with_capacity(HEADER_LEN + 1);
        // the length is patched once the body is written
        buffer.put_u32(0);
        buffer.put_u8(code as u8);

        match self {
            BlockFetchResponse::Found(blocks) => {
                buffer.put_u32(blocks.len() as u32);
                for block in &blocks {
                    block.serialize(&mut buffer);
                }
            }
            BlockFetchResponse::NotFound => {}
            BlockFetchResponse::Error(message) => {
                buffer.put_u32(message.len() as u32);
                buffer.put_slice(message.as_bytes());
            }
        }

        let body_len = (buffer.len() - HEADER_LEN) as u32;
        buffer[0..HEADER_LEN].copy_from_slice(&body_len.to_be_bytes());
        buffer
    }
}

impl TryFrom<BytesMut> for BlockFetchResponse {
    type Error = Error;

    fn try_from(buffer: BytesMut) -> Result<Self> {
        let mut body = frame_body(buffer)?;

        let code_value = read_u8(&mut body)?;
        match ResponseCode::from(code_value) {
            ResponseCode::Ok => {
                let block_count = read_u32(&mut body)? as usize;
                // a serialized block takes at least its 16 header bytes
                let mut blocks = Vec::with_capacity(block_count.min(body.remaining() / 16));
                for _ in 0..block_count {
                    blocks.push(Block::deserialize(&mut body)?);
                }
                Ok(BlockFetchResponse::Found(blocks))
            }
            ResponseCode::NotFound => Ok(BlockFetchResponse::NotFound),
            ResponseCode::Error => {
                let message = read_sized(&mut body)?;
                Ok(BlockFetchResponse::Error(
                    String::from_utf8_lossy(message.as_ref()).to_string(),
                ))
            }
            ResponseCode::Unknown => Err(Error::Codec(format!(
                "found unknown response code {}",
                code_value
            ))),
        }
    }
}

/// Check the `u32` length header of a frame and return its body.
fn frame_body(mut buffer: BytesMut) -> Result<bytes::Bytes> {
    if buffer.remaining() < HEADER_LEN {
        return Err(Error::Codec("frame shorter than its header".to_string()));
    }
    let body_len = buffer.get_u32() as usize;
    if buffer.remaining() != body_len {
        return Err(Error::Codec(format!(
            "illegal frame body length, expect {}, found {}",
            body_len,
            buffer.remaining()
        )));
    }
    Ok(buffer.freeze())
}
