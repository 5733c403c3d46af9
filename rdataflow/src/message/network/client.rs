use std::convert::TryFrom;
use std::net::SocketAddr;

use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::{BytesCodec, FramedWrite};

use crate::api::error::{Error, Result};
use crate::message::network::new_framed_read;
use crate::message::{BlockFetchRequest, BlockFetchResponse};

pub(crate) async fn fetch(
    addr: SocketAddr,
    request: BlockFetchRequest,
) -> Result<BlockFetchResponse> {
    let mut stream = TcpStream::connect(addr).await?;
    let (r, w) = stream.split();
    let mut sink = FramedWrite::new(w, BytesCodec::new());
    let mut framed_read = new_framed_read(r);

    let buffer: BytesMut = request.into();
    sink.send(buffer.freeze()).await?;

    let message = framed_read.next().await.ok_or_else(|| {
        Error::Transport(format!("connection to {} closed before response", addr))
    })?;
    let bytes = message.map_err(|e| Error::Transport(format!("framed read error {}", e)))?;

    BlockFetchResponse::try_from(bytes)
}
