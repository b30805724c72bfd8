//! Socket helpers shared by the registry, the service runtime and the client.
//!
//! Every exchange is one connection, one write and one read. A message is
//! whatever a single `read` into a [`ProtocolConfig::RECV_BUFFER_SIZE`]
//! buffer returns; longer messages are not reassembled and will fail to
//! decode on the receiving side.

use crate::config::{ProtocolConfig, TimeoutConfig};
use crate::{Result, SoaError};
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Read one message with a single `read` call.
///
/// Returns `None` when the peer closed without sending anything.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<String>> {
    let mut buf = vec![0u8; ProtocolConfig::RECV_BUFFER_SIZE];
    let n = reader.read(&mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    buf.truncate(n);

    String::from_utf8(buf)
        .map(Some)
        .map_err(|e| SoaError::malformed(format!("invalid UTF-8 in frame: {}", e)))
}

/// Write one message and flush.
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, frame: &str) -> Result<()> {
    writer.write_all(frame.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Open a fresh connection, send `frame`, wait for one reply and close.
pub async fn exchange(host: &str, port: u16, frame: &str, timeouts: TimeoutConfig) -> Result<String> {
    let mut stream = with_limit(timeouts.connect, TcpStream::connect((host, port))).await?;
    debug!("Connected to {}:{}, sending {}", host, port, frame);

    write_message(&mut stream, frame).await?;

    let reply = match timeouts.read {
        Some(limit) => tokio::time::timeout(limit, read_message(&mut stream))
            .await
            .map_err(|_| SoaError::Timeout(limit))??,
        None => read_message(&mut stream).await?,
    };

    reply.ok_or_else(|| SoaError::Io {
        message: format!("{}:{} closed the connection without replying", host, port),
        source: None,
    })
}

async fn with_limit<T>(
    limit: Option<Duration>,
    fut: impl Future<Output = std::io::Result<T>>,
) -> Result<T> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| SoaError::Timeout(limit))?
            .map_err(SoaError::from),
        None => fut.await.map_err(SoaError::from),
    }
}
