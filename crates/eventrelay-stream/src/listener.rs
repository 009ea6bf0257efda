//! TCP listener: binds the relay port and hands over exactly one client.

use eventrelay_core::error::RelayError;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tracing::info;

/// Bind `addr` (`host:port`). Failure here is fatal for the process.
pub async fn bind(addr: &str) -> Result<TcpListener, RelayError> {
    let listener = TcpListener::bind(addr).await.map_err(|source| RelayError::Bind {
        addr: addr.to_string(),
        source,
    })?;
    info!("Socket bind complete on {}", listener.local_addr().map_err(RelayError::Accept)?);
    Ok(listener)
}

/// Wait for the single client of this process. The listener is consumed,
/// so later connection attempts are refused.
pub async fn accept_one(listener: TcpListener) -> Result<(TcpStream, SocketAddr), RelayError> {
    info!("Listening for connections...");
    let (stream, peer) = listener.accept().await.map_err(RelayError::Accept)?;
    info!("Connected with {peer}");
    Ok((stream, peer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn accepts_one_client() {
        let listener = bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut s = TcpStream::connect(addr).await.unwrap();
            s.write_all(b"hi").await.unwrap();
        });

        let (_stream, peer) = accept_one(listener).await.unwrap();
        assert!(peer.ip().is_loopback());
        client.await.unwrap();
    }

    #[tokio::test]
    async fn bind_conflict_is_bind_error() {
        let first = bind("127.0.0.1:0").await.unwrap();
        let addr = first.local_addr().unwrap().to_string();
        let err = bind(&addr).await.unwrap_err();
        assert!(matches!(err, RelayError::Bind { .. }));
    }
}
