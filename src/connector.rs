//! The pluggable outbound connector (specification component 4.4).
//!
//! Given a destination `(host, port)`, an [`OutboundConnector`] yields a
//! byte-duplex stream connected to it. [`DirectConnector`] is the default:
//! it opens a direct TCP connection via the host platform's resolver. A
//! chaining implementation (see `demos/chained_server.rs`) may instead
//! connect through another SOCKS5 proxy, resolving the destination itself.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::error::ConnectError;

/// Any owned, `'static`, `Send` + `Unpin` byte duplex. Blanket-implemented
/// for every type that satisfies the bound, so [`BoxedDuplex`] can hold a
/// plain `TcpStream` or an arbitrarily wrapped chained connection.
pub trait Duplex: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> Duplex for T {}

/// A type-erased byte-duplex stream to an outbound destination.
pub type BoxedDuplex = Box<dyn Duplex>;

/// Produces the destination-side stream for a CONNECT request.
#[async_trait]
pub trait OutboundConnector: Send + Sync {
    /// Connects to `host:port`, returning a duplex stream on success or a
    /// [`ConnectError`] carrying a reply-code-mappable diagnostic on
    /// failure.
    async fn connect(&self, host: &str, port: u16) -> Result<BoxedDuplex, ConnectError>;
}

/// The default connector: a direct TCP connection via the OS resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectConnector;

#[async_trait]
impl OutboundConnector for DirectConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<BoxedDuplex, ConnectError> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(ConnectError::from_io)?;
        Ok(Box::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connects_to_a_listening_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let connector = DirectConnector;
        let result = connector.connect(&addr.ip().to_string(), addr.port()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn maps_refused_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connector = DirectConnector;
        let err = match connector.connect(&addr.ip().to_string(), addr.port()).await {
            Ok(_) => panic!("expected connect to a dropped listener to fail"),
            Err(err) => err,
        };
        assert!(matches!(err, ConnectError::ConnectionRefused));
    }
}
