//! The server facade (specification component 4.6): binds a listener,
//! accepts connections, and drives one [`crate::session`] per client.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::{info, instrument};

use crate::auth::Authenticator;
use crate::conn::ConnectionFilter;
use crate::connector::{DirectConnector, OutboundConnector};
use crate::error::SocksError;
use crate::event::{EventSink, NullSink};
use crate::session;

/// Configuration shared by every session spawned from a [`Server`].
///
/// Constructed with [`ServerOptions::new`] and customized with the builder
/// methods; `NO_AUTH` is the only method offered until [`Self::authenticate`]
/// is configured.
pub struct ServerOptions {
    pub(crate) authenticate: Option<Arc<dyn Authenticator>>,
    pub(crate) connection_filter: Option<Arc<dyn ConnectionFilter>>,
    pub(crate) outbound_factory: Arc<dyn OutboundConnector>,
    pub(crate) events: Arc<dyn EventSink>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            authenticate: None,
            connection_filter: None,
            outbound_factory: Arc::new(DirectConnector),
            events: Arc::new(NullSink),
        }
    }
}

impl ServerOptions {
    /// Options with `NO_AUTH` only, a direct outbound connector, and no
    /// event sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures username/password authentication. Once set, only
    /// `USERNAME/PASSWORD` is offered to clients (RFC 1928 does not let a
    /// server advertise both and accept either).
    pub fn authenticate(mut self, authenticator: impl Authenticator + 'static) -> Self {
        self.authenticate = Some(Arc::new(authenticator));
        self
    }

    /// Configures a filter run before the outbound connect.
    pub fn connection_filter(mut self, filter: impl ConnectionFilter + 'static) -> Self {
        self.connection_filter = Some(Arc::new(filter));
        self
    }

    /// Replaces the default [`DirectConnector`] with a custom outbound
    /// connector, e.g. one that chains through another SOCKS5 proxy.
    pub fn outbound_connector(mut self, connector: impl OutboundConnector + 'static) -> Self {
        self.outbound_factory = Arc::new(connector);
        self
    }

    /// Configures the sink that receives lifecycle events for every session.
    pub fn events(mut self, sink: impl EventSink + 'static) -> Self {
        self.events = Arc::new(sink);
        self
    }
}

/// A listening SOCKS5 proxy server.
///
/// Each accepted connection is driven by its own [`session::run`] task,
/// tracked in an internal [`JoinSet`] so [`Server::close`] can abort every
/// in-flight session once the listener stops accepting.
pub struct Server {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    accept_loop: tokio::task::JoinHandle<()>,
}

impl Server {
    /// Binds a listener at `addr` and starts accepting connections,
    /// spawning a session per client under `options`.
    pub async fn bind(addr: &str, options: ServerOptions) -> Result<Self, SocksError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let options = Arc::new(options);

        let accept_loop = tokio::spawn(accept_loop(listener, options, shutdown_rx));

        info!(%local_addr, "listening");
        Ok(Self {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            accept_loop,
        })
    }

    /// The address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting new connections and aborts every in-flight session,
    /// returning only once the listener and every session socket are gone.
    /// Idempotent: calling this more than once after the first is a no-op.
    pub async fn close(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.accept_loop).await;
    }
}

#[instrument(skip(listener, options, shutdown_rx))]
async fn accept_loop(
    listener: TcpListener,
    options: Arc<ServerOptions>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut sessions = JoinSet::new();
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, client_addr)) => {
                        let options = Arc::clone(&options);
                        sessions.spawn(session::run(stream, client_addr, options));
                    }
                    Err(err) => {
                        tracing::warn!(?err, "accept failed");
                    }
                }
            }
            Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
        }
    }
    sessions.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn accepts_and_completes_a_no_auth_connect() {
        let dest_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dest_addr = dest_listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = dest_listener.accept().await.unwrap();
            let mut buf = [0u8; 3];
            sock.read_exact(&mut buf).await.unwrap();
            sock.write_all(b"hi!").await.unwrap();
            sock.shutdown().await.unwrap();
        });

        let mut server = Server::bind("127.0.0.1:0", ServerOptions::new())
            .await
            .unwrap();
        let addr = server.local_addr();

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
        let mut method_reply = [0u8; 2];
        client.read_exact(&mut method_reply).await.unwrap();
        assert_eq!(method_reply, [0x05, 0x00]);

        let mut request = vec![0x05, 0x01, 0x00, 0x01];
        request.extend_from_slice(&dest_addr.ip().to_string().parse::<std::net::Ipv4Addr>().unwrap().octets());
        request.extend_from_slice(&dest_addr.port().to_be_bytes());
        client.write_all(&request).await.unwrap();

        let mut reply_header = [0u8; 4];
        client.read_exact(&mut reply_header).await.unwrap();
        assert_eq!(reply_header[1], 0x00);
        let mut reply_tail = [0u8; 6];
        client.read_exact(&mut reply_tail).await.unwrap();

        client.write_all(b"bye").await.unwrap();
        let mut resp = [0u8; 3];
        client.read_exact(&mut resp).await.unwrap();
        assert_eq!(&resp, b"hi!");
        drop(client);

        server.close().await;
    }
}
