//! The server's observable event stream (specification §6).
//!
//! Events are best-effort, fire-and-forget notifications: publishing one
//! never blocks or fails the session that triggered it. They are modelled
//! as a tagged enum delivered through a sink trait, rather than the
//! string-keyed emitter the design note describes replacing.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::address::AddrPort;
use crate::conn::reply::Rep;

/// One lifecycle notification for a session.
#[derive(Debug, Clone)]
pub enum Event {
    /// A client completed the TCP handshake and is beginning negotiation.
    Handshake { client: SocketAddr },
    /// A username/password authentication attempt succeeded.
    Authenticate { client: SocketAddr, username: String },
    /// A username/password authentication attempt failed.
    AuthenticateError {
        client: SocketAddr,
        username: String,
        error: String,
    },
    /// The connection filter ran; `error` is set if it rejected the request.
    ConnectionFilter {
        client: SocketAddr,
        destination: AddrPort,
        error: Option<String>,
    },
    /// The outbound connector succeeded; emitted exactly once.
    ProxyConnect {
        client: SocketAddr,
        destination: AddrPort,
    },
    /// A chunk of data was relayed in one direction.
    ProxyData {
        client: SocketAddr,
        direction: Direction,
        bytes: usize,
    },
    /// The relay ended.
    ProxyDisconnect {
        client: SocketAddr,
        destination: AddrPort,
        had_error: bool,
    },
    /// An internal error occurred during the session.
    ProxyError { client: SocketAddr, error: String },
    /// The session ended before or instead of entering the relay, with the
    /// reply code that was sent (if any).
    ProxyEnd {
        client: SocketAddr,
        reply_code: Option<Rep>,
    },
}

/// Which leg of the relay a [`Event::ProxyData`] chunk travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client to destination.
    ClientToDestination,
    /// Destination to client.
    DestinationToClient,
}

/// Receives [`Event`]s published by a [`crate::server::Server`].
pub trait EventSink: Send + Sync {
    /// Handles one event. Must not block; implementations that need to do
    /// real work should forward the event onto a channel instead.
    fn emit(&self, event: Event);
}

/// The default sink: discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: Event) {}
}

/// Forwards every event onto an unbounded channel. Construct with
/// [`ChannelSink::new`] and keep the paired receiver to consume the stream;
/// if the receiver is dropped, events are silently discarded (fire-and-forget).
#[derive(Clone)]
pub struct ChannelSink(UnboundedSender<Event>);

impl ChannelSink {
    /// Creates a sink paired with the [`tokio::sync::mpsc::UnboundedReceiver`]
    /// that will receive every emitted event.
    pub fn new() -> (Arc<Self>, tokio::sync::mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (Arc::new(Self(tx)), rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: Event) {
        let _ = self.0.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_sink_delivers_events() {
        let (sink, mut rx) = ChannelSink::new();
        let client: SocketAddr = "127.0.0.1:1".parse().unwrap();
        sink.emit(Event::Handshake { client });
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, Event::Handshake { .. }));
    }

    #[test]
    fn null_sink_discards() {
        let client: SocketAddr = "127.0.0.1:1".parse().unwrap();
        NullSink.emit(Event::Handshake { client });
    }
}
