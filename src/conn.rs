//! Connection request/reply framing (RFC 1928 §4-6) and the pluggable
//! connection filter that gates which destinations a client may reach.

pub mod reply;
pub mod request;

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::address::AddrPort;
use crate::error::FilterError;

/// Approves or rejects a destination before the outbound connector is
/// invoked. Corresponds to the specification's `connection_filter(destination,
/// origin, done)` option.
///
/// A configured filter that never resolves stalls the session; this is
/// treated as caller misuse, not something the session guards against.
#[async_trait]
pub trait ConnectionFilter: Send + Sync {
    /// Decides whether `origin` may open a connection to `destination`. An
    /// `Err` causes the session to reply `CONNECTION_NOT_ALLOWED` and close.
    async fn allow(&self, destination: &AddrPort, origin: SocketAddr) -> Result<(), FilterError>;
}
