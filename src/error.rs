//! Error types used across the SOCKS5 implementation.
//!
//! Errors are grouped by protocol phase:
//! - **Version / Method Selection** (RFC 1928 §3).
//! - **Authentication** (RFC 1929).
//! - **Connection requests and replies** (RFC 1928 §4-6).
//! - **Outbound connect** (destination-reachability diagnostics).
//! - General I/O errors from the underlying transport.

use std::io;
use thiserror::Error;

use crate::conn::reply::Rep;

/// Unified error type for a SOCKS5 session.
#[derive(Debug, Error)]
pub enum SocksError {
    // ===== Version / Method Selection =====
    /// The client requested an unsupported SOCKS protocol version.
    #[error("unsupported SOCKS version: {0}")]
    UnsupportedVersion(u8),

    /// The client's version message was too short to contain mandatory fields.
    #[error("version message too short")]
    VersionMessageTooShort,

    /// The client requested an unknown or invalid authentication method.
    #[error("unknown authentication method: {0}")]
    UnknownMethod(u8),

    /// No method in the client's offer is acceptable to this server.
    #[error("no acceptable authentication method")]
    NoAcceptableMethod,

    // ===== Authentication =====
    /// The client used an unsupported sub-negotiation version.
    #[error("authentication version not supported: {0}")]
    UnsupportedAuthVersion(u8),

    /// The authentication message from the client was too short or malformed.
    #[error("authentication message malformed: {0}")]
    AuthMessageMalformed(&'static str),

    /// The authenticate callback rejected the supplied credentials.
    #[error("authentication rejected: {0}")]
    AuthRejected(#[from] AuthError),

    // ===== Connection request =====
    /// The client specified an invalid or unsupported address type.
    #[error("invalid address type: {0}")]
    InvalidAddressType(u8),

    /// The domain name field was truncated or not valid UTF-8.
    #[error("invalid domain name")]
    InvalidDomain,

    /// The connection request from the client was too short.
    #[error("connection request too short")]
    ConnRequestTooShort,

    /// `RSV` was non-zero.
    #[error("non-zero reserved byte")]
    NonZeroReserved,

    /// The client requested an unsupported command (not CONNECT).
    #[error("unsupported command: {0}")]
    UnsupportedCommand(u8),

    /// The reply message was too short to parse.
    #[error("reply too short")]
    ReplyTooShort,

    /// The configured connection filter rejected the destination.
    #[error("connection rejected by filter: {0}")]
    FilterRejected(#[from] FilterError),

    /// The outbound connector failed to reach the destination.
    #[error("connect failed: {0}")]
    ConnectFailed(#[from] ConnectError),

    // ===== General =====
    /// A general I/O error occurred in the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SocksError {
    /// Maps this error onto the RFC 1928 §6 reply code it should produce,
    /// per the error-handling table in the specification. Errors that occur
    /// before any `ConnectRequest` has been parsed are reported with a
    /// short 2-byte reply rather than through this mapping.
    pub fn as_reply_code(&self) -> Rep {
        match self {
            SocksError::InvalidAddressType(_) => Rep::AddressTypeNotSupported,
            SocksError::UnsupportedCommand(_) => Rep::CommandNotSupported,
            SocksError::FilterRejected(_) => Rep::ConnectionNotAllowed,
            SocksError::ConnectFailed(ConnectError::NetworkUnreachable) => {
                Rep::NetworkUnreachable
            }
            SocksError::ConnectFailed(ConnectError::HostUnreachable) => Rep::HostUnreachable,
            SocksError::ConnectFailed(ConnectError::ConnectionRefused) => Rep::ConnectionRefused,
            SocksError::ConnectFailed(ConnectError::General(_)) => Rep::NetworkUnreachable,
            _ => Rep::GeneralFailure,
        }
    }
}

/// Rejection raised by a configured [`crate::auth::Authenticator`].
#[derive(Debug, Error, Clone)]
#[error("{0}")]
pub struct AuthError(pub String);

impl AuthError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Rejection raised by a configured [`crate::conn::ConnectionFilter`].
#[derive(Debug, Error, Clone)]
#[error("{0}")]
pub struct FilterError(pub String);

impl FilterError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Diagnostic kind returned by an [`crate::connector::OutboundConnector`].
///
/// The session consults this by exact identifier to pick between
/// NETWORK_UNREACHABLE, HOST_UNREACHABLE, and CONNECTION_REFUSED.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Destination network unreachable / generic connect failure.
    #[error("network unreachable")]
    NetworkUnreachable,
    /// Destination host unreachable (platform-reported address-not-available).
    #[error("host unreachable")]
    HostUnreachable,
    /// Destination actively refused the connection.
    #[error("connection refused")]
    ConnectionRefused,
    /// Anything else (DNS failure, timeout, ...).
    #[error("connect failed: {0}")]
    General(#[from] io::Error),
}

impl ConnectError {
    /// Classifies a raw I/O error from a direct TCP connect attempt into one
    /// of the diagnostic kinds above, using the `io::ErrorKind` variants
    /// stabilized for this purpose (stable since Rust 1.83).
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => ConnectError::ConnectionRefused,
            io::ErrorKind::HostUnreachable => ConnectError::HostUnreachable,
            io::ErrorKind::NetworkUnreachable => ConnectError::NetworkUnreachable,
            _ => ConnectError::General(err),
        }
    }
}
