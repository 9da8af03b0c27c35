//! An asynchronous SOCKS5 proxy server library (RFC 1928, RFC 1929).
//!
//! The [`server::Server`] facade binds a listener and drives one
//! [`session`] per accepted connection through the full handshake,
//! optional authentication, outbound connect, and bidirectional relay.
//! Authentication, the outbound connector, destination filtering, and
//! event observation are all pluggable via [`server::ServerOptions`].
//!
//! Only the `CONNECT` command is implemented; `BIND` and `UDP ASSOCIATE`
//! are replied to with `COMMAND_NOT_SUPPORTED`.

pub mod address;
pub mod auth;
pub mod conn;
pub mod connector;
pub mod error;
pub mod event;
pub mod msg;
pub mod relay;
pub mod server;
pub mod session;

pub use error::SocksError;
pub use server::{Server, ServerOptions};
