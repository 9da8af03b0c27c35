//! Username/password authentication (RFC 1929).
//!
//! [`request`]/[`reply`] are the pure wire-format types. [`Authenticator`]
//! is the pluggable credential check a server is configured with; without
//! one, only `NO_AUTH` is ever selected during method negotiation.

pub mod reply;
pub mod request;

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::error::AuthError;

/// Checks a username/password pair presented during sub-negotiation.
///
/// Corresponds to the specification's `authenticate(username, password,
/// client_endpoint, done)` option: `done()` with no error is `Ok(())` here,
/// `done(err)` is `Err(AuthError)`.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Validates `username`/`password` for a client connecting from
    /// `client`. An `Err` causes the session to reply with sub-negotiation
    /// status `0xFF` and close.
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
        client: SocketAddr,
    ) -> Result<(), AuthError>;
}

/// Adapts a synchronous closure into an [`Authenticator`], for the common
/// case of a static credential table or simple predicate (mirrors the
/// teacher's `allow_userpass(|u, p| ...)` builder method).
pub struct ClosureAuthenticator<F>(pub F)
where
    F: Fn(&str, &str) -> bool + Send + Sync;

#[async_trait]
impl<F> Authenticator for ClosureAuthenticator<F>
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
        _client: SocketAddr,
    ) -> Result<(), AuthError> {
        if (self.0)(username, password) {
            Ok(())
        } else {
            Err(AuthError::new("invalid credentials"))
        }
    }
}
