//! SOCKS5 handshake messages (RFC 1928 §3).
//!
//! - [`Greeting`] -> sent by the client to advertise supported
//!   authentication methods.
//! - [`MethodReply`] -> sent by the server to choose one method.

use super::method::*;
use crate::error::SocksError;

/// Client's greeting: version plus the list of methods it supports.
///
/// ```text
/// +----+----------+----------+
/// |VER | NMETHODS | METHODS  |
/// +----+----------+----------+
/// | 1  |    1     | 1 to 255 |
/// +----+----------+----------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    /// The SOCKS protocol version (must be `0x05`).
    pub ver: u8,
    /// The list of authentication methods supported by the client.
    pub methods: Vec<Method>,
}

impl Greeting {
    /// Decodes a [`Greeting`] from a buffer already sized to `2 + nmethods`
    /// bytes (the caller reads the 2-byte header first to learn `nmethods`,
    /// then reads the remainder before calling this).
    ///
    /// # Example
    /// ```
    /// use socks5_relay::msg::greeting::Greeting;
    ///
    /// let buf = [0x05, 0x01, 0x00];
    /// let greeting = Greeting::decode(&buf).unwrap();
    /// assert_eq!(greeting.ver, 0x05);
    /// ```
    pub fn decode(buf: &[u8]) -> Result<Self, SocksError> {
        if buf.len() < 2 {
            return Err(SocksError::VersionMessageTooShort);
        }
        let ver = buf[0];
        if ver != 0x05 {
            return Err(SocksError::UnsupportedVersion(ver));
        }
        let nmethods = buf[1] as usize;
        if buf.len() != 2 + nmethods {
            return Err(SocksError::VersionMessageTooShort);
        }
        let methods = buf[2..]
            .iter()
            .map(|&b| Method::from_u8(b))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { ver, methods })
    }
}

/// Server's method-selection reply.
///
/// ```text
/// +----+--------+
/// |VER | METHOD |
/// +----+--------+
/// | 1  |   1    |
/// +----+--------+
/// ```
///
/// `METHOD` is one of the methods proposed by the client, or `0xFF` if none
/// are acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodReply {
    /// The SOCKS protocol version (always `0x05`).
    pub ver: u8,
    /// The authentication method selected by the server.
    pub method: Method,
}

impl MethodReply {
    /// Creates a new [`MethodReply`] selecting `method`.
    pub fn new(method: Method) -> Self {
        Self { ver: 0x05, method }
    }

    /// Serializes this reply into its 2-byte wire form.
    pub fn to_bytes(self) -> [u8; 2] {
        [self.ver, self.method.to_u8()]
    }
}
