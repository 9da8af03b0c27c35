//! SOCKS5 client connection request (RFC 1928 §4).
//!
//! ```text
//! +----+-----+-------+------+----------+----------+
//! |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
//! +----+-----+-------+------+----------+----------+
//! | 1  |  1  | X'00' |  1   | Variable |    2     |
//! +----+-----+-------+------+----------+----------+
//! ```

use std::fmt;

use crate::address::{AddrPort, Atyp};
use crate::error::SocksError;

/// The command (`CMD`) of a SOCKS5 request (RFC 1928 §4).
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Cmd {
    /// CONNECT (`0x01`): the only command this server implements.
    Connect = 0x01,
    /// BIND (`0x02`): not implemented, replied to with `COMMAND_NOT_SUPPORTED`.
    Bind = 0x02,
    /// UDP ASSOCIATE (`0x03`): not implemented, replied to with `COMMAND_NOT_SUPPORTED`.
    UdpAssociate = 0x03,
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cmd::Connect => write!(f, "CONNECT"),
            Cmd::Bind => write!(f, "BIND"),
            Cmd::UdpAssociate => write!(f, "UDP_ASSOCIATE"),
        }
    }
}

/// A SOCKS5 connection request (RFC 1928 §4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Protocol version (`VER`), must be `0x05`.
    pub ver: u8,
    /// Requested command (`CMD`).
    pub cmd: Cmd,
    /// Reserved byte (`RSV`); must be `0x00` per RFC 1928. `decode` does not
    /// reject a non-zero value itself, since by then `dst` is already
    /// parsed and the session wants to echo it in the failure reply; the
    /// session driver checks `rsv` once `decode` returns.
    pub rsv: u8,
    /// Destination address and port (`ATYP`, `DST.ADDR`, `DST.PORT`).
    pub dst: AddrPort,
}

impl ConnectRequest {
    /// Decodes a `ConnectRequest` from a buffer already assembled to the
    /// exact length the header (`VER CMD RSV ATYP`) plus address-specific
    /// tail require.
    pub fn decode(buf: &[u8]) -> Result<Self, SocksError> {
        if buf.len() < 4 {
            return Err(SocksError::ConnRequestTooShort);
        }

        let ver = buf[0];

        let cmd = match buf[1] {
            0x01 => Cmd::Connect,
            0x02 => Cmd::Bind,
            0x03 => Cmd::UdpAssociate,
            other => return Err(SocksError::UnsupportedCommand(other)),
        };

        let rsv = buf[2];

        let atyp = Atyp::from_u8(buf[3])?;
        let (dst, consumed) = AddrPort::decode(&buf[4..], atyp)?;
        if 4 + consumed != buf.len() {
            return Err(SocksError::ConnRequestTooShort);
        }

        Ok(ConnectRequest { ver, cmd, rsv, dst })
    }

    /// Serializes the request into its SOCKS5 wire form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![self.ver, self.cmd as u8, self.rsv, self.dst.atyp() as u8];
        buf.extend(self.dst.encode());
        buf
    }
}

impl fmt::Display for ConnectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.cmd, self.dst)
    }
}
