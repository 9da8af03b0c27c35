//! SOCKS5 server connection reply (RFC 1928 §6).
//!
//! ```text
//! +----+-----+-------+------+----------+----------+
//! |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
//! +----+-----+-------+------+----------+----------+
//! | 1  |  1  | X'00' |  1   | Variable |    2     |
//! +----+-----+-------+------+----------+----------+
//! ```
//!
//! `BND.ADDR`/`BND.PORT` are meaningful for BIND/UDP ASSOCIATE; for CONNECT
//! (the only command this server implements) they are permitted to be
//! zero-valued.

use crate::address::{AddrPort, Atyp};
use crate::error::SocksError;

/// Reply codes (`REP`) for SOCKS5 connection replies (RFC 1928 §6).
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Rep {
    /// `0x00` - Succeeded.
    Succeeded = 0x00,
    /// `0x01` - General SOCKS server failure.
    GeneralFailure = 0x01,
    /// `0x02` - Connection not allowed by ruleset.
    ConnectionNotAllowed = 0x02,
    /// `0x03` - Network unreachable.
    NetworkUnreachable = 0x03,
    /// `0x04` - Host unreachable.
    HostUnreachable = 0x04,
    /// `0x05` - Connection refused by destination host.
    ConnectionRefused = 0x05,
    /// `0x06` - TTL expired.
    TtlExpired = 0x06,
    /// `0x07` - Command not supported.
    CommandNotSupported = 0x07,
    /// `0x08` - Address type not supported.
    AddressTypeNotSupported = 0x08,
}

/// A SOCKS5 server reply (RFC 1928 §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectReply {
    /// Protocol version (`VER`), always `0x05`.
    pub ver: u8,
    /// Reply code (`REP`).
    pub rep: Rep,
    /// Reserved byte (`RSV`), always `0x00`.
    pub rsv: u8,
    /// Bound address and port (`ATYP`, `BND.ADDR`, `BND.PORT`).
    pub bnd: AddrPort,
}

impl ConnectReply {
    /// Creates a reply with the given code, echoing `bnd` as the
    /// (possibly zero-valued) bound address.
    pub fn new(rep: Rep, bnd: AddrPort) -> Self {
        Self {
            ver: 0x05,
            rep,
            rsv: 0x00,
            bnd,
        }
    }

    /// Serializes the reply into its SOCKS5 wire form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![self.ver, self.rep as u8, self.rsv, self.bnd.atyp() as u8];
        buf.extend(self.bnd.encode());
        buf
    }

    /// A bare 2-byte reply (`VER`, `REP`), acceptable for failures that
    /// occur before `ATYP` has been parsed from the request.
    pub fn short(rep: Rep) -> [u8; 2] {
        [0x05, rep as u8]
    }
}

impl TryFrom<&[u8]> for ConnectReply {
    type Error = SocksError;

    /// Parses a `ConnectReply` from raw bytes (used by a chaining outbound
    /// connector reading the reply from an upstream SOCKS5 server).
    fn try_from(buf: &[u8]) -> Result<Self, Self::Error> {
        if buf.len() < 4 {
            return Err(SocksError::ReplyTooShort);
        }

        let ver = buf[0];

        let rep = match buf[1] {
            0x00 => Rep::Succeeded,
            0x01 => Rep::GeneralFailure,
            0x02 => Rep::ConnectionNotAllowed,
            0x03 => Rep::NetworkUnreachable,
            0x04 => Rep::HostUnreachable,
            0x05 => Rep::ConnectionRefused,
            0x06 => Rep::TtlExpired,
            0x07 => Rep::CommandNotSupported,
            0x08 => Rep::AddressTypeNotSupported,
            _ => return Err(SocksError::ReplyTooShort),
        };

        let rsv = buf[2];
        let atyp = Atyp::from_u8(buf[3])?;
        let (bnd, consumed) = AddrPort::decode(&buf[4..], atyp)?;
        if 4 + consumed != buf.len() {
            return Err(SocksError::ReplyTooShort);
        }

        Ok(ConnectReply { ver, rep, rsv, bnd })
    }
}
