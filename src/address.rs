//! SOCKS5 address model (RFC 1928 §5, "Addressing").
//!
//! A destination or bound address/port is encoded as one of three shapes,
//! discriminated by the `ATYP` byte carried alongside it in every
//! `ConnectRequest`/`ConnectReply`:
//!
//! - `0x01` IPv4: 4 raw bytes, textual form `a.b.c.d`.
//! - `0x03` domain name: one length byte `L` (1..=255), then `L` bytes, no
//!   terminator. Passed through as raw bytes to avoid encoding surprises.
//! - `0x04` IPv6: 16 raw bytes, textual form eight unabbreviated
//!   colon-separated lowercase-hex groups.
//!
//! This module is pure: no I/O, only parsing and formatting over byte
//! slices already assembled by the caller.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::SocksError;

/// Address-type discriminator carried in `ConnectRequest`/`ConnectReply`.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Atyp {
    /// IPv4 address (`0x01`).
    V4 = 0x01,
    /// Domain name (`0x03`).
    DomainName = 0x03,
    /// IPv6 address (`0x04`).
    V6 = 0x04,
}

impl Atyp {
    /// Parses an `ATYP` byte, returning an error for any value outside
    /// `{1, 3, 4}`.
    pub fn from_u8(byte: u8) -> Result<Self, SocksError> {
        match byte {
            0x01 => Ok(Atyp::V4),
            0x03 => Ok(Atyp::DomainName),
            0x04 => Ok(Atyp::V6),
            other => Err(SocksError::InvalidAddressType(other)),
        }
    }
}

impl fmt::Display for Atyp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atyp::V4 => write!(f, "IPv4"),
            Atyp::V6 => write!(f, "IPv6"),
            Atyp::DomainName => write!(f, "Domain"),
        }
    }
}

/// A destination or bound address, paired with its port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddrPort {
    /// An IPv4 address and port.
    V4(Ipv4Addr, u16),
    /// An IPv6 address and port, rendered unabbreviated.
    V6(Ipv6Addr, u16),
    /// A domain name and port, carried as raw UTF-8 bytes.
    Domain(String, u16),
}

impl AddrPort {
    /// The `ATYP` this address would be encoded with.
    pub fn atyp(&self) -> Atyp {
        match self {
            AddrPort::V4(..) => Atyp::V4,
            AddrPort::V6(..) => Atyp::V6,
            AddrPort::Domain(..) => Atyp::DomainName,
        }
    }

    /// The host, rendered in its SOCKS5 textual form: dotted-quad for IPv4,
    /// eight unabbreviated lowercase-hex groups for IPv6, and the raw bytes
    /// (as UTF-8) for a domain name. This text is what is handed to the
    /// outbound connector; re-parsing it (if a platform resolver requires
    /// canonical form) is the connector's responsibility.
    pub fn host(&self) -> String {
        match self {
            AddrPort::V4(ip, _) => ip.to_string(),
            AddrPort::V6(ip, _) => format_v6_unabbreviated(ip),
            AddrPort::Domain(name, _) => name.clone(),
        }
    }

    /// The port.
    pub fn port(&self) -> u16 {
        match self {
            AddrPort::V4(_, p) | AddrPort::V6(_, p) | AddrPort::Domain(_, p) => *p,
        }
    }

    /// Decodes the address+port portion of a request/reply frame (the
    /// bytes following `ATYP`). Returns the parsed address and the number
    /// of bytes consumed.
    pub fn decode(buf: &[u8], atyp: Atyp) -> Result<(Self, usize), SocksError> {
        match atyp {
            Atyp::V4 => {
                if buf.len() < 6 {
                    return Err(SocksError::ConnRequestTooShort);
                }
                let ip = Ipv4Addr::new(buf[0], buf[1], buf[2], buf[3]);
                let port = u16::from_be_bytes([buf[4], buf[5]]);
                Ok((AddrPort::V4(ip, port), 6))
            }
            Atyp::V6 => {
                if buf.len() < 18 {
                    return Err(SocksError::ConnRequestTooShort);
                }
                let mut groups = [0u16; 8];
                for (i, group) in groups.iter_mut().enumerate() {
                    *group = u16::from_be_bytes([buf[i * 2], buf[i * 2 + 1]]);
                }
                let ip = Ipv6Addr::new(
                    groups[0], groups[1], groups[2], groups[3], groups[4], groups[5], groups[6],
                    groups[7],
                );
                let port = u16::from_be_bytes([buf[16], buf[17]]);
                Ok((AddrPort::V6(ip, port), 18))
            }
            Atyp::DomainName => {
                if buf.is_empty() {
                    return Err(SocksError::ConnRequestTooShort);
                }
                let len = buf[0] as usize;
                if len == 0 || buf.len() < 1 + len + 2 {
                    return Err(SocksError::InvalidDomain);
                }
                let name = String::from_utf8(buf[1..1 + len].to_vec())
                    .map_err(|_| SocksError::InvalidDomain)?;
                let port = u16::from_be_bytes([buf[1 + len], buf[1 + len + 1]]);
                Ok((AddrPort::Domain(name, port), 1 + len + 2))
            }
        }
    }

    /// Encodes the address+port portion of a request/reply frame (the bytes
    /// that follow `ATYP`).
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            AddrPort::V4(ip, port) => {
                buf.extend_from_slice(&ip.octets());
                buf.extend_from_slice(&port.to_be_bytes());
            }
            AddrPort::V6(ip, port) => {
                buf.extend_from_slice(&ip.octets());
                buf.extend_from_slice(&port.to_be_bytes());
            }
            AddrPort::Domain(name, port) => {
                buf.push(name.len() as u8);
                buf.extend_from_slice(name.as_bytes());
                buf.extend_from_slice(&port.to_be_bytes());
            }
        }
        buf
    }

    /// The number of bytes `decode`/`encode` consume/produce for this atyp,
    /// not counting the `ATYP` byte itself.
    pub fn encoded_len(&self) -> usize {
        match self {
            AddrPort::V4(..) => 6,
            AddrPort::V6(..) => 18,
            AddrPort::Domain(name, _) => 1 + name.len() + 2,
        }
    }
}

impl fmt::Display for AddrPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddrPort::V4(ip, port) => write!(f, "{}:{}", ip, port),
            AddrPort::V6(ip, port) => write!(f, "[{}]:{}", format_v6_unabbreviated(ip), port),
            AddrPort::Domain(name, port) => write!(f, "{}:{}", name, port),
        }
    }
}

/// Renders an IPv6 address as eight unabbreviated colon-separated
/// lowercase-hex groups (no `::` compression), as the specification
/// requires.
fn format_v6_unabbreviated(ip: &Ipv6Addr) -> String {
    let seg = ip.segments();
    format!(
        "{:x}:{:x}:{:x}:{:x}:{:x}:{:x}:{:x}:{:x}",
        seg[0], seg[1], seg[2], seg[3], seg[4], seg[5], seg[6], seg[7]
    )
}
