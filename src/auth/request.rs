//! Username/password authentication request (RFC 1929 §2).
//!
//! After selecting the username/password method during negotiation
//! (RFC 1928 §3), the client sends:
//!
//! ```text
//! +----+------+----------+------+----------+
//! |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
//! +----+------+----------+------+----------+
//! |  1 |  1   | 1-255    |  1   | 1-255    |
//! +----+------+----------+------+----------+
//! ```

use crate::error::SocksError;

/// An authentication request from a client (RFC 1929 §2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    /// Sub-negotiation version (`VER`), always `0x01`.
    pub ver: u8,
    /// The username (`UNAME`).
    pub uname: String,
    /// The password (`PASSWD`).
    pub passwd: String,
}

impl AuthRequest {
    /// Decodes an `AuthRequest` from a buffer already assembled by the
    /// caller to exactly `2 + ulen + 1 + plen` bytes (the session reads
    /// `VER`+`ULEN`, then `UNAME`, then `PLEN`, then `PASSWD`, each with a
    /// separately sized `read_exact`, before calling this).
    pub fn decode(bytes: &[u8]) -> Result<Self, SocksError> {
        if bytes.len() < 2 {
            return Err(SocksError::AuthMessageMalformed("too short"));
        }

        let ver = bytes[0];
        if ver != 0x01 {
            return Err(SocksError::UnsupportedAuthVersion(ver));
        }

        let ulen = bytes[1] as usize;
        if bytes.len() < 2 + ulen + 1 {
            return Err(SocksError::AuthMessageMalformed("truncated before username"));
        }

        let uname = String::from_utf8(bytes[2..2 + ulen].to_vec())
            .map_err(|_| SocksError::AuthMessageMalformed("invalid UTF-8 in username"))?;

        let plen_index = 2 + ulen;
        let plen = bytes[plen_index] as usize;

        if bytes.len() != plen_index + 1 + plen {
            return Err(SocksError::AuthMessageMalformed("truncated before password"));
        }

        let passwd = String::from_utf8(bytes[plen_index + 1..plen_index + 1 + plen].to_vec())
            .map_err(|_| SocksError::AuthMessageMalformed("invalid UTF-8 in password"))?;

        Ok(Self { ver, uname, passwd })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_well_formed_request() {
        let mut bytes = vec![0x01, 4];
        bytes.extend_from_slice(b"user");
        bytes.push(4);
        bytes.extend_from_slice(b"pass");
        let req = AuthRequest::decode(&bytes).unwrap();
        assert_eq!(req.uname, "user");
        assert_eq!(req.passwd, "pass");
    }

    #[test]
    fn rejects_bad_version() {
        let bytes = [0x05, 0, 0];
        assert!(matches!(
            AuthRequest::decode(&bytes),
            Err(SocksError::UnsupportedAuthVersion(0x05))
        ));
    }

    #[test]
    fn rejects_truncated_password() {
        let mut bytes = vec![0x01, 1, b'a', 3];
        bytes.extend_from_slice(b"ab");
        assert!(AuthRequest::decode(&bytes).is_err());
    }
}
