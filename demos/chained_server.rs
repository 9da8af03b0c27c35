//! Proxy chaining: an `OutboundConnector` that reaches the destination by
//! speaking the SOCKS5 client role to an upstream proxy, rather than
//! connecting to it directly.

use async_trait::async_trait;
use socks5_relay::address::{AddrPort, Atyp};
use socks5_relay::conn::reply::ConnectReply;
use socks5_relay::conn::request::{Cmd, ConnectRequest};
use socks5_relay::connector::{BoxedDuplex, OutboundConnector};
use socks5_relay::error::{ConnectError, SocksError};
use socks5_relay::msg::method::FixedMethod;
use socks5_relay::{Server, ServerOptions};
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Connects through an upstream SOCKS5 proxy instead of dialing the
/// destination directly, letting the upstream proxy do the resolving.
struct ChainedConnector {
    upstream: SocketAddr,
}

#[async_trait]
impl OutboundConnector for ChainedConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<BoxedDuplex, ConnectError> {
        let mut stream = TcpStream::connect(self.upstream)
            .await
            .map_err(ConnectError::from_io)?;

        stream
            .write_all(&[0x05, 0x01, FixedMethod::NoAuth as u8])
            .await
            .map_err(ConnectError::from_io)?;
        let mut method_reply = [0u8; 2];
        stream
            .read_exact(&mut method_reply)
            .await
            .map_err(ConnectError::from_io)?;
        if method_reply[1] != FixedMethod::NoAuth as u8 {
            return Err(ConnectError::General(io::Error::other(
                "upstream proxy refused NO_AUTH",
            )));
        }

        let dst = if let Ok(ip) = host.parse::<std::net::Ipv4Addr>() {
            AddrPort::V4(ip, port)
        } else if let Ok(ip) = host.parse::<std::net::Ipv6Addr>() {
            AddrPort::V6(ip, port)
        } else {
            AddrPort::Domain(host.to_string(), port)
        };
        let request = ConnectRequest {
            ver: 0x05,
            cmd: Cmd::Connect,
            rsv: 0x00,
            dst,
        };
        stream
            .write_all(&request.to_bytes())
            .await
            .map_err(ConnectError::from_io)?;

        let mut header = [0u8; 4];
        stream
            .read_exact(&mut header)
            .await
            .map_err(ConnectError::from_io)?;
        let atyp = Atyp::from_u8(header[3])
            .map_err(|_| ConnectError::General(io::Error::other("bad upstream ATYP")))?;
        let tail_len = match atyp {
            Atyp::V4 => 6,
            Atyp::V6 => 18,
            Atyp::DomainName => {
                let mut len_byte = [0u8; 1];
                stream
                    .read_exact(&mut len_byte)
                    .await
                    .map_err(ConnectError::from_io)?;
                len_byte[0] as usize + 2
            }
        };
        let mut buf = header.to_vec();
        if atyp == Atyp::DomainName {
            buf.push((tail_len - 2) as u8);
        }
        let mut tail = vec![0u8; tail_len];
        stream
            .read_exact(&mut tail)
            .await
            .map_err(ConnectError::from_io)?;
        buf.extend_from_slice(&tail);

        let reply = ConnectReply::try_from(&buf[..])
            .map_err(|_| ConnectError::General(io::Error::other("malformed upstream reply")))?;
        if reply.rep as u8 != 0x00 {
            return Err(ConnectError::General(io::Error::other(
                "upstream proxy rejected connect",
            )));
        }

        Ok(Box::new(stream))
    }
}

#[tokio::main]
async fn main() -> Result<(), SocksError> {
    tracing_subscriber::fmt::init();

    let upstream: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:1080".to_string())
        .parse()
        .expect("upstream must be host:port");

    let options = ServerOptions::new().outbound_connector(ChainedConnector { upstream });
    let server = Server::bind("127.0.0.1:1081", options).await?;
    println!(
        "chaining proxy listening on {}, forwarding through {}",
        server.local_addr(),
        upstream
    );

    std::future::pending::<()>().await;
    Ok(())
}
