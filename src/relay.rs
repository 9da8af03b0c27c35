//! The bidirectional relay (specification component 4.5).
//!
//! Once a `ConnectReply` of `SUCCEEDED` has been written, the session stops
//! speaking SOCKS framing and becomes a transparent byte pipe between the
//! client and the destination. Each direction is pumped independently so
//! that EOF on one side cleanly half-closes the other while the still-open
//! direction keeps draining, and so that an error on either side tears
//! down both.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::address::AddrPort;
use crate::connector::BoxedDuplex;
use crate::event::{Direction, Event, EventSink};

const BUF_SIZE: usize = 8 * 1024;

/// Splices `client` and `destination` together until either side closes or
/// errors, emitting [`Event::ProxyData`] for each chunk relayed.
pub async fn relay(
    client: tokio::net::TcpStream,
    destination: BoxedDuplex,
    client_addr: SocketAddr,
    sink: &Arc<dyn EventSink>,
) -> io::Result<()> {
    let (client_r, client_w) = io::split(client);
    let (dest_r, dest_w) = io::split(destination);

    tokio::try_join!(
        pump(
            client_r,
            dest_w,
            client_addr,
            Direction::ClientToDestination,
            sink,
        ),
        pump(
            dest_r,
            client_w,
            client_addr,
            Direction::DestinationToClient,
            sink,
        ),
    )?;
    Ok(())
}

/// Copies bytes from `reader` to `writer` until EOF, shutting `writer` down
/// cleanly once the source is exhausted. A read or write error propagates
/// immediately, letting the caller's `try_join!` cancel the peer pump.
async fn pump<R, W>(
    mut reader: R,
    mut writer: W,
    client: SocketAddr,
    direction: Direction,
    sink: &Arc<dyn EventSink>,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; BUF_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            writer.shutdown().await?;
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
        sink.emit(Event::ProxyData {
            client,
            direction,
            bytes: n,
        });
    }
}

/// Emits [`Event::ProxyDisconnect`] for the outcome of a finished relay.
pub fn emit_disconnect(
    sink: &Arc<dyn EventSink>,
    client: SocketAddr,
    destination: AddrPort,
    result: &io::Result<()>,
) {
    sink.emit(Event::ProxyDisconnect {
        client,
        destination,
        had_error: result.is_err(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NullSink;
    use tokio::net::{TcpListener, TcpStream};

    #[tokio::test]
    async fn relays_bytes_both_ways_and_drains_on_half_close() {
        // Destination side: an echo server reachable as a `BoxedDuplex`.
        let dest_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dest_addr = dest_listener.local_addr().unwrap();
        let echo = tokio::spawn(async move {
            let (mut sock, _) = dest_listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let n = sock.read(&mut buf).await.unwrap();
            sock.write_all(&buf[..n]).await.unwrap();
            sock.shutdown().await.unwrap();
        });
        let destination: BoxedDuplex = Box::new(TcpStream::connect(dest_addr).await.unwrap());

        // Client side: a plain loopback TCP connection, as the session
        // would hand `relay` the accepted socket.
        let client_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client_addr_listen = client_listener.local_addr().unwrap();
        let mut client_side = TcpStream::connect(client_addr_listen).await.unwrap();
        let (server_side, _) = client_listener.accept().await.unwrap();

        let sink: Arc<dyn EventSink> = Arc::new(NullSink);
        let client_addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let relay_task =
            tokio::spawn(async move { relay(server_side, destination, client_addr, &sink).await });

        client_side.write_all(b"ping").await.unwrap();
        let mut reply = [0u8; 4];
        client_side.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply, b"ping");
        drop(client_side);

        echo.await.unwrap();
        relay_task.await.unwrap().unwrap();
    }
}
