//! The per-connection SOCKS5 protocol state machine (specification
//! component 4.3).
//!
//! A session is driven one framed message at a time: `Greeting ->
//! [Authenticating] -> Request -> Relaying | Closed`. After writing a
//! reply, the session arms a single read for the next expected message;
//! nothing is pre-buffered beyond one frame. Every branch either produces a
//! reply and terminates, or advances to exactly one well-defined next
//! state, so at most one `MethodReply`, one `AuthReply`, and one
//! `ConnectReply` are ever written.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument, warn};

use crate::address::{AddrPort, Atyp};
use crate::auth::reply::{AuthReply, AuthStatus};
use crate::auth::request::AuthRequest;
use crate::conn::reply::{ConnectReply, Rep};
use crate::conn::request::{Cmd, ConnectRequest};
use crate::error::SocksError;
use crate::event::Event;
use crate::msg::greeting::{Greeting, MethodReply};
use crate::msg::method::{FixedMethod, Method};
use crate::relay;
use crate::server::ServerOptions;

/// Phase of the session state machine, tracked for logging/diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Greeting,
    AwaitingAuth,
    AwaitingRequest,
    Connecting,
    Relaying,
}

/// Drives one accepted connection through the full SOCKS5 lifecycle:
/// method negotiation, optional authentication, the connect request, the
/// outbound connect, and the relay. Never panics on malformed client
/// input; every failure produces at most one reply and then returns.
#[instrument(skip(stream, options), fields(client = %client_addr))]
pub async fn run(stream: TcpStream, client_addr: SocketAddr, options: Arc<ServerOptions>) {
    options.events.emit(Event::Handshake { client: client_addr });

    let mut phase = Phase::Greeting;
    if let Err(err) = drive(stream, client_addr, &options, &mut phase).await {
        warn!(?err, ?phase, "session ended with error");
        options.events.emit(Event::ProxyError {
            client: client_addr,
            error: err.to_string(),
        });
    }
}

async fn drive(
    mut stream: TcpStream,
    client_addr: SocketAddr,
    options: &Arc<ServerOptions>,
    phase: &mut Phase,
) -> Result<(), SocksError> {
    let greeting = match read_greeting(&mut stream).await {
        Ok(g) => g,
        Err(err) => {
            write_short(&mut stream, Rep::GeneralFailure).await?;
            end(options, client_addr, None);
            return Err(err);
        }
    };

    let method = select_method(&greeting.methods, options.authenticate.is_some());
    write_bytes(&mut stream, &MethodReply::new(method).to_bytes()).await?;

    if method == Method::Fixed(FixedMethod::NoAcceptable) {
        end(options, client_addr, None);
        return Err(SocksError::NoAcceptableMethod);
    }

    if method == Method::Fixed(FixedMethod::UserPass) {
        *phase = Phase::AwaitingAuth;
        authenticate(&mut stream, client_addr, options).await?;
    }

    *phase = Phase::AwaitingRequest;
    let request = match read_connect_request(&mut stream).await {
        Ok(req) => req,
        Err(err) => {
            fail_request(&mut stream, &err, None).await?;
            end(options, client_addr, Some(err.as_reply_code()));
            return Err(err);
        }
    };
    debug!(request = %request, "parsed connect request");

    if request.rsv != 0 {
        let err = SocksError::NonZeroReserved;
        fail_request(&mut stream, &err, Some(&request.dst)).await?;
        end(options, client_addr, Some(err.as_reply_code()));
        return Err(err);
    }

    if request.cmd != Cmd::Connect {
        let err = SocksError::UnsupportedCommand(request.cmd as u8);
        fail_request(&mut stream, &err, None).await?;
        end(options, client_addr, Some(err.as_reply_code()));
        return Err(err);
    }

    *phase = Phase::Connecting;
    if let Some(filter) = &options.connection_filter {
        match filter.allow(&request.dst, client_addr).await {
            Ok(()) => options.events.emit(Event::ConnectionFilter {
                client: client_addr,
                destination: request.dst.clone(),
                error: None,
            }),
            Err(filter_err) => {
                options.events.emit(Event::ConnectionFilter {
                    client: client_addr,
                    destination: request.dst.clone(),
                    error: Some(filter_err.0.clone()),
                });
                let err = SocksError::FilterRejected(filter_err);
                fail_request(&mut stream, &err, Some(&request.dst)).await?;
                end(options, client_addr, Some(err.as_reply_code()));
                return Err(err);
            }
        }
    }

    let destination = match options
        .outbound_factory
        .connect(&request.dst.host(), request.dst.port())
        .await
    {
        Ok(d) => d,
        Err(connect_err) => {
            let err = SocksError::ConnectFailed(connect_err);
            fail_request(&mut stream, &err, Some(&request.dst)).await?;
            end(options, client_addr, Some(err.as_reply_code()));
            return Err(err);
        }
    };

    options.events.emit(Event::ProxyConnect {
        client: client_addr,
        destination: request.dst.clone(),
    });
    write_bytes(
        &mut stream,
        &ConnectReply::new(Rep::Succeeded, request.dst.clone()).to_bytes(),
    )
    .await?;

    *phase = Phase::Relaying;
    info!(destination = %request.dst, "relaying");
    let result = relay::relay(stream, destination, client_addr, &options.events).await;
    relay::emit_disconnect(&options.events, client_addr, request.dst, &result);
    end(options, client_addr, None);
    result.map_err(SocksError::from)
}

fn select_method(offered: &[Method], auth_configured: bool) -> Method {
    if auth_configured {
        if offered.contains(&Method::Fixed(FixedMethod::UserPass)) {
            return Method::Fixed(FixedMethod::UserPass);
        }
    } else if offered.contains(&Method::Fixed(FixedMethod::NoAuth)) {
        return Method::Fixed(FixedMethod::NoAuth);
    }
    Method::Fixed(FixedMethod::NoAcceptable)
}

async fn authenticate(
    stream: &mut TcpStream,
    client_addr: SocketAddr,
    options: &Arc<ServerOptions>,
) -> Result<(), SocksError> {
    let auth_req = match read_auth_request(stream).await {
        Ok(req) => req,
        Err(err) => {
            write_bytes(stream, &AuthReply::new(AuthStatus::Failure).to_bytes()).await?;
            end(options, client_addr, None);
            return Err(err);
        }
    };

    let authenticator = options
        .authenticate
        .as_ref()
        .expect("authenticate phase only reached when configured");

    match authenticator
        .authenticate(&auth_req.uname, &auth_req.passwd, client_addr)
        .await
    {
        Ok(()) => {
            write_bytes(stream, &AuthReply::new(AuthStatus::Success).to_bytes()).await?;
            options.events.emit(Event::Authenticate {
                client: client_addr,
                username: auth_req.uname,
            });
            Ok(())
        }
        Err(auth_err) => {
            write_bytes(stream, &AuthReply::new(AuthStatus::Failure).to_bytes()).await?;
            options.events.emit(Event::AuthenticateError {
                client: client_addr,
                username: auth_req.uname,
                error: auth_err.0.clone(),
            });
            end(options, client_addr, None);
            Err(SocksError::AuthRejected(auth_err))
        }
    }
}

/// Writes the reply for a pre-relay failure: a full `ConnectReply` echoing
/// `dst` as the bound address when one was successfully parsed, or a bare
/// 2-byte reply when the failure occurred before `ATYP`/`DST.ADDR` could be
/// parsed at all.
async fn fail_request(
    stream: &mut TcpStream,
    err: &SocksError,
    dst: Option<&AddrPort>,
) -> Result<(), SocksError> {
    let rep = err.as_reply_code();
    match dst {
        Some(dst) => write_bytes(stream, &ConnectReply::new(rep, dst.clone()).to_bytes()).await?,
        None => write_short(stream, rep).await?,
    }
    Ok(())
}

fn end(options: &Arc<ServerOptions>, client: SocketAddr, reply_code: Option<Rep>) {
    options.events.emit(Event::ProxyEnd { client, reply_code });
}

async fn write_bytes(stream: &mut TcpStream, bytes: &[u8]) -> Result<(), SocksError> {
    stream.write_all(bytes).await?;
    Ok(())
}

async fn write_short(stream: &mut TcpStream, rep: Rep) -> Result<(), SocksError> {
    stream.write_all(&ConnectReply::short(rep)).await?;
    Ok(())
}

async fn read_greeting(stream: &mut TcpStream) -> Result<Greeting, SocksError> {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).await?;
    let nmethods = header[1] as usize;
    let mut buf = vec![0u8; 2 + nmethods];
    buf[..2].copy_from_slice(&header);
    stream.read_exact(&mut buf[2..]).await?;
    Greeting::decode(&buf)
}

async fn read_auth_request(stream: &mut TcpStream) -> Result<AuthRequest, SocksError> {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).await?;
    let ulen = header[1] as usize;

    let mut uname = vec![0u8; ulen];
    stream.read_exact(&mut uname).await?;

    let mut plen_byte = [0u8; 1];
    stream.read_exact(&mut plen_byte).await?;
    let plen = plen_byte[0] as usize;

    let mut passwd = vec![0u8; plen];
    stream.read_exact(&mut passwd).await?;

    let mut buf = Vec::with_capacity(2 + ulen + 1 + plen);
    buf.extend_from_slice(&header);
    buf.extend_from_slice(&uname);
    buf.push(plen_byte[0]);
    buf.extend_from_slice(&passwd);
    AuthRequest::decode(&buf)
}

async fn read_connect_request(stream: &mut TcpStream) -> Result<ConnectRequest, SocksError> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;

    let cmd_byte = header[1];
    if !matches!(cmd_byte, 0x01..=0x03) {
        return Err(SocksError::UnsupportedCommand(cmd_byte));
    }

    let atyp = match Atyp::from_u8(header[3]) {
        Ok(atyp) => atyp,
        Err(err) => return Err(err),
    };

    let mut buf = header.to_vec();
    match atyp {
        Atyp::V4 => {
            let mut tail = [0u8; 6];
            stream.read_exact(&mut tail).await?;
            buf.extend_from_slice(&tail);
        }
        Atyp::V6 => {
            let mut tail = [0u8; 18];
            stream.read_exact(&mut tail).await?;
            buf.extend_from_slice(&tail);
        }
        Atyp::DomainName => {
            let mut len_byte = [0u8; 1];
            stream.read_exact(&mut len_byte).await?;
            let len = len_byte[0] as usize;
            let mut rest = vec![0u8; len + 2];
            stream.read_exact(&mut rest).await?;
            buf.push(len_byte[0]);
            buf.extend_from_slice(&rest);
        }
    }

    ConnectRequest::decode(&buf)
}
