//! A minimal SOCKS5 proxy requiring username/password authentication
//! (admin/admin), default direct outbound connector, events logged at
//! `info`.

use socks5_relay::error::SocksError;
use socks5_relay::event::{Event, EventSink};
use socks5_relay::{Server, ServerOptions};

struct LoggingSink;

impl EventSink for LoggingSink {
    fn emit(&self, event: Event) {
        tracing::info!(?event, "proxy event");
    }
}

#[tokio::main]
async fn main() -> Result<(), SocksError> {
    tracing_subscriber::fmt::init();

    let options = ServerOptions::new()
        .authenticate(socks5_relay::auth::ClosureAuthenticator(
            |u: &str, p: &str| u == "admin" && p == "admin",
        ))
        .events(LoggingSink);

    let server = Server::bind("127.0.0.1:1080", options).await?;
    println!("SOCKS5 proxy listening on {}", server.local_addr());

    std::future::pending::<()>().await;
    Ok(())
}
