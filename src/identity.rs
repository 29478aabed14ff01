//! Local Identity (spec §4.1): bind the UDP socket, discover the private and
//! public IP, and freeze the result as this process's [`Endpoint`] for its
//! whole lifetime.
//!
//! Deliberately synchronous: [`crate::Core::new`] is a sync constructor
//! (mirrors the teacher's `AppState::default()`), so identity discovery runs
//! to completion with blocking calls rather than requiring `Core::new` to be
//! `async` itself. It still needs to run inside an entered Tokio runtime,
//! because binding produces a `tokio::net::UdpSocket` registered with that
//! runtime's reactor.

use std::net::SocketAddr;

use log::Level;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::data::Endpoint;
use crate::error::CoreError;
use crate::events::{emit_log, CoreEvent};

/// Bind the UDP socket the whole core will use (fatal on failure, per the
/// error table in spec §7), then discover the private and public IP best
/// effort (recoverable, per the same table).
pub fn discover(
    config: &Config,
    events: &mpsc::Sender<CoreEvent>,
) -> Result<(UdpSocket, Endpoint), CoreError> {
    let std_socket = std::net::UdpSocket::bind("0.0.0.0:0").map_err(CoreError::Bind)?;
    std_socket.set_nonblocking(true).map_err(CoreError::Bind)?;
    let socket = UdpSocket::from_std(std_socket).map_err(CoreError::Bind)?;
    let port = socket.local_addr().map_err(CoreError::Bind)?.port();

    let private_ip = discover_private_ip().unwrap_or_else(|e| {
        emit_log(
            events,
            Level::Warn,
            format!("private IP discovery failed, continuing without it: {e}"),
        );
        String::new()
    });

    let public_ip = discover_public_ip(config).unwrap_or_else(|e| {
        emit_log(
            events,
            Level::Warn,
            format!("public IP discovery failed, continuing without it: {e}"),
        );
        String::new()
    });

    emit_log(
        events,
        Level::Info,
        format!("local identity: public={public_ip} private={private_ip} port={port}"),
    );

    Ok((
        socket,
        Endpoint {
            public_ip,
            private_ip,
            port,
        },
    ))
}

/// Open a throwaway UDP "connection" to a public address and read back the
/// local-side address the OS chose for the route — no packet is ever
/// actually sent, `connect` just picks an interface/source address.
fn discover_private_ip() -> anyhow::Result<String> {
    let probe = std::net::UdpSocket::bind("0.0.0.0:0")?;
    probe.connect("8.8.8.8:80")?;
    let addr: SocketAddr = probe.local_addr()?;
    Ok(addr.ip().to_string())
}

/// HTTPS GET against a plain-text public-IP reflector, with a hard timeout
/// so a slow or unreachable reflector can never stall startup (spec §5).
/// Uses `reqwest`'s blocking client, which runs its own dedicated-thread
/// runtime internally and so never conflicts with an already-running Tokio
/// runtime on the calling thread.
fn discover_public_ip(config: &Config) -> anyhow::Result<String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(config.public_ip_timeout())
        .build()?;
    let body = client
        .get(&config.public_ip_reflector)
        .send()?
        .error_for_status()?
        .text()?;
    Ok(body.trim().to_string())
}

/// Allow tests to exercise the bind-and-identity plumbing without reaching
/// the network, by constructing an `Endpoint` directly.
#[cfg(test)]
pub(crate) fn local_only(port: u16) -> Endpoint {
    Endpoint {
        public_ip: String::new(),
        private_ip: "127.0.0.1".to_string(),
        port,
    }
}
