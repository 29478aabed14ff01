//! Hole-Puncher (spec §4.4): fire a short burst of priming datagrams at a
//! newly-discovered peer so the intermediate NATs open a mapping before real
//! traffic needs it.
//!
//! Shaped like the teacher's `discovery::run_beacon_broadcaster` interval
//! loop in `runtime/lan/discovery.rs`, but bounded (a fixed burst rather than
//! "forever") and per-peer rather than one shared broadcast task.

use std::net::SocketAddr;
use std::sync::Arc;

use log::Level;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::data::PeerKey;
use crate::events::{emit_log, CoreEvent};
use crate::transport::protocol::PUNCH_SENTINEL;

/// Send `config.punch_attempts` priming datagrams to `addr`, spaced by
/// `config.punch_interval()`, stopping early if `cancel` fires. A send
/// failure is logged and does not abort the burst (same non-fatal policy as
/// the chunk send path, spec §4.6/§7) — the next attempt still goes out.
pub fn spawn_punch_burst(
    peer: PeerKey,
    addr: SocketAddr,
    socket: Arc<UdpSocket>,
    config: &Config,
    events: mpsc::Sender<CoreEvent>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let attempts = config.punch_attempts;
    let interval = config.punch_interval();
    tokio::spawn(async move {
        for attempt in 0..attempts {
            if cancel.is_cancelled() {
                break;
            }
            if let Err(e) = socket.send_to(PUNCH_SENTINEL, addr).await {
                emit_log(
                    &events,
                    Level::Debug,
                    format!("punch attempt {attempt} to {peer} failed: {e}"),
                );
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(interval) => {}
            }
        }
    })
}
