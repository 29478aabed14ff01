//! Transport layer (spec §4.4–§4.7): everything that happens over the one
//! UDP socket once a room has been joined — hole-punching, demultiplexing,
//! reassembly, and outbound fragmentation — wired together the way the
//! teacher's `runtime/lan/mod.rs` wires up its `LanTasks`.

pub mod demux;
pub mod fragment;
pub mod peers;
pub mod protocol;
pub mod punch;
pub mod reassembly;

use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::data::Endpoint;
use crate::events::CoreEvent;

use fragment::{ClockSource, SystemClock};
use peers::{apply_roster, PeerTable, RosterDiff};
use reassembly::ReassemblyEngine;

/// Everything the room needs once the socket is bound and the local
/// [`Endpoint`] is known. Lives for as long as a room is joined; dropped and
/// rebuilt (via its `cancel` token) on the next `join_room` call, same
/// lifetime discipline as the teacher's `LanTasks`.
pub struct Transport {
    socket: Arc<UdpSocket>,
    local: Endpoint,
    config: Config,
    table: Arc<PeerTable>,
    reassembly: Arc<ReassemblyEngine>,
    clock: Box<dyn ClockSource>,
    events: mpsc::Sender<CoreEvent>,
    cancel: CancellationToken,
}

impl Transport {
    /// Spin up the receive loop and the reassembly sweep, and return a
    /// handle ready to accept rosters and outbound frames. Neither
    /// background task is joined here — they run until `cancel` fires.
    pub fn spawn(
        socket: Arc<UdpSocket>,
        local: Endpoint,
        config: Config,
        events: mpsc::Sender<CoreEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let table = PeerTable::new();
        let reassembly = ReassemblyEngine::new(&config);

        demux::spawn_receive_loop(
            socket.clone(),
            table.clone(),
            reassembly.clone(),
            events.clone(),
            cancel.clone(),
        );
        reassembly::spawn_eviction_sweep(reassembly.clone(), &config, events.clone(), cancel.clone());

        Self {
            socket,
            local,
            config,
            table,
            reassembly,
            clock: Box::new(SystemClock),
            events,
            cancel,
        }
    }

    /// Apply a freshly received roster: update the Peer Table and fire a
    /// hole-punch burst at every newly active peer (spec §4.3 → §4.4).
    pub fn apply_roster(&self, roster: crate::data::Roster) {
        let RosterDiff { new_peers } = apply_roster(&self.table, &self.local, roster, &self.events);
        for (peer, addr) in new_peers {
            punch::spawn_punch_burst(
                peer,
                addr,
                self.socket.clone(),
                &self.config,
                self.events.clone(),
                self.cancel.child_token(),
            );
        }
    }

    pub async fn send_message(&self, text: &str) {
        let peers = self.table.snapshot();
        for (peer, addr) in peers {
            if let Err(e) = self.socket.send_to(text.as_bytes(), addr).await {
                crate::events::emit_log(
                    &self.events,
                    log::Level::Debug,
                    format!("send of chat message to {peer} failed: {e}"),
                );
            }
        }
    }

    pub async fn send_frame(&self, frame: &[u8]) {
        fragment::send_frame(
            frame,
            self.clock.as_ref(),
            &self.table,
            &self.socket,
            &self.events,
        )
        .await;
    }

}
