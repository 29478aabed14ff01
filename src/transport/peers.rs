//! Peer Table and roster diffing (spec §3, §4.3).
//!
//! The authoritative live set of reachable peers, guarded by a single
//! `parking_lot::Mutex` exactly as the teacher guards `DiscoveredPeers` in
//! `runtime/lan/discovery.rs`. Two independent writers populate it — the
//! signalling client (roster-driven) and the UDP demultiplexer
//! (packet-driven) — with the invariant from spec §9: roster removals
//! always win, and packet arrival only inserts when the key is absent.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use log::Level;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::data::{peer_key_for, Endpoint, PeerKey, Roster};
use crate::events::{emit_log, CoreEvent};

#[derive(Debug, Clone)]
pub struct PeerEntry {
    pub addr: SocketAddr,
    /// Set once any datagram has actually arrived from this peer (spec §9
    /// open question: surface hole-punch success to the UI). Read-only —
    /// it never changes which peers are sent to.
    pub reachable: bool,
}

#[derive(Default)]
pub struct PeerTable {
    inner: Mutex<HashMap<PeerKey, PeerEntry>>,
}

/// Newly-active peers discovered by a roster diff, returned so the caller
/// can schedule a hole-punch burst for each (spec §4.3).
pub struct RosterDiff {
    pub new_peers: Vec<(PeerKey, SocketAddr)>,
}

impl PeerTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of every live `(PeerKey, SocketAddr)` pair, taken under the
    /// lock and released before the caller does anything with it — the
    /// strategy spec §4.6 requires so a socket write never happens while
    /// the table is locked.
    pub fn snapshot(&self) -> Vec<(PeerKey, SocketAddr)> {
        self.inner
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().contains_key(key)
    }

    /// Insert `key` only if it is absent (packet-driven, first-seen
    /// insertion from spec §4.5). Marks an already-present entry reachable.
    /// Returns `true` if this call inserted a brand-new entry.
    pub fn insert_if_absent(&self, key: PeerKey, addr: SocketAddr) -> bool {
        let mut table = self.inner.lock();
        match table.get_mut(&key) {
            Some(entry) => {
                entry.reachable = true;
                false
            }
            None => {
                table.insert(
                    key,
                    PeerEntry {
                        addr,
                        reachable: true,
                    },
                );
                true
            }
        }
    }

    /// Optimistic roster-driven insertion (spec §4.3: "the Hole-Puncher may
    /// also insert"). Does not mark the entry reachable — that only happens
    /// once a real datagram arrives.
    fn insert_from_roster_if_absent(&self, key: PeerKey, addr: SocketAddr) -> bool {
        let mut table = self.inner.lock();
        if table.contains_key(&key) {
            return false;
        }
        table.insert(
            key,
            PeerEntry {
                addr,
                reachable: false,
            },
        );
        true
    }

    /// Diff an incoming roster against the current table (spec §4.3):
    /// resolve every entry's `PeerKey` by the hairpin rule, insert newly
    /// active peers, and remove any stored peer the roster no longer
    /// mentions. Roster removals always win over packet-driven inserts
    /// (spec §9) because this function holds the lock for the whole diff.
    pub fn diff_roster(&self, local: &Endpoint, roster: &Roster) -> RosterDiff {
        let mut active: HashMap<PeerKey, SocketAddr> = HashMap::new();
        for remote in roster {
            if remote == local {
                continue;
            }
            let key = peer_key_for(local, remote);
            if let Ok(addr) = key.parse::<SocketAddr>() {
                active.insert(key, addr);
            }
        }

        let mut new_peers = Vec::new();
        {
            let mut table = self.inner.lock();
            table.retain(|key, _| active.contains_key(key));
        }
        for (key, addr) in &active {
            if self.insert_from_roster_if_absent(key.clone(), *addr) {
                new_peers.push((key.clone(), *addr));
            }
        }

        RosterDiff { new_peers }
    }
}

/// Run a roster diff and forward both halves of spec §4.3's contract: the
/// diff feeds hole-punch scheduling, and the untouched roster (not the
/// hairpin-rewritten keys) goes to the Event Bridge as `peer-list-updated`.
pub fn apply_roster(
    table: &PeerTable,
    local: &Endpoint,
    roster: Roster,
    events: &mpsc::Sender<CoreEvent>,
) -> RosterDiff {
    let diff = table.diff_roster(local, &roster);
    emit_log(
        events,
        Level::Debug,
        format!(
            "roster applied: {} members, {} newly active",
            roster.len(),
            diff.new_peers.len()
        ),
    );
    crate::events::emit(events, CoreEvent::PeerListUpdated(roster));
    diff
}
