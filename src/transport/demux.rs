//! UDP Demultiplexer (spec §4.5): classify every inbound datagram as a
//! hole-punch sentinel, a chat text message, or a media chunk, and drive the
//! Peer Table's packet-driven insertion.

use std::net::SocketAddr;
use std::sync::Arc;

use log::Level;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::events::{emit_log, ChatMessage, CoreEvent};
use crate::transport::peers::PeerTable;
use crate::transport::protocol::{ChunkHeader, CHUNK_HEADER_SIZE, PUNCH_SENTINEL};
use crate::transport::reassembly::ReassemblyEngine;

const RECV_BUFFER_SIZE: usize = 2048;

/// Classify one already-received datagram and route it. Free function, not
/// a method, so the read loop and the per-datagram tests can both drive it
/// without a live socket.
fn handle_datagram(
    data: &[u8],
    from: SocketAddr,
    table: &PeerTable,
    reassembly: &ReassemblyEngine,
    events: &mpsc::Sender<CoreEvent>,
) {
    let peer_key = from.to_string();
    let is_new = table.insert_if_absent(peer_key.clone(), from);
    if is_new {
        emit_log(events, Level::Debug, format!("first datagram seen from {peer_key}"));
    }

    if data.len() < CHUNK_HEADER_SIZE {
        forward_as_text(&peer_key, data, events);
        return;
    }

    match ChunkHeader::decode(data) {
        Some(header) if header.looks_like_media() => {
            let payload = &data[CHUNK_HEADER_SIZE..];
            reassembly.ingest(&peer_key, header, payload, events);
        }
        _ => forward_as_text(&peer_key, data, events),
    }
}

fn forward_as_text(peer_key: &str, data: &[u8], events: &mpsc::Sender<CoreEvent>) {
    if data == PUNCH_SENTINEL {
        return;
    }
    let Ok(text) = std::str::from_utf8(data) else {
        emit_log(
            events,
            Level::Debug,
            format!("dropped non-UTF8, non-media datagram from {peer_key}"),
        );
        return;
    };
    crate::events::emit(
        events,
        CoreEvent::NewMessageReceived(ChatMessage {
            sender: peer_key.to_string(),
            message: text.to_string(),
        }),
    );
}

/// Drive the UDP read loop for the lifetime of `cancel`. Grounded in the
/// teacher's `discovery::run_beacon_listener` receive-loop shape
/// (`runtime/lan/discovery.rs`), generalised from a single beacon type to
/// the three-way classification spec §4.5 requires.
pub fn spawn_receive_loop(
    socket: Arc<UdpSocket>,
    table: Arc<PeerTable>,
    reassembly: Arc<ReassemblyEngine>,
    events: mpsc::Sender<CoreEvent>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = socket.recv_from(&mut buf) => {
                    match result {
                        Ok((n, from)) => {
                            handle_datagram(&buf[..n], from, &table, &reassembly, &events);
                        }
                        Err(e) => {
                            emit_log(&events, Level::Warn, format!("UDP recv error: {e}"));
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tokio::sync::mpsc::channel;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn short_datagram_is_treated_as_text() {
        let table = PeerTable::new();
        let reassembly = ReassemblyEngine::new(&Config::default());
        let (tx, mut rx) = channel(8);

        handle_datagram(b"hi", addr("127.0.0.1:9000"), &table, &reassembly, &tx);

        let event = rx.try_recv().expect("chat message expected");
        match event {
            CoreEvent::NewMessageReceived(msg) => assert_eq!(msg.message, "hi"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(table.contains("127.0.0.1:9000"));
    }

    #[tokio::test]
    async fn punch_sentinel_is_dropped_silently() {
        let table = PeerTable::new();
        let reassembly = ReassemblyEngine::new(&Config::default());
        let (tx, mut rx) = channel(8);

        handle_datagram(PUNCH_SENTINEL, addr("127.0.0.1:9001"), &table, &reassembly, &tx);

        assert!(rx.try_recv().is_err());
        assert!(table.contains("127.0.0.1:9001"));
    }

    #[tokio::test]
    async fn media_looking_header_with_no_body_routes_to_reassembly() {
        let table = PeerTable::new();
        let reassembly = ReassemblyEngine::new(&Config::default());
        let (tx, mut rx) = channel(8);

        let header = ChunkHeader {
            frame_id: 1,
            chunk_id: 0,
            total_chunks: 1,
        };
        let mut datagram = header.encode().to_vec();
        datagram.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0x00]);

        handle_datagram(&datagram, addr("127.0.0.1:9002"), &table, &reassembly, &tx);

        let event = rx.try_recv().expect("frame-received expected");
        assert!(matches!(event, CoreEvent::FrameReceived(_)));
    }

    #[tokio::test]
    async fn header_with_excessive_total_chunks_falls_back_to_text() {
        let table = PeerTable::new();
        let reassembly = ReassemblyEngine::new(&Config::default());
        let (tx, mut rx) = channel(8);

        let header = ChunkHeader {
            frame_id: 1,
            chunk_id: 0,
            total_chunks: 50_000,
        };
        let datagram = header.encode();

        handle_datagram(&datagram, addr("127.0.0.1:9003"), &table, &reassembly, &tx);

        // Non-UTF8 bytes from the encoded header: dropped, not surfaced.
        assert!(rx.try_recv().is_err());
    }
}
