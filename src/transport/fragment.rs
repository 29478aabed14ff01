//! Frame Fragmenter (spec §4.6): split an outbound frame into
//! `CHUNK_DATA_SIZE`-sized pieces and send one datagram per chunk to every
//! peer currently in the table.

use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use log::Level;

use crate::events::{emit_log, CoreEvent};
use crate::transport::peers::PeerTable;
use crate::transport::protocol::{ChunkHeader, CHUNK_DATA_SIZE};

/// Source of the truncated-millisecond `frame_id` (spec §4.6). A trait
/// rather than a bare `SystemTime::now()` call so the round-trip and
/// boundary tests in `tests/fragment_reassembly.rs` can drive it
/// deterministically instead of racing the wall clock.
pub trait ClockSource: Send + Sync {
    fn now_millis_truncated(&self) -> u32;
}

/// Production clock: wall-clock milliseconds since the Unix epoch,
/// truncated to `u32` (wraps roughly every 49 days, which only matters for
/// frame-id uniqueness within a single in-flight reassembly window).
#[derive(Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now_millis_truncated(&self) -> u32 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u32
    }
}

/// Chunk `frame` and fan it out to every peer in `table`'s current snapshot.
/// The snapshot is taken and released before any socket write happens, so a
/// slow or failing send never holds the Peer Table lock (spec §4.6).
pub async fn send_frame(
    frame: &[u8],
    clock: &dyn ClockSource,
    table: &PeerTable,
    socket: &UdpSocket,
    events: &mpsc::Sender<CoreEvent>,
) {
    let peers = table.snapshot();
    if peers.is_empty() {
        return;
    }

    let chunks: Vec<&[u8]> = if frame.is_empty() {
        vec![&[][..]]
    } else {
        frame.chunks(CHUNK_DATA_SIZE).collect()
    };
    let total_chunks = match u16::try_from(chunks.len()) {
        Ok(n) => n,
        Err(_) => {
            emit_log(
                events,
                Level::Warn,
                format!("frame of {} bytes needs too many chunks, dropping", frame.len()),
            );
            return;
        }
    };
    let frame_id = clock.now_millis_truncated();

    for (chunk_id, chunk) in chunks.into_iter().enumerate() {
        let header = ChunkHeader {
            frame_id,
            chunk_id: chunk_id as u16,
            total_chunks,
        };
        let encoded_header = header.encode();
        let mut datagram = Vec::with_capacity(encoded_header.len() + chunk.len());
        datagram.extend_from_slice(&encoded_header);
        datagram.extend_from_slice(chunk);

        for (peer, addr) in &peers {
            if let Err(e) = socket.send_to(&datagram, addr).await {
                emit_log(
                    events,
                    Level::Debug,
                    format!("send of frame {frame_id} chunk {chunk_id} to {peer} failed: {e}"),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::channel;

    struct FixedClock(u32);
    impl ClockSource for FixedClock {
        fn now_millis_truncated(&self) -> u32 {
            self.0
        }
    }

    #[tokio::test]
    async fn fragments_respect_chunk_size_and_reach_every_peer() {
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let receiver_a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let receiver_b = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let table = PeerTable::new();
        table.insert_if_absent("a".to_string(), receiver_a.local_addr().unwrap());
        table.insert_if_absent("b".to_string(), receiver_b.local_addr().unwrap());

        let frame = vec![0x7Eu8; CHUNK_DATA_SIZE * 2 + 10];
        let clock = FixedClock(1);
        let (tx, _rx) = channel(8);

        send_frame(&frame, &clock, &table, &sender, &tx).await;

        for receiver in [&receiver_a, &receiver_b] {
            let mut seen = 0usize;
            let mut total = None;
            loop {
                let mut buf = vec![0u8; 1500];
                match tokio::time::timeout(std::time::Duration::from_millis(50), receiver.recv(&mut buf)).await {
                    Ok(Ok(n)) => {
                        let header = ChunkHeader::decode(&buf[..n]).unwrap();
                        assert_eq!(header.frame_id, 1);
                        total = Some(header.total_chunks);
                        seen += 1;
                    }
                    _ => break,
                }
            }
            assert_eq!(seen, 3);
            assert_eq!(total, Some(3));
        }
    }

    #[tokio::test]
    async fn empty_peer_table_sends_nothing() {
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let table = PeerTable::new();
        let clock = FixedClock(7);
        let (tx, _rx) = channel(8);
        send_frame(b"hello", &clock, &table, &sender, &tx).await;
    }
}
