//! Reassembly Engine (spec §4.7): buffer and reorder chunks into complete
//! frames, bounded so unreliable concurrent frame streams cannot leak
//! memory (spec §9 — required, absent from the observed source).
//!
//! Guarded by one dedicated `parking_lot::Mutex`, held across the per-chunk
//! update and completion check for a single bucket, same as the Peer Table
//! — two mutexes, never nested, acquisition order therefore trivially
//! deadlock-free (spec §5).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::Level;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::data::PeerKey;
use crate::events::{emit_log, CoreEvent};
use crate::transport::protocol::{has_image_magic, ChunkHeader};

type FrameKey = (PeerKey, u32);

enum BucketState {
    Partial {
        chunks: HashMap<u16, Vec<u8>>,
        total_chunks: u16,
        first_seen: Instant,
    },
}

struct Bucket {
    state: BucketState,
}

impl Bucket {
    fn new(total_chunks: u16) -> Self {
        Self {
            state: BucketState::Partial {
                chunks: HashMap::new(),
                total_chunks,
                first_seen: Instant::now(),
            },
        }
    }
}

pub struct ReassemblyEngine {
    buckets: Mutex<HashMap<FrameKey, Bucket>>,
    bucket_ttl: Duration,
    max_buckets_per_sender: usize,
}

/// Outcome of feeding one chunk in, so the caller can log/emit without the
/// engine itself needing an events handle for every internal decision.
enum Ingest {
    Buffered,
    Discarded(&'static str),
    Completed(Vec<u8>),
}

impl ReassemblyEngine {
    pub fn new(config: &Config) -> Arc<Self> {
        Arc::new(Self {
            buckets: Mutex::new(HashMap::new()),
            bucket_ttl: config.bucket_ttl(),
            max_buckets_per_sender: config.max_buckets_per_sender,
        })
    }

    /// Feed one chunk in. Emits `frame-received` on completion, exactly as
    /// spec §4.7 steps 1–4 describe; every other outcome (buffered,
    /// discarded) is silent to the UI and only logged (spec §7: "incomplete
    /// frame: evict by age, never block completion").
    pub fn ingest(
        &self,
        sender: &PeerKey,
        header: ChunkHeader,
        payload: &[u8],
        events: &mpsc::Sender<CoreEvent>,
    ) {
        let outcome = self.ingest_locked(sender, header, payload);
        match outcome {
            Ingest::Buffered => {}
            Ingest::Discarded(reason) => {
                emit_log(
                    events,
                    Level::Debug,
                    format!(
                        "dropped chunk for frame {} from {sender}: {reason}",
                        header.frame_id
                    ),
                );
            }
            Ingest::Completed(frame) => {
                if has_image_magic(&frame) {
                    crate::events::emit(events, CoreEvent::FrameReceived(frame));
                } else {
                    emit_log(
                        events,
                        Level::Warn,
                        format!(
                            "assembled frame {} from {sender} failed magic-number check, dropping",
                            header.frame_id
                        ),
                    );
                }
            }
        }
    }

    fn ingest_locked(&self, sender: &PeerKey, header: ChunkHeader, payload: &[u8]) -> Ingest {
        let key: FrameKey = (sender.clone(), header.frame_id);
        let mut buckets = self.buckets.lock();

        evict_stale_for_sender(&mut buckets, sender, self.bucket_ttl);
        cap_buckets_for_sender(&mut buckets, sender, key.1, self.max_buckets_per_sender);

        let bucket = buckets.entry(key.clone()).or_insert_with(|| Bucket::new(header.total_chunks));

        let BucketState::Partial {
            chunks,
            total_chunks,
            ..
        } = &mut bucket.state;

        if *total_chunks != header.total_chunks {
            return Ingest::Discarded("totalChunks disagrees with bucket");
        }

        chunks.insert(header.chunk_id, payload.to_vec());

        if chunks.len() != *total_chunks as usize {
            return Ingest::Buffered;
        }

        // Bucket is complete — concatenate in ascending chunkID order.
        let mut assembled = Vec::new();
        for i in 0..*total_chunks {
            match chunks.get(&i) {
                Some(bytes) => assembled.extend_from_slice(bytes),
                None => {
                    // Count matched but an index is missing: corrupted
                    // totalChunks. Defensive per spec §4.7.4a.
                    buckets.remove(&key);
                    return Ingest::Discarded("chunk count matched but an index was missing");
                }
            }
        }
        buckets.remove(&key);
        Ingest::Completed(assembled)
    }

    #[cfg(test)]
    fn bucket_count(&self) -> usize {
        self.buckets.lock().len()
    }
}

fn evict_stale_for_sender(
    buckets: &mut HashMap<FrameKey, Bucket>,
    sender: &PeerKey,
    ttl: Duration,
) {
    buckets.retain(|(key_sender, _), bucket| {
        if key_sender != sender {
            return true;
        }
        let BucketState::Partial { first_seen, .. } = &bucket.state;
        first_seen.elapsed() < ttl
    });
}

/// Enforce the per-sender live-bucket cap by evicting the oldest bucket for
/// `sender` before a brand-new frame ID would push it over the limit.
fn cap_buckets_for_sender(
    buckets: &mut HashMap<FrameKey, Bucket>,
    sender: &PeerKey,
    incoming_frame_id: u32,
    max_per_sender: usize,
) {
    let is_new_frame = !buckets.contains_key(&(sender.clone(), incoming_frame_id));
    if !is_new_frame {
        return;
    }
    let sender_keys: Vec<FrameKey> = buckets
        .keys()
        .filter(|(s, _)| s == sender)
        .cloned()
        .collect();
    if sender_keys.len() < max_per_sender {
        return;
    }
    if let Some(oldest) = sender_keys.into_iter().min_by_key(|key| {
        let BucketState::Partial { first_seen, .. } = &buckets[key].state;
        *first_seen
    }) {
        buckets.remove(&oldest);
    }
}

/// Periodic sweep (spec §4.7, §9): reclaims buckets belonging to senders
/// that stopped sending entirely, not just a sender that dropped one chunk
/// of an otherwise-active stream (the inline sweep in `ingest` only runs for
/// the sender of the *current* chunk).
pub fn spawn_eviction_sweep(
    engine: Arc<ReassemblyEngine>,
    config: &Config,
    events: mpsc::Sender<CoreEvent>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let period = config.eviction_interval();
    let ttl = engine.bucket_ttl;
    tokio::spawn(async move {
        let mut tick = interval(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {
                    let removed = {
                        let mut buckets = engine.buckets.lock();
                        let before = buckets.len();
                        buckets.retain(|_, bucket| {
                            let BucketState::Partial { first_seen, .. } = &bucket.state;
                            first_seen.elapsed() < ttl
                        });
                        before - buckets.len()
                    };
                    if removed > 0 {
                        emit_log(
                            &events,
                            Level::Debug,
                            format!("reassembly sweep evicted {removed} stale bucket(s)"),
                        );
                    }
                }
            }
        }
    })
}
