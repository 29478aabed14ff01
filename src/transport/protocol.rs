//! Wire-level constants and the binary [`ChunkHeader`] (spec §3, §6).
//!
//! Unlike the signalling wire contract, media/chat datagrams are not JSON —
//! they are either raw UTF-8 text or an 8-byte big-endian header followed by
//! a chunk payload. Encode/decode is explicit byte slicing, matching the
//! fixed-width binary framing the spec mandates (contrast with the
//! length-prefixed-JSON framing the teacher's `PeerMessage` uses for its TCP
//! channel — two different wire shapes for two different needs).

/// Target MTU for a single media datagram, header included (spec §4.6).
pub const MAX_UDP_PAYLOAD: usize = 1400;

/// Fixed header size: `frameID:u32 | chunkID:u16 | totalChunks:u16`.
pub const CHUNK_HEADER_SIZE: usize = 8;

/// Largest payload a single chunk may carry.
pub const CHUNK_DATA_SIZE: usize = MAX_UDP_PAYLOAD - CHUNK_HEADER_SIZE;

/// `totalChunks` beyond this is heuristically not media (spec §4.5, §9).
pub const MAX_TOTAL_CHUNKS: u16 = 1000;

/// Sentinel payload for hole-punch priming datagrams (spec §4.4).
pub const PUNCH_SENTINEL: &[u8] = b"punch!";

/// PNG magic number (spec §4.7b, §6).
pub const PNG_MAGIC: [u8; 4] = [0x89, 0x50, 0x4E, 0x47];

/// JPEG magic number (spec §4.7b, §6).
pub const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// The 8-byte prefix on every media datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub frame_id: u32,
    pub chunk_id: u16,
    pub total_chunks: u16,
}

impl ChunkHeader {
    pub fn encode(&self) -> [u8; CHUNK_HEADER_SIZE] {
        let mut buf = [0u8; CHUNK_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.frame_id.to_be_bytes());
        buf[4..6].copy_from_slice(&self.chunk_id.to_be_bytes());
        buf[6..8].copy_from_slice(&self.total_chunks.to_be_bytes());
        buf
    }

    /// Parse the header out of a datagram prefix. Returns `None` if `data`
    /// is too short to hold one — the caller reclassifies as text in that
    /// case (spec §4.5 step 2).
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < CHUNK_HEADER_SIZE {
            return None;
        }
        Some(Self {
            frame_id: u32::from_be_bytes(data[0..4].try_into().ok()?),
            chunk_id: u16::from_be_bytes(data[4..6].try_into().ok()?),
            total_chunks: u16::from_be_bytes(data[6..8].try_into().ok()?),
        })
    }

    /// The `totalChunks == 0 || totalChunks > 1000` disambiguation heuristic
    /// from spec §4.5: a header that fails this is not treated as media at
    /// all, regardless of whether it parsed.
    pub fn looks_like_media(&self) -> bool {
        self.total_chunks != 0 && self.total_chunks <= MAX_TOTAL_CHUNKS
    }
}

/// Validate the magic number of a fully reassembled frame (spec §4.7b, §6).
pub fn has_image_magic(buf: &[u8]) -> bool {
    buf.starts_with(&PNG_MAGIC) || buf.starts_with(&JPEG_MAGIC)
}
