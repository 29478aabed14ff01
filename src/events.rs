//! Event Bridge — the one-way channel of domain events a shell subscribes to.
//!
//! Grounded in the teacher's `RuntimeEvent`/`emit_log` pattern: every
//! long-running task holds a `Sender<CoreEvent>` clone and pushes events as
//! things happen, rather than the caller polling state. Delivery is
//! best-effort: the channel is bounded and a full channel means the event is
//! dropped rather than the transport task blocking (spec §4.8).

use log::Level;
use tokio::sync::mpsc;

use crate::data::Roster;

/// Capacity of the event channel handed back from [`crate::Core::events`].
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct CoreLogEvent {
    pub level: Level,
    pub message: String,
}

impl CoreLogEvent {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub sender: String,
    pub message: String,
}

/// The three UI-facing events from spec §4.8, plus the ambient `Log` event.
#[derive(Debug, Clone)]
pub enum CoreEvent {
    /// The authoritative roster as received from the signalling service,
    /// unmodified by the hairpin rewrite the transport layer applies.
    PeerListUpdated(Roster),
    /// A text datagram that was not the hole-punch sentinel.
    NewMessageReceived(ChatMessage),
    /// A fully reassembled, magic-number-validated frame.
    FrameReceived(Vec<u8>),
    /// A structured log line, mirrored through the `log` facade by the
    /// caller if it wants traditional logging as well as the event stream.
    Log(CoreLogEvent),
}

/// Send `event`, dropping it silently if the channel is full or the
/// receiver has gone away. Never awaits, so it can be called from any
/// transport task without risking a stall (spec §4.8).
pub(crate) fn emit(sender: &mpsc::Sender<CoreEvent>, event: CoreEvent) {
    let _ = sender.try_send(event);
}

/// Convenience: emit a [`CoreEvent::Log`] at `level` and mirror it through
/// the `log` facade, matching the teacher's `emit_log` helper in
/// `runtime/lan/peer.rs`.
pub(crate) fn emit_log(sender: &mpsc::Sender<CoreEvent>, level: Level, message: impl Into<String>) {
    let message = message.into();
    log::log!(level, "{message}");
    emit(sender, CoreEvent::Log(CoreLogEvent::new(level, message)));
}
