//! `vidroom-core`: the NAT-traversing UDP overlay behind a peer-to-peer
//! video room. A signalling WebSocket tells every participant who else is
//! in the room; a UDP socket, primed by short hole-punch bursts, carries
//! chat text and fragmented video frames directly between peers.
//!
//! This crate has no UI and no binary — it is the engine a shell (desktop,
//! CLI, web) drives through [`Core`] and listens to through the event
//! channel returned by [`Core::events`].

pub mod config;
pub mod data;
pub mod error;
pub mod events;
mod identity;
mod signalling;
mod transport;

use std::sync::{Arc, Mutex as StdMutex};

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use config::Config;
pub use data::{Endpoint, PeerKey, Roster};
pub use error::CoreError;
pub use events::CoreEvent;

use events::EVENT_CHANNEL_CAPACITY;
use transport::Transport;

/// The whole running overlay for one process: one bound UDP socket, one
/// local [`Endpoint`], and at most one active room at a time.
///
/// Joining a new room cancels the previous room's signalling session and
/// Transport tasks before starting the new ones, same child-token discipline
/// the teacher's `LanTasks` uses across reconnects.
pub struct Core {
    config: Config,
    socket: Arc<UdpSocket>,
    local: Endpoint,
    events_tx: mpsc::Sender<CoreEvent>,
    events_rx: StdMutex<Option<mpsc::Receiver<CoreEvent>>>,
    room_cancel: StdMutex<Option<CancellationToken>>,
    transport: StdMutex<Option<Arc<Transport>>>,
}

impl Core {
    /// Bind the UDP socket and discover this process's [`Endpoint`]. No
    /// room is joined yet, and no background task other than identity
    /// discovery runs until [`Core::join_room`] is called.
    ///
    /// Must be called from inside an entered Tokio runtime (e.g. from an
    /// `async fn` running on one, or after `Runtime::enter()`), since the
    /// UDP socket it binds needs a reactor to register with.
    pub fn new(config: Config) -> Result<Self, CoreError> {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (socket, local) = identity::discover(&config, &events_tx)?;

        Ok(Self {
            config,
            socket: Arc::new(socket),
            local,
            events_tx,
            events_rx: StdMutex::new(Some(events_rx)),
            room_cancel: StdMutex::new(None),
            transport: StdMutex::new(None),
        })
    }

    /// Take the event receiver. Can only be called once; a second call
    /// returns a channel that has already been closed on the sending side
    /// from the caller's perspective (the original `Receiver` was already
    /// handed out).
    pub fn events(&mut self) -> mpsc::Receiver<CoreEvent> {
        self.events_rx
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| {
                let (_tx, rx) = mpsc::channel(1);
                rx
            })
    }

    /// Join `room`: cancel any previous room's signalling and transport
    /// tasks, bring up a fresh [`Transport`], and connect the Signalling
    /// Client. Returns the room name once the handshake has been sent.
    pub async fn join_room(&self, room: impl Into<String>) -> Result<String, CoreError> {
        let room = room.into();
        if room.trim().is_empty() {
            return Err(CoreError::EmptyRoomName);
        }

        if let Some(previous) = self.room_cancel.lock().unwrap().take() {
            previous.cancel();
        }

        let cancel = CancellationToken::new();
        let transport = Arc::new(Transport::spawn(
            self.socket.clone(),
            self.local.clone(),
            self.config.clone(),
            self.events_tx.clone(),
            cancel.child_token(),
        ));

        let joined = match signalling::join(
            &self.config,
            room,
            self.local.clone(),
            transport.clone(),
            self.events_tx.clone(),
            cancel.child_token(),
        )
        .await
        {
            Ok(joined) => joined,
            Err(e) => {
                // The dial failed: the demux reader and eviction sweep we
                // just spawned for this room have no owner to cancel them
                // later, since `cancel` never gets stored. Cancel them here
                // so they don't outlive this call and end up racing a later
                // successful `join_room`'s `Transport` on the same socket.
                cancel.cancel();
                return Err(e);
            }
        };

        *self.room_cancel.lock().unwrap() = Some(cancel);
        *self.transport.lock().unwrap() = Some(transport);

        Ok(joined)
    }

    /// Broadcast a chat message to every peer currently in the room. A
    /// no-op (observably, by the absence of any outbound datagram) if no
    /// room has been joined yet or the room currently has no peers.
    pub async fn send_message(&self, text: impl Into<String>) {
        let transport = self.transport.lock().unwrap().clone();
        if let Some(transport) = transport {
            transport.send_message(&text.into()).await;
        }
    }

    /// Fragment and send one video frame to every peer currently in the
    /// room. A no-op under the same conditions as [`Core::send_message`].
    pub async fn send_frame_data(&self, bytes: Vec<u8>) {
        let transport = self.transport.lock().unwrap().clone();
        if let Some(transport) = transport {
            transport.send_frame(&bytes).await;
        }
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        if let Some(cancel) = self.room_cancel.lock().unwrap().take() {
            cancel.cancel();
        }
    }
}
