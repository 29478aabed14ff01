//! Signalling Client (spec §4.2): the WebSocket session that tells the room
//! who we are and hands back the room's roster every time it changes.
//!
//! Structurally the same shape as the teacher's `CLI/src/main.rs` — connect,
//! split into write/read halves, send a handshake, read a stream of frames —
//! but without its reconnect-forever loop: a dropped connection here
//! publishes an empty roster and the reader simply ends. `join_room` is the
//! only thing that re-establishes a session.

pub mod protocol;

use futures_util::{SinkExt, StreamExt};
use log::Level;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::data::Endpoint;
use crate::error::CoreError;
use crate::events::{emit_log, CoreEvent};
use crate::transport::Transport;

use protocol::{build_room_url, decode_roster, encode_handshake};

/// Connect to the signalling service for `room`, send the handshake, and
/// spawn the background reader that feeds every roster it receives to
/// `transport`. Returns `room` once the handshake has been written, so the
/// caller (`Core::join_room`) has something to hand back to the UI.
pub async fn join(
    config: &Config,
    room: String,
    local: Endpoint,
    transport: std::sync::Arc<Transport>,
    events: mpsc::Sender<CoreEvent>,
    cancel: CancellationToken,
) -> Result<String, CoreError> {
    if room.trim().is_empty() {
        return Err(CoreError::EmptyRoomName);
    }

    let url = build_room_url(config, &room)?;
    let (stream, _response) = connect_async(url.as_str())
        .await
        .map_err(|e| CoreError::Dial(anyhow::Error::from(e)))?;

    let (mut write, mut read) = stream.split();

    let handshake = encode_handshake(&local)?;
    write
        .send(Message::Text(handshake.into()))
        .await
        .map_err(|e| CoreError::Dial(anyhow::Error::from(e)))?;

    let joined_room = room.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            match decode_roster(&text) {
                                Ok(roster) => transport.apply_roster(roster),
                                Err(e) => emit_log(
                                    &events,
                                    Level::Warn,
                                    format!("malformed roster frame for room {joined_room}: {e}"),
                                ),
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            emit_log(
                                &events,
                                Level::Warn,
                                format!("signalling connection for room {joined_room} dropped: {e}"),
                            );
                            break;
                        }
                    }
                }
            }
        }
        // Connection gone: the room has no authoritative membership list
        // any more, so publish that as an empty roster (spec §4.2).
        transport.apply_roster(Vec::new());
    });

    Ok(room)
}
