//! Signalling wire contract (spec §6): build the room URL and (de)serialise
//! the two JSON message shapes exchanged over the WebSocket.

use url::Url;

use crate::config::Config;
use crate::data::{Endpoint, Roster};
use crate::error::CoreError;

/// Build `ws://<host>/ws?room=<roomName>` the same way the teacher's CLI
/// builds its connection URL: parse a base, then append path and query
/// through the `url` crate rather than formatting strings by hand.
pub fn build_room_url(config: &Config, room: &str) -> Result<Url, CoreError> {
    let base = format!("ws://{}/ws", config.signalling_host);
    let mut url = Url::parse(&base).map_err(|e| CoreError::Dial(anyhow::anyhow!(e)))?;
    url.query_pairs_mut().append_pair("room", room);
    Ok(url)
}

/// The handshake message sent once, immediately after connecting: this
/// process's own [`Endpoint`], so the signalling service can add it to the
/// room's roster.
pub fn encode_handshake(local: &Endpoint) -> Result<String, CoreError> {
    serde_json::to_string(local).map_err(|e| CoreError::Dial(anyhow::Error::from(e)))
}

/// Decode one roster frame. The signalling service always sends the full
/// membership list, never a diff (spec §4.3).
pub fn decode_roster(text: &str) -> anyhow::Result<Roster> {
    let roster = serde_json::from_str(text)?;
    Ok(roster)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: &str) -> Config {
        Config {
            signalling_host: host.to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn room_url_carries_host_and_room_query() {
        let url = build_room_url(&config("signal.example.com:8443"), "lobby-1").unwrap();
        assert_eq!(url.scheme(), "ws");
        assert_eq!(url.host_str(), Some("signal.example.com"));
        assert_eq!(url.port(), Some(8443));
        assert_eq!(url.path(), "/ws");
        assert_eq!(
            url.query_pairs().find(|(k, _)| k == "room").map(|(_, v)| v.to_string()),
            Some("lobby-1".to_string())
        );
    }

    #[test]
    fn roster_decodes_as_a_json_array_of_endpoints() {
        let json = r#"[{"public_ip":"1.2.3.4","private_ip":"10.0.0.1","port":"4000"}]"#;
        let roster = decode_roster(json).unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].port, 4000);
    }
}
