//! Black-box tests against the crate's public surface: a fake signalling
//! service (a bare `tokio_tungstenite` WebSocket server, no real room logic)
//! stands in for the network this crate would otherwise need, the same way
//! the pack's richer integration suites (`CentauriAgent-burrow`) assert on
//! observable behavior through a public API rather than internals.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use vidroom_core::{Config, CoreError, CoreEvent, Endpoint};

fn unreachable_ip_config(signalling_host: String) -> Config {
    Config {
        signalling_host,
        public_ip_reflector: "http://127.0.0.1:1".to_string(),
        public_ip_timeout_secs: 1,
        ..Config::default()
    }
}

#[tokio::test]
async fn join_room_rejects_a_blank_room_name() {
    let config = unreachable_ip_config("127.0.0.1:1".to_string());
    let mut core = vidroom_core::Core::new(config).expect("bind should not fail");
    let _ = core.events();

    let result = core.join_room("").await;
    assert!(matches!(result, Err(CoreError::EmptyRoomName)));
}

#[tokio::test]
async fn joining_a_room_publishes_the_roster_the_signalling_service_sends() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let peer = Endpoint {
        public_ip: "198.51.100.7".to_string(),
        private_ip: "10.0.0.2".to_string(),
        port: 5000,
    };
    let roster_to_send = vec![peer.clone()];

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        // First frame in is the client's own handshake Endpoint; ignored by
        // this fake service, which only ever pushes one fixed roster.
        let _handshake = ws.next().await;

        let body = serde_json::to_string(&roster_to_send).unwrap();
        ws.send(Message::Text(body.into())).await.unwrap();

        // Keep the socket open briefly so the client's reader has time to
        // process the frame before the connection closes.
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    });

    let config = unreachable_ip_config(addr.to_string());
    let mut core = vidroom_core::Core::new(config).expect("bind should not fail");
    let mut events = core.events();

    let joined = core.join_room("lobby").await.expect("join should succeed");
    assert_eq!(joined, "lobby");

    let mut saw_roster = false;
    for _ in 0..10 {
        match tokio::time::timeout(std::time::Duration::from_millis(500), events.recv()).await {
            Ok(Some(CoreEvent::PeerListUpdated(roster))) => {
                assert_eq!(roster, roster_to_send);
                saw_roster = true;
                break;
            }
            Ok(Some(_)) => continue,
            _ => break,
        }
    }
    assert!(saw_roster, "expected a peer-list-updated event carrying the fake roster");

    server.await.unwrap();
}

#[tokio::test]
async fn messaging_before_any_room_is_joined_is_a_silent_no_op() {
    let config = unreachable_ip_config("127.0.0.1:1".to_string());
    let core = vidroom_core::Core::new(config).expect("bind should not fail");

    core.send_message("hello, nobody").await;
    core.send_frame_data(vec![0xFF, 0xD8, 0xFF, 0x00]).await;
}
