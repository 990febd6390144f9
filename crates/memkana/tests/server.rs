//! Integration tests for the memkana server, handler, and full game flow.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use memkana::prelude::*;
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Failing store
// =========================================================================

/// A store whose database is always down.
struct DownStore;

impl ScoreStore for DownStore {
    async fn insert_result(&self, _: Duration) -> Result<PlayerName, StoreError> {
        Err(StoreError::Unavailable("database is down".into()))
    }

    async fn list_top(&self, _: usize) -> Result<Vec<PlayerTime>, StoreError> {
        Err(StoreError::Unavailable("database is down".into()))
    }

    async fn rank_of(&self, _: &str) -> Result<PlayerRank, StoreError> {
        Err(StoreError::Unavailable("database is down".into()))
    }
}

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port and returns its address and registry.
async fn start_server<S: ScoreStore>(
    store: S,
    idle_timeout: Option<Duration>,
) -> (String, Arc<SessionRegistry>) {
    let builder = MemkanaServerBuilder::new().idle_timeout(idle_timeout);
    spawn_server(builder, store).await
}

async fn spawn_server<S: ScoreStore>(
    builder: MemkanaServerBuilder,
    store: S,
) -> (String, Arc<SessionRegistry>) {
    let server = builder
        .bind("127.0.0.1:0")
        .build(store)
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let registry = server.registry();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    (addr, registry)
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

fn pair(kana: &str, romaji: &str, timestamp: i64) -> Value {
    json!({
        "type": "pair",
        "data": {"kana": kana, "romaji": romaji, "timestamp": timestamp},
    })
}

async fn send(ws: &mut ClientWs, value: Value) {
    ws.send(Message::text(value.to_string()))
        .await
        .expect("send");
}

/// Reads the next text frame as JSON, failing after two seconds.
async fn recv_json(ws: &mut ClientWs) -> Value {
    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("reply should arrive")
        .expect("stream should be open")
        .expect("frame should be valid");
    serde_json::from_str(msg.to_text().expect("text frame")).expect("json")
}

/// Plays a full game and returns the redirect the server sent.
async fn play(ws: &mut ClientWs, start: i64, end: i64) -> String {
    send(ws, json!({"type": "start", "data": {"timestamp": start}})).await;
    send(ws, pair("か", "ka", start + 1)).await;
    send(ws, json!({"type": "end", "data": {"timestamp": end}})).await;

    let reply = recv_json(ws).await;
    assert_eq!(reply["type"], "gameover", "unexpected reply {reply}");
    reply["data"]["redirect"]
        .as_str()
        .expect("redirect should be a string")
        .to_string()
}

fn player_from_redirect(redirect: &str) -> &str {
    redirect
        .strip_prefix("/scoreboard?p=")
        .expect("redirect should point at the scoreboard")
}

/// Asserts the client sees the connection end within two seconds.
async fn expect_closed(ws: &mut ClientWs) {
    let result = tokio::time::timeout(Duration::from_secs(2), ws.next()).await;
    match result {
        Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {}
        Ok(Some(Err(_))) => {}
        other => panic!("expected close, got {other:?}"),
    }
}

async fn wait_for_sessions(registry: &SessionRegistry, expected: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while registry.len().await != expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("registry should settle at {expected} sessions"));
}

/// Waits until the only open session holds `expected` pairs and returns
/// them.
async fn wait_for_pairs(
    registry: &SessionRegistry,
    expected: usize,
) -> Vec<Pair> {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let ids = registry.connection_ids().await;
            assert!(ids.len() <= 1, "expected a single session, got {ids:?}");
            if let Some(&id) = ids.first() {
                if let Some(session) = registry.get(id).await {
                    if session.pairs().len() >= expected {
                        return session.pairs().to_vec();
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("session should reach {expected} pairs"))
}

/// Collects formatted log output for the current thread.
#[derive(Clone, Default)]
struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_full_game_records_duration_and_redirects() {
    let store = MemoryStore::new();
    let (addr, _) = start_server(store.clone(), None).await;
    let mut ws = connect(&addr).await;

    send(&mut ws, json!({"type": "start", "data": {"timestamp": 1000}})).await;
    let cards = [("あ", "a"), ("い", "i"), ("う", "u")];
    for (i, (kana, romaji)) in cards.into_iter().enumerate() {
        send(&mut ws, pair(kana, romaji, 1500 + i as i64 * 500)).await;
    }
    send(&mut ws, json!({"type": "end", "data": {"timestamp": 4000}})).await;

    let reply = recv_json(&mut ws).await;
    assert_eq!(reply["type"], "gameover");
    let redirect = reply["data"]["redirect"].as_str().unwrap();
    let player = player_from_redirect(redirect);
    assert!(player.starts_with("guest-"));
    assert_eq!(player.len(), "guest-".len() + 8);
    assert!(player["guest-".len()..].chars().all(|c| c.is_ascii_alphanumeric()));

    let rows = store.rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].player.as_str(), player);
    assert_eq!(rows[0].duration, Duration::from_millis(3000));

    let expected = json!({
        "type": "gameover",
        "data": {"redirect": format!("/scoreboard?p={player}")},
    });
    assert_eq!(reply, expected);

    expect_closed(&mut ws).await;
}

#[tokio::test]
async fn test_unknown_type_is_ignored_and_connection_stays_open() {
    let store = MemoryStore::new();
    let (addr, registry) = start_server(store.clone(), None).await;
    let mut ws = connect(&addr).await;

    send(&mut ws, json!({"type": "ping"})).await;
    send(&mut ws, json!({"type": "hint", "data": {"card": 3}})).await;

    let silence = tokio::time::timeout(Duration::from_millis(200), ws.next()).await;
    assert!(silence.is_err(), "no reply expected, got {silence:?}");
    assert_eq!(registry.len().await, 1);
    assert!(store.is_empty().await);

    let redirect = play(&mut ws, 0, 2000).await;
    assert!(redirect.starts_with("/scoreboard?p=guest-"));
}

#[tokio::test]
async fn test_malformed_messages_are_dropped() {
    let store = MemoryStore::new();
    let (addr, _) = start_server(store.clone(), None).await;
    let mut ws = connect(&addr).await;

    ws.send(Message::text("this is not json".to_string())).await.unwrap();
    send(&mut ws, json!({"data": {"timestamp": 1}})).await;
    let late_start = json!({"type": "start", "data": {"timestamp": "soon"}});
    send(&mut ws, late_start).await;
    send(&mut ws, json!({"type": "end", "data": null})).await;

    play(&mut ws, 10_000, 15_000).await;

    let rows = store.rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].duration, Duration::from_millis(5000));
}

#[tokio::test]
async fn test_binary_frames_are_accepted() {
    let store = MemoryStore::new();
    let (addr, _) = start_server(store.clone(), None).await;
    let mut ws = connect(&addr).await;

    let start = json!({"type": "start", "data": {"timestamp": 100}});
    let start = start.to_string();
    ws.send(Message::binary(start.into_bytes())).await.unwrap();
    send(&mut ws, json!({"type": "end", "data": {"timestamp": 350}})).await;

    assert_eq!(recv_json(&mut ws).await["type"], "gameover");
    assert_eq!(store.rows().await[0].duration, Duration::from_millis(250));
}

#[tokio::test]
async fn test_end_before_start_records_zero() {
    let store = MemoryStore::new();
    let (addr, _) = start_server(store.clone(), None).await;
    let mut ws = connect(&addr).await;

    play(&mut ws, 9000, 4000).await;

    assert_eq!(store.rows().await[0].duration, Duration::ZERO);
}

#[tokio::test]
async fn test_end_without_start_records_zero() {
    let store = MemoryStore::new();
    let (addr, _) = start_server(store.clone(), None).await;
    let mut ws = connect(&addr).await;

    send(&mut ws, json!({"type": "end", "data": {"timestamp": 4000}})).await;

    assert_eq!(recv_json(&mut ws).await["type"], "gameover");
    assert_eq!(store.rows().await[0].duration, Duration::ZERO);
}

#[tokio::test]
async fn test_second_start_overwrites_first() {
    let store = MemoryStore::new();
    let (addr, _) = start_server(store.clone(), None).await;
    let mut ws = connect(&addr).await;

    send(&mut ws, json!({"type": "start", "data": {"timestamp": 1000}})).await;
    play(&mut ws, 2000, 2600).await;

    assert_eq!(store.rows().await[0].duration, Duration::from_millis(600));
}

#[tokio::test]
async fn test_concurrent_sessions_are_isolated() {
    let store = MemoryStore::new();
    let (addr, registry) = start_server(store.clone(), None).await;
    let mut alice = connect(&addr).await;
    let mut bob = connect(&addr).await;

    let alice_start = json!({"type": "start", "data": {"timestamp": 1000}});
    send(&mut alice, alice_start).await;
    send(&mut bob, json!({"type": "start", "data": {"timestamp": 5000}})).await;
    wait_for_sessions(&registry, 2).await;

    send(&mut alice, json!({"type": "end", "data": {"timestamp": 3000}})).await;
    let alice_player = player_from_redirect(
        recv_json(&mut alice).await["data"]["redirect"].as_str().unwrap(),
    )
    .to_string();

    send(&mut bob, json!({"type": "end", "data": {"timestamp": 12_000}})).await;
    let bob_player = player_from_redirect(
        recv_json(&mut bob).await["data"]["redirect"].as_str().unwrap(),
    )
    .to_string();

    assert_ne!(alice_player, bob_player);
    let alice_rank = store.rank_of(&alice_player).await.unwrap();
    let bob_rank = store.rank_of(&bob_player).await.unwrap();
    assert_eq!(alice_rank.duration, Duration::from_millis(2000));
    assert_eq!(bob_rank.duration, Duration::from_millis(7000));
    assert_eq!(alice_rank.rank, 1);
    assert_eq!(bob_rank.rank, 2);
}

#[tokio::test]
async fn test_store_failure_sends_error_reply() {
    let (addr, registry) = start_server(DownStore, None).await;
    let mut ws = connect(&addr).await;

    send(&mut ws, json!({"type": "start", "data": {"timestamp": 0}})).await;
    send(&mut ws, json!({"type": "end", "data": {"timestamp": 1000}})).await;

    let reply = recv_json(&mut ws).await;
    assert_eq!(reply["type"], "error");
    assert!(
        reply["data"]["message"]
            .as_str()
            .unwrap()
            .contains("database is down")
    );

    expect_closed(&mut ws).await;
    wait_for_sessions(&registry, 0).await;

    // The listener survives a failed session.
    let mut next = connect(&addr).await;
    send(&mut next, json!({"type": "ping"})).await;
    wait_for_sessions(&registry, 1).await;
}

#[tokio::test]
async fn test_session_removed_on_disconnect() {
    let (addr, registry) = start_server(MemoryStore::new(), None).await;
    let mut ws = connect(&addr).await;

    send(&mut ws, json!({"type": "start", "data": {"timestamp": 0}})).await;
    wait_for_sessions(&registry, 1).await;

    ws.close(None).await.unwrap();
    wait_for_sessions(&registry, 0).await;
}

#[tokio::test]
async fn test_session_removed_on_abrupt_drop() {
    let (addr, registry) = start_server(MemoryStore::new(), None).await;
    let ws = connect(&addr).await;
    wait_for_sessions(&registry, 1).await;

    drop(ws);
    wait_for_sessions(&registry, 0).await;
}

#[tokio::test]
async fn test_session_removed_after_game_over() {
    let (addr, registry) = start_server(MemoryStore::new(), None).await;
    let mut ws = connect(&addr).await;

    play(&mut ws, 0, 100).await;
    wait_for_sessions(&registry, 0).await;
}

#[tokio::test]
async fn test_idle_timeout_closes_session() {
    let (addr, registry) =
        start_server(MemoryStore::new(), Some(Duration::from_millis(100))).await;
    let mut ws = connect(&addr).await;
    wait_for_sessions(&registry, 1).await;

    expect_closed(&mut ws).await;
    wait_for_sessions(&registry, 0).await;
}

#[tokio::test]
async fn test_idle_timeout_is_logged_in_milliseconds() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _default = tracing::subscriber::set_default(subscriber);

    let idle = Some(Duration::from_millis(150));
    let (addr, registry) = start_server(MemoryStore::new(), idle).await;
    let mut ws = connect(&addr).await;
    expect_closed(&mut ws).await;
    wait_for_sessions(&registry, 0).await;

    let output = logs.contents();
    assert!(output.contains("idle_ms=150"), "{output}");
    assert!(!output.contains("idle_secs"), "{output}");
}

#[tokio::test]
async fn test_pairs_keep_arrival_order_and_malformed_ones_are_dropped() {
    let store = MemoryStore::new();
    let (addr, registry) = start_server(store.clone(), None).await;
    let mut ws = connect(&addr).await;

    send(&mut ws, json!({"type": "start", "data": {"timestamp": 1000}})).await;
    send(&mut ws, pair("あ", "a", 1100)).await;
    send(&mut ws, pair("い", "i", 1200)).await;
    send(
        &mut ws,
        json!({"type": "pair", "data": {"kana": "お", "timestamp": 1250}}),
    )
    .await;
    send(
        &mut ws,
        json!({
            "type": "pair",
            "data": {"kana": "え", "romaji": "e", "timestamp": "late"},
        }),
    )
    .await;
    send(&mut ws, pair("う", "u", 1300)).await;

    let pairs = wait_for_pairs(&registry, 3).await;
    assert_eq!(pairs.len(), 3);
    let kana: Vec<&str> = pairs.iter().map(|p| p.kana.as_str()).collect();
    assert_eq!(kana, ["あ", "い", "う"]);
    let stamps: Vec<i64> = pairs.iter().map(|p| p.timestamp).collect();
    assert_eq!(stamps, [1100, 1200, 1300]);

    send(&mut ws, json!({"type": "end", "data": {"timestamp": 2000}})).await;
    assert_eq!(recv_json(&mut ws).await["type"], "gameover");
    assert_eq!(store.rows().await[0].duration, Duration::from_millis(1000));
    wait_for_sessions(&registry, 0).await;
}

#[tokio::test]
async fn test_stalled_handshake_does_not_block_other_clients() {
    let (addr, registry) = start_server(MemoryStore::new(), None).await;

    // Completes TCP but never sends the upgrade request.
    let _stalled = tokio::net::TcpStream::connect(&addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut ws = tokio::time::timeout(Duration::from_secs(3), connect(&addr))
        .await
        .expect("honest client should connect while another stalls");
    wait_for_sessions(&registry, 1).await;

    let redirect = play(&mut ws, 0, 500).await;
    assert!(redirect.starts_with("/scoreboard?p=guest-"));
}

#[tokio::test]
async fn test_stalled_handshake_is_dropped_after_timeout() {
    use tokio::io::AsyncReadExt;

    let builder = MemkanaServerBuilder::new()
        .handshake_timeout(Duration::from_millis(100));
    let (addr, registry) = spawn_server(builder, MemoryStore::new()).await;

    let mut stalled = tokio::net::TcpStream::connect(&addr).await.unwrap();
    let mut buf = [0u8; 64];
    let read = stalled.read(&mut buf);
    let read = tokio::time::timeout(Duration::from_secs(2), read)
        .await
        .expect("server should hang up on a silent socket");
    assert!(matches!(read, Ok(0) | Err(_)), "unexpected read {read:?}");
    assert!(registry.is_empty().await);
}
