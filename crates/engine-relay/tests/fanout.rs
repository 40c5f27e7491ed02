use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use engine_client::{Protocol, Session};
use engine_codec::{binary, Event, EventKind, Side};
use engine_relay::server::{self, ServerState};
use engine_relay::{producer, Hub};
use engine_transport::TcpTransport;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

async fn start_server(hub: Arc<Hub>) -> (String, watch::Sender<bool>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let state = Arc::new(ServerState {
        hub,
        ws_path: "/ws".to_string(),
        started_at: Instant::now(),
    });
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        let _ = server::run(listener, state, shutdown_rx).await;
    });

    (addr, shutdown_tx)
}

#[tokio::test]
async fn broadcasts_reach_every_subscriber_in_order() {
    let hub = Hub::new();
    let (addr, _shutdown) = start_server(hub.clone()).await;

    let (mut ws_a, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    let (mut ws_b, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();

    // Registration happens after the handshake completes; wait for it.
    for _ in 0..50 {
        if hub.len().await == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(hub.len().await, 2);

    hub.broadcast("first").await;
    hub.broadcast("second").await;

    for ws in [&mut ws_a, &mut ws_b] {
        let msg = ws.next().await.unwrap().unwrap();
        assert_eq!(msg, Message::Text("first".into()));
        let msg = ws.next().await.unwrap().unwrap();
        assert_eq!(msg, Message::Text("second".into()));
    }
}

#[tokio::test]
async fn closed_subscriber_is_deregistered_without_disturbing_peers() {
    let hub = Hub::new();
    let (addr, _shutdown) = start_server(hub.clone()).await;

    let (mut ws_a, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    let (ws_b, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();

    for _ in 0..50 {
        if hub.len().await == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    drop(ws_b);
    for _ in 0..100 {
        if hub.len().await == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(hub.len().await, 1);

    hub.broadcast("still here").await;
    let msg = ws_a.next().await.unwrap().unwrap();
    assert_eq!(msg, Message::Text("still here".into()));
}

#[tokio::test]
async fn ping_is_answered_with_matching_pong() {
    let hub = Hub::new();
    let (addr, _shutdown) = start_server(hub.clone()).await;

    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    ws.send(Message::Ping(b"heartbeat".to_vec())).await.unwrap();

    let msg = ws.next().await.unwrap().unwrap();
    assert_eq!(msg, Message::Pong(b"heartbeat".to_vec()));
}

#[tokio::test]
async fn health_endpoint_reports_subscriber_count() {
    let hub = Hub::new();
    let (addr, _shutdown) = start_server(hub.clone()).await;

    let (_ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    for _ in 0..50 {
        if hub.len().await == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: relay\r\n\r\n")
        .await
        .unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
    let body = response.split("\r\n\r\n").nth(1).unwrap();
    let json: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["subscribers"], 1);
}

#[tokio::test]
async fn unknown_paths_get_404() {
    let hub = Hub::new();
    let (addr, _shutdown) = start_server(hub).await;

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    stream
        .write_all(b"GET /static/index.html HTTP/1.1\r\nHost: relay\r\n\r\n")
        .await
        .unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 404"), "{response}");
}

/// Stub engine that frames a fixed event sequence at the relay.
async fn start_event_source(events: Vec<Event>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        for event in &events {
            let payload = binary::encode_event(event).unwrap();
            let len = (payload.len() as u32).to_be_bytes();
            stream.write_all(&len).await.unwrap();
            stream.write_all(&payload).await.unwrap();
        }
        // Hold the socket open so the producer sees quiet, not EOF.
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    addr
}

#[tokio::test]
async fn producer_forwards_only_filtered_kinds() {
    let events = vec![
        Event::ack("IBM", 1, 1),
        Event::trade("IBM", 1, 1, 2, 2, 100, 5),
        Event::top_of_book("IBM", Side::Buy, 100, 5),
        Event::trade("IBM", 3, 3, 4, 4, 101, 7),
    ];
    let engine_addr = start_event_source(events).await;

    let transport = TcpTransport::connect(&engine_addr, Duration::from_secs(1))
        .await
        .unwrap();
    let mut session = Session::new(Box::new(transport));
    session.set_protocol(Protocol::Binary);

    let hub = Hub::new();
    let (_id, mut rx) = hub.register().await;

    let filter: HashSet<EventKind> = [EventKind::Trade].into_iter().collect();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let producer_handle = {
        let hub = hub.clone();
        tokio::spawn(async move {
            producer::run(session, hub, filter, shutdown_rx).await;
        })
    };

    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();

    for (msg, expected_price) in [(first, 100), (second, 101)] {
        let Message::Text(text) = msg else {
            panic!("expected text frame");
        };
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["type"], "trade");
        assert_eq!(json["price"], expected_price);
    }

    // Nothing else was forwarded.
    assert!(rx.try_recv().is_err());

    let _ = shutdown_tx.send(true);
    let _ = producer_handle.await;
}
