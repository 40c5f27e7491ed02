//! Protocol-discovery state machine behavior.

use std::time::Duration;

use engine_client::{Protocol, Session};
use engine_codec::{binary, csv, Event};
use engine_transport::TcpTransport;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn write_frame(stream: &mut TcpStream, payload: &[u8]) {
    let len = (payload.len() as u32).to_be_bytes();
    stream.write_all(&len).await.unwrap();
    stream.write_all(payload).await.unwrap();
}

async fn read_frame(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await.ok()?;
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut frame = vec![0u8; len];
    stream.read_exact(&mut frame).await.ok()?;
    Some(frame)
}

/// Stub that answers every frame in the given dialect, or stays
/// silent when `dialect` is `None`.
async fn dialect_stub(dialect: Option<Protocol>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        while let Some(frame) = read_frame(&mut stream).await {
            // Only probe orders get an answer; cancels are swallowed so
            // the post-classification drain stays quiet.
            let is_order = frame.first() == Some(&0x4D) && frame.get(1) == Some(&b'N')
                || frame.first() == Some(&b'N');
            if !is_order {
                continue;
            }
            match dialect {
                Some(Protocol::Binary) => {
                    let ack = binary::encode_event(&Event::ack("PROBE", 999_999, 999_999)).unwrap();
                    write_frame(&mut stream, &ack).await;
                }
                Some(Protocol::Csv) => {
                    let ack = csv::encode_event(&Event::ack("PROBE", 999_999, 999_999)).unwrap();
                    write_frame(&mut stream, ack.as_bytes()).await;
                }
                _ => {}
            }
        }
    });

    addr
}

async fn connect(addr: &str) -> Session {
    let transport = TcpTransport::connect(addr, Duration::from_secs(1))
        .await
        .unwrap();
    Session::new(Box::new(transport))
}

#[tokio::test]
async fn binary_engine_is_detected_from_first_probe() {
    let addr = dialect_stub(Some(Protocol::Binary)).await;
    let mut session = connect(&addr).await;

    assert_eq!(session.protocol(), Protocol::Unknown);
    let detected = session.detect().await.unwrap();
    assert_eq!(detected, Protocol::Binary);
    assert_eq!(session.protocol(), Protocol::Binary);
}

#[tokio::test]
async fn csv_engine_is_detected_from_reply_shape() {
    let addr = dialect_stub(Some(Protocol::Csv)).await;
    let mut session = connect(&addr).await;

    let detected = session.detect().await.unwrap();
    assert_eq!(detected, Protocol::Csv);
}

#[tokio::test]
async fn silent_engine_defaults_to_binary() {
    let addr = dialect_stub(None).await;
    let mut session = connect(&addr).await;

    let detected = session.detect().await.unwrap();
    assert_eq!(detected, Protocol::Binary);
}

#[tokio::test]
async fn detected_value_only_moves_via_override() {
    let addr = dialect_stub(Some(Protocol::Binary)).await;
    let mut session = connect(&addr).await;

    session.detect().await.unwrap();
    assert_eq!(session.protocol(), Protocol::Binary);

    // Receiving more traffic must not flip the detected value back.
    let _ = session.recv(Duration::from_millis(50)).await.unwrap();
    assert_eq!(session.protocol(), Protocol::Binary);

    // An explicit override is the only other transition.
    session.set_protocol(Protocol::Csv);
    assert_eq!(session.protocol(), Protocol::Csv);
}

#[tokio::test]
async fn order_ids_are_strictly_increasing() {
    let addr = dialect_stub(None).await;
    let mut session = connect(&addr).await;

    let a = session.next_order_id();
    let b = session.next_order_id();
    let c = session.next_order_id();
    assert!(a < b && b < c);
}
