//! End-to-end tests for the TCP broker over loopback sockets.

use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use courier_broker::StreamBroker;
use courier_protocol::Frame;
use courier_transport::{Connection, TcpConnection};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::oneshot;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);
const SILENCE_TIMEOUT: Duration = Duration::from_millis(200);

async fn start_broker() -> (SocketAddr, oneshot::Sender<()>) {
    let broker = StreamBroker::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = broker.local_addr().unwrap();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        broker
            .run(async {
                let _ = stop_rx.await;
            })
            .await
            .unwrap();
    });

    (addr, stop_tx)
}

async fn recv(conn: &mut TcpConnection) -> Frame {
    timeout(RECV_TIMEOUT, conn.recv())
        .await
        .expect("timed out waiting for frame")
        .unwrap()
        .expect("connection closed")
}

async fn connect_subscriber(addr: SocketAddr, channels: Vec<u8>) -> TcpConnection {
    let mut conn = TcpConnection::connect(addr).await.unwrap();
    conn.send(&Frame::handshake_sub(channels, "sub"))
        .await
        .unwrap();
    match recv(&mut conn).await {
        Frame::HandshakeAck { status: 0, .. } => conn,
        other => panic!("expected handshake ack, got {other:?}"),
    }
}

async fn connect_publisher(addr: SocketAddr, channel: u8) -> TcpConnection {
    let mut conn = TcpConnection::connect(addr).await.unwrap();
    conn.send(&Frame::handshake_pub(channel, "pub"))
        .await
        .unwrap();
    match recv(&mut conn).await {
        Frame::HandshakeAck { status: 0, .. } => conn,
        other => panic!("expected handshake ack, got {other:?}"),
    }
}

#[tokio::test]
async fn first_handshake_gets_session_id_one() {
    let (addr, _stop) = start_broker().await;

    let mut conn = TcpConnection::connect(addr).await.unwrap();
    conn.send(&Frame::handshake_sub(vec![0x07], "abc"))
        .await
        .unwrap();

    assert_eq!(recv(&mut conn).await, Frame::handshake_ack(0, 1));
}

#[tokio::test]
async fn publish_reaches_subscriber_with_fresh_timestamp() {
    let (addr, _stop) = start_broker().await;

    let mut sub = connect_subscriber(addr, vec![5]).await;
    let mut publisher = connect_publisher(addr, 5).await;

    let before = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64;
    publisher
        .send(&Frame::publish(5, b"hi".as_ref()))
        .await
        .unwrap();

    match recv(&mut sub).await {
        Frame::Message {
            channel,
            timestamp_ms,
            payload,
        } => {
            let after = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_millis() as u64;
            assert_eq!(channel, 5);
            assert_eq!(&payload[..], b"hi");
            assert!(
                timestamp_ms >= before && timestamp_ms <= after,
                "timestamp {timestamp_ms} outside [{before}, {after}]"
            );
        }
        other => panic!("expected message, got {other:?}"),
    }
}

#[tokio::test]
async fn publishes_arrive_in_order() {
    let (addr, _stop) = start_broker().await;

    let mut sub = connect_subscriber(addr, vec![1]).await;
    let mut publisher = connect_publisher(addr, 1).await;

    for i in 0..20u8 {
        publisher
            .send(&Frame::publish(1, vec![i]))
            .await
            .unwrap();
    }

    for i in 0..20u8 {
        match recv(&mut sub).await {
            Frame::Message { payload, .. } => assert_eq!(payload[0], i),
            other => panic!("expected message, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn other_channels_stay_silent() {
    let (addr, _stop) = start_broker().await;

    let mut sub_a = connect_subscriber(addr, vec![1]).await;
    let mut sub_b = connect_subscriber(addr, vec![2]).await;
    let mut publisher = connect_publisher(addr, 1).await;

    publisher
        .send(&Frame::publish(1, b"x".as_ref()))
        .await
        .unwrap();

    assert!(matches!(recv(&mut sub_a).await, Frame::Message { .. }));
    assert!(
        timeout(SILENCE_TIMEOUT, sub_b.recv()).await.is_err(),
        "subscriber on channel 2 must not hear channel 1"
    );
}

#[tokio::test]
async fn ping_is_answered_with_pong() {
    let (addr, _stop) = start_broker().await;

    let mut sub = connect_subscriber(addr, vec![0]).await;
    sub.send(&Frame::Ping).await.unwrap();

    assert_eq!(recv(&mut sub).await, Frame::Pong);
}

#[tokio::test]
async fn bad_magic_gets_the_connection_closed() {
    let (addr, _stop) = start_broker().await;

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(&[0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00])
        .await
        .unwrap();

    // The broker tears the session down; the read side sees EOF or reset.
    let mut buf = [0u8; 16];
    let outcome = timeout(RECV_TIMEOUT, stream.read(&mut buf)).await.unwrap();
    assert!(matches!(outcome, Ok(0) | Err(_)));
}

#[tokio::test]
async fn disconnect_stops_delivery() {
    let (addr, _stop) = start_broker().await;

    let mut sub = connect_subscriber(addr, vec![3]).await;
    let mut publisher = connect_publisher(addr, 3).await;

    sub.send(&Frame::Disconnect).await.unwrap();
    // Allow the broker to process the disconnect.
    tokio::time::sleep(Duration::from_millis(100)).await;

    publisher
        .send(&Frame::publish(3, b"anyone?".as_ref()))
        .await
        .unwrap();

    match timeout(SILENCE_TIMEOUT, sub.recv()).await {
        Err(_) => {}                      // nothing delivered
        Ok(Ok(None)) | Ok(Err(_)) => {}  // connection torn down
        Ok(Ok(Some(frame))) => panic!("received {frame:?} after disconnect"),
    }
}
