//! End-to-end tests for the UDP broker over loopback sockets.

use std::net::SocketAddr;
use std::time::Duration;

use courier_broker::DatagramBroker;
use courier_protocol::Frame;
use courier_transport::{Connection, UdpConnection};
use tokio::sync::oneshot;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);
const SILENCE_TIMEOUT: Duration = Duration::from_millis(200);

async fn start_broker() -> (SocketAddr, oneshot::Sender<()>) {
    let broker = DatagramBroker::bind("127.0.0.1:0".parse().unwrap())
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

async fn recv(conn: &mut UdpConnection) -> Frame {
    timeout(RECV_TIMEOUT, conn.recv())
        .await
        .expect("timed out waiting for frame")
        .unwrap()
        .expect("connection closed")
}

#[tokio::test]
async fn handshake_is_acknowledged() {
    let (addr, _stop) = start_broker().await;

    let mut conn = UdpConnection::connect(addr).await.unwrap();
    conn.send(&Frame::handshake_sub(vec![7], "udp-sub"))
        .await
        .unwrap();

    assert_eq!(recv(&mut conn).await, Frame::handshake_ack(0, 1));
}

#[tokio::test]
async fn publish_reaches_subscriber() {
    let (addr, _stop) = start_broker().await;

    let mut sub = UdpConnection::connect(addr).await.unwrap();
    sub.send(&Frame::handshake_sub(vec![5], "s")).await.unwrap();
    assert!(matches!(recv(&mut sub).await, Frame::HandshakeAck { .. }));

    let mut publisher = UdpConnection::connect(addr).await.unwrap();
    publisher
        .send(&Frame::handshake_pub(5, "p"))
        .await
        .unwrap();
    assert!(matches!(
        recv(&mut publisher).await,
        Frame::HandshakeAck { .. }
    ));

    publisher
        .send(&Frame::publish(5, b"hi".as_ref()))
        .await
        .unwrap();

    match recv(&mut sub).await {
        Frame::Message {
            channel, payload, ..
        } => {
            assert_eq!(channel, 5);
            assert_eq!(&payload[..], b"hi");
        }
        other => panic!("expected message, got {other:?}"),
    }
}

#[tokio::test]
async fn frames_from_unknown_endpoints_are_ignored() {
    let (addr, _stop) = start_broker().await;

    // Publish without a handshake: no session, no reply, no delivery.
    let mut stranger = UdpConnection::connect(addr).await.unwrap();
    stranger
        .send(&Frame::publish(1, b"who dis".as_ref()))
        .await
        .unwrap();

    assert!(timeout(SILENCE_TIMEOUT, stranger.recv()).await.is_err());
}

#[tokio::test]
async fn disconnect_removes_the_session() {
    let (addr, _stop) = start_broker().await;

    let mut sub = UdpConnection::connect(addr).await.unwrap();
    sub.send(&Frame::handshake_sub(vec![3], "s")).await.unwrap();
    assert!(matches!(recv(&mut sub).await, Frame::HandshakeAck { .. }));

    let mut publisher = UdpConnection::connect(addr).await.unwrap();
    publisher
        .send(&Frame::handshake_pub(3, "p"))
        .await
        .unwrap();
    assert!(matches!(
        recv(&mut publisher).await,
        Frame::HandshakeAck { .. }
    ));

    sub.send(&Frame::Disconnect).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    publisher
        .send(&Frame::publish(3, b"anyone?".as_ref()))
        .await
        .unwrap();

    assert!(
        timeout(SILENCE_TIMEOUT, sub.recv()).await.is_err(),
        "session must be gone after disconnect"
    );
}
