//! Client library tests against a real broker on a loopback socket.

use std::net::SocketAddr;
use std::time::Duration;

use courier_broker::StreamBroker;
use courier_client::{Publisher, Subscriber};
use courier_transport::TransportKind;
use tokio::sync::oneshot;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

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

#[tokio::test]
async fn publish_and_receive() {
    let (addr, _stop) = start_broker().await;

    let mut subscriber = Subscriber::connect(TransportKind::Tcp, addr, vec![9], "ticker")
        .await
        .unwrap();
    let mut publisher = Publisher::connect(TransportKind::Tcp, addr, 9, "scores")
        .await
        .unwrap();

    assert_ne!(publisher.session_id(), subscriber.session_id());

    publisher.publish("Gol de Tigres al minuto 12").await.unwrap();

    let delivery = timeout(RECV_TIMEOUT, subscriber.next_message())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(delivery.channel, 9);
    assert_eq!(&delivery.payload[..], b"Gol de Tigres al minuto 12");
}

#[tokio::test]
async fn dynamic_resubscription() {
    let (addr, _stop) = start_broker().await;

    let mut subscriber = Subscriber::connect(TransportKind::Tcp, addr, vec![1], "ticker")
        .await
        .unwrap();
    let mut publisher = Publisher::connect(TransportKind::Tcp, addr, 2, "scores")
        .await
        .unwrap();

    subscriber.subscribe(2).await.unwrap();
    // Subscribe carries no acknowledgment; give the broker a beat.
    tokio::time::sleep(Duration::from_millis(100)).await;

    publisher.publish("second channel").await.unwrap();

    let delivery = timeout(RECV_TIMEOUT, subscriber.next_message())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(delivery.channel, 2);

    subscriber.disconnect().await.unwrap();
    publisher.disconnect().await.unwrap();
}
