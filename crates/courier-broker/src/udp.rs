//! Datagram-transport broker.
//!
//! A single shared socket receives from every endpoint; sessions are
//! keyed by the remote address. There is no accept and no per-session
//! receive state: each datagram carries one frame, and the first
//! well-formed handshake from a new endpoint creates its session.
//! Outbound frames drain through per-session writer tasks that share
//! the socket.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use courier_core::{Engine, SendQueue};
use courier_protocol::{HEADER_SIZE, MAX_PAYLOAD_SIZE};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::metrics;

/// A UDP broker bound to its socket.
pub struct DatagramBroker {
    socket: Arc<UdpSocket>,
}

impl DatagramBroker {
    /// Bind the shared socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;

        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    /// The bound address (useful with port 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .context("socket has no local address")
    }

    /// Run the event loop until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Infallible at runtime today; the `Result` keeps the signature
    /// uniform with `bind`.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send) -> Result<()> {
        let mut engine: Engine<SocketAddr> = Engine::new();
        let mut writers: HashMap<SocketAddr, JoinHandle<()>> = HashMap::new();
        let mut buf = vec![0u8; HEADER_SIZE + MAX_PAYLOAD_SIZE];

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }

                received = self.socket.recv_from(&mut buf) => {
                    match received {
                        Ok((n, peer)) => {
                            engine.on_datagram(peer, &buf[..n], || {
                                let (queue, queue_rx) = SendQueue::bounded();
                                let handle = tokio::spawn(send_loop(
                                    Arc::clone(&self.socket),
                                    peer,
                                    queue_rx,
                                ));
                                writers.insert(peer, handle);
                                queue
                            });
                            metrics::sync_engine(&engine.stats(), engine.session_count());
                        }
                        Err(err) => {
                            warn!(error = %err, "recv failed");
                        }
                    }

                    // Writers of departed sessions finish on their own
                    // once their queue closes; reap them occasionally.
                    if writers.len() > engine.session_count() {
                        writers.retain(|_, handle| !handle.is_finished());
                    }
                }
            }
        }

        for (_, handle) in writers.drain() {
            handle.abort();
        }
        info!(stats = ?engine.stats(), "datagram broker stopped");
        Ok(())
    }
}

/// Drain one session's outbound queue onto the shared socket, FIFO.
async fn send_loop(socket: Arc<UdpSocket>, peer: SocketAddr, mut queue: mpsc::Receiver<Bytes>) {
    while let Some(frame) = queue.recv().await {
        if let Err(err) = socket.send_to(&frame, peer).await {
            debug!(session = %peer, error = %err, "send failed");
        }
    }
}
