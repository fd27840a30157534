//! Stream-transport broker.
//!
//! One event-loop task owns the engine and multiplexes accepts,
//! inbound data, and session closures. Each connection gets a reader
//! task (raw bytes in, 4 KiB chunks) and a writer task (drains the
//! session's bounded queue); neither touches broker state.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use bytes::Bytes;
use courier_core::{Engine, SendQueue, SessionStatus};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::metrics;

/// Read chunk size for connection readers.
const RECV_CHUNK_SIZE: usize = 4096;

/// Depth of the inbound event queue feeding the engine loop.
const EVENT_QUEUE_DEPTH: usize = 1024;

/// Listen backlog.
const LISTEN_BACKLOG: u32 = 1024;

/// Engine key for one stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Inbound events from connection readers and writers.
enum Event {
    Data(ConnId, Bytes),
    Closed(ConnId),
}

/// Reader and writer task handles for one connection.
struct IoTasks {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl IoTasks {
    fn abort(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// A TCP broker bound to a listen address.
pub struct StreamBroker {
    listener: TcpListener,
}

impl StreamBroker {
    /// Bind the listen socket with address reuse enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be created, bound, or put
    /// into listening mode.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .context("failed to create listen socket")?;

        socket
            .set_reuseaddr(true)
            .context("failed to set SO_REUSEADDR")?;
        socket
            .bind(addr)
            .with_context(|| format!("failed to bind {addr}"))?;
        let listener = socket
            .listen(LISTEN_BACKLOG)
            .with_context(|| format!("failed to listen on {addr}"))?;

        Ok(Self { listener })
    }

    /// The bound address (useful with port 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("listener has no local address")
    }

    /// Run the event loop until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Infallible at runtime today; the `Result` covers future fatal
    /// conditions and keeps the signature uniform with `bind`.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send) -> Result<()> {
        let (event_tx, mut event_rx) = mpsc::channel::<Event>(EVENT_QUEUE_DEPTH);
        let mut engine: Engine<ConnId> = Engine::new();
        let mut io_tasks: HashMap<ConnId, IoTasks> = HashMap::new();
        let mut next_conn_id = 1u64;

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }

                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let key = ConnId(next_conn_id);
                            next_conn_id += 1;
                            debug!(session = %key, peer = %peer, "connection accepted");

                            let (read_half, write_half) = stream.into_split();
                            let (queue, queue_rx) = SendQueue::bounded();
                            io_tasks.insert(key, IoTasks {
                                reader: tokio::spawn(read_loop(key, read_half, event_tx.clone())),
                                writer: tokio::spawn(write_loop(key, write_half, queue_rx, event_tx.clone())),
                            });
                            engine.open_session(key, queue);
                        }
                        Err(err) => {
                            warn!(error = %err, "accept failed");
                        }
                    }
                }

                Some(event) = event_rx.recv() => {
                    match event {
                        Event::Data(key, data) => {
                            if engine.on_data(key, &data) == SessionStatus::Closed {
                                if let Some(tasks) = io_tasks.remove(&key) {
                                    tasks.abort();
                                }
                            }
                        }
                        Event::Closed(key) => {
                            engine.close_session(key);
                            if let Some(tasks) = io_tasks.remove(&key) {
                                tasks.abort();
                            }
                        }
                    }
                    metrics::sync_engine(&engine.stats(), engine.session_count());
                }
            }
        }

        for (_, tasks) in io_tasks.drain() {
            tasks.abort();
        }
        info!(stats = ?engine.stats(), "stream broker stopped");
        Ok(())
    }
}

/// Read raw bytes off one connection and forward them to the engine loop.
async fn read_loop(key: ConnId, mut read_half: OwnedReadHalf, events: mpsc::Sender<Event>) {
    let mut buf = [0u8; RECV_CHUNK_SIZE];
    loop {
        match read_half.read(&mut buf).await {
            Ok(0) => {
                debug!(session = %key, "peer closed connection");
                let _ = events.send(Event::Closed(key)).await;
                return;
            }
            Ok(n) => {
                let chunk = Bytes::copy_from_slice(&buf[..n]);
                if events.send(Event::Data(key, chunk)).await.is_err() {
                    return;
                }
            }
            Err(err) => {
                debug!(session = %key, error = %err, "read failed");
                let _ = events.send(Event::Closed(key)).await;
                return;
            }
        }
    }
}

/// Drain one session's outbound queue to its socket, FIFO.
async fn write_loop(
    key: ConnId,
    mut write_half: OwnedWriteHalf,
    mut queue: mpsc::Receiver<Bytes>,
    events: mpsc::Sender<Event>,
) {
    while let Some(frame) = queue.recv().await {
        if let Err(err) = write_half.write_all(&frame).await {
            debug!(session = %key, error = %err, "write failed");
            let _ = events.send(Event::Closed(key)).await;
            return;
        }
    }
    // Queue sender dropped: the engine tore the session down.
    let _ = write_half.shutdown().await;
}
