//! The hub task and its command protocol.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

/// Capacity of each subscriber's channel. A subscriber this far behind is
/// evicted.
pub const SUBSCRIBER_BUFFER: usize = 64;

/// Capacity of the hub's own intake. When producers outrun the hub task,
/// records are dropped rather than blocking the producer.
const INTAKE_BUFFER: usize = 256;

enum Command {
    Register {
        id: u64,
        tx: mpsc::Sender<String>,
    },
    Unregister {
        id: u64,
    },
    Broadcast(String),
    Stop,
}

/// One subscriber's receiving end. Dropping it (or falling behind) ends the
/// stream.
pub struct Subscription {
    pub id: u64,
    pub rx: mpsc::Receiver<String>,
}

/// Clonable handle to the hub task.
#[derive(Clone)]
pub struct LogHub {
    tx: mpsc::Sender<Command>,
    next_id: Arc<AtomicU64>,
}

impl LogHub {
    /// Spawn the hub task. Requires a running tokio runtime.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel(INTAKE_BUFFER);
        tokio::spawn(run(rx));
        Self {
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Register a new subscriber with a fresh 64-slot channel.
    pub async fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sub_tx, sub_rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let _ = self.tx.send(Command::Register { id, tx: sub_tx }).await;
        Subscription { id, rx: sub_rx }
    }

    /// Remove a subscriber. Safe to call for an already-evicted id.
    pub async fn unsubscribe(&self, id: u64) {
        let _ = self.tx.send(Command::Unregister { id }).await;
    }

    /// Fan a record out to every subscriber. Never blocks: if the hub's
    /// intake is full the record is dropped.
    pub fn broadcast(&self, line: String) {
        let _ = self.tx.try_send(Command::Broadcast(line));
    }

    /// Shut the hub down, closing every subscriber stream.
    pub async fn stop(&self) {
        let _ = self.tx.send(Command::Stop).await;
    }
}

async fn run(mut rx: mpsc::Receiver<Command>) {
    let mut subscribers: HashMap<u64, mpsc::Sender<String>> = HashMap::new();

    while let Some(command) = rx.recv().await {
        match command {
            Command::Register { id, tx } => {
                subscribers.insert(id, tx);
                debug!(subscriber = id, total = subscribers.len(), "log subscriber registered");
            }
            Command::Unregister { id } => {
                subscribers.remove(&id);
            }
            Command::Broadcast(line) => {
                // try_send keeps the hub loop non-blocking; a full channel
                // means the subscriber stopped draining, so evict it and
                // drop its sender (which closes the stream).
                subscribers.retain(|id, tx| match tx.try_send(line.clone()) {
                    Ok(()) => true,
                    Err(_) => {
                        debug!(subscriber = id, "dropping slow log subscriber");
                        false
                    }
                });
            }
            Command::Stop => break,
        }
    }
}
