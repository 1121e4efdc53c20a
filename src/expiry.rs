//! Record expiry scheduler
//!
//! Removes TTL records once their lifetime has elapsed.
//!
//! ## Design
//! - One worker thread owns a min-heap of armed timers
//! - `put` arms a timer by sending a message over a channel
//! - The worker is the single delete executor: it sleeps until the earliest
//!   deadline (or the next message) and runs one write transaction per fired
//!   timer
//! - A fired timer only removes the record if the persisted deadline still
//!   matches; a record deleted (or deleted and re-inserted) in the meantime is
//!   left alone
//!
//! Timers live in memory only. After a restart, overdue records are hidden by
//! their persisted deadline and physically removed by the autoclean sweep.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use redb::Database;

use crate::error::Result;
use crate::store::tables;

/// One armed timer
#[derive(Debug)]
struct Expiry {
    /// When to fire
    at: Instant,

    /// Persisted deadline (unix millis) the record was inserted with
    deadline: u64,

    collection: String,
    key: Vec<u8>,
}

impl PartialEq for Expiry {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at
    }
}

impl Eq for Expiry {}

impl PartialOrd for Expiry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Expiry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at.cmp(&other.at)
    }
}

enum Message {
    Arm(Expiry),
    Shutdown,
}

/// Handle to the expiry worker thread
///
/// Dropping it stops the worker and joins it. Timers still pending at that
/// point are discarded.
pub struct ExpiryScheduler {
    sender: Sender<Message>,
    armed: Arc<AtomicUsize>,
    worker: Option<JoinHandle<()>>,
}

impl ExpiryScheduler {
    /// Spawn the worker
    ///
    /// The worker holds only a weak reference to the engine and stops on its
    /// own once the engine is gone.
    pub(crate) fn start(db: Weak<Database>) -> Result<Self> {
        let (sender, receiver) = channel::unbounded();
        let armed = Arc::new(AtomicUsize::new(0));

        let worker = {
            let armed = Arc::clone(&armed);
            thread::Builder::new()
                .name("storer-expiry".to_string())
                .spawn(move || run(db, receiver, armed))?
        };

        Ok(Self {
            sender,
            armed,
            worker: Some(worker),
        })
    }

    /// Arm a timer that removes `key` from `collection` after `ttl`
    ///
    /// Never fails: if the worker is gone the record is left to the sweep. A
    /// `ttl` too far out for the monotonic clock arms nothing; the persisted
    /// deadline still governs the record.
    pub(crate) fn arm(&self, collection: &str, key: &[u8], ttl: Duration, deadline: u64) {
        let Some(at) = Instant::now().checked_add(ttl) else {
            tracing::debug!(
                "ttl {:?} for key ({}) in collection ({}) is beyond the timer range",
                ttl,
                String::from_utf8_lossy(key),
                collection
            );
            return;
        };

        let expiry = Expiry {
            at,
            deadline,
            collection: collection.to_string(),
            key: key.to_vec(),
        };

        self.armed.fetch_add(1, AtomicOrdering::Relaxed);
        if self.sender.send(Message::Arm(expiry)).is_err() {
            self.armed.fetch_sub(1, AtomicOrdering::Relaxed);
            tracing::warn!(
                "expiry worker is not running; key ({}) in collection ({}) left for autoclean",
                String::from_utf8_lossy(key),
                collection
            );
        }
    }

    /// Number of timers armed and not yet fired
    pub fn armed(&self) -> usize {
        self.armed.load(AtomicOrdering::Relaxed)
    }
}

impl Drop for ExpiryScheduler {
    fn drop(&mut self) {
        let _ = self.sender.send(Message::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("expiry worker panicked");
            }
        }
    }
}

/// Worker loop
fn run(db: Weak<Database>, receiver: Receiver<Message>, armed: Arc<AtomicUsize>) {
    let mut queue: BinaryHeap<Reverse<Expiry>> = BinaryHeap::new();

    loop {
        let message = match queue.peek() {
            Some(Reverse(next)) => {
                receiver.recv_timeout(next.at.saturating_duration_since(Instant::now()))
            }
            None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match message {
            Ok(Message::Arm(expiry)) => queue.push(Reverse(expiry)),
            Ok(Message::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        let now = Instant::now();
        while queue.peek().map_or(false, |Reverse(next)| next.at <= now) {
            let Some(Reverse(expiry)) = queue.pop() else {
                break;
            };
            armed.fetch_sub(1, AtomicOrdering::Relaxed);

            let Some(db) = db.upgrade() else {
                tracing::debug!("engine closed; expiry worker exiting");
                return;
            };
            fire(&db, &expiry);
        }
    }

    tracing::debug!("expiry worker stopped with {} timers pending", queue.len());
}

/// Run the delete for one timer; failures are logged, never raised
fn fire(db: &Database, expiry: &Expiry) {
    let key = String::from_utf8_lossy(&expiry.key);
    match tables::expire_record(db, &expiry.collection, &expiry.key, expiry.deadline) {
        Ok(true) => {
            tracing::debug!("expired key ({}) from collection ({})", key, expiry.collection);
        }
        Ok(false) => {
            tracing::trace!(
                "key ({}) in collection ({}) already gone or re-inserted",
                key,
                expiry.collection
            );
        }
        Err(e) => {
            tracing::warn!(
                "failed to expire key ({}) from collection ({}): {}",
                key,
                expiry.collection,
                e
            );
        }
    }
}
