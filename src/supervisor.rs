//! Storage supervisor
//!
//! Periodic maintenance loop for a shared [`Store`].
//!
//! ```text
//!            tick ──► autoclean? ──► purge_expired()
//!              │
//!  Running ────┼── error report ──► log, keep running
//!              │
//!            shutdown ──► Stopped
//! ```
//!
//! Shutdown is observed between ticks; a sweep in progress always finishes.

use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::StoreError;
use crate::store::Store;

/// Cloneable handle used to stop the supervisor or hand it errors from
/// other background work
#[derive(Clone)]
pub struct SupervisorHandle {
    shutdown: Sender<()>,
    errors: Sender<StoreError>,
}

impl SupervisorHandle {
    /// Ask the supervisor loop to exit
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Report a background error; it is logged and the loop keeps running
    pub fn report(&self, error: StoreError) {
        if let Err(e) = self.errors.send(error) {
            tracing::warn!("supervisor stopped, dropping error: {}", e.into_inner());
        }
    }
}

/// Background maintenance loop
pub struct Supervisor {
    store: Arc<Store>,
    handle: SupervisorHandle,
    shutdown: Receiver<()>,
    errors: Receiver<StoreError>,
}

impl Supervisor {
    /// Create a supervisor for `store`; it does nothing until [`Supervisor::run`]
    pub fn new(store: Arc<Store>) -> Self {
        let (shutdown_tx, shutdown) = channel::bounded(1);
        let (errors_tx, errors) = channel::unbounded();

        Self {
            store,
            handle: SupervisorHandle {
                shutdown: shutdown_tx,
                errors: errors_tx,
            },
            shutdown,
            errors,
        }
    }

    /// A handle for stopping the loop or reporting errors to it
    pub fn handle(&self) -> SupervisorHandle {
        self.handle.clone()
    }

    /// Run the loop until shut down (blocking)
    ///
    /// The loop also stops once every [`SupervisorHandle`] has been dropped.
    pub fn run(self) {
        let Supervisor {
            store,
            handle,
            shutdown,
            errors,
        } = self;
        // Only external handles keep the channels open
        drop(handle);

        let config = store.config();
        let ticker = channel::tick(config.scan_interval);
        tracing::info!(
            "Supervisor running (scan every {:?}, autoclean {})",
            config.scan_interval,
            if config.autoclean { "on" } else { "off" }
        );

        loop {
            crossbeam::channel::select! {
                recv(ticker) -> _ => Self::tick(&store),
                recv(shutdown) -> _ => break,
                recv(errors) -> report => match report {
                    Ok(error) => tracing::warn!("background error ({}): {}", error.kind(), error),
                    Err(_) => break,
                },
            }
        }

        tracing::info!("Supervisor stopped");
    }

    fn tick(store: &Store) {
        if !store.config().autoclean {
            return;
        }

        match store.purge_expired() {
            Ok(0) => tracing::trace!("autoclean: nothing expired"),
            Ok(purged) => tracing::info!("autoclean removed {} expired records", purged),
            Err(e) => tracing::warn!("autoclean failed: {}", e),
        }
    }
}
