//! TCP Server
//!
//! Accepts connections and hands each one to its own worker thread.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::store::Store;

use super::Connection;

/// TCP server for Storer
pub struct Server {
    config: Config,
    store: Arc<Store>,
    listener: TcpListener,

    /// Set to stop the accept loop
    shutdown: AtomicBool,

    /// Connections currently being served
    active: Arc<AtomicUsize>,

    /// Worker threads, reaped as they finish
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Server {
    /// How long the accept loop sleeps when no connection is pending
    const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

    /// Bind the listen address from `config`
    pub fn bind(config: Config, store: Arc<Store>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)?;
        // Non-blocking so the accept loop can observe shutdown
        listener.set_nonblocking(true)?;

        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            config,
            store,
            listener,
            shutdown: AtomicBool::new(false),
            active: Arc::new(AtomicUsize::new(0)),
            workers: Mutex::new(Vec::new()),
        })
    }

    /// The bound address (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Number of connections currently being served
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Run the accept loop (blocking) until shutdown
    ///
    /// Waits for in-flight connections before returning.
    pub fn run(&self) -> Result<()> {
        while !self.shutdown.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, addr)) => self.dispatch(stream, addr),
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(Self::ACCEPT_POLL_INTERVAL);
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    thread::sleep(Self::ACCEPT_POLL_INTERVAL);
                }
            }
            self.workers.lock().retain(|worker| !worker.is_finished());
        }

        tracing::info!("Server shutting down");
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if worker.join().is_err() {
                tracing::warn!("Connection worker panicked");
            }
        }
        Ok(())
    }

    fn dispatch(&self, stream: TcpStream, addr: SocketAddr) {
        if self.active.load(Ordering::Relaxed) >= self.config.max_connections {
            tracing::warn!(
                "Rejecting {}: {} connections already open",
                addr,
                self.config.max_connections
            );
            return;
        }

        let mut connection = match stream
            .set_nonblocking(false)
            .map_err(StoreError::from)
            .and_then(|_| Connection::new(stream, Arc::clone(&self.store)))
        {
            Ok(connection) => connection,
            Err(e) => {
                tracing::warn!("Failed to set up connection from {}: {}", addr, e);
                return;
            }
        };
        if let Err(e) =
            connection.set_timeouts(self.config.read_timeout_ms, self.config.write_timeout_ms)
        {
            tracing::warn!("Failed to set timeouts for {}: {}", addr, e);
            return;
        }

        let active = Arc::clone(&self.active);
        active.fetch_add(1, Ordering::Relaxed);

        let spawned = thread::Builder::new()
            .name(format!("storer-conn-{}", addr))
            .spawn(move || {
                if let Err(e) = connection.handle() {
                    tracing::debug!("Connection {} closed with error: {}", connection.peer_addr(), e);
                }
                active.fetch_sub(1, Ordering::Relaxed);
            });

        match spawned {
            Ok(worker) => self.workers.lock().push(worker),
            Err(e) => {
                self.active.fetch_sub(1, Ordering::Relaxed);
                tracing::warn!("Failed to spawn worker for {}: {}", addr, e);
            }
        }
    }
}
