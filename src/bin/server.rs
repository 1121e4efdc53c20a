//! Storer Server Binary
//!
//! Opens the store, starts the maintenance supervisor and serves the TCP
//! protocol.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use storer::network::Server;
use storer::{Config, Store, Supervisor};
use tracing_subscriber::{fmt, EnvFilter};

/// Storer Server
#[derive(Parser, Debug)]
#[command(name = "storer-server")]
#[command(about = "Collection-oriented key-value store with TTL expiry")]
#[command(version)]
struct Args {
    /// Database name (file is <data-dir>/<name>.db)
    #[arg(short, long, env = "STORER_DB_NAME", default_value = "app")]
    name: String,

    /// Data directory
    #[arg(short, long, env = "STORER_DATA_DIR", default_value = ".")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, env = "STORER_LISTEN", default_value = "127.0.0.1:7070")]
    listen: String,

    /// Max wait for the database file lock, in milliseconds
    #[arg(long, env = "STORER_OPEN_TIMEOUT_MS", default_value = "2000")]
    open_timeout_ms: u64,

    /// Sweep overdue TTL records on every maintenance tick
    #[arg(long, env = "STORER_AUTOCLEAN")]
    autoclean: bool,

    /// Maintenance tick period, in seconds
    #[arg(long, env = "STORER_SCAN_INTERVAL_SECS", default_value = "15")]
    scan_interval_secs: u64,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,storer=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("Storer Server v{}", storer::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    // Build config from args
    let config = Config::builder()
        .name(&args.name)
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .open_timeout(Duration::from_millis(args.open_timeout_ms))
        .autoclean(args.autoclean)
        .scan_interval(Duration::from_secs(args.scan_interval_secs))
        .max_connections(args.max_connections)
        .build();

    // Open store
    let store = match Store::open(config.clone()) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Store initialized successfully");

    // Start maintenance
    let supervisor = Supervisor::new(Arc::clone(&store));
    let supervisor_handle = supervisor.handle();
    let maintenance = thread::Builder::new()
        .name("storer-supervisor".to_string())
        .spawn(move || supervisor.run());
    let maintenance = match maintenance {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!("Failed to start supervisor: {}", e);
            std::process::exit(1);
        }
    };

    // Start server
    let result = Server::bind(config, Arc::clone(&store)).and_then(|server| server.run());

    supervisor_handle.shutdown();
    if maintenance.join().is_err() {
        tracing::error!("Supervisor panicked");
    }

    if let Err(e) = result {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
