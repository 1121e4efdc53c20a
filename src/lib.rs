//! # Storer
//!
//! A collection-oriented key-value store with:
//! - Named collections of binary key/value records, created on first write
//! - One atomic transaction per operation on an embedded B-tree engine
//! - Per-record time-to-live with in-memory timers and persisted deadlines
//! - TCP-based client protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │                  (Multiple Clients)                          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Store                                 │
//! │        (collection accessors, one txn per operation)         │
//! └──────┬──────────────────────┬───────────────────────┬───────┘
//!        │                      │                       │
//!        ▼                      ▼                       ▼
//!  ┌───────────┐         ┌─────────────┐         ┌─────────────┐
//!  │  Expiry   │────────►│    redb     │◄────────│ Supervisor  │
//!  │ Scheduler │ expire  │ (SWMR txns) │ sweep   │ (autoclean) │
//!  └───────────┘         └─────────────┘         └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod store;
pub mod expiry;
pub mod supervisor;
pub mod protocol;
pub mod network;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ErrorKind, Result, StoreError};
pub use config::Config;
pub use store::{Collection, Store};
pub use supervisor::{Supervisor, SupervisorHandle};
pub use client::Client;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of Storer
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
