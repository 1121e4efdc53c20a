//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor loop (non-blocking, polls the shutdown flag)
//! - One worker thread per connection, capped by `max_connections`
//! - Commands executed through `Store::execute`

mod server;
mod connection;

pub use server::Server;
pub use connection::Connection;
