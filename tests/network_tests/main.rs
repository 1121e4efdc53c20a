//! Tests for the TCP server and client
//!
//! Each test binds a server on an ephemeral loopback port and talks to it
//! with the blocking client.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use storer::network::Server;
use storer::protocol::{decode_response, Status, HEADER_SIZE};
use storer::{Client, Config, ErrorKind, Store, StoreError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

struct TestServer {
    _temp: TempDir,
    addr: SocketAddr,
    server: Arc<Server>,
    worker: Option<JoinHandle<()>>,
}

impl TestServer {
    fn start() -> Self {
        Self::start_with(|builder| builder)
    }

    fn start_with(
        tweak: impl FnOnce(storer::config::ConfigBuilder) -> storer::config::ConfigBuilder,
    ) -> Self {
        let temp = TempDir::new().unwrap();
        let config = tweak(
            Config::builder()
                .data_dir(temp.path())
                .name("net")
                .listen_addr("127.0.0.1:0"),
        )
        .build();

        let store = Arc::new(Store::open(config.clone()).unwrap());
        let server = Arc::new(Server::bind(config, store).unwrap());
        let addr = server.local_addr().unwrap();

        let worker = {
            let server = Arc::clone(&server);
            thread::spawn(move || server.run().unwrap())
        };

        Self {
            _temp: temp,
            addr,
            server,
            worker: Some(worker),
        }
    }

    fn client(&self) -> Client {
        Client::connect(self.addr).unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.shutdown();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

// =============================================================================
// Client Round-Trip Tests
// =============================================================================

#[test]
fn test_ping() {
    let server = TestServer::start();
    let mut client = server.client();

    client.ping().unwrap();
    assert_eq!(client.server_addr(), server.addr);
}

#[test]
fn test_client_crud() {
    let server = TestServer::start();
    let mut client = server.client();

    let id = client.put("ips", b"1.1.1.1", b"Bucharest", None).unwrap();
    assert_eq!(id, 1);
    assert_eq!(client.get("ips", b"1.1.1.1").unwrap(), b"Bucharest");

    client.update("ips", b"1.1.1.1", b"Cluj").unwrap();
    assert_eq!(client.get("ips", b"1.1.1.1").unwrap(), b"Cluj");

    client.delete("ips", b"1.1.1.1").unwrap();
    let err = client.get("ips", b"1.1.1.1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::KeyNotFound);
}

#[test]
fn test_client_errors_keep_connection() {
    let server = TestServer::start();
    let mut client = server.client();

    client.put("users", b"alice", b"1", None).unwrap();

    let conflict = client.put("users", b"alice", b"2", None).unwrap_err();
    assert!(matches!(
        conflict,
        StoreError::Remote {
            kind: ErrorKind::PutConflict,
            ..
        }
    ));

    let missing = client.delete("ghost", b"k").unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::CollectionNotFound);

    // Same connection still serves requests
    assert_eq!(client.get("users", b"alice").unwrap(), b"1");
}

#[test]
fn test_client_collections() {
    let server = TestServer::start();
    let mut client = server.client();

    client.create_collection("users").unwrap();
    assert_eq!(
        client.get("users", b"k").unwrap_err().kind(),
        ErrorKind::KeyNotFound
    );

    client.drop_collection("users").unwrap();
    assert_eq!(
        client.drop_collection("users").unwrap_err().kind(),
        ErrorKind::CollectionDropFailed
    );
}

#[test]
fn test_client_put_with_ttl() {
    let server = TestServer::start();
    let mut client = server.client();

    client
        .put("sessions", b"token", b"abc", Some(Duration::from_secs(1)))
        .unwrap();
    assert_eq!(client.get("sessions", b"token").unwrap(), b"abc");

    thread::sleep(Duration::from_millis(1200));

    assert_eq!(
        client.get("sessions", b"token").unwrap_err().kind(),
        ErrorKind::KeyNotFound
    );
}

#[test]
fn test_multiple_clients() {
    let server = TestServer::start();
    let mut handles = vec![];

    for t in 0..4 {
        let addr = server.addr;
        handles.push(thread::spawn(move || {
            let mut client = Client::connect(addr).unwrap();
            for i in 0..10 {
                let key = format!("t{}-{}", t, i);
                client.put("shared", key.as_bytes(), b"v", None).unwrap();
                assert_eq!(client.get("shared", key.as_bytes()).unwrap(), b"v");
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    // 40 records, so the next id is 41
    let mut client = server.client();
    assert_eq!(client.put("shared", b"last", b"v", None).unwrap(), 41);
}

// =============================================================================
// Raw Wire Tests
// =============================================================================

#[test]
fn test_unknown_command_gets_protocol_error() {
    let server = TestServer::start();
    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();

    stream.write_all(&[0xEE, 0, 0, 0, 0]).unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();

    assert!(response.len() >= HEADER_SIZE);
    let decoded = decode_response(&response).unwrap();
    assert_eq!(decoded.status, Status::Protocol);
}

#[test]
fn test_connection_limit() {
    let server = TestServer::start_with(|builder| builder.max_connections(1));

    let mut first = server.client();
    first.ping().unwrap();
    assert_eq!(server.server.active_connections(), 1);

    // Rejected connections are closed without a reply
    let mut second = Client::connect_timeout(server.addr, Duration::from_millis(500)).unwrap();
    assert!(second.ping().is_err());

    first.ping().unwrap();
}

#[test]
fn test_shutdown_stops_accept_loop() {
    let mut server = TestServer::start();
    server.client().ping().unwrap();

    server.server.shutdown();
    let worker = server.worker.take().unwrap();

    worker.join().unwrap();
}
