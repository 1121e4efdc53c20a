//! Blocking client for the Storer wire protocol
//!
//! One TCP connection, one request in flight at a time. Error responses come
//! back as [`StoreError::Remote`] carrying the server's [`ErrorKind`].
//!
//! [`ErrorKind`]: crate::error::ErrorKind

use std::io::{BufReader, BufWriter};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{Result, StoreError};
use crate::protocol::{read_response, write_command, Command};

/// Client connection to a Storer server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    server_addr: SocketAddr,
}

impl Client {
    /// Connect, read and write timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

    /// Connect with the default timeout
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        Self::connect_timeout(addr, Self::DEFAULT_TIMEOUT)
    }

    /// Connect, bounding the connect and every read/write by `timeout`
    pub fn connect_timeout(addr: impl ToSocketAddrs, timeout: Duration) -> Result<Self> {
        let mut last_err = None;
        for candidate in addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&candidate, timeout) {
                Ok(stream) => return Self::from_stream(stream, timeout),
                Err(e) => last_err = Some(e),
            }
        }

        Err(match last_err {
            Some(e) => e.into(),
            None => StoreError::Config("server address resolved to nothing".to_string()),
        })
    }

    fn from_stream(stream: TcpStream, timeout: Duration) -> Result<Self> {
        let server_addr = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;

        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            server_addr,
        })
    }

    /// Address of the server this client talks to
    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// Send one command and wait for its response
    pub fn call(&mut self, command: &Command) -> Result<Option<Vec<u8>>> {
        write_command(&mut self.writer, command)?;
        read_response(&mut self.reader)?.into_result()
    }

    /// Insert a record; returns its sequence id
    pub fn put(
        &mut self,
        collection: &str,
        key: &[u8],
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<u64> {
        let payload = self.call(&Command::Put {
            collection: collection.to_string(),
            key: key.to_vec(),
            value: value.to_vec(),
            ttl_secs: ttl.map(|ttl| ttl.as_secs()).unwrap_or(0),
        })?;

        let bytes: [u8; 8] = payload
            .as_deref()
            .and_then(|p| p.try_into().ok())
            .ok_or_else(|| StoreError::Protocol("PUT response: expected an 8-byte id".to_string()))?;
        Ok(u64::from_be_bytes(bytes))
    }

    /// Read a record's value
    pub fn get(&mut self, collection: &str, key: &[u8]) -> Result<Vec<u8>> {
        let payload = self.call(&Command::Get {
            collection: collection.to_string(),
            key: key.to_vec(),
        })?;
        Ok(payload.unwrap_or_default())
    }

    /// Overwrite an existing record
    pub fn update(&mut self, collection: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.call(&Command::Update {
            collection: collection.to_string(),
            key: key.to_vec(),
            value: value.to_vec(),
        })?;
        Ok(())
    }

    /// Delete an existing record
    pub fn delete(&mut self, collection: &str, key: &[u8]) -> Result<()> {
        self.call(&Command::Delete {
            collection: collection.to_string(),
            key: key.to_vec(),
        })?;
        Ok(())
    }

    /// Materialize an empty collection
    pub fn create_collection(&mut self, collection: &str) -> Result<()> {
        self.call(&Command::CreateCollection {
            collection: collection.to_string(),
        })?;
        Ok(())
    }

    /// Drop a collection and its records
    pub fn drop_collection(&mut self, collection: &str) -> Result<()> {
        self.call(&Command::DropCollection {
            collection: collection.to_string(),
        })?;
        Ok(())
    }

    /// Health check
    pub fn ping(&mut self) -> Result<()> {
        match self.call(&Command::Ping)? {
            Some(ref pong) if pong == b"PONG" => Ok(()),
            other => Err(StoreError::Protocol(format!(
                "unexpected PING reply: {:?}",
                other.map(|p| String::from_utf8_lossy(&p).into_owned())
            ))),
        }
    }
}
