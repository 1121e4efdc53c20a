//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Request (Command) Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Payload by Command Type
//! Every field below is `field_len (4 bytes) + bytes`, except `ttl_secs`
//! which is a plain 8-byte big-endian integer.
//! - GET:               collection + key
//! - PUT:               collection + key + value + ttl_secs
//! - DELETE:            collection + key
//! - PING:              empty
//! - UPDATE:            collection + key + value
//! - CREATE_COLLECTION: collection
//! - DROP_COLLECTION:   collection
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```

use std::io::{Read, Write};

use crate::error::{Result, StoreError};
use super::{Command, CommandType, Response, Status};

/// Header size: 1 byte command/status + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Payload Fields
// =============================================================================

fn put_field(payload: &mut Vec<u8>, field: &[u8]) {
    payload.extend_from_slice(&(field.len() as u32).to_be_bytes());
    payload.extend_from_slice(field);
}

/// Cursor over a command payload
struct Fields<'a> {
    command: &'static str,
    rest: &'a [u8],
}

impl<'a> Fields<'a> {
    fn new(command: &'static str, payload: &'a [u8]) -> Self {
        Self {
            command,
            rest: payload,
        }
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        if self.rest.len() < len {
            return Err(StoreError::Protocol(format!(
                "{} command: incomplete {} (expected {}, got {})",
                self.command,
                what,
                len,
                self.rest.len()
            )));
        }
        let (head, tail) = self.rest.split_at(len);
        self.rest = tail;
        Ok(head)
    }

    fn bytes(&mut self, what: &str) -> Result<Vec<u8>> {
        let len = self.take(4, &format!("{} length", what))?;
        let len = u32::from_be_bytes([len[0], len[1], len[2], len[3]]) as usize;
        Ok(self.take(len, what)?.to_vec())
    }

    fn string(&mut self, what: &str) -> Result<String> {
        let bytes = self.bytes(what)?;
        String::from_utf8(bytes).map_err(|_| {
            StoreError::Protocol(format!("{} command: {} is not valid UTF-8", self.command, what))
        })
    }

    fn u64(&mut self, what: &str) -> Result<u64> {
        let raw = self.take(8, what)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(raw);
        Ok(u64::from_be_bytes(buf))
    }

    fn finish(self) -> Result<()> {
        if !self.rest.is_empty() {
            return Err(StoreError::Protocol(format!(
                "{} command: unexpected {} trailing bytes",
                self.command,
                self.rest.len()
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
///
/// Format: cmd_type (1) + payload_len (4) + payload
pub fn encode_command(command: &Command) -> Vec<u8> {
    let cmd_type = command.command_type() as u8;

    let mut payload = Vec::new();
    match command {
        Command::Get { collection, key } | Command::Delete { collection, key } => {
            put_field(&mut payload, collection.as_bytes());
            put_field(&mut payload, key);
        }
        Command::Put {
            collection,
            key,
            value,
            ttl_secs,
        } => {
            put_field(&mut payload, collection.as_bytes());
            put_field(&mut payload, key);
            put_field(&mut payload, value);
            payload.extend_from_slice(&ttl_secs.to_be_bytes());
        }
        Command::Update {
            collection,
            key,
            value,
        } => {
            put_field(&mut payload, collection.as_bytes());
            put_field(&mut payload, key);
            put_field(&mut payload, value);
        }
        Command::CreateCollection { collection } | Command::DropCollection { collection } => {
            put_field(&mut payload, collection.as_bytes());
        }
        Command::Ping => {}
    }

    // Build full message: header + payload
    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len());
    message.push(cmd_type);
    message.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    message.extend_from_slice(&payload);

    message
}

/// Decode a command from bytes
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let (cmd_type, payload) = split_frame(bytes, "")?;

    let cmd_type = CommandType::from_byte(cmd_type).ok_or_else(|| {
        StoreError::Protocol(format!("Unknown command type: 0x{:02x}", cmd_type))
    })?;

    let command = match cmd_type {
        CommandType::Get => {
            let mut fields = Fields::new("GET", payload);
            let command = Command::Get {
                collection: fields.string("collection")?,
                key: fields.bytes("key")?,
            };
            fields.finish()?;
            command
        }
        CommandType::Put => {
            let mut fields = Fields::new("PUT", payload);
            let command = Command::Put {
                collection: fields.string("collection")?,
                key: fields.bytes("key")?,
                value: fields.bytes("value")?,
                ttl_secs: fields.u64("ttl")?,
            };
            fields.finish()?;
            command
        }
        CommandType::Update => {
            let mut fields = Fields::new("UPDATE", payload);
            let command = Command::Update {
                collection: fields.string("collection")?,
                key: fields.bytes("key")?,
                value: fields.bytes("value")?,
            };
            fields.finish()?;
            command
        }
        CommandType::Delete => {
            let mut fields = Fields::new("DELETE", payload);
            let command = Command::Delete {
                collection: fields.string("collection")?,
                key: fields.bytes("key")?,
            };
            fields.finish()?;
            command
        }
        CommandType::CreateCollection => {
            let mut fields = Fields::new("CREATE_COLLECTION", payload);
            let command = Command::CreateCollection {
                collection: fields.string("collection")?,
            };
            fields.finish()?;
            command
        }
        CommandType::DropCollection => {
            let mut fields = Fields::new("DROP_COLLECTION", payload);
            let command = Command::DropCollection {
                collection: fields.string("collection")?,
            };
            fields.finish()?;
            command
        }
        CommandType::Ping => {
            Fields::new("PING", payload).finish()?;
            Command::Ping
        }
    };

    Ok(command)
}

/// Split a frame into its type byte and payload, validating the length
fn split_frame<'a>(bytes: &'a [u8], what: &str) -> Result<(u8, &'a [u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(StoreError::Protocol(format!(
            "Incomplete {}header: expected {} bytes, got {}",
            what,
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let payload_len = payload_len(&bytes[..HEADER_SIZE])?;
    let total_len = HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(StoreError::Protocol(format!(
            "Incomplete {}payload: expected {} bytes, got {}",
            what,
            total_len,
            bytes.len()
        )));
    }

    Ok((bytes[0], &bytes[HEADER_SIZE..total_len]))
}

/// Payload length from a header, rejecting oversized frames
fn payload_len(header: &[u8]) -> Result<usize> {
    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(StoreError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }
    Ok(payload_len as usize)
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
///
/// Format: status (1) + payload_len (4) + payload
pub fn encode_response(response: &Response) -> Vec<u8> {
    let payload = response.payload.as_deref().unwrap_or(&[]);
    let payload_len = payload.len() as u32;

    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len());
    message.push(response.status as u8);
    message.extend_from_slice(&payload_len.to_be_bytes());
    message.extend_from_slice(payload);

    message
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let (status_byte, payload) = split_frame(bytes, "response ")?;

    let status = Status::from_byte(status_byte).ok_or_else(|| {
        StoreError::Protocol(format!("Unknown response status: 0x{:02x}", status_byte))
    })?;

    let payload = if payload.is_empty() {
        None
    } else {
        Some(payload.to_vec())
    };

    Ok(Response { status, payload })
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one complete frame (header + payload) from a stream
fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let payload_len = payload_len(&header)?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload_len);
    frame.extend_from_slice(&header);
    frame.resize(HEADER_SIZE + payload_len, 0);
    if payload_len > 0 {
        reader.read_exact(&mut frame[HEADER_SIZE..])?;
    }
    Ok(frame)
}

/// Read a complete command from a stream
///
/// Blocks until a complete command is received or an error occurs
pub fn read_command<R: Read>(reader: &mut R) -> Result<Command> {
    decode_command(&read_frame(reader)?)
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    let bytes = encode_command(command);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    decode_response(&read_frame(reader)?)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
