//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Protocol Format (V1 - Simple Binary)
//!
//! ### Request Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Commands
//! - 0x01: GET               - Payload: collection + key
//! - 0x02: PUT               - Payload: collection + key + value + ttl_secs
//! - 0x03: DEL               - Payload: collection + key
//! - 0x04: PING              - Payload: empty
//! - 0x05: UPDATE            - Payload: collection + key + value
//! - 0x06: CREATE_COLLECTION - Payload: collection
//! - 0x07: DROP_COLLECTION   - Payload: collection
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Status Codes
//! - 0x00: OK (payload: 8-byte id for PUT, value for GET)
//! - 0x01..=0x0d: one code per error kind (payload: message)

mod command;
mod response;
mod codec;

pub use command::{Command, CommandType};
pub use response::{Response, Status};
pub use codec::{
    decode_command, decode_response, encode_command, encode_response, read_command,
    read_response, write_command, write_response, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
