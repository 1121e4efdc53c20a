//! Response definitions
//!
//! Represents responses to clients.

use crate::error::{ErrorKind, Result, StoreError};

/// Response status codes
///
/// `Ok` plus one code per [`ErrorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    CollectionCreateFailed = 0x01,
    CollectionDropFailed = 0x02,
    CollectionNotFound = 0x03,
    PutConflict = 0x04,
    PutFailed = 0x05,
    GetFailed = 0x06,
    UpdateFailed = 0x07,
    DeleteFailed = 0x08,
    KeyNotFound = 0x09,
    EngineUnavailable = 0x0a,
    Io = 0x0b,
    Protocol = 0x0c,
    Config = 0x0d,
}

impl From<ErrorKind> for Status {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::CollectionCreateFailed => Status::CollectionCreateFailed,
            ErrorKind::CollectionDropFailed => Status::CollectionDropFailed,
            ErrorKind::CollectionNotFound => Status::CollectionNotFound,
            ErrorKind::PutConflict => Status::PutConflict,
            ErrorKind::PutFailed => Status::PutFailed,
            ErrorKind::GetFailed => Status::GetFailed,
            ErrorKind::UpdateFailed => Status::UpdateFailed,
            ErrorKind::DeleteFailed => Status::DeleteFailed,
            ErrorKind::KeyNotFound => Status::KeyNotFound,
            ErrorKind::EngineUnavailable => Status::EngineUnavailable,
            ErrorKind::Io => Status::Io,
            ErrorKind::Protocol => Status::Protocol,
            ErrorKind::Config => Status::Config,
        }
    }
}

impl Status {
    /// Parse a status byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        let status = match byte {
            0x00 => Status::Ok,
            0x01 => Status::CollectionCreateFailed,
            0x02 => Status::CollectionDropFailed,
            0x03 => Status::CollectionNotFound,
            0x04 => Status::PutConflict,
            0x05 => Status::PutFailed,
            0x06 => Status::GetFailed,
            0x07 => Status::UpdateFailed,
            0x08 => Status::DeleteFailed,
            0x09 => Status::KeyNotFound,
            0x0a => Status::EngineUnavailable,
            0x0b => Status::Io,
            0x0c => Status::Protocol,
            0x0d => Status::Config,
            _ => return None,
        };
        Some(status)
    }

    /// The error kind this status reports, `None` for `Ok`
    pub fn error_kind(self) -> Option<ErrorKind> {
        match self {
            Status::Ok => None,
            Status::CollectionCreateFailed => Some(ErrorKind::CollectionCreateFailed),
            Status::CollectionDropFailed => Some(ErrorKind::CollectionDropFailed),
            Status::CollectionNotFound => Some(ErrorKind::CollectionNotFound),
            Status::PutConflict => Some(ErrorKind::PutConflict),
            Status::PutFailed => Some(ErrorKind::PutFailed),
            Status::GetFailed => Some(ErrorKind::GetFailed),
            Status::UpdateFailed => Some(ErrorKind::UpdateFailed),
            Status::DeleteFailed => Some(ErrorKind::DeleteFailed),
            Status::KeyNotFound => Some(ErrorKind::KeyNotFound),
            Status::EngineUnavailable => Some(ErrorKind::EngineUnavailable),
            Status::Io => Some(ErrorKind::Io),
            Status::Protocol => Some(ErrorKind::Protocol),
            Status::Config => Some(ErrorKind::Config),
        }
    }
}

/// A response to send to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// Optional payload (id for PUT, value for GET, error message on failure)
    pub payload: Option<Vec<u8>>,
}

impl Response {
    /// Create an OK response with optional payload
    pub fn ok(payload: Option<Vec<u8>>) -> Self {
        Self {
            status: Status::Ok,
            payload,
        }
    }

    /// Create an error response carrying the error's kind and message
    pub fn error(error: &StoreError) -> Self {
        Self {
            status: error.kind().into(),
            payload: Some(error.to_string().into_bytes()),
        }
    }

    /// Turn the response back into the outcome it reports
    pub fn into_result(self) -> Result<Option<Vec<u8>>> {
        match self.status.error_kind() {
            None => Ok(self.payload),
            Some(kind) => Err(StoreError::Remote {
                kind,
                message: self
                    .payload
                    .map(|p| String::from_utf8_lossy(&p).into_owned())
                    .unwrap_or_default(),
            }),
        }
    }
}
