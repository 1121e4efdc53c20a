//! Command definitions
//!
//! Represents requests from clients.

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Get = 0x01,
    Put = 0x02,
    Delete = 0x03,
    Ping = 0x04,
    Update = 0x05,
    CreateCollection = 0x06,
    DropCollection = 0x07,
}

impl CommandType {
    /// Parse a command byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(CommandType::Get),
            0x02 => Some(CommandType::Put),
            0x03 => Some(CommandType::Delete),
            0x04 => Some(CommandType::Ping),
            0x05 => Some(CommandType::Update),
            0x06 => Some(CommandType::CreateCollection),
            0x07 => Some(CommandType::DropCollection),
            _ => None,
        }
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Get a value by key
    Get { collection: String, key: Vec<u8> },

    /// Insert a new record; `ttl_secs == 0` means no expiry
    Put {
        collection: String,
        key: Vec<u8>,
        value: Vec<u8>,
        ttl_secs: u64,
    },

    /// Overwrite an existing record
    Update {
        collection: String,
        key: Vec<u8>,
        value: Vec<u8>,
    },

    /// Delete an existing record
    Delete { collection: String, key: Vec<u8> },

    /// Materialize an empty collection
    CreateCollection { collection: String },

    /// Remove a collection and all its records
    DropCollection { collection: String },

    /// Ping (health check)
    Ping,
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Get { .. } => CommandType::Get,
            Command::Put { .. } => CommandType::Put,
            Command::Update { .. } => CommandType::Update,
            Command::Delete { .. } => CommandType::Delete,
            Command::CreateCollection { .. } => CommandType::CreateCollection,
            Command::DropCollection { .. } => CommandType::DropCollection,
            Command::Ping => CommandType::Ping,
        }
    }

    /// Collection the command targets, if any
    pub fn collection(&self) -> Option<&str> {
        match self {
            Command::Get { collection, .. }
            | Command::Put { collection, .. }
            | Command::Update { collection, .. }
            | Command::Delete { collection, .. }
            | Command::CreateCollection { collection }
            | Command::DropCollection { collection } => Some(collection),
            Command::Ping => None,
        }
    }
}
