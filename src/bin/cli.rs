//! Storer CLI Client
//!
//! Command-line interface for interacting with a Storer server.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use storer::Client;

/// Storer CLI
#[derive(Parser, Debug)]
#[command(name = "storer-cli")]
#[command(about = "CLI for the Storer key-value store")]
struct Args {
    /// Server address
    #[arg(short, long, env = "STORER_SERVER", default_value = "127.0.0.1:7070")]
    server: String,

    /// Request timeout in milliseconds
    #[arg(short, long, default_value = "2000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The collection to read from
        collection: String,

        /// The key to get
        key: String,
    },

    /// Insert a new key-value pair
    Put {
        /// The collection to insert into
        collection: String,

        /// The key to insert
        key: String,

        /// The value to insert
        value: String,

        /// Remove the record after this many seconds
        #[arg(long)]
        ttl: Option<u64>,
    },

    /// Overwrite the value of an existing key
    Update {
        /// The collection holding the key
        collection: String,

        /// The key to update
        key: String,

        /// The new value
        value: String,
    },

    /// Delete a key
    Del {
        /// The collection holding the key
        collection: String,

        /// The key to delete
        key: String,
    },

    /// Create an empty collection
    Create {
        /// The collection to create
        collection: String,
    },

    /// Drop a collection and all its records
    Drop {
        /// The collection to drop
        collection: String,
    },

    /// Ping the server
    Ping,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut client =
        match Client::connect_timeout(args.server.as_str(), Duration::from_millis(args.timeout_ms)) {
            Ok(client) => client,
            Err(e) => {
                eprintln!("error: cannot connect to {}: {}", args.server, e);
                return ExitCode::FAILURE;
            }
        };

    let outcome = match args.command {
        Commands::Get { collection, key } => client
            .get(&collection, key.as_bytes())
            .map(|value| String::from_utf8_lossy(&value).into_owned()),
        Commands::Put {
            collection,
            key,
            value,
            ttl,
        } => client
            .put(
                &collection,
                key.as_bytes(),
                value.as_bytes(),
                ttl.map(Duration::from_secs),
            )
            .map(|id| format!("id: {}", id)),
        Commands::Update {
            collection,
            key,
            value,
        } => client
            .update(&collection, key.as_bytes(), value.as_bytes())
            .map(|_| "OK".to_string()),
        Commands::Del { collection, key } => client
            .delete(&collection, key.as_bytes())
            .map(|_| "OK".to_string()),
        Commands::Create { collection } => client
            .create_collection(&collection)
            .map(|_| "OK".to_string()),
        Commands::Drop { collection } => client
            .drop_collection(&collection)
            .map(|_| "OK".to_string()),
        Commands::Ping => client.ping().map(|_| "PONG".to_string()),
    };

    match outcome {
        Ok(line) => {
            println!("{}", line);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error ({}): {}", e.kind(), e);
            ExitCode::FAILURE
        }
    }
}
