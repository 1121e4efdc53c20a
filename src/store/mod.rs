//! Store Module
//!
//! Owns the engine handle for one database file and hands out collection
//! accessors.
//!
//! ## Responsibilities
//! - Open (or create) `{data_dir}/{name}.db`, waiting for the file lock up to
//!   the configured timeout
//! - Schema-level operations: create/drop/list collections, drop database
//! - Own the expiry scheduler that removes TTL records
//! - Execute decoded protocol commands

mod collection;
pub(crate) mod tables;

pub use collection::Collection;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use redb::{Database, DatabaseError, TableHandle};

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::expiry::ExpiryScheduler;
use crate::protocol::Command;

/// A named database holding any number of collections
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// Enforced by the engine: write transactions are serialized, read
/// transactions run concurrently against a snapshot. All methods take
/// `&self`; share the store across threads with `Arc<Store>`.
pub struct Store {
    /// Declared before `db` so the worker is joined before the engine closes
    expiry: ExpiryScheduler,

    /// Engine handle; the expiry worker only holds a `Weak` to it
    db: Arc<Database>,

    /// Path of the database file
    path: PathBuf,

    config: Config,
}

impl Store {
    /// Pause between attempts to take a locked database file
    const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(25);

    /// Open or create the store described by `config`
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        fs::create_dir_all(&config.data_dir).map_err(|e| {
            StoreError::EngineUnavailable(format!(
                "cannot create data directory {}: {}",
                config.data_dir.display(),
                e
            ))
        })?;

        let path = config.database_path(&config.name);
        let db = Arc::new(Self::open_engine(&path, config.open_timeout)?);
        let expiry = ExpiryScheduler::start(Arc::downgrade(&db))?;

        tracing::info!("Opened database {}", path.display());

        Ok(Self {
            expiry,
            db,
            path,
            config,
        })
    }

    /// Open with a name under a directory (convenience method)
    pub fn open_named(data_dir: &Path, name: &str) -> Result<Self> {
        let config = Config::builder().data_dir(data_dir).name(name).build();
        Self::open(config)
    }

    fn open_engine(path: &Path, timeout: Duration) -> Result<Database> {
        let started = Instant::now();
        loop {
            match Database::create(path) {
                Ok(db) => return Ok(db),
                Err(DatabaseError::DatabaseAlreadyOpen) if started.elapsed() < timeout => {
                    let remaining = timeout.saturating_sub(started.elapsed());
                    thread::sleep(remaining.min(Self::LOCK_RETRY_INTERVAL));
                }
                Err(e) => {
                    return Err(StoreError::EngineUnavailable(format!(
                        "{}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }
    }

    // =========================================================================
    // Collections
    // =========================================================================

    /// Bind a collection name; does not touch storage
    pub fn collection(&self, name: &str) -> Collection<'_> {
        Collection::new(self, name)
    }

    /// Materialize an empty collection (no-op if it already exists)
    pub fn create_collection(&self, name: &str) -> Result<()> {
        let create = || -> std::result::Result<(), redb::Error> {
            let txn = self.db.begin_write()?;
            {
                let table = tables::table_name(name);
                txn.open_table(tables::records(&table))?;
            }
            txn.commit()?;
            Ok(())
        };

        create().map_err(|source| StoreError::CollectionCreateFailed {
            collection: name.to_string(),
            source,
        })?;

        tracing::debug!("created collection ({})", name);
        Ok(())
    }

    /// Remove a collection with all its records, its sequence counter and its
    /// expiry deadlines
    pub fn drop_collection(&self, name: &str) -> Result<()> {
        let failed = |reason: String| StoreError::CollectionDropFailed {
            collection: name.to_string(),
            reason,
        };

        let txn = self.db.begin_write().map_err(|e| failed(e.to_string()))?;
        let table = tables::table_name(name);
        let existed = txn
            .delete_table(tables::records(&table))
            .map_err(|e| failed(e.to_string()))?;
        if !existed {
            return Err(failed("collection does not exist".to_string()));
        }

        let forgotten = {
            let mut sequences = txn
                .open_table(tables::SEQUENCES)
                .map_err(|e| failed(e.to_string()))?;
            sequences.remove(name).map_err(|e| failed(e.to_string()))?;

            tables::clear_deadlines(&txn, name).map_err(|abort| failed(abort.to_string()))?
        };

        txn.commit().map_err(|e| failed(e.to_string()))?;

        tracing::debug!(
            "dropped collection ({}) with {} pending expiries",
            name,
            forgotten
        );
        Ok(())
    }

    /// Names of all materialized collections, sorted
    pub fn list_collections(&self) -> Result<Vec<String>> {
        let list = || -> std::result::Result<Vec<String>, redb::Error> {
            let txn = self.db.begin_read()?;
            let mut names: Vec<String> = txn
                .list_tables()?
                .filter_map(|handle| tables::collection_name(handle.name()).map(str::to_string))
                .collect();
            names.sort();
            Ok(names)
        };

        list().map_err(|source| StoreError::GetFailed {
            collection: "*".to_string(),
            source,
        })
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Remove every record whose expiry deadline has passed
    ///
    /// Returns the number of records removed.
    pub fn purge_expired(&self) -> Result<usize> {
        tables::purge_expired(&self.db, tables::now_millis()).map_err(|source| {
            StoreError::DeleteFailed {
                collection: "*".to_string(),
                source,
            }
        })
    }

    /// Number of TTL timers currently armed in memory
    pub fn armed_expiries(&self) -> usize {
        self.expiry.armed()
    }

    // =========================================================================
    // Database Files
    // =========================================================================

    /// Remove the file of another database in the same data directory
    ///
    /// Fails if `name` is this store's own (open) database; use
    /// [`Store::destroy`] for that.
    pub fn drop_database(&self, name: &str) -> Result<()> {
        let path = self.config.database_path(name);
        if path == self.path {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("database ({}) is in use", name),
            )));
        }
        fs::remove_file(&path)?;
        tracing::info!("Removed database {}", path.display());
        Ok(())
    }

    /// Close this store and remove its database file
    pub fn destroy(self) -> Result<()> {
        let path = self.path.clone();
        drop(self);
        fs::remove_file(&path)?;
        tracing::info!("Removed database {}", path.display());
        Ok(())
    }

    // =========================================================================
    // Command Execution
    // =========================================================================

    /// Execute a protocol command
    ///
    /// Returns the response payload: the id (8 bytes, big endian) for PUT,
    /// the value for GET, nothing for the rest.
    pub fn execute(&self, command: Command) -> Result<Option<Vec<u8>>> {
        match command {
            Command::Get { collection, key } => {
                self.collection(&collection).get(&key).map(Some)
            }
            Command::Put {
                collection,
                key,
                value,
                ttl_secs,
            } => {
                let ttl = Some(Duration::from_secs(ttl_secs));
                let id = self.collection(&collection).put(&key, &value, ttl)?;
                Ok(Some(id.to_be_bytes().to_vec()))
            }
            Command::Update {
                collection,
                key,
                value,
            } => {
                self.collection(&collection).update(&key, &value)?;
                Ok(None)
            }
            Command::Delete { collection, key } => {
                self.collection(&collection).delete(&key)?;
                Ok(None)
            }
            Command::CreateCollection { collection } => {
                self.create_collection(&collection)?;
                Ok(None)
            }
            Command::DropCollection { collection } => {
                self.drop_collection(&collection)?;
                Ok(None)
            }
            Command::Ping => Ok(Some(b"PONG".to_vec())),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn db(&self) -> &Database {
        &self.db
    }

    pub(crate) fn expiry(&self) -> &ExpiryScheduler {
        &self.expiry
    }
}
