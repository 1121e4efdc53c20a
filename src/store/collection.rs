//! Collection accessor
//!
//! Per-record CRUD. Every call runs in exactly one engine transaction:
//! reads in a read transaction, everything else in a write transaction that
//! is either committed or dropped (rolled back) before the call returns.

use std::time::Duration;

use redb::{ReadableTable, TableError, TableHandle};

use crate::error::{Result, StoreError};

use super::tables::{self, Abort};
use super::Store;

/// Which operation an abort happened in
#[derive(Debug, Clone, Copy)]
enum Op {
    Put,
    Get,
    Update,
    Delete,
}

/// Operation surface for one named collection
///
/// Obtained from [`Store::collection`]. Binding a name does not touch
/// storage; the collection table is created by the first `put`.
pub struct Collection<'a> {
    store: &'a Store,
    name: String,
    table: String,
}

impl<'a> Collection<'a> {
    pub(crate) fn new(store: &'a Store, name: &str) -> Self {
        Self {
            store,
            name: name.to_string(),
            table: tables::table_name(name),
        }
    }

    /// The collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert a new record and return its sequence id
    ///
    /// Fails with `PutConflict` if the key is already present. A `ttl` of
    /// `Some(d)` with non-zero `d` schedules the record's removal.
    pub fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) -> Result<u64> {
        let ttl = ttl.filter(|ttl| !ttl.is_zero());
        let deadline = ttl.map(tables::deadline_after);

        let id = self
            .insert(key, value, deadline)
            .map_err(|abort| self.classify(Op::Put, key, abort))?;

        if let (Some(ttl), Some(deadline)) = (ttl, deadline) {
            self.store.expiry().arm(&self.name, key, ttl, deadline);
        }

        tracing::debug!(
            "put key ({}) into collection ({}) with id {}",
            String::from_utf8_lossy(key),
            self.name,
            id
        );
        Ok(id)
    }

    /// Alias of [`Collection::put`]
    pub fn set(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) -> Result<u64> {
        self.put(key, value, ttl)
    }

    /// Read the current value of a record
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.read(key)
            .map_err(|abort| self.classify(Op::Get, key, abort))
    }

    /// Overwrite the value of an existing record
    ///
    /// The sequence id and any expiry deadline are left as they were.
    pub fn update(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.overwrite(key, value)
            .map_err(|abort| self.classify(Op::Update, key, abort))?;

        tracing::debug!(
            "updated key ({}) in collection ({})",
            String::from_utf8_lossy(key),
            self.name
        );
        Ok(())
    }

    /// Remove an existing record
    ///
    /// Deleting an absent key is an error (`KeyNotFound`).
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.remove(key)
            .map_err(|abort| self.classify(Op::Delete, key, abort))?;

        tracing::debug!(
            "deleted key ({}) from collection ({})",
            String::from_utf8_lossy(key),
            self.name
        );
        Ok(())
    }

    /// Whether the collection has been materialized
    pub fn exists(&self) -> Result<bool> {
        let exists = self.store.db().begin_read().map_err(redb::Error::from).and_then(|txn| {
            Ok(txn
                .list_tables()?
                .any(|handle| handle.name() == self.table))
        });
        exists.map_err(|source| StoreError::GetFailed {
            collection: self.name.clone(),
            source,
        })
    }

    /// Number of live (unexpired) records
    pub fn len(&self) -> Result<u64> {
        self.count()
            .map_err(|abort| self.classify(Op::Get, b"", abort))
    }

    /// True if the collection holds no live records
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    fn insert(&self, key: &[u8], value: &[u8], deadline: Option<u64>) -> std::result::Result<u64, Abort> {
        let txn = self.store.db().begin_write()?;
        let now = tables::now_millis();

        let id = {
            let mut records = txn.open_table(tables::records(&self.table))?;
            let mut deadlines = txn.open_table(tables::DEADLINES)?;

            // An overdue record whose timer has not fired yet is replaced
            let exists = records.get(key)?.is_some();
            if exists && tables::is_live(tables::deadline_of(&deadlines, &self.name, key)?, now) {
                return Err(Abort::Conflict);
            }

            let id = tables::next_sequence(&txn, &self.name)?;
            records.insert(key, value)?;
            match deadline {
                Some(deadline) => {
                    deadlines.insert((self.name.as_str(), key), deadline)?;
                }
                None => {
                    deadlines.remove((self.name.as_str(), key))?;
                }
            }
            id
        };

        txn.commit()?;
        Ok(id)
    }

    fn read(&self, key: &[u8]) -> std::result::Result<Vec<u8>, Abort> {
        let txn = self.store.db().begin_read()?;
        let records = txn
            .open_table(tables::records(&self.table))
            .map_err(tables::missing_collection)?;

        let value = records
            .get(key)?
            .map(|value| value.value().to_vec())
            .ok_or(Abort::MissingKey)?;

        if !tables::is_live(tables::read_deadline(&txn, &self.name, key)?, tables::now_millis()) {
            return Err(Abort::MissingKey);
        }
        Ok(value)
    }

    fn overwrite(&self, key: &[u8], value: &[u8]) -> std::result::Result<(), Abort> {
        let txn = self.store.db().begin_write()?;
        if !tables::has_table(&txn, &self.table)? {
            return Err(Abort::MissingCollection);
        }

        {
            let mut records = txn.open_table(tables::records(&self.table))?;
            let deadlines = txn.open_table(tables::DEADLINES)?;

            let exists = records.get(key)?.is_some();
            let deadline = tables::deadline_of(&deadlines, &self.name, key)?;
            if !exists || !tables::is_live(deadline, tables::now_millis()) {
                return Err(Abort::MissingKey);
            }
            records.insert(key, value)?;
        }

        txn.commit()?;
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> std::result::Result<(), Abort> {
        let txn = self.store.db().begin_write()?;
        if !tables::has_table(&txn, &self.table)? {
            return Err(Abort::MissingCollection);
        }

        {
            let mut records = txn.open_table(tables::records(&self.table))?;
            let mut deadlines = txn.open_table(tables::DEADLINES)?;

            let deadline = tables::deadline_of(&deadlines, &self.name, key)?;
            let removed = records.remove(key)?.is_some();
            if !removed || !tables::is_live(deadline, tables::now_millis()) {
                return Err(Abort::MissingKey);
            }
            deadlines.remove((self.name.as_str(), key))?;
        }

        txn.commit()?;
        Ok(())
    }

    fn count(&self) -> std::result::Result<u64, Abort> {
        let txn = self.store.db().begin_read()?;
        let records = txn
            .open_table(tables::records(&self.table))
            .map_err(tables::missing_collection)?;
        let deadlines = match txn.open_table(tables::DEADLINES) {
            Ok(deadlines) => Some(deadlines),
            Err(TableError::TableDoesNotExist(_)) => None,
            Err(e) => return Err(e.into()),
        };
        let now = tables::now_millis();

        let mut live = 0;
        for entry in records.iter()? {
            let (key, _) = entry?;
            let deadline = match &deadlines {
                Some(deadlines) => tables::deadline_of(deadlines, &self.name, key.value())?,
                None => None,
            };
            if tables::is_live(deadline, now) {
                live += 1;
            }
        }
        Ok(live)
    }

    // =========================================================================
    // Error Classification
    // =========================================================================

    /// The single point where an abort becomes a taxonomy error
    fn classify(&self, op: Op, key: &[u8], abort: Abort) -> StoreError {
        let collection = self.name.clone();
        let key = String::from_utf8_lossy(key).into_owned();

        match (abort, op) {
            (Abort::Conflict, _) => StoreError::PutConflict { collection, key },
            (Abort::MissingCollection, _) => StoreError::CollectionNotFound(collection),
            (Abort::MissingKey, _) => StoreError::KeyNotFound { collection, key },
            (Abort::Engine(source), Op::Put) => StoreError::PutFailed { collection, source },
            (Abort::Engine(source), Op::Get) => StoreError::GetFailed { collection, source },
            (Abort::Engine(source), Op::Update) => StoreError::UpdateFailed { collection, source },
            (Abort::Engine(source), Op::Delete) => StoreError::DeleteFailed { collection, source },
        }
    }
}
