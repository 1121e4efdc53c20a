//! Table layout inside the database file
//!
//! ```text
//! coll:{name}      &[u8] -> &[u8]         records of one collection
//! meta:sequences   &str  -> u64           last issued sequence id per collection
//! meta:expiry      (&str, &[u8]) -> u64   deadline (unix millis) per TTL record
//! ```
//!
//! The prefixes keep user collection names apart from the metadata tables.
//! Helpers here take an open transaction and never commit it; the caller
//! owns the transaction boundary.

use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use redb::{
    Database, ReadTransaction, ReadableTable, StorageError, TableDefinition, TableError,
    TableHandle, WriteTransaction,
};

const COLLECTION_PREFIX: &str = "coll:";

pub(crate) const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("meta:sequences");
pub(crate) const DEADLINES: TableDefinition<(&str, &[u8]), u64> =
    TableDefinition::new("meta:expiry");

pub(crate) type RecordTable<'n> = TableDefinition<'n, &'static [u8], &'static [u8]>;

/// Why a transaction was abandoned
///
/// Accessor operations turn this into exactly one `StoreError` variant.
#[derive(Debug)]
pub(crate) enum Abort {
    Conflict,
    MissingCollection,
    MissingKey,
    Engine(redb::Error),
}

impl fmt::Display for Abort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Abort::Conflict => f.write_str("key already present"),
            Abort::MissingCollection => f.write_str("collection does not exist"),
            Abort::MissingKey => f.write_str("key does not exist"),
            Abort::Engine(e) => write!(f, "{}", e),
        }
    }
}

impl From<redb::TransactionError> for Abort {
    fn from(e: redb::TransactionError) -> Self {
        Abort::Engine(e.into())
    }
}

impl From<TableError> for Abort {
    fn from(e: TableError) -> Self {
        Abort::Engine(e.into())
    }
}

impl From<StorageError> for Abort {
    fn from(e: StorageError) -> Self {
        Abort::Engine(e.into())
    }
}

impl From<redb::CommitError> for Abort {
    fn from(e: redb::CommitError) -> Self {
        Abort::Engine(e.into())
    }
}

/// Map a table-open failure, treating an absent table as a missing collection
pub(crate) fn missing_collection(e: TableError) -> Abort {
    match e {
        TableError::TableDoesNotExist(_) => Abort::MissingCollection,
        other => other.into(),
    }
}

/// Engine table name of a collection
pub(crate) fn table_name(collection: &str) -> String {
    format!("{}{}", COLLECTION_PREFIX, collection)
}

/// Collection name of an engine table, if it is a collection table
pub(crate) fn collection_name(table: &str) -> Option<&str> {
    table.strip_prefix(COLLECTION_PREFIX)
}

pub(crate) fn records(table: &str) -> RecordTable<'_> {
    TableDefinition::new(table)
}

// =============================================================================
// Clock
// =============================================================================

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| saturating_millis(d.as_millis()))
        .unwrap_or(0)
}

/// Deadline `ttl` from now, saturating at `u64::MAX`
///
/// Sub-millisecond remainders round up so a record never expires early.
pub(crate) fn deadline_after(ttl: Duration) -> u64 {
    let ttl_millis = saturating_millis((ttl.as_nanos() + 999_999) / 1_000_000);
    now_millis().saturating_add(ttl_millis)
}

fn saturating_millis(millis: u128) -> u64 {
    u64::try_from(millis).unwrap_or(u64::MAX)
}

/// A record without a deadline never expires
pub(crate) fn is_live(deadline: Option<u64>, now: u64) -> bool {
    deadline.map_or(true, |d| d > now)
}

// =============================================================================
// Lookups
// =============================================================================

pub(crate) fn has_table(txn: &WriteTransaction, table: &str) -> Result<bool, StorageError> {
    Ok(txn.list_tables()?.any(|handle| handle.name() == table))
}

pub(crate) fn deadline_of<T>(
    deadlines: &T,
    collection: &str,
    key: &[u8],
) -> Result<Option<u64>, StorageError>
where
    T: ReadableTable<(&'static str, &'static [u8]), u64>,
{
    Ok(deadlines.get((collection, key))?.map(|d| d.value()))
}

/// Deadline of a record as seen by a read transaction
pub(crate) fn read_deadline(
    txn: &ReadTransaction,
    collection: &str,
    key: &[u8],
) -> Result<Option<u64>, Abort> {
    match txn.open_table(DEADLINES) {
        Ok(deadlines) => Ok(deadline_of(&deadlines, collection, key)?),
        Err(TableError::TableDoesNotExist(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Bump and return the collection's sequence counter
pub(crate) fn next_sequence(txn: &WriteTransaction, collection: &str) -> Result<u64, Abort> {
    let mut sequences = txn.open_table(SEQUENCES)?;
    let next = sequences.get(collection)?.map(|last| last.value()).unwrap_or(0) + 1;
    sequences.insert(collection, next)?;
    Ok(next)
}

// =============================================================================
// Expiry
// =============================================================================

/// Remove one TTL record if its persisted deadline is still `deadline`
///
/// Returns `false` when there was nothing to do: the collection or record is
/// gone, or the key was re-inserted with a different deadline.
pub(crate) fn expire_record(
    db: &Database,
    collection: &str,
    key: &[u8],
    deadline: u64,
) -> Result<bool, redb::Error> {
    let txn = db.begin_write()?;
    let table = table_name(collection);
    if !has_table(&txn, &table)? {
        return Ok(false);
    }

    {
        let mut deadlines = txn.open_table(DEADLINES)?;
        if deadline_of(&deadlines, collection, key)? != Some(deadline) {
            return Ok(false);
        }
        deadlines.remove((collection, key))?;

        let mut records = txn.open_table(records(&table))?;
        records.remove(key)?;
    }

    txn.commit()?;
    Ok(true)
}

/// Remove every record whose deadline is at or before `now`
///
/// One write transaction; returns the number of records removed.
pub(crate) fn purge_expired(db: &Database, now: u64) -> Result<usize, redb::Error> {
    let txn = db.begin_write()?;
    let existing: HashSet<String> = txn
        .list_tables()?
        .map(|handle| handle.name().to_string())
        .collect();

    let mut purged = 0;
    {
        let mut deadlines = txn.open_table(DEADLINES)?;

        let mut overdue = Vec::new();
        for entry in deadlines.iter()? {
            let (record, deadline) = entry?;
            if deadline.value() <= now {
                let (collection, key) = record.value();
                overdue.push((collection.to_string(), key.to_vec()));
            }
        }

        for (collection, key) in &overdue {
            deadlines.remove((collection.as_str(), key.as_slice()))?;

            let table = table_name(collection);
            if !existing.contains(&table) {
                continue;
            }
            let mut records = txn.open_table(records(&table))?;
            if records.remove(key.as_slice())?.is_some() {
                purged += 1;
            }
        }
    }

    txn.commit()?;
    Ok(purged)
}

/// Forget every deadline of a collection (collection drop)
pub(crate) fn clear_deadlines(txn: &WriteTransaction, collection: &str) -> Result<usize, Abort> {
    let mut deadlines = txn.open_table(DEADLINES)?;

    let mut keys = Vec::new();
    for entry in deadlines.iter()? {
        let (record, _) = entry?;
        let (owner, key) = record.value();
        if owner == collection {
            keys.push(key.to_vec());
        }
    }

    for key in &keys {
        deadlines.remove((collection, key.as_slice()))?;
    }
    Ok(keys.len())
}
