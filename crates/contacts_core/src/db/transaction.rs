//! Connection-bound transactions and the errors raised while running them.
//!
//! # Invariants
//! - Read transactions run on a `query_only` connection and pin their WAL
//!   snapshot at begin, so they neither write nor observe concurrent
//!   uncommitted (or later-committed) writes.
//! - Write transactions take the write lock up front (`BEGIN IMMEDIATE`).
//! - Resolution (`commit`/`rollback`) consumes the transaction.

use super::DbError;
use rusqlite::{Connection, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::Deref;

pub type TxResult<T> = Result<T, TxError>;

/// Whether a transaction may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

impl TransactionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnly => "read",
            Self::ReadWrite => "write",
        }
    }
}

impl Display for TransactionMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures produced by scoped transaction execution itself, as opposed to
/// failures returned by the caller's callback.
#[derive(Debug)]
pub enum TxError {
    /// The store could not be reached when opening the transaction.
    Connection(DbError),
    /// The connection opened but the transaction could not start.
    Begin {
        mode: TransactionMode,
        source: rusqlite::Error,
    },
    /// The callback succeeded but the commit did not.
    Commit(rusqlite::Error),
    /// The callback panicked with a payload that was not a typed error.
    Panicked(String),
}

impl Display for TxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection(err) => write!(f, "unable to open storage connection: {err}"),
            Self::Begin { mode, source } => {
                write!(f, "unable to begin {mode} transaction: {source}")
            }
            Self::Commit(err) => write!(f, "transaction commit failed: {err}"),
            Self::Panicked(message) => write!(f, "transaction callback panicked: {message}"),
        }
    }
}

impl Error for TxError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Connection(err) => Some(err),
            Self::Begin { source, .. } => Some(source),
            Self::Commit(err) => Some(err),
            Self::Panicked(_) => None,
        }
    }
}

impl From<DbError> for TxError {
    fn from(value: DbError) -> Self {
        Self::Connection(value)
    }
}

/// An open transaction handed to scoped-execution callbacks.
///
/// Dereferences to [`rusqlite::Connection`] so callbacks can run
/// parameterized statements directly.
pub struct Transaction<'conn> {
    inner: rusqlite::Transaction<'conn>,
    mode: TransactionMode,
}

impl Transaction<'_> {
    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    pub(crate) fn commit(self) -> rusqlite::Result<()> {
        self.inner.commit()
    }

    pub(crate) fn rollback(self) -> rusqlite::Result<()> {
        self.inner.rollback()
    }
}

impl Deref for Transaction<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.inner
    }
}

/// Starts a read-only transaction on `conn`.
///
/// The connection is switched to `query_only` first; it should not be reused
/// for writes afterwards.
pub fn begin_read(conn: &mut Connection) -> TxResult<Transaction<'_>> {
    let mode = TransactionMode::ReadOnly;
    let begin_error = |source| TxError::Begin { mode, source };

    conn.pragma_update(None, "query_only", true)
        .map_err(begin_error)?;
    let inner = conn
        .transaction_with_behavior(TransactionBehavior::Deferred)
        .map_err(begin_error)?;
    // A deferred transaction takes its snapshot on first read; read now so
    // every statement the callback runs sees the same state.
    inner
        .query_row("SELECT COUNT(*) FROM sqlite_master;", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(begin_error)?;

    Ok(Transaction { inner, mode })
}

/// Starts a read-write transaction on `conn`, taking the write lock.
pub fn begin_write(conn: &mut Connection) -> TxResult<Transaction<'_>> {
    let mode = TransactionMode::ReadWrite;
    let inner = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|source| TxError::Begin { mode, source })?;

    Ok(Transaction { inner, mode })
}
