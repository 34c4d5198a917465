//! SQLite storage bootstrap, schema migrations and scoped transactions.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the contacts store.
//! - Apply schema migrations in deterministic order.
//! - Run caller logic inside read/write transactions that are always
//!   resolved exactly once.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Core code must not read/write application data before migrations succeed.
//! - A `Transaction` never outlives the `Database::read`/`Database::write`
//!   call that opened it.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;
mod scoped;
mod transaction;

pub use open::{open_db, open_db_with_options, Database, DatabaseOptions};
pub use transaction::{begin_read, begin_write, Transaction, TransactionMode, TxError, TxResult};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// The path names an in-memory or anonymous temporary database.
    EphemeralPath { path: String },
    /// The handle was torn down with `Database::close`.
    Closed,
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::EphemeralPath { path } => write!(
                f,
                "database path `{path}` does not name a file; in-memory databases are not supported"
            ),
            Self::Closed => write!(f, "database handle is closed"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::EphemeralPath { .. } | Self::Closed => {
                None
            }
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
