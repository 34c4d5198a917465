//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Own the storage handle shared by every request.
//! - Configure connection pragmas required by core behavior.
//! - Trigger schema migrations before returning a usable handle.
//!
//! # Invariants
//! - Every connection handed to a transaction has `foreign_keys=ON` and the
//!   configured busy timeout.
//! - The database file runs in WAL mode, so readers keep a stable snapshot
//!   while a writer is active.
//! - Per-transaction connections never create the database file; a missing
//!   store is a connection failure.
//! - The store is a named file. In-memory and anonymous temporary databases
//!   are private to one connection, so they are refused at open.
//! - Schema upgrades run under `BEGIN IMMEDIATE`, so concurrent opens of the
//!   same file migrate it once.

use super::migrations;
use super::{DbError, DbResult};
use log::{error, info, warn};
use rusqlite::{Connection, OpenFlags, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables applied to every connection opened by a [`Database`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseOptions {
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

/// Handle to the contacts store.
///
/// Holds no open connection between transactions: each `read`/`write` call
/// opens its own connection, so the handle is `Send + Sync` and can be shared
/// behind an `Arc` by concurrent requests.
#[derive(Debug)]
pub struct Database {
    path: PathBuf,
    options: DatabaseOptions,
    closed: AtomicBool,
}

/// Opens (creating if needed) a SQLite database file and applies all pending
/// migrations, using default options.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Database> {
    open_db_with_options(path, DatabaseOptions::default())
}

/// Opens (creating if needed) a SQLite database file and applies all pending
/// migrations.
///
/// # Side effects
/// - Switches the file to WAL journaling.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db_with_options(
    path: impl AsRef<Path>,
    options: DatabaseOptions,
) -> DbResult<Database> {
    let path = path.as_ref().to_path_buf();
    let started_at = Instant::now();
    info!("event=db_open module=db status=start path={}", path.display());

    if is_ephemeral(&path) {
        error!("event=db_open module=db status=error error_code=db_path_ephemeral");
        return Err(DbError::EphemeralPath {
            path: path.display().to_string(),
        });
    }

    let mut conn = match Connection::open(&path) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_database(&mut conn, &options) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(Database {
                path,
                options,
                closed: AtomicBool::new(false),
            })
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

impl Database {
    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Opens a fresh, configured connection to the store.
    ///
    /// Fails with [`DbError::Closed`] after `close`, and with a SQLite error
    /// when the file is gone or unreadable.
    pub fn connect(&self) -> DbResult<Connection> {
        if self.is_closed() {
            return Err(DbError::Closed);
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_URI;
        let conn = Connection::open_with_flags(&self.path, flags)?;
        configure_connection(&conn, &self.options)?;
        Ok(conn)
    }

    /// Tears the handle down.
    ///
    /// Checkpoints the WAL into the main file and rejects every later
    /// transaction with a connection error. Calling it twice is harmless.
    pub fn close(&self) -> DbResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        configure_connection(&conn, &self.options)?;
        if let Err(err) = conn.query_row("PRAGMA wal_checkpoint(TRUNCATE);", [], |_| Ok(())) {
            warn!("event=db_close module=db status=error error_code=checkpoint_failed error={err}");
        }
        conn.close().map_err(|(_, err)| DbError::Sqlite(err))?;

        info!("event=db_close module=db status=ok path={}", self.path.display());
        Ok(())
    }
}

fn configure_connection(conn: &Connection, options: &DatabaseOptions) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(options.busy_timeout)?;
    Ok(())
}

fn bootstrap_database(conn: &mut Connection, options: &DatabaseOptions) -> DbResult<()> {
    configure_connection(conn, options)?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    migrate_schema(conn)
}

fn migrate_schema(conn: &mut Connection) -> DbResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let from_version = migrations::current_user_version(&tx)?;
    let latest = migrations::latest_version();

    if from_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }
    if from_version == latest {
        return Ok(());
    }

    migrations::apply_pending(&tx, from_version)?;
    tx.commit()?;
    info!("event=db_migrate module=db status=ok from_version={from_version} to_version={latest}");
    Ok(())
}

/// Whether `path` opens a database no second connection can see.
fn is_ephemeral(path: &Path) -> bool {
    let Some(text) = path.to_str() else {
        return false;
    };
    let text = text.trim();
    if text.is_empty() || text == ":memory:" {
        return true;
    }
    match text.strip_prefix("file:") {
        Some(uri) => {
            let (location, query) = uri.split_once('?').unwrap_or((uri, ""));
            location.is_empty()
                || location == ":memory:"
                || query
                    .split('&')
                    .any(|pair| pair == "mode=memory" || pair == "vfs=memdb")
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::is_ephemeral;
    use std::path::Path;

    #[test]
    fn ephemeral_paths_are_detected() {
        for path in [
            "",
            "  ",
            ":memory:",
            "file::memory:",
            "file::memory:?cache=shared",
            "file:contacts?mode=memory&cache=shared",
            "file:/contacts.db?vfs=memdb",
            "file:",
        ] {
            assert!(is_ephemeral(Path::new(path)), "{path:?} should be ephemeral");
        }
    }

    #[test]
    fn file_paths_are_not_ephemeral() {
        for path in [
            "contacts.db",
            "/var/lib/contacts/contacts.db",
            "file:contacts.db",
            "file:contacts.db?mode=rwc",
            "./:memory:",
        ] {
            assert!(!is_ephemeral(Path::new(path)), "{path:?} should be a file");
        }
    }
}
