//! Embedded schema migrations.
//!
//! Entry `n` of [`MIGRATIONS`] upgrades the schema to version `n + 1`; the
//! reached version is stamped into `PRAGMA user_version`. Never reorder or
//! edit a shipped entry, only append.

use rusqlite::Connection;

const MIGRATIONS: [&str; 1] = [include_str!("0001_contacts.sql")];

/// Schema version produced by the last embedded migration.
pub fn latest_version() -> u32 {
    MIGRATIONS.len() as u32
}

/// Reads the schema version stamped on the database.
pub fn current_user_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}

/// Runs every migration above `from` on `conn`, stamping each version.
///
/// The caller owns the surrounding transaction.
pub(crate) fn apply_pending(conn: &Connection, from: u32) -> rusqlite::Result<()> {
    for (sql, version) in MIGRATIONS.iter().zip(1u32..).skip(from as usize) {
        conn.execute_batch(sql)?;
        conn.pragma_update(None, "user_version", version)?;
    }
    Ok(())
}
