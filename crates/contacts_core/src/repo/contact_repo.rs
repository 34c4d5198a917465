//! Contact repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide insert and lookup-by-email over the `contacts` table.
//! - Keep SQL details inside core persistence boundary.
//!
//! # Invariants
//! - Absence of a row is `Ok(None)`, not an error.
//! - A duplicate email is reported as `RepoError::Conflict`.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::contact::{Contact, ContactId, NewContact};
use rusqlite::{ffi, params, Connection, ErrorCode, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for contact persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// A contact with this email already exists.
    Conflict { email: String },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Conflict { email } => write!(f, "contact already exists: {email}"),
            Self::InvalidData(message) => write!(f, "invalid persisted contact data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Conflict { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for contact operations.
pub trait ContactRepository {
    /// Inserts a contact and returns the id storage assigned to it.
    fn insert_contact(&self, contact: &NewContact) -> RepoResult<ContactId>;
    /// Finds the contact registered under `email`.
    fn find_by_email(&self, email: &str) -> RepoResult<Option<Contact>>;
}

/// SQLite-backed contact repository.
///
/// Borrows a connection; pass a [`crate::db::Transaction`] to run inside a
/// scoped transaction.
pub struct SqliteContactRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteContactRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ContactRepository for SqliteContactRepository<'_> {
    fn insert_contact(&self, contact: &NewContact) -> RepoResult<ContactId> {
        let inserted = self.conn.query_row(
            "INSERT INTO contacts (email, name) VALUES (?1, ?2) RETURNING id;",
            params![contact.email.as_str(), contact.name.as_str()],
            |row| row.get::<_, ContactId>(0),
        );

        let id = match inserted {
            Ok(id) => id,
            Err(err) if is_unique_violation(&err) => {
                return Err(RepoError::Conflict {
                    email: contact.email.clone(),
                });
            }
            Err(err) => return Err(err.into()),
        };

        if id <= 0 {
            return Err(RepoError::InvalidData(format!(
                "storage assigned non-positive id `{id}` to contacts.id"
            )));
        }

        Ok(id)
    }

    fn find_by_email(&self, email: &str) -> RepoResult<Option<Contact>> {
        self.conn
            .query_row(
                "SELECT id, email, name FROM contacts WHERE email = ?1;",
                [email],
                parse_contact_row,
            )
            .optional()?
            .map(validate_contact)
            .transpose()
    }
}

fn parse_contact_row(row: &Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get("id")?,
        email: row.get("email")?,
        name: row.get("name")?,
    })
}

fn validate_contact(contact: Contact) -> RepoResult<Contact> {
    if contact.id <= 0 {
        return Err(RepoError::InvalidData(format!(
            "invalid id `{}` in contacts.id",
            contact.id
        )));
    }
    Ok(contact)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && (failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    || failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}
