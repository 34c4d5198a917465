//! Contact use-case service.
//!
//! # Responsibility
//! - Provide add and lookup entry points for HTTP callers.
//! - Choose the transaction mode for each use-case.
//!
//! # Invariants
//! - Every storage access goes through `Database::read`/`Database::write`.
//! - Duplicate emails surface as `ServiceError::Conflict`, never as a
//!   transport error.

use crate::db::{Database, TxError};
use crate::model::contact::{Contact, NewContact};
use crate::repo::contact_repo::{ContactRepository, RepoError, SqliteContactRepository};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error for contact use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Another contact already uses this email.
    Conflict { email: String },
    /// Scoped transaction failure (connection, begin, commit, panic).
    Tx(TxError),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conflict { email } => write!(f, "contact already exists: {email}"),
            Self::Tx(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Conflict { .. } => None,
            Self::Tx(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<TxError> for ServiceError {
    fn from(value: TxError) -> Self {
        Self::Tx(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Conflict { email } => Self::Conflict { email },
            other => Self::Repo(other),
        }
    }
}

/// Contact service facade over the shared database handle.
///
/// Cheap to clone; clones share the same handle.
#[derive(Debug, Clone)]
pub struct ContactService {
    db: Arc<Database>,
}

impl ContactService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Inserts a contact in a write transaction and returns it with its id.
    pub fn add_contact(&self, contact: NewContact) -> ServiceResult<Contact> {
        let id = self.db.write(|tx| -> ServiceResult<_> {
            Ok(SqliteContactRepository::new(tx).insert_contact(&contact)?)
        })?;

        info!("event=contact_add module=service status=ok contact_id={id}");
        Ok(contact.into_contact(id))
    }

    /// Looks a contact up by email in a read-only transaction.
    ///
    /// Returns `Ok(None)` when no contact uses `email`.
    pub fn get_contact_by_email(&self, email: &str) -> ServiceResult<Option<Contact>> {
        self.db.read(|tx| -> ServiceResult<_> {
            Ok(SqliteContactRepository::new(tx).find_by_email(email)?)
        })
    }
}
