//! Core domain logic for the contacts service.
//! This crate owns storage, scoped transactions and contact use-cases.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{
    open_db, open_db_with_options, Database, DatabaseOptions, DbError, DbResult, Transaction,
    TransactionMode, TxError, TxResult,
};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status, LogSink};
pub use model::contact::{Contact, ContactId, NewContact};
pub use repo::contact_repo::{ContactRepository, RepoError, RepoResult, SqliteContactRepository};
pub use service::contact_service::{ContactService, ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
