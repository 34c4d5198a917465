//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repositories never open or resolve transactions; they run on whatever
//!   connection or transaction the caller hands them.
//! - Uniqueness violations surface as `RepoError::Conflict`, distinct from
//!   transport errors.

pub mod contact_repo;
