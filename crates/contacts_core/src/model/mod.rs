//! Domain model for the contacts store.
//!
//! # Invariants
//! - A stored contact is identified by a storage-assigned positive `id`.
//! - Email addresses are unique across stored contacts.

pub mod contact;
