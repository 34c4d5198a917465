//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls inside scoped transactions.
//! - Keep HTTP layers decoupled from storage details.

pub mod contact_service;
