//! Domain layer for the DB copy backend.
//!
//! This crate contains:
//! - Domain models (copy jobs, transfer logs, hosts, users)
//! - The request validation pipeline and the status state machine
//! - Collaborator traits (schema enumeration, storage, group membership)
//! - Domain error types

pub mod error;
pub mod models;
pub mod services;

pub use error::DomainError;
