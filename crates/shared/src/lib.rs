//! Shared utilities and common types for the DB copy backend.
//!
//! This crate provides functionality used across all other crates:
//! - `host:port` address parsing
//! - SQL-wildcard name patterns compiled to regular expressions
//! - Common validation logic for comma-separated form fields

pub mod address;
pub mod pattern;
pub mod validation;

pub use address::{AddressError, HostAddress};
pub use pattern::{NamePattern, NamePatternSet, PatternError};
