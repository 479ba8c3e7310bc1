//! Persistence layer for the DB copy backend.
//!
//! This crate contains:
//! - Metadata store connection management and migrations
//! - Entity definitions (database row mappings)
//! - Repository implementations of the domain storage traits
//! - Live schema introspection of managed MySQL servers

pub mod db;
pub mod entities;
pub mod introspection;
pub mod metrics;
pub mod repositories;
