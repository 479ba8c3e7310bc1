//! Command line front end of the DB copy backend.
//!
//! Reads configuration, wires the domain services to the metadata store and
//! the managed MySQL servers, and exposes the job operations as subcommands.

pub mod app;
pub mod commands;
pub mod config;
pub mod logging;
