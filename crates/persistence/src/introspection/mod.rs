//! Schema introspection against managed servers.

pub mod mysql;

pub use mysql::{MysqlIntrospectionConfig, MysqlSchemaSource};
