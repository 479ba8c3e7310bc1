//! Repository implementations.
//!
//! Repositories provide data access operations for entities and implement the
//! storage collaborators of the domain services.

pub mod copy_job;
pub mod excluded_schema;
pub mod host;
pub mod user;

pub use copy_job::CopyJobRepository;
pub use excluded_schema::ExcludedSchemaRepository;
pub use host::HostRepository;
pub use user::UserRepository;
