//! Domain services.

pub mod access_control;
pub mod conflict;
pub mod copy_jobs;
pub mod job_validator;
pub mod mock;
pub mod notification;
pub mod schema_introspection;
pub mod status;

pub use access_control::{
    can_target, resolve_user, AccessControl, HostDirectory, MembershipProvider, TargetCheck,
};
pub use conflict::{ConflictDetector, EquivalenceQuery};
pub use copy_jobs::{CopyJobService, CopyJobStore, JobListFilter, JobSummary};
pub use job_validator::{
    FieldIssue, FieldWarning, IssueKind, JobValidator, Validation, ValidationReport, WarningKind,
};
pub use notification::{notification_recipients, NotificationSettings};
pub use schema_introspection::{
    ExcludedSchemaCache, ExclusionListSource, IntrospectionError, SchemaIntrospector,
    SchemaSource, SourceError,
};
pub use status::{derive_job_state, derive_table_state, progress_percent, status_report};
