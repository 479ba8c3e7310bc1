//! Domain models for DB copy jobs.

pub mod copy_job;
pub mod host;
pub mod job_status;
pub mod transfer_log;
pub mod user;

pub use copy_job::{CopyJob, CopyJobDraft};
pub use host::{Host, TargetGroup};
pub use job_status::{JobState, JobStatusReport, RawStatus, TableState};
pub use transfer_log::{JobSnapshot, TransferAggregate, TransferLog, TransferLogView};
pub use user::ActingUser;
