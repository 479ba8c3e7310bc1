//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod copy_job;
pub mod host;
pub mod transfer_log;
pub mod user;

pub use copy_job::{join_list, CopyJobEntity};
pub use host::{HostEntity, TargetGroupMemberEntity};
pub use transfer_log::TransferLogEntity;
pub use user::UserEntity;
