//! Copy job entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{CopyJob, JobSnapshot, TransferAggregate};
use shared::validation::split_list;
use shared::{AddressError, HostAddress};
use sqlx::FromRow;

/// Database row mapping for the copy_jobs table, read together with the
/// transfer log counts of the job.
#[derive(Debug, Clone, FromRow)]
pub struct CopyJobEntity {
    pub job_id: String,
    pub source_host: String,
    pub target_hosts: String,
    pub include_schemas: String,
    pub exclude_schemas: String,
    pub include_tables: String,
    pub exclude_tables: String,
    pub target_names: String,
    pub target_directory: Option<String>,
    pub skip_optimize: bool,
    pub wipe_target: bool,
    pub convert_innodb: bool,
    pub dry_run: bool,
    pub email_list: String,
    pub username: String,
    pub status: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// All transfer logs of the job.
    pub total_transfers: i64,
    /// Transfer logs without an end timestamp.
    pub running_transfers: i64,
}

impl TryFrom<CopyJobEntity> for JobSnapshot {
    type Error = AddressError;

    fn try_from(entity: CopyJobEntity) -> Result<Self, Self::Error> {
        let source_host = entity.source_host.parse::<HostAddress>()?;
        let target_hosts = split_list(&entity.target_hosts)
            .iter()
            .map(|h| h.parse::<HostAddress>())
            .collect::<Result<Vec<_>, _>>()?;
        let transfers = TransferAggregate::new(
            entity.total_transfers.max(0) as u64,
            entity.running_transfers.max(0) as u64,
        );

        Ok(JobSnapshot {
            job: CopyJob {
                job_id: entity.job_id,
                source_host,
                target_hosts,
                include_schemas: split_list(&entity.include_schemas),
                exclude_schemas: split_list(&entity.exclude_schemas),
                include_tables: split_list(&entity.include_tables),
                exclude_tables: split_list(&entity.exclude_tables),
                target_names: split_list(&entity.target_names),
                target_directory: entity.target_directory,
                skip_optimize: entity.skip_optimize,
                wipe_target: entity.wipe_target,
                convert_innodb: entity.convert_innodb,
                dry_run: entity.dry_run,
                email_list: split_list(&entity.email_list),
                username: entity.username,
                raw_status: entity.status,
                submitted_at: entity.submitted_at,
                started_at: entity.started_at,
                ended_at: entity.ended_at,
            },
            transfers,
        })
    }
}

/// Joins a list field the way it is stored.
pub fn join_list<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|v| v.as_ref().trim())
        .collect::<Vec<_>>()
        .join(",")
}
