//! Copy job domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::validation::split_list;
use shared::HostAddress;
use std::fmt;
use uuid::Uuid;

/// An unsaved copy request as submitted by a user.
///
/// List fields accept either one entry per element or comma-separated
/// entries; [`CopyJobDraft::normalized`] flattens both forms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct CopyJobDraft {
    pub source_host: String,
    pub target_hosts: Vec<String>,
    pub include_schemas: Vec<String>,
    pub exclude_schemas: Vec<String>,
    pub include_tables: Vec<String>,
    pub exclude_tables: Vec<String>,
    /// Target schema names, parallel to `include_schemas`.
    pub target_names: Vec<String>,
    pub skip_optimize: bool,
    pub wipe_target: bool,
    pub convert_innodb: bool,
    pub dry_run: bool,
    pub email_list: Vec<String>,
    /// Set when the submitter has seen the collision warnings and wants to go ahead.
    pub accept_warnings: bool,
}

impl CopyJobDraft {
    pub fn normalized(&self) -> Self {
        Self {
            source_host: self.source_host.trim().to_string(),
            target_hosts: normalize_list(&self.target_hosts),
            include_schemas: normalize_list(&self.include_schemas),
            exclude_schemas: normalize_list(&self.exclude_schemas),
            include_tables: normalize_list(&self.include_tables),
            exclude_tables: normalize_list(&self.exclude_tables),
            target_names: normalize_list(&self.target_names),
            email_list: normalize_list(&self.email_list),
            ..self.clone()
        }
    }

    pub fn is_renaming(&self) -> bool {
        !self.target_names.is_empty()
    }
}

fn normalize_list(values: &[String]) -> Vec<String> {
    split_list(&values.join(","))
}

/// A persisted copy job.
///
/// Copy parameters are written once at creation. The raw status and the
/// timestamps belong to the execution engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct CopyJob {
    pub job_id: String,
    pub source_host: HostAddress,
    pub target_hosts: Vec<HostAddress>,
    pub include_schemas: Vec<String>,
    pub exclude_schemas: Vec<String>,
    pub include_tables: Vec<String>,
    pub exclude_tables: Vec<String>,
    pub target_names: Vec<String>,
    pub target_directory: Option<String>,
    pub skip_optimize: bool,
    pub wipe_target: bool,
    pub convert_innodb: bool,
    pub dry_run: bool,
    pub email_list: Vec<String>,
    pub username: String,
    pub raw_status: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl CopyJob {
    pub fn generate_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Build a new, not yet started job from a validated draft.
    pub fn from_draft(
        job_id: String,
        draft: &CopyJobDraft,
        source_host: HostAddress,
        target_hosts: Vec<HostAddress>,
        username: &str,
        email_list: Vec<String>,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id,
            source_host,
            target_hosts,
            include_schemas: draft.include_schemas.clone(),
            exclude_schemas: draft.exclude_schemas.clone(),
            include_tables: draft.include_tables.clone(),
            exclude_tables: draft.exclude_tables.clone(),
            target_names: draft.target_names.clone(),
            target_directory: None,
            skip_optimize: draft.skip_optimize,
            wipe_target: draft.wipe_target,
            convert_innodb: draft.convert_innodb,
            dry_run: draft.dry_run,
            email_list,
            username: username.to_string(),
            raw_status: None,
            submitted_at,
            started_at: None,
            ended_at: None,
        }
    }

    /// Copy parameters of this job as a fresh draft, without identity,
    /// status, timestamps or recipients.
    pub fn to_draft(&self) -> CopyJobDraft {
        CopyJobDraft {
            source_host: self.source_host.to_string(),
            target_hosts: self.target_hosts.iter().map(ToString::to_string).collect(),
            include_schemas: self.include_schemas.clone(),
            exclude_schemas: self.exclude_schemas.clone(),
            include_tables: self.include_tables.clone(),
            exclude_tables: self.exclude_tables.clone(),
            target_names: self.target_names.clone(),
            skip_optimize: self.skip_optimize,
            wipe_target: self.wipe_target,
            convert_innodb: self.convert_innodb,
            dry_run: self.dry_run,
            email_list: Vec::new(),
            accept_warnings: false,
        }
    }
}

impl fmt::Display for CopyJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let first_target = self
            .target_hosts
            .first()
            .map(ToString::to_string)
            .unwrap_or_default();
        write!(
            f,
            "{}[{}]:{} -> {}",
            self.username, self.job_id, self.source_host, first_target
        )
    }
}
