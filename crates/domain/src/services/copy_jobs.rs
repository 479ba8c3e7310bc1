//! Copy job service: submission, status, listing and deletion.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::HostAddress;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::DomainError;
use crate::models::{
    ActingUser, CopyJob, CopyJobDraft, Host, JobSnapshot, JobState, JobStatusReport, RawStatus,
    TargetGroup, TransferLog, TransferLogView,
};
use crate::services::access_control::{resolve_user, AccessControl, MembershipProvider};
use crate::services::conflict::EquivalenceQuery;
use crate::services::job_validator::JobValidator;
use crate::services::notification::{notification_recipients, NotificationSettings};
use crate::services::schema_introspection::SchemaIntrospector;
use crate::services::status::{derive_table_state, state_of, status_report};

/// Persistent storage of copy jobs and their transfer logs.
///
/// Jobs are written once. There is no update operation: the raw status,
/// timestamps and transfer logs belong to the execution engine.
#[async_trait]
pub trait CopyJobStore: Send + Sync {
    async fn insert(&self, job: &CopyJob) -> Result<(), DomainError>;

    /// The job and its transfer counts, read together.
    async fn find(&self, job_id: &str) -> Result<Option<JobSnapshot>, DomainError>;

    async fn find_equivalent(
        &self,
        query: &EquivalenceQuery,
    ) -> Result<Vec<JobSnapshot>, DomainError>;

    /// Jobs, newest first, optionally restricted to one submitter.
    async fn list(&self, username: Option<&str>) -> Result<Vec<JobSnapshot>, DomainError>;

    async fn transfer_logs(&self, job_id: &str) -> Result<Vec<TransferLog>, DomainError>;

    /// Removes the job and its transfer logs. Returns false if it did not exist.
    async fn delete(&self, job_id: &str) -> Result<bool, DomainError>;
}

/// Filter for [`CopyJobService::list_jobs`].
#[derive(Debug, Clone, Default)]
pub struct JobListFilter {
    pub username: Option<String>,
    /// Derived state to keep.
    pub state: Option<JobState>,
}

/// One row of a job listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub job_id: String,
    pub username: String,
    pub source_host: HostAddress,
    pub target_hosts: Vec<HostAddress>,
    pub submitted_at: DateTime<Utc>,
    pub status: JobStatusReport,
}

impl JobSummary {
    fn from_snapshot(snapshot: &JobSnapshot) -> Self {
        Self {
            job_id: snapshot.job.job_id.clone(),
            username: snapshot.job.username.clone(),
            source_host: snapshot.job.source_host.clone(),
            target_hosts: snapshot.job.target_hosts.clone(),
            submitted_at: snapshot.job.submitted_at,
            status: status_report(snapshot),
        }
    }
}

/// Entry point for the operations offered to outer layers.
#[derive(Clone)]
pub struct CopyJobService {
    store: Arc<dyn CopyJobStore>,
    membership: Arc<dyn MembershipProvider>,
    validator: JobValidator,
    introspector: SchemaIntrospector,
    access: AccessControl,
    notification: NotificationSettings,
}

impl CopyJobService {
    pub fn new(
        store: Arc<dyn CopyJobStore>,
        membership: Arc<dyn MembershipProvider>,
        validator: JobValidator,
        introspector: SchemaIntrospector,
        access: AccessControl,
        notification: NotificationSettings,
    ) -> Self {
        Self {
            store,
            membership,
            validator,
            introspector,
            access,
            notification,
        }
    }

    pub async fn resolve_user(&self, username: &str) -> Result<ActingUser, DomainError> {
        resolve_user(self.membership.as_ref(), username).await
    }

    /// Validate `draft` and create the job.
    ///
    /// Rejected with the full report when any check fails, or when collision
    /// warnings were raised and the draft does not accept them.
    pub async fn submit(
        &self,
        draft: &CopyJobDraft,
        user: &ActingUser,
    ) -> Result<String, DomainError> {
        let validation = self.validator.validate(draft, user).await?;
        let report = validation.report;

        let mut job = match validation.job {
            Some(job) if !report.has_warnings() || draft.accept_warnings => job,
            _ => return Err(DomainError::Rejected(report)),
        };
        job.email_list = notification_recipients(&job.email_list, user, &self.notification);

        self.store.insert(&job).await?;
        info!(
            job_id = %job.job_id,
            user = %user.username,
            source = %job.source_host,
            targets = job.target_hosts.len(),
            warnings = report.warnings.len(),
            "Copy job submitted"
        );
        Ok(job.job_id)
    }

    pub async fn status_of(&self, job_id: &str) -> Result<JobStatusReport, DomainError> {
        let snapshot = self.snapshot(job_id).await?;
        Ok(status_report(&snapshot))
    }

    /// True if `user` submitted the job or is a superuser, and the engine is
    /// not in the middle of processing it.
    pub async fn can_delete(&self, job_id: &str, user: &ActingUser) -> Result<bool, DomainError> {
        let snapshot = self.snapshot(job_id).await?;
        Ok(may_delete(&snapshot.job, user))
    }

    pub async fn delete(&self, job_id: &str, user: &ActingUser) -> Result<(), DomainError> {
        let snapshot = self.snapshot(job_id).await?;
        if !may_delete(&snapshot.job, user) {
            warn!(job_id = %job_id, user = %user.username, "Refused to delete copy job");
            return Err(DomainError::NotDeletable(job_id.to_string()));
        }
        if !self.store.delete(job_id).await? {
            return Err(DomainError::NotFound(format!("job {}", job_id)));
        }
        info!(job_id = %job_id, user = %user.username, "Copy job deleted");
        Ok(())
    }

    /// A new draft carrying the copy parameters of an existing job.
    pub async fn resubmit(&self, job_id: &str) -> Result<CopyJobDraft, DomainError> {
        let snapshot = self.snapshot(job_id).await?;
        Ok(snapshot.job.to_draft())
    }

    pub async fn list_jobs(&self, filter: &JobListFilter) -> Result<Vec<JobSummary>, DomainError> {
        let snapshots = self.store.list(filter.username.as_deref()).await?;
        Ok(snapshots
            .iter()
            .filter(|s| filter.state.map_or(true, |wanted| state_of(s) == wanted))
            .map(JobSummary::from_snapshot)
            .collect())
    }

    /// Transfer logs of a job with their derived table state.
    pub async fn transfer_logs(&self, job_id: &str) -> Result<Vec<TransferLogView>, DomainError> {
        let snapshot = self.snapshot(job_id).await?;
        let raw = RawStatus::parse(snapshot.job.raw_status.as_deref());
        let logs = self.store.transfer_logs(job_id).await?;

        Ok(logs
            .into_iter()
            .map(|log| TransferLogView {
                table_state: derive_table_state(&log, &raw),
                log,
            })
            .collect())
    }

    pub async fn list_schemas(
        &self,
        host: &HostAddress,
        include: &[String],
        exclude: &[String],
    ) -> Result<BTreeSet<String>, DomainError> {
        Ok(self.introspector.list_schemas(host, include, exclude).await?)
    }

    /// Tables of the single schema in `schemas`.
    pub async fn list_tables(
        &self,
        host: &HostAddress,
        schemas: &[String],
        include: &[String],
        exclude: &[String],
    ) -> Result<BTreeSet<String>, DomainError> {
        let [schema] = schemas else {
            return Err(DomainError::InvalidQuery(format!(
                "tables can be listed for exactly one schema, got {}",
                schemas.len()
            )));
        };
        Ok(self
            .introspector
            .list_tables(host, schema, include, exclude)
            .await?)
    }

    pub async fn list_source_hosts(&self, pattern: &str) -> Result<Vec<Host>, DomainError> {
        self.access.list_source_hosts(pattern).await
    }

    pub async fn list_target_hosts(
        &self,
        user: &ActingUser,
        pattern: &str,
    ) -> Result<Vec<Host>, DomainError> {
        self.access.list_target_hosts(user, pattern).await
    }

    pub async fn target_groups_for(
        &self,
        user: &ActingUser,
    ) -> Result<Vec<TargetGroup>, DomainError> {
        self.access.target_groups_for(user).await
    }

    async fn snapshot(&self, job_id: &str) -> Result<JobSnapshot, DomainError> {
        self.store
            .find(job_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("job {}", job_id)))
    }
}

fn may_delete(job: &CopyJob, user: &ActingUser) -> bool {
    let owner = user.is_superuser || job.username == user.username;
    owner && !RawStatus::parse(job.raw_status.as_deref()).is_mid_execution()
}
