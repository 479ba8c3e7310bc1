//! Duplicate job detection.
//!
//! Two jobs are equivalent when every field supplied in an
//! [`EquivalenceQuery`] compares equal, ignoring case. Fields left out of the
//! query are not compared at all.
//!
//! The check-then-insert sequence is not serialized across requests. Two
//! identical submissions racing through validation can both be accepted; the
//! transfer log's unique (job, host, schema, table) key still keeps each table
//! from being processed twice within one job.

use serde::Serialize;
use shared::HostAddress;
use std::sync::Arc;

use crate::error::DomainError;
use crate::models::{CopyJob, JobSnapshot};
use crate::services::copy_jobs::CopyJobStore;
use crate::services::status::state_of;

/// Fields to compare when looking for equivalent jobs.
///
/// Each value holds the canonical (lower-cased, comma-joined) form of the
/// field. `Some("")` asks for jobs where the field is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EquivalenceQuery {
    pub source_host: Option<String>,
    pub include_schemas: Option<String>,
    pub exclude_schemas: Option<String>,
    pub include_tables: Option<String>,
    pub exclude_tables: Option<String>,
    /// Sorted, since target order does not change what a job does.
    pub target_hosts: Option<String>,
    pub target_names: Option<String>,
}

impl EquivalenceQuery {
    /// Query on every copy parameter of `job`.
    pub fn for_job(job: &CopyJob) -> Self {
        Self {
            source_host: Some(canonical_host(&job.source_host)),
            include_schemas: Some(canonical_list(&job.include_schemas)),
            exclude_schemas: Some(canonical_list(&job.exclude_schemas)),
            include_tables: Some(canonical_list(&job.include_tables)),
            exclude_tables: Some(canonical_list(&job.exclude_tables)),
            target_hosts: Some(canonical_hosts(&job.target_hosts)),
            target_names: Some(canonical_list(&job.target_names)),
        }
    }

    pub fn with_source_host(mut self, host: &HostAddress) -> Self {
        self.source_host = Some(canonical_host(host));
        self
    }

    pub fn with_include_schemas(mut self, names: &[String]) -> Self {
        self.include_schemas = Some(canonical_list(names));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.source_host.is_none()
            && self.include_schemas.is_none()
            && self.exclude_schemas.is_none()
            && self.include_tables.is_none()
            && self.exclude_tables.is_none()
            && self.target_hosts.is_none()
            && self.target_names.is_none()
    }

    pub fn matches(&self, job: &CopyJob) -> bool {
        fn field(wanted: &Option<String>, actual: impl FnOnce() -> String) -> bool {
            wanted.as_ref().map_or(true, |w| *w == actual())
        }

        field(&self.source_host, || canonical_host(&job.source_host))
            && field(&self.include_schemas, || canonical_list(&job.include_schemas))
            && field(&self.exclude_schemas, || canonical_list(&job.exclude_schemas))
            && field(&self.include_tables, || canonical_list(&job.include_tables))
            && field(&self.exclude_tables, || canonical_list(&job.exclude_tables))
            && field(&self.target_hosts, || canonical_hosts(&job.target_hosts))
            && field(&self.target_names, || canonical_list(&job.target_names))
    }
}

pub fn canonical_host(host: &HostAddress) -> String {
    host.to_string().to_lowercase()
}

pub fn canonical_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn canonical_hosts(hosts: &[HostAddress]) -> String {
    let mut names: Vec<String> = hosts.iter().map(canonical_host).collect();
    names.sort();
    names.dedup();
    names.join(",")
}

/// Finds existing jobs equivalent to a proposed one.
#[derive(Clone)]
pub struct ConflictDetector {
    store: Arc<dyn CopyJobStore>,
}

impl ConflictDetector {
    pub fn new(store: Arc<dyn CopyJobStore>) -> Self {
        Self { store }
    }

    pub async fn find_equivalent(
        &self,
        query: &EquivalenceQuery,
    ) -> Result<Vec<JobSnapshot>, DomainError> {
        if query.is_empty() {
            return Err(DomainError::InvalidQuery(
                "at least one field must be supplied".to_string(),
            ));
        }
        self.store.find_equivalent(query).await
    }

    /// An equivalent job of `job` that has not reached a terminal state.
    pub async fn find_active_duplicate(
        &self,
        job: &CopyJob,
    ) -> Result<Option<JobSnapshot>, DomainError> {
        let candidates = self.find_equivalent(&EquivalenceQuery::for_job(job)).await?;
        Ok(candidates
            .into_iter()
            .filter(|s| s.job.job_id != job.job_id)
            .find(|s| state_of(s).is_active()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CopyJobDraft, TransferAggregate};
    use crate::services::mock::MockCopyJobStore;
    use chrono::Utc;

    fn job(id: &str, source: &str, targets: &[&str], include: &[&str]) -> CopyJob {
        let draft = CopyJobDraft {
            include_schemas: include.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        CopyJob::from_draft(
            id.to_string(),
            &draft,
            source.parse().unwrap(),
            targets.iter().map(|t| t.parse().unwrap()).collect(),
            "jdoe",
            vec![],
            Utc::now(),
        )
    }

    #[test]
    fn test_for_job_matches_itself_ignoring_case_and_target_order() {
        let a = job("a", "host2:3306", &["host4:3306", "host3:3306"], &["DB1"]);
        let b = job("b", "HOST2:3306", &["host3:3306", "host4:3306"], &["db1"]);
        assert!(EquivalenceQuery::for_job(&a).matches(&b));
    }

    #[test]
    fn test_include_order_matters() {
        let a = job("a", "host2:3306", &["host3:3306"], &["db1", "db4"]);
        let b = job("b", "host2:3306", &["host3:3306"], &["db4", "db1"]);
        assert!(!EquivalenceQuery::for_job(&a).matches(&b));
    }

    #[test]
    fn test_unsupplied_fields_are_ignored() {
        let a = job("a", "host2:3306", &["host3:3306"], &["db1"]);
        let b = job("b", "host2:3306", &["host9:3306"], &["db7"]);
        let query = EquivalenceQuery::default().with_source_host(&a.source_host);
        assert!(query.matches(&b));

        let query = query.with_include_schemas(&a.include_schemas);
        assert!(!query.matches(&b));
    }

    #[test]
    fn test_empty_value_is_not_absence() {
        let a = job("a", "host2:3306", &["host3:3306"], &[]);
        let b = job("b", "host2:3306", &["host3:3306"], &["db1"]);
        let query = EquivalenceQuery::default().with_include_schemas(&a.include_schemas);
        assert_eq!(query.include_schemas.as_deref(), Some(""));
        assert!(query.matches(&a));
        assert!(!query.matches(&b));
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let detector = ConflictDetector::new(Arc::new(MockCopyJobStore::new()));
        let err = detector
            .find_equivalent(&EquivalenceQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_active_duplicate_ignores_terminal_jobs() {
        let store = Arc::new(MockCopyJobStore::new());
        let detector = ConflictDetector::new(store.clone());

        let mut done = job("done", "host2:3306", &["host3:3306"], &["db1"]);
        done.raw_status = Some("Transfer Ended".into());
        store.put(done, TransferAggregate::new(3, 0));

        let proposed = job("new", "host2:3306", &["host3:3306"], &["db1"]);
        assert!(detector
            .find_active_duplicate(&proposed)
            .await
            .unwrap()
            .is_none());

        let mut running = job("running", "host2:3306", &["host3:3306"], &["db1"]);
        running.raw_status = Some("Processing Requests".into());
        store.put(running, TransferAggregate::new(3, 1));

        let duplicate = detector.find_active_duplicate(&proposed).await.unwrap();
        assert_eq!(duplicate.unwrap().job.job_id, "running");
    }
}
