//! In-memory collaborators for tests and local wiring.

use async_trait::async_trait;
use shared::HostAddress;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::DomainError;
use crate::models::{
    CopyJob, Host, JobSnapshot, TargetGroup, TransferAggregate, TransferLog,
};
use crate::services::access_control::{HostDirectory, MembershipProvider};
use crate::services::conflict::EquivalenceQuery;
use crate::services::copy_jobs::CopyJobStore;
use crate::services::schema_introspection::{ExclusionListSource, SchemaSource, SourceError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct MockServer {
    schemas: BTreeMap<String, Vec<String>>,
    unreachable: bool,
    delay: Option<Duration>,
}

/// Schema source backed by a fixed set of servers.
#[derive(Debug, Default)]
pub struct MockSchemaSource {
    servers: HashMap<HostAddress, MockServer>,
}

impl MockSchemaSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a server without schemas.
    pub fn with_host(mut self, host: HostAddress) -> Self {
        self.servers.entry(host).or_default();
        self
    }

    pub fn with_schema(mut self, host: HostAddress, schema: &str, tables: &[&str]) -> Self {
        self.servers
            .entry(host)
            .or_default()
            .schemas
            .insert(
                schema.to_string(),
                tables.iter().map(|t| t.to_string()).collect(),
            );
        self
    }

    pub fn with_unreachable(mut self, host: HostAddress) -> Self {
        self.servers.entry(host).or_default().unreachable = true;
        self
    }

    /// Make every call against `host` take `delay`.
    pub fn with_delay(mut self, host: HostAddress, delay: Duration) -> Self {
        self.servers.entry(host).or_default().delay = Some(delay);
        self
    }

    async fn server(&self, host: &HostAddress) -> Result<&MockServer, SourceError> {
        let server = self
            .servers
            .get(host)
            .ok_or_else(|| SourceError::HostNotFound {
                host: host.to_string(),
            })?;
        if let Some(delay) = server.delay {
            tokio::time::sleep(delay).await;
        }
        if server.unreachable {
            return Err(SourceError::Unreachable {
                host: host.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(server)
    }
}

#[async_trait]
impl SchemaSource for MockSchemaSource {
    async fn enumerate_schemas(&self, host: &HostAddress) -> Result<Vec<String>, SourceError> {
        let server = self.server(host).await?;
        Ok(server.schemas.keys().cloned().collect())
    }

    async fn enumerate_tables(
        &self,
        host: &HostAddress,
        schema: &str,
    ) -> Result<Vec<String>, SourceError> {
        let server = self.server(host).await?;
        server
            .schemas
            .get(schema)
            .cloned()
            .ok_or_else(|| SourceError::SchemaNotFound {
                host: host.to_string(),
                schema: schema.to_string(),
            })
    }
}

/// Excluded-schema list that counts how often it is read.
#[derive(Debug, Default)]
pub struct MockExclusionList {
    names: Mutex<HashSet<String>>,
    loads: AtomicUsize,
}

impl MockExclusionList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: Mutex::new(names.into_iter().map(Into::into).collect()),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn replace<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *lock(&self.names) = names.into_iter().map(Into::into).collect();
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExclusionListSource for MockExclusionList {
    async fn excluded_schema_names(&self) -> Result<HashSet<String>, DomainError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.names).clone())
    }
}

#[derive(Debug, Default)]
pub struct MockHostDirectory {
    hosts: Vec<Host>,
    groups: Vec<TargetGroup>,
}

impl MockHostDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, mut host: Host) -> Self {
        host.id = self.hosts.len() as i64 + 1;
        self.hosts.push(host);
        self
    }

    /// Add a target group. Members that are not valid `host:port` strings are skipped.
    pub fn with_group(mut self, name: &str, members: &[&str]) -> Self {
        self.groups.push(TargetGroup {
            name: name.to_string(),
            hosts: members.iter().filter_map(|m| m.parse().ok()).collect(),
        });
        self
    }
}

#[async_trait]
impl HostDirectory for MockHostDirectory {
    async fn find_host(&self, address: &HostAddress) -> Result<Option<Host>, DomainError> {
        Ok(self.hosts.iter().find(|h| &h.address == address).cloned())
    }

    async fn search_hosts(
        &self,
        name_fragment: &str,
        active_only: bool,
    ) -> Result<Vec<Host>, DomainError> {
        let fragment = name_fragment.to_lowercase();
        Ok(self
            .hosts
            .iter()
            .filter(|h| !active_only || h.active)
            .filter(|h| h.address.name().contains(&fragment))
            .cloned()
            .collect())
    }

    async fn target_groups(&self) -> Result<Vec<TargetGroup>, DomainError> {
        Ok(self.groups.clone())
    }
}

#[derive(Debug, Clone, Default)]
struct MockAccount {
    groups: HashSet<String>,
    email: Option<String>,
    is_superuser: bool,
}

/// Membership provider over a fixed set of accounts. Unknown users have no
/// groups and no privileges.
#[derive(Debug, Default)]
pub struct MockMembership {
    accounts: HashMap<String, MockAccount>,
}

impl MockMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, username: &str, groups: &[&str], email: Option<&str>) -> Self {
        self.accounts.insert(
            username.to_string(),
            MockAccount {
                groups: groups.iter().map(|g| g.to_string()).collect(),
                email: email.map(str::to_string),
                is_superuser: false,
            },
        );
        self
    }

    pub fn with_superuser(mut self, username: &str) -> Self {
        self.accounts
            .entry(username.to_string())
            .or_default()
            .is_superuser = true;
        self
    }

    fn account(&self, username: &str) -> MockAccount {
        self.accounts.get(username).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl MembershipProvider for MockMembership {
    async fn groups_of(&self, username: &str) -> Result<HashSet<String>, DomainError> {
        Ok(self.account(username).groups)
    }

    async fn is_superuser(&self, username: &str) -> Result<bool, DomainError> {
        Ok(self.account(username).is_superuser)
    }

    async fn email_of(&self, username: &str) -> Result<Option<String>, DomainError> {
        Ok(self.account(username).email)
    }
}

/// Job store kept in memory. Transfer counts are set explicitly with
/// [`MockCopyJobStore::put`] so tests can stage any engine state.
#[derive(Debug, Default)]
pub struct MockCopyJobStore {
    jobs: Mutex<Vec<JobSnapshot>>,
    logs: Mutex<Vec<TransferLog>>,
}

impl MockCopyJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a job together with its transfer counts.
    pub fn put(&self, job: CopyJob, transfers: TransferAggregate) {
        let mut jobs = lock(&self.jobs);
        jobs.retain(|s| s.job.job_id != job.job_id);
        jobs.push(JobSnapshot { job, transfers });
    }

    pub fn put_logs(&self, logs: Vec<TransferLog>) {
        lock(&self.logs).extend(logs);
    }

    /// Overwrite the raw status as the execution engine would.
    pub fn set_raw_status(&self, job_id: &str, raw_status: Option<&str>, transfers: TransferAggregate) {
        let mut jobs = lock(&self.jobs);
        if let Some(snapshot) = jobs.iter_mut().find(|s| s.job.job_id == job_id) {
            snapshot.job.raw_status = raw_status.map(str::to_string);
            snapshot.transfers = transfers;
        }
    }

    pub fn get(&self, job_id: &str) -> Option<CopyJob> {
        lock(&self.jobs)
            .iter()
            .find(|s| s.job.job_id == job_id)
            .map(|s| s.job.clone())
    }

    pub fn len(&self) -> usize {
        lock(&self.jobs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CopyJobStore for MockCopyJobStore {
    async fn insert(&self, job: &CopyJob) -> Result<(), DomainError> {
        let mut jobs = lock(&self.jobs);
        if jobs.iter().any(|s| s.job.job_id == job.job_id) {
            return Err(DomainError::Storage(format!(
                "duplicate job id {}",
                job.job_id
            )));
        }
        jobs.push(JobSnapshot {
            job: job.clone(),
            transfers: TransferAggregate::default(),
        });
        Ok(())
    }

    async fn find(&self, job_id: &str) -> Result<Option<JobSnapshot>, DomainError> {
        Ok(lock(&self.jobs)
            .iter()
            .find(|s| s.job.job_id == job_id)
            .cloned())
    }

    async fn find_equivalent(
        &self,
        query: &EquivalenceQuery,
    ) -> Result<Vec<JobSnapshot>, DomainError> {
        Ok(lock(&self.jobs)
            .iter()
            .filter(|s| query.matches(&s.job))
            .cloned()
            .collect())
    }

    async fn list(&self, username: Option<&str>) -> Result<Vec<JobSnapshot>, DomainError> {
        let mut jobs: Vec<JobSnapshot> = lock(&self.jobs)
            .iter()
            .filter(|s| username.map_or(true, |u| s.job.username == u))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.job.submitted_at.cmp(&a.job.submitted_at));
        Ok(jobs)
    }

    async fn transfer_logs(&self, job_id: &str) -> Result<Vec<TransferLog>, DomainError> {
        Ok(lock(&self.logs)
            .iter()
            .filter(|l| l.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, job_id: &str) -> Result<bool, DomainError> {
        let mut jobs = lock(&self.jobs);
        let before = jobs.len();
        jobs.retain(|s| s.job.job_id != job_id);
        lock(&self.logs).retain(|l| l.job_id != job_id);
        Ok(jobs.len() != before)
    }
}
