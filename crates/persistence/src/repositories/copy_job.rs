//! Copy job repository for database operations.

use async_trait::async_trait;
use domain::models::{CopyJob, JobSnapshot, TransferLog};
use domain::services::{CopyJobStore, EquivalenceQuery};
use domain::DomainError;
use sqlx::PgPool;

use crate::entities::{join_list, CopyJobEntity, TransferLogEntity};
use crate::metrics::QueryTimer;

/// Job columns plus the transfer counts, evaluated in the same statement so
/// both describe the same moment.
const JOB_SELECT: &str = r#"
    SELECT
        j.job_id, j.source_host, j.target_hosts, j.include_schemas, j.exclude_schemas,
        j.include_tables, j.exclude_tables, j.target_names, j.target_directory,
        j.skip_optimize, j.wipe_target, j.convert_innodb, j.dry_run, j.email_list,
        j.username, j.status, j.submitted_at, j.started_at, j.ended_at,
        (SELECT COUNT(*) FROM transfer_logs t WHERE t.job_id = j.job_id) AS total_transfers,
        (SELECT COUNT(*) FROM transfer_logs t WHERE t.job_id = j.job_id AND t.ended_at IS NULL) AS running_transfers
    FROM copy_jobs j
"#;

/// Repository for copy job database operations.
#[derive(Clone)]
pub struct CopyJobRepository {
    pool: PgPool,
}

impl CopyJobRepository {
    /// Creates a new CopyJobRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new job. Status and timestamps other than submission are
    /// left to the execution engine.
    pub async fn insert(&self, job: &CopyJob) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("insert_copy_job");
        let target_hosts: Vec<String> = job.target_hosts.iter().map(ToString::to_string).collect();
        let result = sqlx::query(
            r#"
            INSERT INTO copy_jobs (
                job_id, source_host, target_hosts, include_schemas, exclude_schemas,
                include_tables, exclude_tables, target_names, target_directory,
                skip_optimize, wipe_target, convert_innodb, dry_run, email_list,
                username, submitted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(&job.job_id)
        .bind(job.source_host.to_string())
        .bind(join_list(&target_hosts))
        .bind(join_list(&job.include_schemas))
        .bind(join_list(&job.exclude_schemas))
        .bind(join_list(&job.include_tables))
        .bind(join_list(&job.exclude_tables))
        .bind(join_list(&job.target_names))
        .bind(&job.target_directory)
        .bind(job.skip_optimize)
        .bind(job.wipe_target)
        .bind(job.convert_innodb)
        .bind(job.dry_run)
        .bind(join_list(&job.email_list))
        .bind(&job.username)
        .bind(job.submitted_at)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|_| ())
    }

    pub async fn find_by_id(&self, job_id: &str) -> Result<Option<CopyJobEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_copy_job_by_id");
        let sql = format!("{} WHERE j.job_id = $1", JOB_SELECT);
        let result = sqlx::query_as::<_, CopyJobEntity>(&sql)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Jobs whose supplied fields equal the query, compared case-insensitively.
    ///
    /// Target hosts are stored in submission order and compared as a set, so
    /// that field is left to the caller.
    pub async fn find_equivalent(
        &self,
        query: &EquivalenceQuery,
    ) -> Result<Vec<CopyJobEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_equivalent_copy_jobs");
        let sql = format!(
            r#"{}
            WHERE ($1::text IS NULL OR LOWER(j.source_host) = $1)
              AND ($2::text IS NULL OR LOWER(j.include_schemas) = $2)
              AND ($3::text IS NULL OR LOWER(j.exclude_schemas) = $3)
              AND ($4::text IS NULL OR LOWER(j.include_tables) = $4)
              AND ($5::text IS NULL OR LOWER(j.exclude_tables) = $5)
              AND ($6::text IS NULL OR LOWER(j.target_names) = $6)
            ORDER BY j.submitted_at DESC
            "#,
            JOB_SELECT
        );
        let result = sqlx::query_as::<_, CopyJobEntity>(&sql)
            .bind(&query.source_host)
            .bind(&query.include_schemas)
            .bind(&query.exclude_schemas)
            .bind(&query.include_tables)
            .bind(&query.exclude_tables)
            .bind(&query.target_names)
            .fetch_all(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Jobs newest first, optionally restricted to one submitter.
    pub async fn list(&self, username: Option<&str>) -> Result<Vec<CopyJobEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_copy_jobs");
        let sql = format!(
            "{} WHERE ($1::text IS NULL OR j.username = $1) ORDER BY j.submitted_at DESC",
            JOB_SELECT
        );
        let result = sqlx::query_as::<_, CopyJobEntity>(&sql)
            .bind(username)
            .fetch_all(&self.pool)
            .await;
        timer.record();
        result
    }

    pub async fn transfer_logs(&self, job_id: &str) -> Result<Vec<TransferLogEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_transfer_logs");
        let result = sqlx::query_as::<_, TransferLogEntity>(
            r#"
            SELECT id, job_id, target_host, table_schema, table_name, renamed_table_schema,
                   target_directory, started_at, ended_at, size, retries, message
            FROM transfer_logs
            WHERE job_id = $1
            ORDER BY target_host, table_schema, table_name
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Delete a job; its transfer logs go with it.
    pub async fn delete(&self, job_id: &str) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_copy_job");
        let result = sqlx::query("DELETE FROM copy_jobs WHERE job_id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await;
        timer.record();
        Ok(result?.rows_affected() > 0)
    }
}

fn entity_to_snapshot(entity: CopyJobEntity) -> Result<JobSnapshot, DomainError> {
    let job_id = entity.job_id.clone();
    JobSnapshot::try_from(entity)
        .map_err(|e| DomainError::Storage(format!("job {} has an invalid host: {}", job_id, e)))
}

#[async_trait]
impl CopyJobStore for CopyJobRepository {
    async fn insert(&self, job: &CopyJob) -> Result<(), DomainError> {
        CopyJobRepository::insert(self, job)
            .await
            .map_err(DomainError::storage)
    }

    async fn find(&self, job_id: &str) -> Result<Option<JobSnapshot>, DomainError> {
        self.find_by_id(job_id)
            .await
            .map_err(DomainError::storage)?
            .map(entity_to_snapshot)
            .transpose()
    }

    async fn find_equivalent(
        &self,
        query: &EquivalenceQuery,
    ) -> Result<Vec<JobSnapshot>, DomainError> {
        let rows = CopyJobRepository::find_equivalent(self, query)
            .await
            .map_err(DomainError::storage)?;
        let mut snapshots = Vec::with_capacity(rows.len());
        for row in rows {
            let snapshot = entity_to_snapshot(row)?;
            if query.matches(&snapshot.job) {
                snapshots.push(snapshot);
            }
        }
        Ok(snapshots)
    }

    async fn list(&self, username: Option<&str>) -> Result<Vec<JobSnapshot>, DomainError> {
        CopyJobRepository::list(self, username)
            .await
            .map_err(DomainError::storage)?
            .into_iter()
            .map(entity_to_snapshot)
            .collect()
    }

    async fn transfer_logs(&self, job_id: &str) -> Result<Vec<TransferLog>, DomainError> {
        let rows = CopyJobRepository::transfer_logs(self, job_id)
            .await
            .map_err(DomainError::storage)?;
        Ok(rows.into_iter().map(TransferLog::from).collect())
    }

    async fn delete(&self, job_id: &str) -> Result<bool, DomainError> {
        CopyJobRepository::delete(self, job_id)
            .await
            .map_err(DomainError::storage)
    }
}
