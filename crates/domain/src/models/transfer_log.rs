//! Per-table transfer records written by the execution engine.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::copy_job::CopyJob;
use super::job_status::TableState;

/// One table transfer for one target host of a job.
///
/// Unique per (job, target host, schema, table). Only ever read here.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TransferLog {
    pub id: i64,
    pub job_id: String,
    pub target_host: String,
    pub table_schema: String,
    pub table_name: String,
    pub renamed_table_schema: String,
    pub target_directory: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub size: Option<i64>,
    pub retries: Option<i32>,
    pub message: Option<String>,
}

impl TransferLog {
    pub fn is_running(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// A transfer log row together with its derived table state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TransferLogView {
    #[serde(flatten)]
    pub log: TransferLog,
    pub table_state: TableState,
}

/// Transfer log counts of one job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferAggregate {
    /// All transfer logs of the job.
    pub total: u64,
    /// Logs without an end timestamp.
    pub running: u64,
}

impl TransferAggregate {
    pub fn new(total: u64, running: u64) -> Self {
        Self {
            total,
            running: running.min(total),
        }
    }

    pub fn from_logs(logs: &[TransferLog]) -> Self {
        let running = logs.iter().filter(|l| l.is_running()).count() as u64;
        Self::new(logs.len() as u64, running)
    }

    pub fn done(&self) -> u64 {
        self.total - self.running
    }

    pub fn has_logs(&self) -> bool {
        self.total > 0
    }

    pub fn has_running(&self) -> bool {
        self.running > 0
    }
}

/// A job row and its transfer aggregate, read together so both describe the
/// same moment.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub job: CopyJob,
    pub transfers: TransferAggregate,
}
