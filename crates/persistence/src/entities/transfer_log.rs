//! Transfer log entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::TransferLog;
use sqlx::FromRow;

/// Database row mapping for the transfer_logs table.
#[derive(Debug, Clone, FromRow)]
pub struct TransferLogEntity {
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

impl From<TransferLogEntity> for TransferLog {
    fn from(entity: TransferLogEntity) -> Self {
        Self {
            id: entity.id,
            job_id: entity.job_id,
            target_host: entity.target_host,
            table_schema: entity.table_schema,
            table_name: entity.table_name,
            renamed_table_schema: entity.renamed_table_schema,
            target_directory: entity.target_directory,
            started_at: entity.started_at,
            ended_at: entity.ended_at,
            size: entity.size,
            retries: entity.retries,
            message: entity.message,
        }
    }
}
