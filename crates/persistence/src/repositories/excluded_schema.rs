//! Excluded schema repository.

use async_trait::async_trait;
use domain::services::ExclusionListSource;
use domain::DomainError;
use sqlx::PgPool;
use std::collections::HashSet;

use crate::metrics::QueryTimer;

/// Repository for the list of schemas that are never copied.
#[derive(Clone)]
pub struct ExcludedSchemaRepository {
    pool: PgPool,
}

impl ExcludedSchemaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn names(&self) -> Result<Vec<String>, sqlx::Error> {
        let timer = QueryTimer::new("list_excluded_schemas");
        let result = sqlx::query_scalar::<_, String>("SELECT name FROM excluded_schemas")
            .fetch_all(&self.pool)
            .await;
        timer.record();
        result
    }
}

#[async_trait]
impl ExclusionListSource for ExcludedSchemaRepository {
    async fn excluded_schema_names(&self) -> Result<HashSet<String>, DomainError> {
        let names = self.names().await.map_err(DomainError::storage)?;
        Ok(names.into_iter().collect())
    }
}
