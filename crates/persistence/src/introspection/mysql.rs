//! Live schema enumeration against managed MySQL servers.

use async_trait::async_trait;
use domain::models::Host;
use domain::services::{HostDirectory, SchemaSource, SourceError};
use shared::HostAddress;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{ConnectOptions, Connection};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::metrics::{record_introspection, QueryTimer};

/// Connection settings shared by every managed server. The account name
/// comes from the host registry.
#[derive(Debug, Clone)]
pub struct MysqlIntrospectionConfig {
    pub password: Option<String>,
    pub connect_timeout: Duration,
}

/// [`SchemaSource`] that connects to the server registered for an address
/// and reads `information_schema`.
#[derive(Clone)]
pub struct MysqlSchemaSource {
    hosts: Arc<dyn HostDirectory>,
    config: MysqlIntrospectionConfig,
}

impl MysqlSchemaSource {
    pub fn new(hosts: Arc<dyn HostDirectory>, config: MysqlIntrospectionConfig) -> Self {
        Self { hosts, config }
    }

    async fn registered(&self, address: &HostAddress) -> Result<Host, SourceError> {
        let host = self.hosts.find_host(address).await.map_err(|e| SourceError::Unreachable {
            host: address.to_string(),
            reason: e.to_string(),
        })?;
        host.ok_or_else(|| SourceError::HostNotFound {
            host: address.to_string(),
        })
    }

    async fn connect(&self, host: &Host) -> Result<MySqlConnection, SourceError> {
        let mut options = MySqlConnectOptions::new()
            .host(host.address.name())
            .port(host.address.port())
            .username(&host.mysql_user)
            .disable_statement_logging();
        if let Some(password) = &self.config.password {
            options = options.password(password);
        }

        match tokio::time::timeout(self.config.connect_timeout, options.connect()).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => {
                record_introspection("connect_failed");
                Err(unreachable(&host.address, e))
            }
            Err(_) => {
                record_introspection("connect_timeout");
                Err(SourceError::Unreachable {
                    host: host.address.to_string(),
                    reason: format!(
                        "connection not established within {}s",
                        self.config.connect_timeout.as_secs()
                    ),
                })
            }
        }
    }
}

fn unreachable(address: &HostAddress, err: sqlx::Error) -> SourceError {
    SourceError::Unreachable {
        host: address.to_string(),
        reason: err.to_string(),
    }
}

/// Logs a failed connection close. The lookup result is kept either way.
/// Returns true when the connection closed cleanly.
fn log_close(address: &HostAddress, outcome: Result<(), sqlx::Error>) -> bool {
    match outcome {
        Ok(()) => true,
        Err(e) => {
            record_introspection("close_failed");
            debug!(host = %address, error = %e, "Failed to close introspection connection");
            false
        }
    }
}

#[async_trait]
impl SchemaSource for MysqlSchemaSource {
    async fn enumerate_schemas(&self, address: &HostAddress) -> Result<Vec<String>, SourceError> {
        let host = self.registered(address).await?;
        let mut conn = self.connect(&host).await?;

        let timer = QueryTimer::new("mysql_list_schemas");
        let names = sqlx::query_scalar::<_, String>(
            "SELECT CAST(SCHEMA_NAME AS CHAR) FROM information_schema.SCHEMATA",
        )
        .fetch_all(&mut conn)
        .await
        .map_err(|e| unreachable(address, e));
        timer.record();
        log_close(address, conn.close().await);

        let names = names?;
        record_introspection("ok");
        debug!(host = %address, count = names.len(), "Enumerated schemas");
        Ok(names)
    }

    async fn enumerate_tables(
        &self,
        address: &HostAddress,
        schema: &str,
    ) -> Result<Vec<String>, SourceError> {
        let host = self.registered(address).await?;
        let mut conn = self.connect(&host).await?;

        let timer = QueryTimer::new("mysql_list_tables");
        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM information_schema.SCHEMATA WHERE SCHEMA_NAME = ?",
        )
        .bind(schema)
        .fetch_one(&mut conn)
        .await;
        let tables = match exists {
            Ok(0) => None,
            Ok(_) => Some(
                sqlx::query_scalar::<_, String>(
                    r#"
                    SELECT CAST(TABLE_NAME AS CHAR)
                    FROM information_schema.TABLES
                    WHERE TABLE_SCHEMA = ?
                    "#,
                )
                .bind(schema)
                .fetch_all(&mut conn)
                .await,
            ),
            Err(e) => Some(Err(e)),
        };
        timer.record();
        log_close(address, conn.close().await);

        match tables {
            None => Err(SourceError::SchemaNotFound {
                host: address.to_string(),
                schema: schema.to_string(),
            }),
            Some(result) => {
                let names = result.map_err(|e| unreachable(address, e))?;
                record_introspection("ok");
                debug!(host = %address, schema = %schema, count = names.len(), "Enumerated tables");
                Ok(names)
            }
        }
    }
}
