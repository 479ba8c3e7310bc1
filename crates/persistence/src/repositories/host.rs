//! Host registry repository for database operations.

use async_trait::async_trait;
use domain::models::{Host, TargetGroup};
use domain::services::HostDirectory;
use domain::DomainError;
use shared::HostAddress;
use sqlx::PgPool;
use tracing::warn;

use crate::entities::{HostEntity, TargetGroupMemberEntity};
use crate::metrics::QueryTimer;

/// Repository for the host registry.
#[derive(Clone)]
pub struct HostRepository {
    pool: PgPool,
}

impl HostRepository {
    /// Creates a new HostRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a host by name and port. Names compare case-insensitively.
    pub async fn find_by_address(
        &self,
        name: &str,
        port: u16,
    ) -> Result<Option<HostEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_host_by_address");
        let result = sqlx::query_as::<_, HostEntity>(
            r#"
            SELECT h.id, h.name, h.port, h.mysql_user, h.virtual_machine, h.mysqld_file_owner,
                   h.active,
                   COALESCE(
                       ARRAY_AGG(g.group_name::TEXT ORDER BY g.group_name)
                           FILTER (WHERE g.group_name IS NOT NULL),
                       ARRAY[]::TEXT[]
                   ) AS groups
            FROM hosts h
            LEFT JOIN host_groups g ON g.host_id = h.id
            WHERE LOWER(h.name) = LOWER($1) AND h.port = $2
            GROUP BY h.id
            "#,
        )
        .bind(name)
        .bind(i32::from(port))
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Hosts whose name contains `fragment`, ordered by name and port.
    pub async fn search(
        &self,
        fragment: &str,
        active_only: bool,
    ) -> Result<Vec<HostEntity>, sqlx::Error> {
        let timer = QueryTimer::new("search_hosts");
        let result = sqlx::query_as::<_, HostEntity>(
            r#"
            SELECT h.id, h.name, h.port, h.mysql_user, h.virtual_machine, h.mysqld_file_owner,
                   h.active,
                   COALESCE(
                       ARRAY_AGG(g.group_name::TEXT ORDER BY g.group_name)
                           FILTER (WHERE g.group_name IS NOT NULL),
                       ARRAY[]::TEXT[]
                   ) AS groups
            FROM hosts h
            LEFT JOIN host_groups g ON g.host_id = h.id
            WHERE STRPOS(LOWER(h.name), LOWER($1)) > 0
              AND ($2 = FALSE OR h.active)
            GROUP BY h.id
            ORDER BY h.name, h.port
            "#,
        )
        .bind(fragment)
        .bind(active_only)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Members of every target group, ordered by group then host.
    pub async fn target_group_members(&self) -> Result<Vec<TargetGroupMemberEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_target_group_members");
        let result = sqlx::query_as::<_, TargetGroupMemberEntity>(
            r#"
            SELECT tg.name AS group_name, h.name AS host_name, h.port
            FROM target_groups tg
            JOIN target_group_hosts tgh ON tgh.target_group_id = tg.id
            JOIN hosts h ON h.id = tgh.host_id
            ORDER BY tg.name, h.name, h.port
            "#,
        )
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}

fn to_host(entity: HostEntity) -> Option<Host> {
    let (name, port) = (entity.name.clone(), entity.port);
    let host = entity.into_host();
    if host.is_none() {
        warn!(host = %name, port = port, "Skipping host with invalid port");
    }
    host
}

/// Folds ordered member rows into groups, keeping the row order.
pub fn group_members(rows: Vec<TargetGroupMemberEntity>) -> Vec<TargetGroup> {
    let mut groups: Vec<TargetGroup> = Vec::new();
    for row in rows {
        let Some(port) = u16::try_from(row.port).ok().filter(|p| *p > 0) else {
            continue;
        };
        let address = HostAddress::new(row.host_name, port);
        match groups.last_mut() {
            Some(group) if group.name == row.group_name => group.hosts.push(address),
            _ => groups.push(TargetGroup {
                name: row.group_name,
                hosts: vec![address],
            }),
        }
    }
    groups
}

#[async_trait]
impl HostDirectory for HostRepository {
    async fn find_host(&self, address: &HostAddress) -> Result<Option<Host>, DomainError> {
        let entity = self
            .find_by_address(address.name(), address.port())
            .await
            .map_err(DomainError::storage)?;
        Ok(entity.and_then(to_host))
    }

    async fn search_hosts(
        &self,
        name_fragment: &str,
        active_only: bool,
    ) -> Result<Vec<Host>, DomainError> {
        let rows = self
            .search(name_fragment, active_only)
            .await
            .map_err(DomainError::storage)?;
        Ok(rows.into_iter().filter_map(to_host).collect())
    }

    async fn target_groups(&self) -> Result<Vec<TargetGroup>, DomainError> {
        let rows = self
            .target_group_members()
            .await
            .map_err(DomainError::storage)?;
        Ok(group_members(rows))
    }
}
