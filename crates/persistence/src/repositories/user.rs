//! User and group membership repository.

use async_trait::async_trait;
use domain::services::MembershipProvider;
use domain::DomainError;
use sqlx::PgPool;
use std::collections::HashSet;

use crate::entities::UserEntity;
use crate::metrics::QueryTimer;

/// Repository for accounts and their identity-provider groups.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find an active user by user name.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_username");
        let result = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT id, username, email, is_superuser, is_active
            FROM users
            WHERE username = $1 AND is_active = true
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn group_names(&self, username: &str) -> Result<Vec<String>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_groups");
        let result = sqlx::query_scalar::<_, String>(
            r#"
            SELECT g.group_name
            FROM user_groups g
            JOIN users u ON u.id = g.user_id
            WHERE u.username = $1 AND u.is_active = true
            "#,
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    async fn require(&self, username: &str) -> Result<UserEntity, DomainError> {
        self.find_by_username(username)
            .await
            .map_err(DomainError::storage)?
            .ok_or_else(|| DomainError::NotFound(format!("user {}", username)))
    }
}

#[async_trait]
impl MembershipProvider for UserRepository {
    async fn groups_of(&self, username: &str) -> Result<HashSet<String>, DomainError> {
        let names = self
            .group_names(username)
            .await
            .map_err(DomainError::storage)?;
        Ok(names.into_iter().collect())
    }

    async fn is_superuser(&self, username: &str) -> Result<bool, DomainError> {
        Ok(self.require(username).await?.is_superuser)
    }

    async fn email_of(&self, username: &str) -> Result<Option<String>, DomainError> {
        let user = self.require(username).await?;
        Ok(user.email.filter(|e| !e.trim().is_empty()))
    }
}
