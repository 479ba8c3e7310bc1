//! User entity (database row mapping).

use sqlx::FromRow;

/// Database row mapping for the users table.
#[derive(Debug, Clone, FromRow)]
pub struct UserEntity {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub is_superuser: bool,
    pub is_active: bool,
}
