use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::{with_timeout, StoreError};

pub const MOVIES_READ: &str = "movies:read";
pub const MOVIES_WRITE: &str = "movies:write";

/// The set of permission codes held by one user.
#[derive(Debug, Clone, Default)]
pub struct Permissions(Vec<String>);

impl Permissions {
    pub fn includes(&self, code: &str) -> bool {
        self.0.iter().any(|c| c == code)
    }
}

impl From<Vec<String>> for Permissions {
    fn from(codes: Vec<String>) -> Self {
        Permissions(codes)
    }
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn all_for_user(&self, user_id: i64) -> Result<Permissions, StoreError>;

    /// Grants the given codes to the user. Codes missing from the permission
    /// catalog are silently not granted.
    async fn add_for_user(&self, user_id: i64, codes: &[&str]) -> Result<(), StoreError>;
}

pub struct PgPermissionStore {
    db: PgPool,
}

impl PgPermissionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PermissionStore for PgPermissionStore {
    async fn all_for_user(&self, user_id: i64) -> Result<Permissions, StoreError> {
        let codes = with_timeout(
            sqlx::query_scalar::<_, String>(
                r#"
                SELECT permissions.code
                FROM permissions
                INNER JOIN users_permissions ON users_permissions.permission_id = permissions.id
                WHERE users_permissions.user_id = $1
                "#,
            )
            .bind(user_id)
            .fetch_all(&self.db),
        )
        .await?;
        Ok(Permissions(codes))
    }

    async fn add_for_user(&self, user_id: i64, codes: &[&str]) -> Result<(), StoreError> {
        let codes: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        with_timeout(
            sqlx::query(
                r#"
                INSERT INTO users_permissions (user_id, permission_id)
                SELECT $1, permissions.id FROM permissions WHERE permissions.code = ANY($2)
                "#,
            )
            .bind(user_id)
            .bind(&codes)
            .execute(&self.db),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn includes_is_a_membership_test() {
        let perms = Permissions::from(vec![MOVIES_READ.to_string()]);
        assert!(perms.includes(MOVIES_READ));
        assert!(!perms.includes(MOVIES_WRITE));
    }

    #[test]
    fn empty_set_includes_nothing() {
        assert!(!Permissions::default().includes(MOVIES_READ));
    }
}
