use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool, Row};
use time::OffsetDateTime;

use crate::db::{with_timeout, StoreError};
use crate::tokens::hash_plaintext;
use crate::users::password::validate_password_plaintext;
use crate::validator::{is_valid_email, Validator};

/// A registered account. The password hash and the version counter never
/// appear in JSON responses.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub activated: bool,
    #[serde(skip_serializing)]
    pub version: i32,
}

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(
        is_valid_email(email),
        "email",
        "must be a valid email address",
    );
}

/// Validates the profile fields plus the plaintext password, which is only
/// available transiently at registration.
pub fn validate_user(v: &mut Validator, user: &User, password_plaintext: &str) {
    v.check(!user.name.is_empty(), "name", "must be provided");
    v.check(
        user.name.len() <= 500,
        "name",
        "must not be more than 500 bytes long",
    );
    validate_email(v, &user.email);
    validate_password_plaintext(v, password_plaintext);
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: &mut User) -> Result<(), StoreError>;
    async fn get_by_email(&self, email: &str) -> Result<User, StoreError>;

    /// Version-checked update. A stale version surfaces as
    /// [`StoreError::EditConflict`].
    async fn update(&self, user: &mut User) -> Result<(), StoreError>;

    /// Resolves a bearer token plaintext to its owner, constrained to the
    /// given scope and to unexpired tokens. "Never existed" and "expired"
    /// are deliberately indistinguishable: both are a plain not-found.
    async fn get_for_token(&self, scope: &str, plaintext: &str) -> Result<User, StoreError>;
}

pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: &mut User) -> Result<(), StoreError> {
        let row = with_timeout(
            sqlx::query(
                r#"
                INSERT INTO users (name, email, password_hash, activated)
                VALUES ($1, $2, $3, $4)
                RETURNING id, created_at, version
                "#,
            )
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.activated)
            .fetch_one(&self.db),
        )
        .await?;

        user.id = row.try_get("id").map_err(StoreError::from)?;
        user.created_at = row.try_get("created_at").map_err(StoreError::from)?;
        user.version = row.try_get("version").map_err(StoreError::from)?;
        Ok(())
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        let user = with_timeout(
            sqlx::query_as::<_, User>(
                r#"
                SELECT id, created_at, name, email, password_hash, activated, version
                FROM users
                WHERE email = $1
                "#,
            )
            .bind(email)
            .fetch_one(&self.db),
        )
        .await?;
        Ok(user)
    }

    async fn update(&self, user: &mut User) -> Result<(), StoreError> {
        let version = with_timeout(
            sqlx::query_scalar::<_, i32>(
                r#"
                UPDATE users
                SET name = $1, email = $2, password_hash = $3, activated = $4,
                    version = version + 1
                WHERE id = $5 AND version = $6
                RETURNING version
                "#,
            )
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.activated)
            .bind(user.id)
            .bind(user.version)
            .fetch_one(&self.db),
        )
        .await
        .map_err(|err| match err {
            // The row exists but the version moved on (or the row vanished);
            // either way the caller must re-fetch and retry.
            StoreError::NotFound => StoreError::EditConflict,
            other => other,
        })?;

        user.version = version;
        Ok(())
    }

    async fn get_for_token(&self, scope: &str, plaintext: &str) -> Result<User, StoreError> {
        let hash = hash_plaintext(plaintext);
        let user = with_timeout(
            sqlx::query_as::<_, User>(
                r#"
                SELECT users.id, users.created_at, users.name, users.email,
                       users.password_hash, users.activated, users.version
                FROM users
                INNER JOIN tokens ON users.id = tokens.user_id
                WHERE tokens.hash = $1
                  AND tokens.scope = $2
                  AND tokens.expiry > $3
                "#,
            )
            .bind(&hash)
            .bind(scope)
            .bind(OffsetDateTime::now_utc())
            .fetch_one(&self.db),
        )
        .await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: 0,
            created_at: OffsetDateTime::now_utc(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "$argon2id$fake".to_string(),
            activated: false,
            version: 0,
        }
    }

    #[test]
    fn valid_user_passes() {
        let mut v = Validator::new();
        validate_user(&mut v, &sample_user(), "long-enough-password");
        assert!(v.valid());
    }

    #[test]
    fn missing_fields_are_reported_per_field() {
        let mut user = sample_user();
        user.name.clear();
        user.email = "nope".to_string();

        let mut v = Validator::new();
        validate_user(&mut v, &user, "short");
        let errors = v.into_errors();
        assert_eq!(errors.get("name").map(String::as_str), Some("must be provided"));
        assert_eq!(
            errors.get("email").map(String::as_str),
            Some("must be a valid email address")
        );
        assert_eq!(
            errors.get("password").map(String::as_str),
            Some("must be at least 8 bytes long")
        );
    }

    #[test]
    fn serialization_hides_credentials_and_version() {
        let json = serde_json::to_value(sample_user()).expect("serialize");
        let object = json.as_object().expect("object");
        assert!(object.contains_key("email"));
        assert!(!object.contains_key("password_hash"));
        assert!(!object.contains_key("version"));
    }
}
