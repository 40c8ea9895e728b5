use async_trait::async_trait;
use data_encoding::BASE32_NOPAD;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};

use crate::db::{with_timeout, StoreError};
use crate::validator::Validator;

pub const SCOPE_ACTIVATION: &str = "activation";
pub const SCOPE_AUTHENTICATION: &str = "authentication";

/// Unpadded base-32 over 16 random bytes is always 26 characters.
pub const PLAINTEXT_LEN: usize = 26;

/// An opaque bearer token. The plaintext leaves the server exactly once, in
/// the response that created it; only the SHA-256 hash is ever persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip_serializing)]
    pub hash: Vec<u8>,
    #[serde(skip_serializing)]
    pub user_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub expiry: OffsetDateTime,
    #[serde(skip_serializing)]
    pub scope: String,
}

pub fn hash_plaintext(plaintext: &str) -> Vec<u8> {
    Sha256::digest(plaintext.as_bytes()).to_vec()
}

pub fn generate_token(user_id: i64, ttl: Duration, scope: &str) -> Token {
    let mut random_bytes = [0u8; 16];
    OsRng.fill_bytes(&mut random_bytes);

    let plaintext = BASE32_NOPAD.encode(&random_bytes);
    let hash = hash_plaintext(&plaintext);

    Token {
        plaintext,
        hash,
        user_id,
        expiry: OffsetDateTime::now_utc() + ttl,
        scope: scope.to_string(),
    }
}

pub fn validate_token_plaintext(v: &mut Validator, plaintext: &str) {
    v.check(!plaintext.is_empty(), "token", "must be provided");
    v.check(
        plaintext.len() == PLAINTEXT_LEN,
        "token",
        "must be 26 bytes long",
    );
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Generates a fresh token and persists its hash, returning the struct
    /// with the plaintext still attached for one-time transmission.
    async fn new_token(
        &self,
        user_id: i64,
        ttl: Duration,
        scope: &str,
    ) -> Result<Token, StoreError>;

    /// Bulk-revokes every token of the given scope held by the user.
    async fn delete_all_for_user(&self, scope: &str, user_id: i64) -> Result<(), StoreError>;
}

pub struct PgTokenStore {
    db: PgPool,
}

impl PgTokenStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn new_token(
        &self,
        user_id: i64,
        ttl: Duration,
        scope: &str,
    ) -> Result<Token, StoreError> {
        let token = generate_token(user_id, ttl, scope);
        with_timeout(
            sqlx::query(
                r#"
                INSERT INTO tokens (hash, user_id, expiry, scope)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(&token.hash)
            .bind(token.user_id)
            .bind(token.expiry)
            .bind(&token.scope)
            .execute(&self.db),
        )
        .await?;
        Ok(token)
    }

    async fn delete_all_for_user(&self, scope: &str, user_id: i64) -> Result<(), StoreError> {
        with_timeout(
            sqlx::query("DELETE FROM tokens WHERE scope = $1 AND user_id = $2")
                .bind(scope)
                .bind(user_id)
                .execute(&self.db),
        )
        .await?;
        Ok(())
    }
}
