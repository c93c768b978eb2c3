//! Session management: access/refresh token pairs backed by Postgres.
//!
//! ARCHITECTURE
//! ============
//! A session is a short-lived access token plus a long-lived refresh token,
//! both handed to the browser as HttpOnly cookies. Only SHA-256 digests are
//! stored, so a leaked `sessions` table cannot be replayed.
//!
//! TRADE-OFFS
//! ==========
//! Refresh is destructive (`DELETE ... RETURNING`) and rotates both tokens
//! inside one transaction; a refresh token works exactly once, which favors
//! replay safety over tolerance of two tabs refreshing at the same instant.

use std::fmt::Write;

use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Postgres, Row};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::SessionConfig;

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Digest stored in place of a token.
#[must_use]
pub(crate) fn hash_token(token: &str) -> String {
    bytes_to_hex(&Sha256::digest(token.as_bytes()))
}

/// A freshly minted token pair. The plain tokens exist only here and in the
/// cookies built from them.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: OffsetDateTime,
    pub refresh_expires_at: OffsetDateTime,
}

/// User row returned from session validation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SessionUser {
    /// Unique user identifier; the owner id attached to bookmarks.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    pub email: Option<String>,
    /// Avatar image URL, if available.
    pub avatar_url: Option<String>,
}

async fn insert_session<'e, E>(executor: E, user_id: Uuid, config: &SessionConfig) -> Result<SessionTokens, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let now = OffsetDateTime::now_utc();
    let tokens = SessionTokens {
        user_id,
        access_token: generate_token(),
        refresh_token: generate_token(),
        expires_at: now + config.access_ttl,
        refresh_expires_at: now + config.refresh_ttl,
    };

    sqlx::query(
        "INSERT INTO sessions (token_hash, refresh_hash, user_id, expires_at, refresh_expires_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(hash_token(&tokens.access_token))
    .bind(hash_token(&tokens.refresh_token))
    .bind(user_id)
    .bind(tokens.expires_at)
    .bind(tokens.refresh_expires_at)
    .execute(executor)
    .await?;

    Ok(tokens)
}

/// Create a session for the given user.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn create_session(pool: &PgPool, user_id: Uuid, config: &SessionConfig) -> Result<SessionTokens, sqlx::Error> {
    insert_session(pool, user_id, config).await
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> SessionUser {
    SessionUser {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        avatar_url: row.get("avatar_url"),
    }
}

/// Validate an access token and return the associated user.
/// Expired or unknown tokens yield `Ok(None)`.
///
/// # Errors
///
/// Returns a database error if the lookup fails.
pub async fn validate_session(pool: &PgPool, token: &str) -> Result<Option<SessionUser>, sqlx::Error> {
    let row = sqlx::query(
        r"SELECT u.id, u.name, u.email, u.avatar_url
          FROM sessions s
          JOIN users u ON u.id = s.user_id
          WHERE s.token_hash = $1 AND s.expires_at > now()",
    )
    .bind(hash_token(token))
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(user_from_row))
}

/// Trade a refresh token for a new token pair. The old pair stops working.
/// Expired or unknown refresh tokens yield `Ok(None)`.
///
/// # Errors
///
/// Returns a database error if any statement fails; the rotation is rolled
/// back in that case.
pub async fn refresh_session(
    pool: &PgPool,
    refresh_token: &str,
    config: &SessionConfig,
) -> Result<Option<(SessionTokens, SessionUser)>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let consumed = sqlx::query(
        "DELETE FROM sessions WHERE refresh_hash = $1 AND refresh_expires_at > now() RETURNING user_id",
    )
    .bind(hash_token(refresh_token))
    .fetch_optional(&mut *tx)
    .await?;
    let Some(consumed) = consumed else {
        return Ok(None);
    };
    let user_id: Uuid = consumed.get("user_id");

    let tokens = insert_session(&mut *tx, user_id, config).await?;
    let user = sqlx::query("SELECT id, name, email, avatar_url FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(Some((tokens, user_from_row(&user))))
}

/// Delete the session matching either token. The refresh cookie outlives
/// the access cookie, so logout may only have the refresh token left.
/// Returns the number of sessions removed.
///
/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn delete_session(
    pool: &PgPool,
    access_token: Option<&str>,
    refresh_token: Option<&str>,
) -> Result<u64, sqlx::Error> {
    if access_token.is_none() && refresh_token.is_none() {
        return Ok(0);
    }
    let result = sqlx::query("DELETE FROM sessions WHERE token_hash = $1 OR refresh_hash = $2")
        .bind(access_token.map(hash_token))
        .bind(refresh_token.map(hash_token))
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
