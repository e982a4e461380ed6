//! Bearer tokens: random, handed out once, stored only as a SHA-256 digest.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rand::Rng;
use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};

use crate::error::{Result, ServiceError};

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex_encode(&bytes)
}

fn digest(token: &str) -> String {
    hex_encode(&Sha256::digest(token.as_bytes()))
}

pub fn issue(conn: &Connection, user_id: &str, ttl_minutes: i64) -> Result<IssuedToken> {
    issue_at(conn, user_id, ttl_minutes, Utc::now())
}

fn issue_at(
    conn: &Connection,
    user_id: &str,
    ttl_minutes: i64,
    now: DateTime<Utc>,
) -> Result<IssuedToken> {
    let expires_at = Duration::try_minutes(ttl_minutes)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| {
            ServiceError::Internal(format!("token ttl of {ttl_minutes} minutes is out of range"))
        })?;
    let token = generate_token();
    conn.execute(
        "INSERT INTO auth_tokens(token_hash, user_id, issued_at, expires_at) VALUES(?, ?, ?, ?)",
        (
            digest(&token),
            user_id,
            now.to_rfc3339_opts(SecondsFormat::Secs, true),
            expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
    )?;
    Ok(IssuedToken { token, expires_at })
}

/// Returns the user id the token was issued to.
pub fn verify(conn: &Connection, token: &str) -> Result<String> {
    verify_at(conn, token, Utc::now())
}

fn verify_at(conn: &Connection, token: &str, now: DateTime<Utc>) -> Result<String> {
    let token_hash = digest(token.trim());
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT user_id, expires_at FROM auth_tokens WHERE token_hash = ?",
            [&token_hash],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;

    let Some((user_id, expires_at)) = row else {
        return Err(ServiceError::Unauthorized("invalid token".into()));
    };

    let expires_at = DateTime::parse_from_rfc3339(&expires_at)
        .map_err(|_| ServiceError::Unauthorized("invalid token".into()))?
        .with_timezone(&Utc);
    if expires_at <= now {
        conn.execute("DELETE FROM auth_tokens WHERE token_hash = ?", [&token_hash])?;
        return Err(ServiceError::Unauthorized("token expired".into()));
    }
    Ok(user_id)
}

pub fn revoke(conn: &Connection, token: &str) -> Result<bool> {
    let n = conn.execute(
        "DELETE FROM auth_tokens WHERE token_hash = ?",
        [digest(token.trim())],
    )?;
    Ok(n > 0)
}

/// Drops every token of `user_id` except `keep`.
pub fn revoke_others(conn: &Connection, user_id: &str, keep: &str) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM auth_tokens WHERE user_id = ? AND token_hash <> ?",
        (user_id, digest(keep.trim())),
    )?)
}

pub fn purge_expired(conn: &Connection) -> Result<usize> {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    Ok(conn.execute("DELETE FROM auth_tokens WHERE expires_at <= ?", [now])?)
}
