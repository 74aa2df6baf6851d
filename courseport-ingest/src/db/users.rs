//! User storage
//!
//! Only what the importer needs: resolve a teacher reference to a user id,
//! creating the account on first sight.

use courseport_common::Result;
use sqlx::SqlitePool;

/// Find a user by login name, creating one when missing
pub async fn get_or_create(
    pool: &SqlitePool,
    username: &str,
    email: Option<&str>,
    role: &str,
) -> Result<i64> {
    let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let result = sqlx::query("INSERT INTO users (username, email, role) VALUES (?, ?, ?)")
        .bind(username)
        .bind(email.unwrap_or(""))
        .bind(role)
        .execute(pool)
        .await?;

    tracing::debug!(username = %username, role = %role, "Created user");

    Ok(result.last_insert_rowid())
}
