//! Media library storage
//!
//! A media reference is either an absolute URL (registered on first use) or
//! the filename of an object already in the library. A filename that does
//! not resolve is an error; so is a source whose type falls outside the
//! caller's allowlist.

use courseport_common::{Error, Result};
use sqlx::SqlitePool;

/// Resolve a media reference to a library id
pub async fn resolve(
    pool: &SqlitePool,
    source: &str,
    allowed_mime: Option<&[&str]>,
) -> Result<i64> {
    let is_url = source.starts_with("http://") || source.starts_with("https://");
    let mime = guess_mime(source);

    if let Some(allowed) = allowed_mime {
        if !allowed.contains(&mime) {
            return Err(Error::InvalidInput(format!(
                "\"{}\" has type {} which is not allowed here",
                source, mime
            )));
        }
    }

    let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM media_items WHERE source = ?")
        .bind(source)
        .fetch_optional(pool)
        .await?;

    if let Some(id) = existing {
        return Ok(id);
    }

    if !is_url {
        // Plain filenames must already exist in the library
        return Err(Error::NotFound(format!(
            "\"{}\" is not in the media library",
            source
        )));
    }

    let result = sqlx::query("INSERT INTO media_items (source, mime) VALUES (?, ?)")
        .bind(source)
        .bind(mime)
        .execute(pool)
        .await?;

    Ok(result.last_insert_rowid())
}

/// Register a library file directly (used by fixtures and upload handling)
pub async fn register_file(pool: &SqlitePool, filename: &str, mime: &str) -> Result<i64> {
    let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM media_items WHERE source = ?")
        .bind(filename)
        .fetch_optional(pool)
        .await?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let result = sqlx::query("INSERT INTO media_items (source, mime) VALUES (?, ?)")
        .bind(filename)
        .bind(mime)
        .execute(pool)
        .await?;

    Ok(result.last_insert_rowid())
}

/// Guess a mime type from the file extension
pub fn guess_mime(source: &str) -> &'static str {
    let extension = source
        .rsplit('.')
        .next()
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn urls_register_on_first_use() {
        let pool = test_pool().await;
        let first = resolve(&pool, "https://cdn.example.com/cover.png", None)
            .await
            .unwrap();
        let second = resolve(&pool, "https://cdn.example.com/cover.png", None)
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unknown_filenames_are_an_error() {
        let pool = test_pool().await;
        let err = resolve(&pool, "missing.png", None).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn library_files_resolve_after_registration() {
        let pool = test_pool().await;
        let id = register_file(&pool, "cover.png", "image/png").await.unwrap();
        assert_eq!(resolve(&pool, "cover.png", None).await.unwrap(), id);
    }

    #[tokio::test]
    async fn mime_allowlist_is_enforced() {
        let pool = test_pool().await;
        let err = resolve(
            &pool,
            "https://cdn.example.com/notes.pdf",
            Some(crate::schema::IMAGE_MIME_TYPES),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
