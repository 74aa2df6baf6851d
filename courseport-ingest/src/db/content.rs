//! Content item storage
//!
//! Items are identified for "already exists" purposes by (item_type, slug).
//! Updates use merge semantics: a `None` field means "leave unchanged", and
//! an update that changes nothing performs no write at all (the `revision`
//! column only moves on a real change).

use courseport_common::{slug::slugify, Error, Result};
use sqlx::{Row, SqlitePool};

/// Writable columns of a content item; `None` leaves the stored value alone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentFields {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub status: Option<String>,
    pub author_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub menu_order: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
struct StoredItem {
    title: String,
    slug: String,
    content: String,
    excerpt: String,
    status: String,
    author_id: Option<i64>,
    parent_id: Option<i64>,
    menu_order: i64,
}

/// Look up a content item id by its natural key
pub async fn find_id_by_slug(
    pool: &SqlitePool,
    item_type: &str,
    slug: &str,
) -> Result<Option<i64>> {
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM content_items WHERE item_type = ? AND slug = ?",
    )
    .bind(item_type)
    .bind(slug)
    .fetch_optional(pool)
    .await?;

    Ok(id)
}

/// Create a content item, or update an existing one in place.
///
/// Returns the item id. On update, compares the merged row against the
/// stored row and skips the write entirely when nothing changed.
pub async fn upsert_item(
    pool: &SqlitePool,
    item_type: &str,
    existing: Option<i64>,
    fields: &ContentFields,
) -> Result<i64> {
    match existing {
        Some(id) => {
            let current = load_item(pool, id).await?.ok_or_else(|| {
                Error::NotFound(format!("content item {} disappeared during import", id))
            })?;

            let merged = StoredItem {
                title: fields.title.clone().unwrap_or_else(|| current.title.clone()),
                slug: fields.slug.clone().unwrap_or_else(|| current.slug.clone()),
                content: fields
                    .content
                    .clone()
                    .unwrap_or_else(|| current.content.clone()),
                excerpt: fields
                    .excerpt
                    .clone()
                    .unwrap_or_else(|| current.excerpt.clone()),
                status: fields
                    .status
                    .clone()
                    .unwrap_or_else(|| current.status.clone()),
                author_id: fields.author_id.or(current.author_id),
                parent_id: fields.parent_id.or(current.parent_id),
                menu_order: fields.menu_order.unwrap_or(current.menu_order),
            };

            if merged == current {
                return Ok(id);
            }

            sqlx::query(
                r#"
                UPDATE content_items
                SET title = ?, slug = ?, content = ?, excerpt = ?, status = ?,
                    author_id = ?, parent_id = ?, menu_order = ?,
                    revision = revision + 1, updated_at = CURRENT_TIMESTAMP
                WHERE id = ?
                "#,
            )
            .bind(&merged.title)
            .bind(&merged.slug)
            .bind(&merged.content)
            .bind(&merged.excerpt)
            .bind(&merged.status)
            .bind(merged.author_id)
            .bind(merged.parent_id)
            .bind(merged.menu_order)
            .bind(id)
            .execute(pool)
            .await?;

            Ok(id)
        }
        None => {
            let slug = fields
                .slug
                .clone()
                .filter(|s| !s.is_empty())
                .or_else(|| fields.title.as_deref().map(slugify).filter(|s| !s.is_empty()))
                .ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "cannot create a {} without a slug or title",
                        item_type
                    ))
                })?;

            let result = sqlx::query(
                r#"
                INSERT INTO content_items (
                    item_type, slug, title, content, excerpt, status,
                    author_id, parent_id, menu_order
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(item_type)
            .bind(&slug)
            .bind(fields.title.as_deref().unwrap_or(""))
            .bind(fields.content.as_deref().unwrap_or(""))
            .bind(fields.excerpt.as_deref().unwrap_or(""))
            .bind(fields.status.as_deref().unwrap_or("publish"))
            .bind(fields.author_id)
            .bind(fields.parent_id)
            .bind(fields.menu_order.unwrap_or(0))
            .execute(pool)
            .await?;

            Ok(result.last_insert_rowid())
        }
    }
}

async fn load_item(pool: &SqlitePool, id: i64) -> Result<Option<StoredItem>> {
    let row = sqlx::query(
        r#"
        SELECT title, slug, content, excerpt, status, author_id, parent_id, menu_order
        FROM content_items
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| StoredItem {
        title: row.get("title"),
        slug: row.get("slug"),
        content: row.get("content"),
        excerpt: row.get("excerpt"),
        status: row.get("status"),
        author_id: row.get("author_id"),
        parent_id: row.get("parent_id"),
        menu_order: row.get("menu_order"),
    }))
}

/// Write revision of an item; bumps only when a real update happened
pub async fn revision(pool: &SqlitePool, id: i64) -> Result<i64> {
    let revision = sqlx::query_scalar::<_, i64>("SELECT revision FROM content_items WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(revision)
}

/// Set a metadata value; no write when the stored value already matches
pub async fn set_meta(pool: &SqlitePool, item_id: i64, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO item_meta (item_id, key, value)
        VALUES (?, ?, ?)
        ON CONFLICT(item_id, key) DO UPDATE SET value = excluded.value
        WHERE item_meta.value != excluded.value
        "#,
    )
    .bind(item_id)
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_meta(pool: &SqlitePool, item_id: i64, key: &str) -> Result<Option<String>> {
    let value =
        sqlx::query_scalar::<_, String>("SELECT value FROM item_meta WHERE item_id = ? AND key = ?")
            .bind(item_id)
            .bind(key)
            .fetch_optional(pool)
            .await?;
    Ok(value)
}

pub async fn delete_meta(pool: &SqlitePool, item_id: i64, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM item_meta WHERE item_id = ? AND key = ?")
        .bind(item_id)
        .bind(key)
        .execute(pool)
        .await?;
    Ok(())
}
