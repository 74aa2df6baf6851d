//! Classification term storage
//!
//! Terms live in flat taxonomies (course-category, module, question-category,
//! lesson-tag). Assignment uses replace semantics; ordered taxonomies keep a
//! parallel ordering record whose revision moves only when the order really
//! changes.

use std::collections::BTreeSet;

use courseport_common::{slug::slugify, Error, Result};
use sqlx::{Row, SqlitePool};

#[derive(Debug, Clone)]
pub struct Term {
    pub id: i64,
    pub taxonomy: String,
    pub name: String,
    pub slug: String,
}

/// Find a term by slug, creating it when missing
pub async fn get_or_create(pool: &SqlitePool, taxonomy: &str, name: &str) -> Result<Term> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(Error::InvalidInput(format!(
            "\"{}\" is not a usable {} name",
            name, taxonomy
        )));
    }

    if let Some(term) = find_by_slug(pool, taxonomy, &slug).await? {
        return Ok(term);
    }

    let result = sqlx::query("INSERT INTO terms (taxonomy, name, slug) VALUES (?, ?, ?)")
        .bind(taxonomy)
        .bind(name.trim())
        .bind(&slug)
        .execute(pool)
        .await?;

    Ok(Term {
        id: result.last_insert_rowid(),
        taxonomy: taxonomy.to_string(),
        name: name.trim().to_string(),
        slug,
    })
}

pub async fn find_by_slug(pool: &SqlitePool, taxonomy: &str, slug: &str) -> Result<Option<Term>> {
    let row = sqlx::query("SELECT id, taxonomy, name, slug FROM terms WHERE taxonomy = ? AND slug = ?")
        .bind(taxonomy)
        .bind(slug)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| Term {
        id: row.get("id"),
        taxonomy: row.get("taxonomy"),
        name: row.get("name"),
        slug: row.get("slug"),
    }))
}

/// Term ids currently linked to an item within one taxonomy
pub async fn item_terms(pool: &SqlitePool, item_id: i64, taxonomy: &str) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT t.id
        FROM term_links l
        JOIN terms t ON t.id = l.term_id
        WHERE l.item_id = ? AND t.taxonomy = ?
        ORDER BY t.id
        "#,
    )
    .bind(item_id)
    .bind(taxonomy)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

pub async fn item_has_term(pool: &SqlitePool, item_id: i64, term_id: i64) -> Result<bool> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM term_links WHERE item_id = ? AND term_id = ?",
    )
    .bind(item_id)
    .bind(term_id)
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

/// Replace an item's terms within one taxonomy.
///
/// Returns true when anything was written. For ordered taxonomies the new
/// list fully replaces the stored ordering record, but an identical order is
/// left untouched.
pub async fn set_item_terms(
    pool: &SqlitePool,
    item_id: i64,
    taxonomy: &str,
    term_ids: &[i64],
    ordered: bool,
) -> Result<bool> {
    let current = item_terms(pool, item_id, taxonomy).await?;
    let current_set: BTreeSet<i64> = current.iter().copied().collect();
    let new_set: BTreeSet<i64> = term_ids.iter().copied().collect();

    let mut changed = false;

    if current_set != new_set {
        sqlx::query(
            r#"
            DELETE FROM term_links
            WHERE item_id = ?
              AND term_id IN (SELECT id FROM terms WHERE taxonomy = ?)
            "#,
        )
        .bind(item_id)
        .bind(taxonomy)
        .execute(pool)
        .await?;

        for term_id in &new_set {
            sqlx::query("INSERT OR IGNORE INTO term_links (item_id, term_id) VALUES (?, ?)")
                .bind(item_id)
                .bind(term_id)
                .execute(pool)
                .await?;
        }
        changed = true;
    }

    if ordered {
        let new_ordering = serde_json::to_string(term_ids)
            .map_err(|e| Error::Internal(format!("Failed to serialize term order: {}", e)))?;

        let stored: Option<String> = sqlx::query_scalar(
            "SELECT ordering FROM term_order WHERE item_id = ? AND taxonomy = ?",
        )
        .bind(item_id)
        .bind(taxonomy)
        .fetch_optional(pool)
        .await?;

        if stored.as_deref() != Some(new_ordering.as_str()) {
            sqlx::query(
                r#"
                INSERT INTO term_order (item_id, taxonomy, ordering)
                VALUES (?, ?, ?)
                ON CONFLICT(item_id, taxonomy) DO UPDATE SET
                    ordering = excluded.ordering,
                    revision = term_order.revision + 1
                "#,
            )
            .bind(item_id)
            .bind(taxonomy)
            .bind(&new_ordering)
            .execute(pool)
            .await?;
            changed = true;
        }
    }

    Ok(changed)
}

/// Revision of an ordered taxonomy's ordering record
pub async fn order_revision(
    pool: &SqlitePool,
    item_id: i64,
    taxonomy: &str,
) -> Result<Option<i64>> {
    let revision = sqlx::query_scalar::<_, i64>(
        "SELECT revision FROM term_order WHERE item_id = ? AND taxonomy = ?",
    )
    .bind(item_id)
    .bind(taxonomy)
    .fetch_optional(pool)
    .await?;

    Ok(revision)
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
    async fn get_or_create_is_idempotent() {
        let pool = test_pool().await;
        let first = get_or_create(&pool, "module", "Week 1").await.unwrap();
        let second = get_or_create(&pool, "module", "Week 1").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.slug, "week-1");
    }

    #[tokio::test]
    async fn replace_semantics_drop_stale_terms() {
        let pool = test_pool().await;
        let a = get_or_create(&pool, "course-category", "Pastry").await.unwrap();
        let b = get_or_create(&pool, "course-category", "Bread").await.unwrap();

        set_item_terms(&pool, 1, "course-category", &[a.id, b.id], false)
            .await
            .unwrap();
        set_item_terms(&pool, 1, "course-category", &[b.id], false)
            .await
            .unwrap();

        assert_eq!(item_terms(&pool, 1, "course-category").await.unwrap(), vec![b.id]);
    }

    #[tokio::test]
    async fn unchanged_order_performs_no_write() {
        let pool = test_pool().await;
        let a = get_or_create(&pool, "module", "Week 1").await.unwrap();
        let b = get_or_create(&pool, "module", "Week 2").await.unwrap();

        let wrote = set_item_terms(&pool, 1, "module", &[a.id, b.id], true).await.unwrap();
        assert!(wrote);
        let before = order_revision(&pool, 1, "module").await.unwrap().unwrap();

        let wrote = set_item_terms(&pool, 1, "module", &[a.id, b.id], true).await.unwrap();
        assert!(!wrote);
        assert_eq!(order_revision(&pool, 1, "module").await.unwrap().unwrap(), before);

        let wrote = set_item_terms(&pool, 1, "module", &[b.id, a.id], true).await.unwrap();
        assert!(wrote);
        assert_eq!(
            order_revision(&pool, 1, "module").await.unwrap().unwrap(),
            before + 1
        );
    }
}
