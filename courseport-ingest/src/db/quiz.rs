//! Quiz storage helpers
//!
//! Every lesson owns exactly one quiz (a content item parented to the
//! lesson). The quiz's question list is an ordering record diffed before
//! every write so an unchanged import leaves it untouched.

use courseport_common::{Error, Result};
use sqlx::SqlitePool;

/// Quiz content item paired to a lesson, if it exists yet
pub async fn find_for_lesson(pool: &SqlitePool, lesson_id: i64) -> Result<Option<i64>> {
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM content_items WHERE item_type = 'quiz' AND parent_id = ?",
    )
    .bind(lesson_id)
    .fetch_optional(pool)
    .await?;

    Ok(id)
}

/// Stored question order for a quiz (empty when never assigned)
pub async fn question_order(pool: &SqlitePool, quiz_id: i64) -> Result<Vec<i64>> {
    let ordering: Option<String> =
        sqlx::query_scalar("SELECT ordering FROM question_order WHERE quiz_id = ?")
            .bind(quiz_id)
            .fetch_optional(pool)
            .await?;

    match ordering {
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| Error::Internal(format!("Corrupt question order record: {}", e))),
        None => Ok(Vec::new()),
    }
}

/// Replace the quiz's question order.
///
/// Diffs against the stored order first; returns true only when a write
/// happened.
pub async fn set_question_order(
    pool: &SqlitePool,
    quiz_id: i64,
    question_ids: &[i64],
) -> Result<bool> {
    let current = question_order(pool, quiz_id).await?;
    if current == question_ids {
        return Ok(false);
    }

    let ordering = serde_json::to_string(question_ids)
        .map_err(|e| Error::Internal(format!("Failed to serialize question order: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO question_order (quiz_id, ordering)
        VALUES (?, ?)
        ON CONFLICT(quiz_id) DO UPDATE SET
            ordering = excluded.ordering,
            revision = question_order.revision + 1
        "#,
    )
    .bind(quiz_id)
    .bind(&ordering)
    .execute(pool)
    .await?;

    Ok(true)
}

/// Revision of the question order record
pub async fn order_revision(pool: &SqlitePool, quiz_id: i64) -> Result<Option<i64>> {
    let revision =
        sqlx::query_scalar::<_, i64>("SELECT revision FROM question_order WHERE quiz_id = ?")
            .bind(quiz_id)
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
    async fn order_diffing_writes_only_on_change() {
        let pool = test_pool().await;

        assert!(set_question_order(&pool, 7, &[10, 11, 12]).await.unwrap());
        let before = order_revision(&pool, 7).await.unwrap().unwrap();

        assert!(!set_question_order(&pool, 7, &[10, 11, 12]).await.unwrap());
        assert_eq!(order_revision(&pool, 7).await.unwrap().unwrap(), before);

        assert!(set_question_order(&pool, 7, &[12, 10, 11]).await.unwrap());
        assert_eq!(order_revision(&pool, 7).await.unwrap().unwrap(), before + 1);

        assert_eq!(question_order(&pool, 7).await.unwrap(), vec![12, 10, 11]);
    }
}
