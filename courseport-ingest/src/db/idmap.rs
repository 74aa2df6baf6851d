//! Durable import id → internal id mapping
//!
//! Scoped by job id so a long-running job can resolve cross-sheet references
//! across many scheduler ticks and process restarts.

use std::collections::HashMap;

use courseport_common::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::schema::EntityKind;

/// Load the accumulated mapping for one job
pub async fn load_map(
    pool: &SqlitePool,
    job_id: Uuid,
) -> Result<HashMap<(EntityKind, String), i64>> {
    let rows = sqlx::query(
        "SELECT entity, import_id, internal_id FROM import_id_map WHERE job_id = ?",
    )
    .bind(job_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut map = HashMap::new();
    for row in rows {
        let entity: String = row.get("entity");
        let Some(kind) = EntityKind::parse(&entity) else {
            continue;
        };
        let import_id: String = row.get("import_id");
        let internal_id: i64 = row.get("internal_id");
        map.insert((kind, import_id), internal_id);
    }

    Ok(map)
}

/// Persist newly registered mappings
pub async fn save_entries(
    pool: &SqlitePool,
    job_id: Uuid,
    entries: &[(EntityKind, String, i64)],
) -> Result<()> {
    for (kind, import_id, internal_id) in entries {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO import_id_map (job_id, entity, import_id, internal_id)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(job_id.to_string())
        .bind(kind.as_str())
        .bind(import_id)
        .bind(internal_id)
        .execute(pool)
        .await?;
    }

    Ok(())
}
