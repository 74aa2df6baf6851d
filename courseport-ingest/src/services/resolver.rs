//! Import identifier resolution
//!
//! Sheets cross-reference each other by externally supplied import ids. The
//! resolver maps (entity type, import id) to the internally assigned id for
//! everything synchronized so far in the current job. The mapping is
//! append-only in memory and flushed to the database at the end of every
//! page, so a paginated or restarted job keeps resolving earlier sheets.

use std::collections::HashMap;

use courseport_common::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::idmap;
use crate::schema::EntityKind;

pub struct IdResolver {
    job_id: Uuid,
    map: HashMap<(EntityKind, String), i64>,
    pending: Vec<(EntityKind, String, i64)>,
}

impl IdResolver {
    /// Load the mapping accumulated so far for this job
    pub async fn load(pool: &SqlitePool, job_id: Uuid) -> Result<Self> {
        let map = idmap::load_map(pool, job_id).await?;
        Ok(Self {
            job_id,
            map,
            pending: Vec::new(),
        })
    }

    /// Resolve an import id within the current job's mapping.
    ///
    /// Returns `None` when the referenced entity has not been registered
    /// yet; the caller turns that into a hard reference error.
    pub fn resolve(&self, kind: EntityKind, import_id: &str) -> Option<i64> {
        self.map.get(&(kind, import_id.to_string())).copied()
    }

    /// Register a freshly synchronized entity under its import id
    pub fn register(&mut self, kind: EntityKind, import_id: &str, internal_id: i64) {
        self.map
            .insert((kind, import_id.to_string()), internal_id);
        self.pending
            .push((kind, import_id.to_string(), internal_id));
    }

    /// Flush newly registered mappings to durable storage
    pub async fn flush(&mut self, pool: &SqlitePool) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        idmap::save_entries(pool, self.job_id, &self.pending).await?;
        self.pending.clear();
        Ok(())
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
    async fn unregistered_ids_do_not_resolve() {
        let pool = test_pool().await;
        let resolver = IdResolver::load(&pool, Uuid::new_v4()).await.unwrap();
        assert_eq!(resolver.resolve(EntityKind::Course, "c1"), None);
    }

    #[tokio::test]
    async fn registered_ids_survive_a_reload_after_flush() {
        let pool = test_pool().await;
        let job_id = Uuid::new_v4();

        let mut resolver = IdResolver::load(&pool, job_id).await.unwrap();
        resolver.register(EntityKind::Question, "q1", 31);
        assert_eq!(resolver.resolve(EntityKind::Question, "q1"), Some(31));
        resolver.flush(&pool).await.unwrap();

        // A fresh resolver (new page, or restarted process) sees the mapping
        let resolver = IdResolver::load(&pool, job_id).await.unwrap();
        assert_eq!(resolver.resolve(EntityKind::Question, "q1"), Some(31));
    }

    #[tokio::test]
    async fn unflushed_registrations_stay_in_memory_only() {
        let pool = test_pool().await;
        let job_id = Uuid::new_v4();

        let mut resolver = IdResolver::load(&pool, job_id).await.unwrap();
        resolver.register(EntityKind::Course, "c1", 7);
        drop(resolver);

        let resolver = IdResolver::load(&pool, job_id).await.unwrap();
        assert_eq!(resolver.resolve(EntityKind::Course, "c1"), None);
    }
}
