//! Per-plan SQLite file access through a small LRU cache of open pools
//! (SPEC_FULL §4.1 addition; spec §9 "query layers must... open plan files
//! on demand with a small LRU cache").

use crate::db::connection::{DatabaseConnection, DatabasePool};
use crate::db::schema::PLAN_FILE_TABLES;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const DEFAULT_CACHE_CAPACITY: usize = 32;

/// Opens (and caches) the SQLite pool backing each plan's file.
pub struct PlanFileCache {
    root: PathBuf,
    cache: Mutex<LruCache<i64, Arc<DatabaseConnection>>>,
}

impl PlanFileCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_capacity(root, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(root: impl Into<PathBuf>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            root: root.into(),
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn file_path(&self, plan_id: i64) -> PathBuf {
        self.root.join(format!("plan-{plan_id}.db"))
    }

    /// Get (opening and caching on miss) the pool for `plan_id`.
    pub async fn get(&self, plan_id: i64) -> Result<Arc<DatabaseConnection>, sqlx::Error> {
        {
            let mut cache = self.cache.lock().await;
            if let Some(conn) = cache.get(&plan_id) {
                return Ok(Arc::clone(conn));
            }
        }

        let path = self.file_path(plan_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                sqlx::Error::Configuration(Box::new(std::io::Error::new(e.kind(), e.to_string())))
            })?;
        }

        let url = format!("sqlite://{}?mode=rwc", path.display());
        let conn = DatabaseConnection::new(&url).await?;
        conn.apply_schema(PLAN_FILE_TABLES).await?;
        conn.apply_schema(&[crate::db::schema::PLAN_FILE_JOB_TABLE]).await?;
        let conn = Arc::new(conn);

        let mut cache = self.cache.lock().await;
        cache.put(plan_id, Arc::clone(&conn));
        Ok(conn)
    }

    pub async fn pool(&self, plan_id: i64) -> Result<Arc<DatabaseConnection>, sqlx::Error> {
        self.get(plan_id).await
    }

    /// Evict a plan's cached pool, e.g. after `delete_plan` removes the file.
    pub async fn evict(&self, plan_id: i64) {
        self.cache.lock().await.pop(&plan_id);
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Snapshot of every pool currently cached, for sweeps that touch
    /// whatever plan files happen to be open (e.g. job retention).
    pub async fn cached_pools(&self) -> Vec<Arc<DatabaseConnection>> {
        self.cache.lock().await.iter().map(|(_, v)| Arc::clone(v)).collect()
    }
}

pub type PlanPool = DatabasePool;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_caches_subsequent_lookups() {
        let dir = tempfile_dir();
        let cache = PlanFileCache::with_capacity(&dir, 2);

        let first = cache.get(1).await.unwrap();
        let second = cache.get(1).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn eviction_drops_cached_entry() {
        let dir = tempfile_dir();
        let cache = PlanFileCache::with_capacity(&dir, 2);

        cache.get(1).await.unwrap();
        cache.evict(1).await;

        // Re-fetching reopens the same file, so the schema is still intact.
        cache.get(1).await.unwrap();
    }

    fn tempfile_dir() -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("planloom-test-{}", uuid::Uuid::new_v4()));
        dir
    }
}
