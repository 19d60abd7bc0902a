//! Relational metadata store
//!
//! Persists one `processed_images` row per uploaded file plus an
//! `orphaned_blobs` ledger of artifacts whose deletion failed. The SQLite
//! implementation runs every query on the blocking pool.

pub mod migrations;
pub mod mock;
pub mod pool;
pub mod queries;

pub use mock::MockMetadataStore;
pub use pool::{init_memory_pool, init_pool, DbPool};

use crate::models::{NewProcessedImage, OrphanedBlob, ProcessedImage};
use crate::{Error, Result};
use async_trait::async_trait;
use rusqlite::Connection;
use uuid::Uuid;

#[async_trait]
pub trait MetadataService: Send + Sync {
    async fn insert(&self, image: NewProcessedImage) -> Result<ProcessedImage>;
    /// All rows ordered newest first.
    async fn list(&self) -> Result<Vec<ProcessedImage>>;
    async fn get(&self, id: Uuid) -> Result<Option<ProcessedImage>>;
    /// Returns `false` when no row had that id.
    async fn delete(&self, id: Uuid) -> Result<bool>;
    /// Delete a batch of rows as one operation; returns how many existed.
    async fn delete_many(&self, ids: Vec<Uuid>) -> Result<usize>;

    async fn record_orphan(&self, blob_path: &str, error: &str) -> Result<()>;
    async fn list_orphans(&self) -> Result<Vec<OrphanedBlob>>;
    async fn clear_orphan(&self, blob_path: &str) -> Result<bool>;
}

pub struct SqliteMetadataStore {
    pool: DbPool,
}

impl SqliteMetadataStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn open(db_path: &str) -> Result<Self> {
        Ok(Self::new(init_pool(db_path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(init_memory_pool()?))
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db_pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool::get_conn(&db_pool)?;
            f(&*conn)
        })
        .await
        .map_err(|e| Error::Invariant(format!("Database task join error: {}", e)))?
    }
}

#[async_trait]
impl MetadataService for SqliteMetadataStore {
    async fn insert(&self, image: NewProcessedImage) -> Result<ProcessedImage> {
        self.with_conn(move |conn| queries::insert_image(conn, &image))
            .await
    }

    async fn list(&self) -> Result<Vec<ProcessedImage>> {
        self.with_conn(queries::list_images).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<ProcessedImage>> {
        self.with_conn(move |conn| queries::get_image(conn, id)).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        self.with_conn(move |conn| queries::delete_image(conn, id))
            .await
    }

    async fn delete_many(&self, ids: Vec<Uuid>) -> Result<usize> {
        self.with_conn(move |conn| queries::delete_images(conn, &ids))
            .await
    }

    async fn record_orphan(&self, blob_path: &str, error: &str) -> Result<()> {
        let blob_path = blob_path.to_string();
        let error = error.to_string();
        self.with_conn(move |conn| queries::record_orphan(conn, &blob_path, &error))
            .await
    }

    async fn list_orphans(&self) -> Result<Vec<OrphanedBlob>> {
        self.with_conn(queries::list_orphans).await
    }

    async fn clear_orphan(&self, blob_path: &str) -> Result<bool> {
        let blob_path = blob_path.to_string();
        self.with_conn(move |conn| queries::clear_orphan(conn, &blob_path))
            .await
    }
}
