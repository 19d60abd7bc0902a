use super::MetadataService;
use crate::models::{NewProcessedImage, OrphanedBlob, ProcessedImage};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// In-memory metadata store with failure injection.
#[derive(Clone)]
pub struct MockMetadataStore {
    rows: Arc<Mutex<Vec<ProcessedImage>>>,
    orphans: Arc<Mutex<BTreeMap<String, OrphanedBlob>>>,
    insert_count: Arc<Mutex<usize>>,
    fail_insert_on: Arc<Mutex<Option<usize>>>,
    fail_queries: Arc<Mutex<bool>>,
    fail_orphan_writes: Arc<Mutex<bool>>,
}

impl MockMetadataStore {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(Mutex::new(Vec::new())),
            orphans: Arc::new(Mutex::new(BTreeMap::new())),
            insert_count: Arc::new(Mutex::new(0)),
            fail_insert_on: Arc::new(Mutex::new(None)),
            fail_queries: Arc::new(Mutex::new(false)),
            fail_orphan_writes: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_row(self, row: ProcessedImage) -> Self {
        self.rows.lock().unwrap().push(row);
        self
    }

    /// Fail the `call`-th insert (1-based) and every one after it.
    pub fn with_insert_failure_on(self, call: usize) -> Self {
        *self.fail_insert_on.lock().unwrap() = Some(call);
        self
    }

    /// Make every read and delete fail.
    pub fn with_query_failure(self, should_fail: bool) -> Self {
        *self.fail_queries.lock().unwrap() = should_fail;
        self
    }

    /// Make `record_orphan` and `clear_orphan` fail.
    pub fn set_orphan_write_failure(&self, should_fail: bool) {
        *self.fail_orphan_writes.lock().unwrap() = should_fail;
    }

    pub fn get_insert_count(&self) -> usize {
        *self.insert_count.lock().unwrap()
    }

    pub fn get_rows(&self) -> Vec<ProcessedImage> {
        self.rows.lock().unwrap().clone()
    }

    fn check_queries(&self) -> Result<()> {
        if *self.fail_queries.lock().unwrap() {
            return Err(Error::Database("Mock query failure".to_string()));
        }
        Ok(())
    }

    fn check_orphan_writes(&self) -> Result<()> {
        if *self.fail_orphan_writes.lock().unwrap() {
            return Err(Error::Database("Mock orphan write failure".to_string()));
        }
        Ok(())
    }
}

impl Default for MockMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataService for MockMetadataStore {
    async fn insert(&self, image: NewProcessedImage) -> Result<ProcessedImage> {
        let call = {
            let mut count = self.insert_count.lock().unwrap();
            *count += 1;
            *count
        };

        if let Some(fail_from) = *self.fail_insert_on.lock().unwrap() {
            if call >= fail_from {
                return Err(Error::Database("Mock insert failure".to_string()));
            }
        }

        let row = ProcessedImage {
            id: Uuid::new_v4(),
            original_name: image.original_name,
            original_url: image.original_url,
            processed_url: image.processed_url,
            original_blob_path: image.original_blob_path,
            processed_blob_path: image.processed_blob_path,
            created_at: Utc::now(),
        };
        self.rows.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn list(&self) -> Result<Vec<ProcessedImage>> {
        self.check_queries()?;
        // Rows are kept in insertion order; newest first is the reverse.
        Ok(self.rows.lock().unwrap().iter().rev().cloned().collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ProcessedImage>> {
        self.check_queries()?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.id == id)
            .cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        self.check_queries()?;
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|row| row.id != id);
        Ok(rows.len() < before)
    }

    async fn delete_many(&self, ids: Vec<Uuid>) -> Result<usize> {
        self.check_queries()?;
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|row| !ids.contains(&row.id));
        Ok(before - rows.len())
    }

    async fn record_orphan(&self, blob_path: &str, error: &str) -> Result<()> {
        self.check_orphan_writes()?;
        let mut orphans = self.orphans.lock().unwrap();
        orphans
            .entry(blob_path.to_string())
            .and_modify(|orphan| {
                orphan.attempts += 1;
                orphan.last_error = error.to_string();
            })
            .or_insert_with(|| OrphanedBlob {
                blob_path: blob_path.to_string(),
                last_error: error.to_string(),
                attempts: 1,
                recorded_at: Utc::now(),
            });
        Ok(())
    }

    async fn list_orphans(&self) -> Result<Vec<OrphanedBlob>> {
        Ok(self.orphans.lock().unwrap().values().cloned().collect())
    }

    async fn clear_orphan(&self, blob_path: &str) -> Result<bool> {
        self.check_orphan_writes()?;
        Ok(self.orphans.lock().unwrap().remove(blob_path).is_some())
    }
}
