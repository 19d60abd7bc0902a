use super::BlobService;
use crate::export::{ArtifactFetcher, FetchedArtifact};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// In-memory blob store used by tests and `DRY_RUN` mode.
#[derive(Clone)]
pub struct MockBlobClient {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    content_types: Arc<Mutex<HashMap<String, String>>>,
    base_url: String,
    put_count: Arc<Mutex<usize>>,
    delete_count: Arc<Mutex<usize>>,
    fail_puts: Arc<Mutex<bool>>,
    fail_deletes: Arc<Mutex<bool>>,
    failing_paths: Arc<Mutex<HashSet<String>>>,
}

impl MockBlobClient {
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
            content_types: Arc::new(Mutex::new(HashMap::new())),
            base_url: "https://mock-blob.example.com".to_string(),
            put_count: Arc::new(Mutex::new(0)),
            delete_count: Arc::new(Mutex::new(0)),
            fail_puts: Arc::new(Mutex::new(false)),
            fail_deletes: Arc::new(Mutex::new(false)),
            failing_paths: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_file(self, key: String, content: Vec<u8>) -> Self {
        self.files.lock().unwrap().insert(key, content);
        self
    }

    pub fn with_put_failure(self, should_fail: bool) -> Self {
        *self.fail_puts.lock().unwrap() = should_fail;
        self
    }

    pub fn with_delete_failure(self, should_fail: bool) -> Self {
        self.set_delete_failure(should_fail);
        self
    }

    /// Toggle delete failures on a client that is already shared.
    pub fn set_delete_failure(&self, should_fail: bool) {
        *self.fail_deletes.lock().unwrap() = should_fail;
    }

    /// Make deletes of one specific path fail.
    pub fn fail_delete_of(&self, path: &str) {
        self.failing_paths.lock().unwrap().insert(path.to_string());
    }

    pub fn get_put_count(&self) -> usize {
        *self.put_count.lock().unwrap()
    }

    pub fn get_delete_count(&self) -> usize {
        *self.delete_count.lock().unwrap()
    }

    pub fn get_files(&self) -> HashMap<String, Vec<u8>> {
        self.files.lock().unwrap().clone()
    }

    pub fn get_content_type(&self, key: &str) -> Option<String> {
        self.content_types.lock().unwrap().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.files.lock().unwrap().contains_key(key)
    }
}

impl Default for MockBlobClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobService for MockBlobClient {
    async fn put(&self, path: &str, data: &[u8], content_type: &str) -> Result<String> {
        if *self.fail_puts.lock().unwrap() {
            return Err(Error::Storage(format!("Mock put failure: {}", path)));
        }

        *self.put_count.lock().unwrap() += 1;

        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), data.to_vec());
        self.content_types
            .lock()
            .unwrap()
            .insert(path.to_string(), content_type.to_string());
        Ok(format!("{}/{}", self.base_url, path))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        *self.delete_count.lock().unwrap() += 1;

        if *self.fail_deletes.lock().unwrap() || self.failing_paths.lock().unwrap().contains(path)
        {
            return Err(Error::Storage(format!("Mock delete failure: {}", path)));
        }

        self.files.lock().unwrap().remove(path);
        self.content_types.lock().unwrap().remove(path);
        Ok(())
    }
}

/// Serves stored blobs back by their public URL, so `DRY_RUN` can download
/// what it uploaded.
#[async_trait]
impl ArtifactFetcher for MockBlobClient {
    async fn fetch(&self, url: &str) -> Result<FetchedArtifact> {
        let path = url
            .strip_prefix(self.base_url.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| Error::Fetch(format!("Artifact {} is outside {}", url, self.base_url)))?;

        let data = self
            .files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::Fetch(format!("Artifact {} returned status 404", url)))?;

        Ok(FetchedArtifact {
            data,
            content_type: self.get_content_type(path),
        })
    }
}
