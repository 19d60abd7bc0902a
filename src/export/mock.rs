use super::{ArtifactFetcher, FetchedArtifact};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Serves canned artifacts by URL; unknown URLs fail like a 404.
#[derive(Clone)]
pub struct MockArtifactFetcher {
    artifacts: Arc<Mutex<HashMap<String, FetchedArtifact>>>,
    fetch_count: Arc<Mutex<usize>>,
}

impl MockArtifactFetcher {
    pub fn new() -> Self {
        Self {
            artifacts: Arc::new(Mutex::new(HashMap::new())),
            fetch_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_artifact(self, url: &str, data: Vec<u8>, content_type: Option<&str>) -> Self {
        self.insert(url, data, content_type);
        self
    }

    pub fn insert(&self, url: &str, data: Vec<u8>, content_type: Option<&str>) {
        self.artifacts.lock().unwrap().insert(
            url.to_string(),
            FetchedArtifact {
                data,
                content_type: content_type.map(str::to_string),
            },
        );
    }

    pub fn get_fetch_count(&self) -> usize {
        *self.fetch_count.lock().unwrap()
    }
}

impl Default for MockArtifactFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactFetcher for MockArtifactFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedArtifact> {
        *self.fetch_count.lock().unwrap() += 1;

        self.artifacts
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Fetch(format!("Artifact {} returned status 404", url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_fetcher_serves_known_urls() {
        let fetcher = MockArtifactFetcher::new().with_artifact(
            "https://blob.test/a.png",
            vec![9],
            Some("image/png"),
        );

        let artifact = fetcher.fetch("https://blob.test/a.png").await.unwrap();
        assert_eq!(artifact.data, vec![9]);
        assert!(fetcher.fetch("https://blob.test/b.png").await.is_err());
        assert_eq!(fetcher.get_fetch_count(), 2);
    }
}
