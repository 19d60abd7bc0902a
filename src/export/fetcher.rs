use super::{ArtifactFetcher, FetchedArtifact};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;

/// Downloads stored artifacts from their public URLs.
pub struct HttpArtifactFetcher {
    client: Client,
}

impl HttpArtifactFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn new_with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArtifactFetcher for HttpArtifactFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedArtifact> {
        tracing::debug!("Fetching artifact {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            tracing::error!("Failed to request artifact {}: {}", url, e);
            e
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!(
                "Artifact {} returned status {}",
                url, status
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let data = response.bytes().await?.to_vec();

        Ok(FetchedArtifact { data, content_type })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_returns_bytes_and_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/processed/a.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![1, 2, 3])
                    .insert_header("content-type", "image/png"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpArtifactFetcher::new(Duration::from_secs(5)).unwrap();
        let artifact = fetcher
            .fetch(&format!("{}/processed/a.png", server.uri()))
            .await
            .unwrap();

        assert_eq!(artifact.data, vec![1, 2, 3]);
        assert_eq!(artifact.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_fetch_non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpArtifactFetcher::new_with_client(Client::new());
        let err = fetcher
            .fetch(&format!("{}/processed/missing.png", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Fetch(_)));
        assert!(err.to_string().contains("404"));
    }
}
