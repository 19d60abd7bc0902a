//! Single and bulk download of processed artifacts
//!
//! Artifacts are pulled back from their public URLs through an
//! [`ArtifactFetcher`]. Bulk export fetches everything concurrently, skips
//! (and logs) whatever fails, and packs the rest into one zip.

pub mod archive;
pub mod fetcher;
pub mod mock;

pub use fetcher::HttpArtifactFetcher;
pub use mock::MockArtifactFetcher;

use crate::app::App;
use crate::models::{DownloadTarget, ProcessedImage};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use tracing::{info, warn};
use uuid::Uuid;

/// Content type reported when the object store does not send one.
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedArtifact {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedArtifact>;
}

/// A processed artifact ready to hand to the client.
#[derive(Debug, Clone)]
pub struct ImageDownload {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ExportArchive {
    pub filename: String,
    pub data: Vec<u8>,
    pub entries: usize,
    pub skipped: usize,
}

impl App {
    async fn find_image(&self, id: Uuid) -> Result<ProcessedImage> {
        self.metadata
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Image {} not found", id)))
    }

    /// Resolve where the processed artifact for `id` lives; the caller does
    /// the transfer.
    pub async fn resolve_download(&self, id: Uuid) -> Result<DownloadTarget> {
        let image = self.find_image(id).await?;
        Ok(DownloadTarget {
            filename: image.download_filename(),
            url: image.processed_url,
        })
    }

    /// Fetch the processed artifact for `id` so it can be streamed back.
    pub async fn download_image(&self, id: Uuid) -> Result<ImageDownload> {
        let target = self.resolve_download(id).await?;
        let artifact = self.fetcher.fetch(&target.url).await?;

        Ok(ImageDownload {
            filename: target.filename,
            content_type: artifact
                .content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            data: artifact.data,
        })
    }

    /// Zip every processed artifact. Fails with not-found when there are no
    /// rows; individual fetch failures only shrink the archive.
    pub async fn export_all(&self) -> Result<ExportArchive> {
        let images = self.metadata.list().await?;
        if images.is_empty() {
            return Err(Error::NotFound("No images to download".to_string()));
        }

        let fetches = images.iter().map(|image| async move {
            match self.fetcher.fetch(&image.processed_url).await {
                Ok(artifact) => Some((image.download_filename(), artifact.data)),
                Err(e) => {
                    warn!("Failed to fetch image {}: {}", image.original_name, e);
                    None
                }
            }
        });
        let fetched: Vec<(String, Vec<u8>)> = join_all(fetches).await.into_iter().flatten().collect();

        let entries = fetched.len();
        let skipped = images.len() - entries;
        let data = tokio::task::spawn_blocking(move || archive::build_zip(fetched))
            .await
            .map_err(|e| Error::Invariant(format!("Archive task join error: {}", e)))??;

        info!(
            "Exported {} images ({} skipped, {} bytes)",
            entries,
            skipped,
            data.len()
        );

        Ok(ExportArchive {
            filename: archive::archive_file_name(Utc::now().date_naive()),
            data,
            entries,
            skipped,
        })
    }
}
