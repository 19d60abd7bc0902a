//! Application wiring and the upload pipeline.

use crate::blob::{blob_key, BlobService, MockBlobClient, S3BlobClient};
use crate::blob::{ORIGINALS_NAMESPACE, PROCESSED_NAMESPACE};
use crate::db::{MetadataService, SqliteMetadataStore};
use crate::export::{ArtifactFetcher, HttpArtifactFetcher};
use crate::models::{Config, NewProcessedImage, ProcessedImage, UploadFile};
use crate::roi::mime::{detect_image_format, mime_for_format};
use crate::roi::{CenterCropProcessor, RoiService};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Owns the store clients and the ROI strategy. Built once at startup and
/// shared with the HTTP layer and the reconciler.
pub struct App {
    pub(crate) blob: Arc<dyn BlobService>,
    pub(crate) metadata: Arc<dyn MetadataService>,
    pub(crate) roi: Arc<dyn RoiService>,
    pub(crate) fetcher: Arc<dyn ArtifactFetcher>,
}

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub blob: Arc<dyn BlobService>,
    pub metadata: Arc<dyn MetadataService>,
    pub roi: Arc<dyn RoiService>,
    pub fetcher: Arc<dyn ArtifactFetcher>,
}

impl App {
    /// Build an app from concrete service dependencies.
    pub fn with_services(services: AppServices) -> Self {
        Self {
            blob: services.blob,
            metadata: services.metadata,
            roi: services.roi,
            fetcher: services.fetcher,
        }
    }

    /// Construct an app from configuration (see `Config::from_env`).
    pub async fn new(config: &Config) -> Result<Self> {
        let (blob, fetcher): (Arc<dyn BlobService>, Arc<dyn ArtifactFetcher>) = if config.dry_run
        {
            warn!("DRY_RUN enabled: artifacts are kept in memory only");
            let store = MockBlobClient::new()
                .with_base_url(config.blob_base_url.trim_end_matches('/').to_string());
            (Arc::new(store.clone()), Arc::new(store))
        } else {
            let access_key_id = config.blob_access_key_id.clone().ok_or_else(|| {
                Error::Generic("BLOB_ACCESS_KEY_ID not set".to_string())
            })?;
            let secret_access_key = config.blob_secret_access_key.clone().ok_or_else(|| {
                Error::Generic("BLOB_SECRET_ACCESS_KEY not set".to_string())
            })?;
            let client = S3BlobClient::new(
                access_key_id,
                secret_access_key,
                config.blob_endpoint.clone(),
                config.blob_region.clone(),
                config.blob_bucket.clone(),
                config.blob_base_url.clone(),
            )
            .await?;
            let fetcher =
                HttpArtifactFetcher::new(Duration::from_secs(config.http_timeout_secs))?;
            (Arc::new(client), Arc::new(fetcher))
        };
        info!(
            "Blob store: bucket {} at {}",
            config.blob_bucket, config.blob_endpoint
        );

        let metadata = Arc::new(SqliteMetadataStore::open(&config.database_path)?);
        info!("Metadata store: {}", config.database_path);

        Ok(Self::with_services(AppServices {
            blob,
            metadata,
            roi: Arc::new(CenterCropProcessor::new()),
            fetcher,
        }))
    }

    pub fn blob_service(&self) -> Arc<dyn BlobService> {
        Arc::clone(&self.blob)
    }

    pub fn metadata_service(&self) -> Arc<dyn MetadataService> {
        Arc::clone(&self.metadata)
    }

    /// Store, crop and record each file in order.
    ///
    /// The first failure aborts the batch. Artifacts and rows already written
    /// for earlier files are kept.
    pub async fn process_images(&self, files: Vec<UploadFile>) -> Result<Vec<ProcessedImage>> {
        if files.is_empty() {
            return Err(Error::Validation("No files provided".to_string()));
        }

        let total = files.len();
        let mut processed = Vec::with_capacity(total);
        for (index, file) in files.into_iter().enumerate() {
            let label = format!("{}/{} {}", index + 1, total, file.name);
            match self.process_one(&file, &label).await {
                Ok(row) => processed.push(row),
                Err(e) => {
                    error!(
                        "[{}] Upload failed, aborting batch after {} of {} files: {}",
                        label,
                        processed.len(),
                        total,
                        e
                    );
                    return Err(e);
                }
            }
        }

        info!("Processed {} images", processed.len());
        Ok(processed)
    }

    async fn process_one(&self, file: &UploadFile, label: &str) -> Result<ProcessedImage> {
        let original_path = blob_key(ORIGINALS_NAMESPACE, &file.name);
        let original_url = self
            .blob
            .put(&original_path, &file.data, &file.content_type)
            .await?;
        info!("[{}] Stored original at {}", label, original_path);

        let cropped = self
            .roi
            .detect_and_crop(&file.data, &file.content_type)
            .await?;
        info!(
            "[{}] Cropped region of interest ({} -> {} bytes)",
            label,
            file.data.len(),
            cropped.len()
        );

        // the crop may have been encoded from sniffed bytes, not the declared type
        let processed_type = match detect_image_format(&cropped) {
            Some(format) => mime_for_format(format),
            None => file.content_type.as_str(),
        };
        let processed_path = blob_key(PROCESSED_NAMESPACE, &file.name);
        let processed_url = self
            .blob
            .put(&processed_path, &cropped, processed_type)
            .await?;
        info!("[{}] Stored processed image at {}", label, processed_path);

        self.metadata
            .insert(NewProcessedImage {
                original_name: file.name.clone(),
                original_url,
                processed_url,
                original_blob_path: original_path,
                processed_blob_path: processed_path,
            })
            .await
    }
}
