//! Listing and deletion of processed images.
//!
//! Row deletion never waits on blob deletion. A blob that fails to delete is
//! written to the orphan ledger and retried later by the reconciler.

use crate::app::App;
use crate::models::{DeleteReport, ProcessedImage};
use crate::{Error, Result};
use tracing::{error, info, warn};
use uuid::Uuid;

impl App {
    pub async fn list_images(&self) -> Result<Vec<ProcessedImage>> {
        self.metadata.list().await
    }

    /// Delete one row and both of its artifacts.
    ///
    /// Unknown ids fail before anything is deleted.
    pub async fn delete_image(&self, id: Uuid) -> Result<DeleteReport> {
        let image = self
            .metadata
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Image {} not found", id)))?;

        let blobs_orphaned = self.delete_blobs(&image).await;

        let rows_deleted = usize::from(self.metadata.delete(id).await?);
        info!(
            "Deleted image {} ({}), {} blob(s) orphaned",
            id, image.original_name, blobs_orphaned
        );

        Ok(DeleteReport {
            rows_deleted,
            blobs_orphaned,
        })
    }

    /// Delete every row and attempt to delete every artifact.
    pub async fn delete_all_images(&self) -> Result<DeleteReport> {
        let images = self.metadata.list().await?;
        if images.is_empty() {
            return Ok(DeleteReport::default());
        }

        let mut blobs_orphaned = 0;
        for image in &images {
            blobs_orphaned += self.delete_blobs(image).await;
        }

        let ids = images.iter().map(|image| image.id).collect();
        let rows_deleted = self.metadata.delete_many(ids).await?;
        info!(
            "Deleted {} images, {} blob(s) orphaned",
            rows_deleted, blobs_orphaned
        );

        Ok(DeleteReport {
            rows_deleted,
            blobs_orphaned,
        })
    }

    /// Best-effort removal of both artifacts. Returns how many were orphaned.
    async fn delete_blobs(&self, image: &ProcessedImage) -> usize {
        let mut orphaned = 0;
        for path in image.blob_paths() {
            if let Err(e) = self.blob.delete(path).await {
                warn!("Failed to delete blob {}: {}", path, e);
                orphaned += 1;
                if let Err(record_err) = self.metadata.record_orphan(path, &e.to_string()).await {
                    error!("Failed to record orphaned blob {}: {}", path, record_err);
                }
            }
        }
        orphaned
    }
}
