//! Background cleanup of orphaned blobs.
//!
//! Deleting a row never blocks on its artifacts. Artifacts that failed to
//! delete sit in the orphan ledger until a sweep removes them from the blob
//! store. Orphans that exhaust `max_attempts` stay in the ledger for manual
//! cleanup and are skipped by later sweeps.

use crate::blob::BlobService;
use crate::db::MetadataService;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_retry::{strategy::FixedInterval, Retry};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct ReconcileSettings {
    pub interval: Duration,
    pub max_attempts: u32,
    /// Delay between the in-sweep retries of a single delete.
    pub retry_delay: Duration,
    pub retries_per_sweep: usize,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            max_attempts: 10,
            retry_delay: Duration::from_millis(500),
            retries_per_sweep: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub cleared: usize,
    pub failed: usize,
    pub skipped: usize,
}

pub struct Reconciler {
    blob: Arc<dyn BlobService>,
    metadata: Arc<dyn MetadataService>,
    settings: ReconcileSettings,
}

impl Reconciler {
    pub fn new(
        blob: Arc<dyn BlobService>,
        metadata: Arc<dyn MetadataService>,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            blob,
            metadata,
            settings,
        }
    }

    /// Try once to delete every orphan that still has attempts left.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let orphans = self.metadata.list_orphans().await?;
        let mut report = SweepReport::default();

        for orphan in orphans {
            if orphan.attempts >= self.settings.max_attempts {
                report.skipped += 1;
                continue;
            }

            let strategy = FixedInterval::new(self.settings.retry_delay)
                .take(self.settings.retries_per_sweep);
            let path = orphan.blob_path.as_str();
            match Retry::spawn(strategy, || self.blob.delete(path)).await {
                Ok(()) => {
                    info!("Removed orphaned blob {}", path);
                    report.cleared += 1;
                    if let Err(clear_err) = self.metadata.clear_orphan(path).await {
                        error!("Failed to clear orphan entry for {}: {}", path, clear_err);
                    }
                }
                Err(e) => {
                    if let Err(record_err) = self.metadata.record_orphan(path, &e.to_string()).await {
                        error!("Failed to record attempt for orphan {}: {}", path, record_err);
                    }
                    if orphan.attempts + 1 >= self.settings.max_attempts {
                        error!(
                            "Giving up on orphaned blob {} after {} attempts: {}",
                            path,
                            orphan.attempts + 1,
                            e
                        );
                    } else {
                        warn!("Orphaned blob {} still not deleted: {}", path, e);
                    }
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Run [`Reconciler::sweep`] every `interval` until the task is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.settings.interval);
            loop {
                ticker.tick().await;
                match self.sweep().await {
                    Ok(report) if report.cleared + report.failed > 0 => info!(
                        "Orphan sweep: {} cleared, {} failed, {} skipped",
                        report.cleared, report.failed, report.skipped
                    ),
                    Ok(_) => {}
                    Err(e) => error!("Orphan sweep failed: {}", e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MockBlobClient;
    use crate::db::MockMetadataStore;

    fn fast_settings(max_attempts: u32) -> ReconcileSettings {
        ReconcileSettings {
            interval: Duration::from_millis(10),
            max_attempts,
            retry_delay: Duration::from_millis(1),
            retries_per_sweep: 1,
        }
    }

    #[tokio::test]
    async fn test_sweep_clears_orphans_once_delete_succeeds() {
        let blob = MockBlobClient::new()
            .with_file("processed/a.jpg".to_string(), vec![1])
            .with_delete_failure(true);
        let metadata = MockMetadataStore::new();
        metadata
            .record_orphan("processed/a.jpg", "503")
            .await
            .unwrap();

        let reconciler = Reconciler::new(
            Arc::new(blob.clone()),
            Arc::new(metadata.clone()),
            fast_settings(10),
        );

        let report = reconciler.sweep().await.unwrap();
        assert_eq!(report.failed, 1);
        // one initial attempt plus one retry
        assert_eq!(blob.get_delete_count(), 2);
        assert_eq!(metadata.list_orphans().await.unwrap()[0].attempts, 2);

        blob.set_delete_failure(false);
        let report = reconciler.sweep().await.unwrap();
        assert_eq!(report.cleared, 1);
        assert!(metadata.list_orphans().await.unwrap().is_empty());
        assert!(!blob.contains("processed/a.jpg"));
    }

    #[tokio::test]
    async fn test_sweep_skips_exhausted_orphans() {
        let blob = MockBlobClient::new();
        let metadata = MockMetadataStore::new();
        metadata.record_orphan("originals/a.jpg", "e").await.unwrap();
        metadata.record_orphan("originals/a.jpg", "e").await.unwrap();

        let reconciler = Reconciler::new(
            Arc::new(blob.clone()),
            Arc::new(metadata.clone()),
            fast_settings(2),
        );

        let report = reconciler.sweep().await.unwrap();
        assert_eq!(report, SweepReport { cleared: 0, failed: 0, skipped: 1 });
        assert_eq!(blob.get_delete_count(), 0);
    }

    #[tokio::test]
    async fn test_sweep_continues_past_ledger_write_failures() {
        let blob = MockBlobClient::new()
            .with_file("processed/a.jpg".to_string(), vec![1])
            .with_file("processed/b.jpg".to_string(), vec![2]);
        blob.fail_delete_of("processed/b.jpg");
        let metadata = MockMetadataStore::new();
        metadata.record_orphan("processed/a.jpg", "e").await.unwrap();
        metadata.record_orphan("processed/b.jpg", "e").await.unwrap();
        metadata.set_orphan_write_failure(true);

        let reconciler = Reconciler::new(
            Arc::new(blob.clone()),
            Arc::new(metadata.clone()),
            fast_settings(10),
        );

        let report = reconciler.sweep().await.unwrap();
        assert_eq!(report, SweepReport { cleared: 1, failed: 1, skipped: 0 });
        assert!(!blob.contains("processed/a.jpg"));
        assert!(blob.contains("processed/b.jpg"));
        // ledger untouched, both entries come back next sweep
        assert_eq!(metadata.list_orphans().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_spawned_reconciler_sweeps_periodically() {
        let blob = MockBlobClient::new().with_file("processed/b.png".to_string(), vec![1]);
        let metadata = MockMetadataStore::new();
        metadata.record_orphan("processed/b.png", "e").await.unwrap();

        let handle = Reconciler::new(
            Arc::new(blob.clone()),
            Arc::new(metadata.clone()),
            fast_settings(5),
        )
        .spawn();

        for _ in 0..100 {
            if metadata.list_orphans().await.unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert!(metadata.list_orphans().await.unwrap().is_empty());
        assert!(!blob.contains("processed/b.png"));
    }
}
