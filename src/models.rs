//! Data models and structures
//!
//! Defines the processed-image record, the values passed between the upload
//! pipeline and the HTTP layer, and the environment-driven configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Prefix prepended to the original file name of every processed download.
pub const DOWNLOAD_PREFIX: &str = "roi_";

/// One uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub data: Vec<u8>,
    pub content_type: String,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data,
            content_type: content_type.into(),
        }
    }
}

/// Metadata row linking an original artifact to its processed counterpart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedImage {
    pub id: Uuid,
    pub original_name: String,
    pub original_url: String,
    pub processed_url: String,
    pub original_blob_path: String,
    pub processed_blob_path: String,
    pub created_at: DateTime<Utc>,
}

impl ProcessedImage {
    /// Suggested file name for downloading the processed artifact.
    pub fn download_filename(&self) -> String {
        format!("{}{}", DOWNLOAD_PREFIX, self.original_name)
    }

    pub fn blob_paths(&self) -> [&str; 2] {
        [&self.original_blob_path, &self.processed_blob_path]
    }
}

/// Row contents before the store assigns an id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProcessedImage {
    pub original_name: String,
    pub original_url: String,
    pub processed_url: String,
    pub original_blob_path: String,
    pub processed_blob_path: String,
}

/// A blob whose row is gone but whose deletion has not succeeded yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrphanedBlob {
    pub blob_path: String,
    pub last_error: String,
    pub attempts: u32,
    pub recorded_at: DateTime<Utc>,
}

/// Where to fetch a single processed artifact and what to call it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadTarget {
    pub url: String,
    pub filename: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReport {
    pub rows_deleted: usize,
    pub blobs_orphaned: usize,
}

/// Uniform result envelope returned by the server-side actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ActionResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_path: String,
    pub blob_access_key_id: Option<String>,
    pub blob_secret_access_key: Option<String>,
    pub blob_endpoint: String,
    pub blob_region: String,
    pub blob_bucket: String,
    pub blob_base_url: String,
    pub dry_run: bool,
    pub max_upload_bytes: usize,
    pub http_timeout_secs: u64,
    pub reconcile_interval_secs: u64,
    pub reconcile_max_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            database_path: "roi-gallery.sqlite".to_string(),
            blob_access_key_id: None,
            blob_secret_access_key: None,
            blob_endpoint: "https://s3.amazonaws.com".to_string(),
            blob_region: "us-east-1".to_string(),
            blob_bucket: "roi-gallery".to_string(),
            blob_base_url: "https://roi-gallery.s3.amazonaws.com".to_string(),
            dry_run: false,
            max_upload_bytes: 32 * 1024 * 1024,
            http_timeout_secs: 30,
            reconcile_interval_secs: 300,
            reconcile_max_attempts: 10,
        }
    }
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let dry_run = parse_var(&lookup, "DRY_RUN", defaults.dry_run)?;

        let blob_access_key_id = lookup("BLOB_ACCESS_KEY_ID");
        let blob_secret_access_key = lookup("BLOB_SECRET_ACCESS_KEY");
        if !dry_run {
            if blob_access_key_id.is_none() {
                return Err(crate::Error::Generic(
                    "BLOB_ACCESS_KEY_ID not set".to_string(),
                ));
            }
            if blob_secret_access_key.is_none() {
                return Err(crate::Error::Generic(
                    "BLOB_SECRET_ACCESS_KEY not set".to_string(),
                ));
            }
        }

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_path: lookup("DATABASE_PATH").unwrap_or(defaults.database_path),
            blob_access_key_id,
            blob_secret_access_key,
            blob_endpoint: lookup("BLOB_ENDPOINT").unwrap_or(defaults.blob_endpoint),
            blob_region: lookup("BLOB_REGION").unwrap_or(defaults.blob_region),
            blob_bucket: lookup("BLOB_BUCKET").unwrap_or(defaults.blob_bucket),
            blob_base_url: lookup("BLOB_BASE_URL").unwrap_or(defaults.blob_base_url),
            dry_run,
            max_upload_bytes: parse_var(&lookup, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            http_timeout_secs: parse_var(&lookup, "HTTP_TIMEOUT_SECS", defaults.http_timeout_secs)?,
            reconcile_interval_secs: parse_var(
                &lookup,
                "RECONCILE_INTERVAL_SECS",
                defaults.reconcile_interval_secs,
            )?,
            reconcile_max_attempts: parse_var(
                &lookup,
                "RECONCILE_MAX_ATTEMPTS",
                defaults.reconcile_max_attempts,
            )?,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> crate::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| crate::Error::Generic(format!("Invalid value for {}: '{}'", key, raw))),
        None => Ok(default),
    }
}
