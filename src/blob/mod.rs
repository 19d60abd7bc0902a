//! Object storage for original and processed artifacts
//!
//! Artifacts live in an S3-compatible bucket under two namespaces,
//! `originals/` and `processed/`, keyed by timestamp-prefixed randomized
//! paths so concurrent uploads of the same file name never collide.

pub mod client;
pub mod mock;

pub use client::S3BlobClient;
pub use mock::MockBlobClient;

use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;

pub const ORIGINALS_NAMESPACE: &str = "originals";
pub const PROCESSED_NAMESPACE: &str = "processed";

const RANDOM_SUFFIX_LEN: usize = 21;

#[async_trait]
pub trait BlobService: Send + Sync {
    /// Store `data` under `path` and return its public URL.
    async fn put(&self, path: &str, data: &[u8], content_type: &str) -> Result<String>;
    async fn delete(&self, path: &str) -> Result<()>;
}

/// Build a collision-resistant storage key for `file_name` inside `namespace`.
///
/// Keys look like `originals/1718000000000-photo-<21 random chars>.jpg`.
pub fn blob_key(namespace: &str, file_name: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let safe_name = sanitize_file_name(file_name);
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_SUFFIX_LEN)
        .map(char::from)
        .collect();

    match split_extension(&safe_name) {
        (stem, Some(ext)) => format!("{}/{}-{}-{}.{}", namespace, millis, stem, suffix, ext),
        (stem, None) => format!("{}/{}-{}-{}", namespace, millis, stem, suffix),
    }
}

/// Replace path separators so a client file name can never name a directory.
pub(crate) fn sanitize_file_name(file_name: &str) -> String {
    let cleaned: String = file_name
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();

    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}
