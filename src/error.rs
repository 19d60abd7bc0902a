//! Error handling and custom error types
//!
//! One error enum for every service; the HTTP layer maps variants to status
//! codes.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Blob storage error: {0}")]
    Storage(String),

    #[error("Metadata store error: {0}")]
    Database(String),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Artifact fetch error: {0}")]
    Fetch(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invariant violation: {0}")]
    Invariant(String),

    #[error("Generic error: {0}")]
    Generic(String),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Database(e.to_string())
    }
}

impl From<r2d2::Error> for Error {
    fn from(e: r2d2::Error) -> Self {
        Error::Database(format!("Connection pool error: {}", e))
    }
}

impl Error {
    /// True for errors that describe a missing row rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
