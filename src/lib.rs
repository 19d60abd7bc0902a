//! ROI gallery service
//!
//! Accepts image uploads, stores each original alongside a center-cropped
//! region of interest in an S3-compatible blob store, records the pair in
//! SQLite, and serves listing, download, zip export and deletion over HTTP.

pub mod app;
pub mod blob;
pub mod db;
pub mod error;
pub mod export;
pub mod gallery;
pub mod models;
pub mod reconcile;
pub mod roi;
pub mod server;

pub use error::{Error, Result};
