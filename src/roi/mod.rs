//! Region-of-interest detection and cropping
//!
//! The pipeline only talks to [`RoiService`]: bytes in, cropped bytes of the
//! same format out. [`CenterCropProcessor`] is the default strategy and crops
//! a fixed rectangle; a real detector can replace it without touching the
//! orchestration code.

pub mod mime;
pub mod mock;
pub mod processor;

pub use mock::MockRoiProcessor;
pub use processor::CenterCropProcessor;

use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait RoiService: Send + Sync {
    /// Locate the region of interest in `image_data` and return it re-encoded
    /// in the same format as the input.
    async fn detect_and_crop(&self, image_data: &[u8], media_type: &str) -> Result<Vec<u8>>;
}

/// Axis-aligned crop rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoiRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl RoiRegion {
    /// The fixed center rectangle: 25% offset on each axis, 50% of each side.
    pub fn centered(image_width: u32, image_height: u32) -> Self {
        Self {
            x: image_width / 4,
            y: image_height / 4,
            width: image_width / 2,
            height: image_height / 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}
