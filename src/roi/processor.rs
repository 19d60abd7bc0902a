use super::mime::resolve_output_format;
use super::{RoiRegion, RoiService};
use crate::{Error, Result};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// Placeholder ROI strategy: crops the fixed center rectangle described by
/// [`RoiRegion::centered`]. No content detection happens.
#[derive(Debug, Clone, Copy, Default)]
pub struct CenterCropProcessor;

impl CenterCropProcessor {
    pub fn new() -> Self {
        Self
    }

    fn crop_sync(image_data: &[u8], format: ImageFormat) -> Result<Vec<u8>> {
        let img = image::load_from_memory(image_data)?;
        let region = RoiRegion::centered(img.width(), img.height());
        if region.is_empty() {
            return Err(Error::Validation(format!(
                "Image {}x{} is too small to crop",
                img.width(),
                img.height()
            )));
        }

        let cropped = img.crop_imm(region.x, region.y, region.width, region.height);
        encode(cropped, format)
    }
}

fn encode(image: DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    // JPEG has no alpha channel
    let image = if format == ImageFormat::Jpeg && image.color().has_alpha() {
        DynamicImage::ImageRgb8(image.to_rgb8())
    } else {
        image
    };

    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format)?;
    Ok(buf.into_inner())
}

#[async_trait]
impl RoiService for CenterCropProcessor {
    async fn detect_and_crop(&self, image_data: &[u8], media_type: &str) -> Result<Vec<u8>> {
        let format = resolve_output_format(media_type, image_data).ok_or_else(|| {
            Error::Image(image::ImageError::Unsupported(
                image::error::ImageFormatHint::Name(media_type.to_string()).into(),
            ))
        })?;

        tokio::task::spawn_blocking({
            let image_data = image_data.to_vec();
            move || Self::crop_sync(&image_data, format)
        })
        .await
        .map_err(|e| Error::Invariant(format!("Image processing task join error: {}", e)))?
    }
}
