use image::ImageFormat;

/// Sniff the image format from magic bytes.
pub fn detect_image_format(bytes: &[u8]) -> Option<ImageFormat> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some(ImageFormat::Jpeg),
        [0x89, 0x50, 0x4E, 0x47, ..] => Some(ImageFormat::Png),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some(ImageFormat::WebP),
        [0x47, 0x49, 0x46, 0x38, ..] => Some(ImageFormat::Gif),
        [0x42, 0x4D, ..] => Some(ImageFormat::Bmp),
        _ => None,
    }
}

/// Choose the encoding for a processed artifact.
///
/// The declared media type wins when it names a format we can write; the
/// bytes are sniffed otherwise.
pub fn resolve_output_format(media_type: &str, bytes: &[u8]) -> Option<ImageFormat> {
    let declared = media_type
        .split(';')
        .next()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .and_then(ImageFormat::from_mime_type)
        .filter(|f| f.can_write());

    match declared {
        Some(format) => Some(format),
        None => {
            let sniffed = detect_image_format(bytes);
            if sniffed.is_none() {
                tracing::warn!(
                    "Unrecognized image format (declared '{}', first 4 bytes: {:02X?})",
                    media_type,
                    &bytes[..bytes.len().min(4)]
                );
            }
            sniffed
        }
    }
}

/// Media type to store alongside an artifact written in `format`.
pub fn mime_for_format(format: ImageFormat) -> &'static str {
    format.to_mime_type()
}
