//! Image re-encoding: raster bytes → `DynamicImage` → PNG or JPEG bytes.
//!
//! The source container is sniffed from the bytes, not trusted from the
//! identifier, so a JPEG uploaded under `png-to-jpg` still decodes. JPEG has
//! no alpha channel; transparent inputs are flattened to RGB before encoding.
//! PNG output uses the best compression level with adaptive filtering.

use crate::error::ConvertError;
use crate::format::RasterFormat;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Decode `input` and re-encode it as `target`.
///
/// `jpeg_quality` is ignored for PNG output.
pub fn reencode(input: &[u8], target: RasterFormat, jpeg_quality: u8) -> Result<Vec<u8>, ConvertError> {
    let img = image::load_from_memory(input).map_err(|e| ConvertError::Decode {
        detail: format!("not a valid image: {e}"),
    })?;
    debug!(
        "Decoded image {}x{} ({:?})",
        img.width(),
        img.height(),
        img.color()
    );

    let buf = match target {
        RasterFormat::Jpg => encode_jpeg(&img, jpeg_quality),
        RasterFormat::Png => encode_png(&img),
    }
    .map_err(|e| ConvertError::Encode {
        target: crate::format::FileFormat::from(target).to_string(),
        detail: e.to_string(),
    })?;

    debug!("Encoded image → {} bytes {:?}", buf.len(), target);
    Ok(buf)
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buf), quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)?;
    Ok(buf)
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    let encoder = PngEncoder::new_with_quality(
        Cursor::new(&mut buf),
        CompressionType::Best,
        FilterType::Adaptive,
    );
    img.write_with_encoder(encoder)?;
    Ok(buf)
}
