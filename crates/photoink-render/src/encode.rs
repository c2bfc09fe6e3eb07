//! Bitmap encoding and file output.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use photoink_core::{Bitmap, SaveError, SaveFormat, SaveResult, SaveSettings};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

fn encode_error(err: image::ImageError) -> SaveError {
    SaveError::Encode(err.to_string())
}

/// Encode into `writer`.
///
/// PNG and WebP are lossless and keep alpha. JPEG drops alpha and uses
/// `quality` clamped to `1..=100`.
pub fn encode_to<W: Write>(writer: W, bitmap: &Bitmap, format: SaveFormat, quality: u8) -> SaveResult<()> {
    let (width, height) = bitmap.dimensions();
    match format {
        SaveFormat::Png => PngEncoder::new(writer)
            .write_image(bitmap.as_raw(), width, height, ExtendedColorType::Rgba8)
            .map_err(encode_error),
        SaveFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(bitmap.clone()).to_rgb8();
            JpegEncoder::new_with_quality(writer, quality.clamp(1, 100))
                .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                .map_err(encode_error)
        }
        SaveFormat::WebP => WebPEncoder::new_lossless(writer)
            .write_image(bitmap.as_raw(), width, height, ExtendedColorType::Rgba8)
            .map_err(encode_error),
    }
}

/// Encode into memory.
pub fn encode(bitmap: &Bitmap, format: SaveFormat, quality: u8) -> SaveResult<Vec<u8>> {
    let mut bytes = Vec::new();
    encode_to(&mut bytes, bitmap, format, quality)?;
    Ok(bytes)
}

/// Encode and write to `path`, truncating any existing file.
pub fn write_file(path: &Path, bitmap: &Bitmap, settings: &SaveSettings) -> SaveResult<()> {
    let file = File::create(path).map_err(|e| SaveError::from_io(&path.display().to_string(), &e))?;
    let mut writer = BufWriter::new(file);
    encode_to(&mut writer, bitmap, settings.format, settings.quality)?;
    writer
        .flush()
        .map_err(|e| SaveError::from_io(&path.display().to_string(), &e))?;
    log::debug!("wrote {:?} ({}x{}) to {}", settings.format, bitmap.width(), bitmap.height(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Bitmap {
        let mut bitmap = Bitmap::from_pixel(8, 6, image::Rgba([10, 120, 200, 255]));
        bitmap.put_pixel(0, 0, image::Rgba([5, 6, 7, 128]));
        bitmap
    }

    #[test]
    fn test_png_is_lossless() {
        let bytes = encode(&sample(), SaveFormat::Png, 0).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn test_webp_is_lossless() {
        let bytes = encode(&sample(), SaveFormat::WebP, 10).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn test_jpeg_drops_alpha() {
        let bytes = encode(&sample(), SaveFormat::Jpeg, 0).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 8);
        assert!(!decoded.color().has_alpha());
    }

    #[test]
    fn test_write_file_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        std::fs::write(&path, vec![0xAB; 100_000]).unwrap();

        write_file(&path, &sample(), &SaveSettings::new().with_format(SaveFormat::Png)).unwrap();
        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.png");
        let err = write_file(&path, &sample(), &SaveSettings::default()).unwrap_err();
        assert!(matches!(err, SaveError::Io(_)));
    }
}
