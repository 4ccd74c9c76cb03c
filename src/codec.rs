use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};

use crate::batch::{Frame, frame_to_rgb, rgb_to_frame};

/// Encode a single frame as PNG at the exact given path.
///
/// Missing parent directories are an error, not an invitation to create
/// them; path allocation is the storage layer's job.
pub fn write_png(frame: &Frame, path: &Path) -> Result<()> {
    let rgb = frame_to_rgb(frame);
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let encoder = PngEncoder::new_with_quality(
        BufWriter::new(file),
        CompressionType::Default,
        FilterType::Adaptive,
    );
    encoder
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .with_context(|| format!("failed to encode {}", path.display()))?;
    Ok(())
}

/// Decode an image file into a [0, 1] float frame, dropping any alpha channel.
pub fn read_png(path: &Path) -> Result<Frame> {
    let image = image::open(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    Ok(rgb_to_frame(&image.to_rgb8()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use tempfile::TempDir;

    #[test]
    fn test_png_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frame.png");

        let original = RgbImage::from_fn(9, 6, |x, y| {
            image::Rgb([(x * 20) as u8, (y * 30) as u8, ((x + y) * 10) as u8])
        });
        let frame = rgb_to_frame(&original);

        write_png(&frame, &path).unwrap();
        let reloaded = read_png(&path).unwrap();
        assert_eq!(reloaded, frame);
    }

    #[test]
    fn test_write_png_missing_parent_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope").join("frame.png");
        let frame = Frame::zeros((2, 2, 3));
        assert!(write_png(&frame, &path).is_err());
    }

    #[test]
    fn test_read_png_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(read_png(&dir.path().join("absent.png")).is_err());
    }
}
