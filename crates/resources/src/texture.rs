//! Decoded RGBA8 images ready for upload.

use std::path::Path;

use crate::error::{ResourceError, ResourceResult};

/// Tightly packed 8-bit RGBA pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    /// Bytes per row, always `width * 4`.
    pub row_pitch: u32,
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Decodes an image file of any format the `image` crate supports.
    pub fn load(path: impl AsRef<Path>) -> ResourceResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }

        let rgba = image::open(path)?.into_rgba8();
        let (width, height) = rgba.dimensions();
        tracing::debug!("Decoded texture '{}' ({}x{})", path.display(), width, height);

        Ok(Self::from_rgba8(width, height, rgba.into_raw()))
    }

    /// A 1x1 texture of a single color.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self::from_rgba8(1, 1, rgba.to_vec())
    }

    fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            row_pitch: width * 4,
            pixels,
        }
    }

    /// Iterates pixel rows of `row_pitch` bytes.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.pixels.chunks_exact(self.row_pitch.max(1) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid() {
        let tex = TextureData::solid([255, 255, 255, 255]);
        assert_eq!((tex.width, tex.height, tex.row_pitch), (1, 1, 4));
        assert_eq!(tex.pixels, vec![255; 4]);
        assert_eq!(tex.rows().count(), 1);
    }

    #[test]
    fn test_load_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gradient.png");
        let img = image::RgbImage::from_fn(3, 2, |x, y| image::Rgb([x as u8 * 10, y as u8 * 20, 7]));
        img.save(&path).unwrap();

        let tex = TextureData::load(&path).unwrap();

        assert_eq!((tex.width, tex.height, tex.row_pitch), (3, 2, 12));
        assert_eq!(tex.pixels.len(), 24);
        // Second row, third pixel, alpha added by the RGBA conversion
        assert_eq!(&tex.pixels[20..24], &[20, 20, 7, 255]);
        assert_eq!(tex.rows().count(), 2);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            TextureData::load("does/not/exist.png"),
            Err(ResourceError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_corrupt_file_is_image_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();
        assert!(matches!(TextureData::load(&path), Err(ResourceError::Image(_))));
    }
}
