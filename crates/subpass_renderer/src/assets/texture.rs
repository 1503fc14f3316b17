//! Decoded RGBA8 texture data

use std::path::Path;

use crate::vulkan::{VulkanError, VulkanResult};

/// Tightly packed RGBA8 texels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl TextureData {
    /// Wrap RGBA8 texels; `pixels` must hold exactly `width * height * 4` bytes
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> VulkanResult<Self> {
        if width == 0 || height == 0 {
            return Err(VulkanError::invalid("Texture dimensions must be non-zero"));
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(VulkanError::invalid(format!(
                "Texture {width}x{height} needs {expected} bytes, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// 1x1 texture of a single color
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: rgba.to_vec(),
        }
    }

    /// Decode an image file into RGBA8
    pub fn load(path: &Path) -> VulkanResult<Self> {
        let image = image::open(path).map_err(|e| VulkanError::TextureLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::new(width, height, rgba.into_raw())
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Texel bytes
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_texture() {
        let texture = TextureData::solid([255, 255, 255, 255]);
        assert_eq!((texture.width(), texture.height()), (1, 1));
        assert_eq!(texture.pixels(), &[255, 255, 255, 255]);
    }

    #[test]
    fn test_size_mismatch_rejected() {
        assert!(TextureData::new(2, 2, vec![0; 15]).is_err());
        assert!(TextureData::new(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(TextureData::new(0, 4, Vec::new()).is_err());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let result = TextureData::load(Path::new("does/not/exist.png"));
        match result {
            Err(VulkanError::TextureLoad { path, .. }) => {
                assert_eq!(path, Path::new("does/not/exist.png"));
            }
            other => panic!("expected TextureLoad error, got {other:?}"),
        }
    }
}
