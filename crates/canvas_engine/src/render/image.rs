//! Decoded RGBA8 images

use std::path::Path;

use image::RgbaImage;

use super::texture::ResourceId;
use super::{RenderError, RenderResult};
use crate::foundation::Color;

/// CPU-side RGBA8 pixels, rows top to bottom
#[derive(Debug, Clone)]
pub struct Image {
    id: ResourceId,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Image {
    /// Wrap tightly packed RGBA8 pixels
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> RenderResult<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(RenderError::InvalidImage(format!(
                "{width}x{height} RGBA8 image needs {expected} bytes, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            id: ResourceId::next(),
            width,
            height,
            pixels,
        })
    }

    /// Take ownership of a decoded `image` buffer
    pub fn from_rgba_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            id: ResourceId::next(),
            width,
            height,
            pixels: image.into_raw(),
        }
    }

    /// Decode any supported file into RGBA8
    pub fn from_file<P: AsRef<Path>>(path: P) -> RenderResult<Self> {
        let path = path.as_ref();
        log::debug!("Loading image {}", path.display());
        let decoded = image::open(path)?;
        Ok(Self::from_rgba_image(decoded.to_rgba8()))
    }

    /// Image filled with one color
    pub fn solid(width: u32, height: u32, color: Color) -> Self {
        let texel = color.to_rgba8();
        let pixels = texel.repeat(width as usize * height as usize);
        Self {
            id: ResourceId::next(),
            width,
            height,
            pixels,
        }
    }

    /// Encode as PNG
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> RenderResult<()> {
        let buffer = RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| RenderError::InvalidImage("pixel buffer does not match dimensions".to_string()))?;
        buffer.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }

    /// Identity used as a cache key
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// RGBA8 bytes
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}
