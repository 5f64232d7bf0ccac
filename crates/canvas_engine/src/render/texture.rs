//! GPU textures and resource identity

use std::sync::atomic::{AtomicU64, Ordering};

use super::driver::{Driver, FilterMode, PixelBufferDescriptor, TextureDesc, TextureFormat, TextureHandle};
use super::image::Image;
use super::{RenderError, RenderResult};
use crate::foundation::Recti;

/// Process-unique identity of a texture or image.
///
/// The atlas allocator keys its placement cache on this, so two distinct
/// sources never share a placement even if their pixels are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Allocate a fresh identity
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value
    pub fn get(self) -> u64 {
        self.0
    }
}

/// A 2D texture living in the driver
#[derive(Debug)]
pub struct Texture {
    id: ResourceId,
    handle: TextureHandle,
    width: u32,
    height: u32,
    format: TextureFormat,
    filter: FilterMode,
}

impl Texture {
    /// Create an uninitialized texture
    pub fn new(
        driver: &mut dyn Driver,
        width: u32,
        height: u32,
        format: TextureFormat,
        filter: FilterMode,
    ) -> RenderResult<Self> {
        if !driver.is_texture_format_supported(format) {
            return Err(RenderError::UnsupportedFormat(format));
        }
        let handle = driver.create_texture(&TextureDesc::new_2d(width, height, format));
        Ok(Self {
            id: ResourceId::next(),
            handle,
            width,
            height,
            format,
            filter,
        })
    }

    /// Create an RGBA8 texture holding `image`
    pub fn from_image(driver: &mut dyn Driver, image: &Image, filter: FilterMode) -> RenderResult<Self> {
        let texture = Self::new(driver, image.width(), image.height(), TextureFormat::Rgba8, filter)?;
        texture.update_region(driver, 0, 0, image.width(), image.height(), image.pixels().to_vec());
        Ok(texture)
    }

    /// Identity used as a cache key
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Driver handle
    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    /// Width in texels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in texels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Texel format
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Preferred sampling filter
    pub fn filter(&self) -> FilterMode {
        self.filter
    }

    /// Upload tightly packed pixels into a sub-rectangle
    pub fn update_region(&self, driver: &mut dyn Driver, x: u32, y: u32, width: u32, height: u32, pixels: Vec<u8>) {
        driver.update_2d_image(
            self.handle,
            0,
            x,
            y,
            width,
            height,
            PixelBufferDescriptor::new(pixels, self.format),
        );
    }

    /// Copy `src_rect` of `source` to (`x`, `y`) of this texture on the device
    pub fn copy_region_from(&self, driver: &mut dyn Driver, x: i32, y: i32, source: &Self, src_rect: Recti) {
        let dst_rect = Recti::new(x, y, src_rect.w, src_rect.h);
        driver.blit_texture(self.handle, dst_rect, source.handle, src_rect, FilterMode::Nearest);
    }

    /// Read level 0 back from the driver
    pub fn read_back(&self, driver: &mut dyn Driver) -> Vec<u8> {
        driver.read_texture(self.handle, 0)
    }

    /// Release the driver texture; the handle is invalid afterwards
    pub fn destroy(&self, driver: &mut dyn Driver) {
        driver.destroy_texture(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::DriverConfig;
    use crate::render::backends::SoftwareDriver;

    #[test]
    fn test_resource_ids_are_unique() {
        let a = ResourceId::next();
        let b = ResourceId::next();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }

    #[test]
    fn test_compressed_format_rejected() {
        let mut driver = SoftwareDriver::new(&DriverConfig::default());
        let result = Texture::new(&mut driver, 4, 4, TextureFormat::Astc4x4Rgba, FilterMode::Linear);
        assert!(matches!(result, Err(RenderError::UnsupportedFormat(TextureFormat::Astc4x4Rgba))));
    }

    #[test]
    fn test_copy_region_between_textures() {
        let mut driver = SoftwareDriver::new(&DriverConfig::default());
        let image = Image::solid(2, 2, crate::foundation::Color::from_rgba8(10, 20, 30, 255));
        let source = Texture::from_image(&mut driver, &image, FilterMode::Nearest).unwrap();
        let atlas = Texture::new(&mut driver, 4, 4, TextureFormat::Rgba8, FilterMode::Nearest).unwrap();

        atlas.copy_region_from(&mut driver, 2, 0, &source, Recti::new(0, 0, 2, 2));

        let pixels = atlas.read_back(&mut driver);
        assert_eq!(&pixels[(2 * 4)..(2 * 4 + 4)], &[10, 20, 30, 255]);
        assert_eq!(&pixels[0..4], &[0, 0, 0, 0]);
    }
}
