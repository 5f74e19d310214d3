//! Thumbnail synthesis.

use crate::error::StoreResult;
use bindery_common::config::ThumbnailConfig;
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;

/// Turns cover image bytes into thumbnail bytes
pub trait Thumbnailer: Send + Sync {
    fn thumbnail(&self, image: &[u8]) -> StoreResult<Vec<u8>>;
}

/// Decodes any format `image` supports and re-encodes a bounded JPEG.
#[derive(Clone, Debug)]
pub struct ImageThumbnailer {
    max_width: u32,
    max_height: u32,
    quality: u8,
}

impl ImageThumbnailer {
    #[must_use]
    pub fn new(config: &ThumbnailConfig) -> Self {
        Self {
            max_width: config.max_width,
            max_height: config.max_height,
            quality: config.jpeg_quality.clamp(1, 100),
        }
    }
}

impl Default for ImageThumbnailer {
    fn default() -> Self {
        Self::new(&ThumbnailConfig::default())
    }
}

impl Thumbnailer for ImageThumbnailer {
    fn thumbnail(&self, data: &[u8]) -> StoreResult<Vec<u8>> {
        let img = image::load_from_memory(data)?;
        let thumb = if img.width() > self.max_width || img.height() > self.max_height {
            img.thumbnail(self.max_width, self.max_height)
        } else {
            img
        };
        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, self.quality);
        DynamicImage::ImageRgb8(thumb.to_rgb8()).write_with_encoder(encoder)?;
        Ok(out)
    }
}
