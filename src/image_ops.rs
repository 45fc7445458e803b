use anyhow::{Context, Result};
use image::{imageops, RgbaImage};
use log::debug;
use std::path::Path;

/// Loads stills from disk or memory and prepares them for sampling.
pub struct ImageLoader {
    supported_formats: Vec<&'static str>,
    max_dimensions: (u32, u32),
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageLoader {
    pub fn new() -> Self {
        Self {
            supported_formats: vec!["png", "jpg", "jpeg", "bmp", "gif", "tiff", "webp"],
            max_dimensions: (4096, 4096),
        }
    }

    /// Reads a still from disk, rejecting unknown extensions, and shrinks it
    /// to the maximum working size.
    pub fn load_image<P: AsRef<Path>>(&self, path: P) -> Result<RgbaImage> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(anyhow::anyhow!("Image file not found: {}", path.display()));
        }

        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            let ext_lower = extension.to_lowercase();
            if !self.supported_formats.contains(&ext_lower.as_str()) {
                return Err(anyhow::anyhow!("Unsupported file format: {}", extension));
            }
        } else {
            return Err(anyhow::anyhow!("No file extension found"));
        }

        let img = image::open(path)
            .with_context(|| format!("Failed to load image from {}", path.display()))?;

        let rgba = self.fit(img.to_rgba8());
        debug!("Loaded image {}: {}x{}", path.display(), rgba.width(), rgba.height());
        Ok(rgba)
    }

    /// Decodes an encoded still (JPEG, PNG, ...) held in memory.
    pub fn decode(&self, bytes: &[u8]) -> Result<RgbaImage> {
        let img = image::load_from_memory(bytes).context("Failed to decode captured image")?;
        Ok(self.fit(img.to_rgba8()))
    }

    fn fit(&self, image: RgbaImage) -> RgbaImage {
        let (max_w, max_h) = self.max_dimensions;
        if image.width() > max_w || image.height() > max_h {
            debug!(
                "Resizing large image from {}x{} to fit within {}x{}",
                image.width(),
                image.height(),
                max_w,
                max_h
            );
            resize_to_fit(&image, max_w, max_h)
        } else {
            image
        }
    }
}

/// Scales down, keeping the aspect ratio, to fit inside the bounds. Never
/// upscales.
pub fn resize_to_fit(image: &RgbaImage, max_width: u32, max_height: u32) -> RgbaImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let width_ratio = max_width as f32 / width as f32;
    let height_ratio = max_height as f32 / height as f32;
    let scale = width_ratio.min(height_ratio);

    if scale >= 1.0 {
        return image.clone();
    }

    let new_width = ((width as f32 * scale) as u32).max(1);
    let new_height = ((height as f32 * scale) as u32).max(1);

    imageops::resize(image, new_width, new_height, imageops::FilterType::Lanczos3)
}

/// Centered square crop whose side is the shorter image edge, capped at
/// `max_side`.
pub fn crop_center(image: &RgbaImage, max_side: u32) -> RgbaImage {
    let (width, height) = image.dimensions();
    let side = width.min(height).min(max_side);
    if side == 0 {
        return RgbaImage::new(0, 0);
    }

    let x = (width - side) / 2;
    let y = (height - side) / 2;
    imageops::crop_imm(image, x, y, side, side).to_image()
}
