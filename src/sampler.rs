use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::color::SampledColor;

pub const DEFAULT_WINDOW_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingStrategy {
    /// Most frequent exact color in a small window around a point.
    ModalWindow,
    /// Per-channel mean over the whole frame.
    AreaAverage,
}

impl std::fmt::Display for SamplingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl SamplingStrategy {
    /// Every strategy in cycling order.
    pub fn all() -> &'static [SamplingStrategy] {
        &[SamplingStrategy::ModalWindow, SamplingStrategy::AreaAverage]
    }

    pub fn name(&self) -> &'static str {
        match self {
            SamplingStrategy::ModalWindow => "Modal window",
            SamplingStrategy::AreaAverage => "Area average",
        }
    }

    /// The strategy after this one, wrapping around.
    pub fn next(&self) -> SamplingStrategy {
        let all = Self::all();
        let current_index = all.iter().position(|s| s == self).unwrap_or(0);
        all[(current_index + 1) % all.len()]
    }
}

/// Target point in image coordinates. May lie outside the image; it is
/// clamped before scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplePoint {
    pub x: i64,
    pub y: i64,
}

impl SamplePoint {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    pub fn center_of(image: &RgbaImage) -> Self {
        Self::new(image.width() as i64 / 2, image.height() as i64 / 2)
    }
}

/// Half-open pixel rectangle, always inside the image it was built for.
/// Only built through [`Window::around`] and [`Window::covering`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

impl Window {
    /// Every pixel of an image with the given dimensions. `None` when the
    /// image has no pixels.
    pub fn covering(image_dims: (u32, u32)) -> Option<Self> {
        let (width, height) = image_dims;
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self {
            x0: 0,
            y0: 0,
            x1: width,
            y1: height,
        })
    }

    /// Top-left corner, inclusive.
    pub fn origin(&self) -> (u32, u32) {
        (self.x0, self.y0)
    }

    /// Width and height in pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.x1 - self.x0, self.y1 - self.y0)
    }

    /// A `width`x`height` rectangle centered on `point`, intersected with the
    /// image bounds. `None` when the image has no pixels.
    pub fn around(point: SamplePoint, width: u32, height: u32, image_dims: (u32, u32)) -> Option<Self> {
        let (img_w, img_h) = image_dims;
        if img_w == 0 || img_h == 0 || width == 0 || height == 0 {
            return None;
        }

        let cx = point.x.clamp(0, img_w as i64 - 1) as u32;
        let cy = point.y.clamp(0, img_h as i64 - 1) as u32;

        let x0 = cx.saturating_sub(width / 2);
        let y0 = cy.saturating_sub(height / 2);
        let x1 = cx.saturating_add(width - width / 2).min(img_w);
        let y1 = cy.saturating_add(height - height / 2).min(img_h);

        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self { x0, y0, x1, y1 })
    }

    pub fn pixel_count(&self) -> u64 {
        (self.x1 - self.x0) as u64 * (self.y1 - self.y0) as u64
    }
}

/// Reduces a decoded still to one representative color.
#[derive(Debug, Clone)]
pub struct ColorSampler {
    strategy: SamplingStrategy,
    window_width: u32,
    window_height: u32,
}

impl Default for ColorSampler {
    fn default() -> Self {
        Self::new(SamplingStrategy::AreaAverage)
    }
}

impl ColorSampler {
    pub fn new(strategy: SamplingStrategy) -> Self {
        Self {
            strategy,
            window_width: DEFAULT_WINDOW_SIZE,
            window_height: DEFAULT_WINDOW_SIZE,
        }
    }

    /// Window size used by the modal strategy.
    pub fn with_window(mut self, width: u32, height: u32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }

    pub fn strategy(&self) -> SamplingStrategy {
        self.strategy
    }

    /// Samples with the configured strategy. `point` is ignored by the
    /// whole-frame average.
    pub fn sample(&self, image: &RgbaImage, point: SamplePoint) -> Option<SampledColor> {
        match self.strategy {
            SamplingStrategy::ModalWindow => {
                modal_color(image, point, self.window_width, self.window_height)
            }
            SamplingStrategy::AreaAverage => area_average(image),
        }
    }

    /// Runs the scan on the blocking pool and hands the result back to the
    /// calling task.
    pub async fn sample_in_background(
        &self,
        image: RgbaImage,
        point: SamplePoint,
    ) -> Result<Option<SampledColor>> {
        let sampler = self.clone();
        tokio::task::spawn_blocking(move || sampler.sample(&image, point))
            .await
            .context("Pixel scan task panicked")
    }
}

/// The most frequent exact RGBA value inside the window around `point`.
/// Ties go to the color seen first in row-major order.
pub fn modal_color(
    image: &RgbaImage,
    point: SamplePoint,
    window_width: u32,
    window_height: u32,
) -> Option<SampledColor> {
    let window = Window::around(point, window_width, window_height, image.dimensions())?;

    let mut first_seen: Vec<[u8; 4]> = Vec::new();
    let mut counts: HashMap<[u8; 4], u32> = HashMap::new();

    for y in window.y0..window.y1 {
        for x in window.x0..window.x1 {
            let pixel = image.get_pixel(x, y).0;
            let count = counts.entry(pixel).or_insert(0);
            if *count == 0 {
                first_seen.push(pixel);
            }
            *count += 1;
        }
    }

    let mut best: Option<([u8; 4], u32)> = None;
    for pixel in first_seen {
        let count = counts[&pixel];
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((pixel, count));
        }
    }

    let (scan_w, scan_h) = window.size();
    let (left, top) = window.origin();
    debug!(
        "Modal scan over {}x{} window at ({}, {}): {} distinct colors",
        scan_w,
        scan_h,
        left,
        top,
        counts.len()
    );

    best.map(|(pixel, _)| SampledColor::from(Rgba(pixel)))
}

/// Per-channel arithmetic mean over every pixel, rounded to nearest.
pub fn area_average(image: &RgbaImage) -> Option<SampledColor> {
    let window = Window::covering(image.dimensions())?;
    region_average(image, window)
}

/// Per-channel mean over a window of the image. `window` must come from the
/// same image's dimensions.
fn region_average(image: &RgbaImage, window: Window) -> Option<SampledColor> {
    let pixel_count = window.pixel_count();
    if pixel_count == 0 {
        return None;
    }

    let mut totals = [0u64; 4];
    for y in window.y0..window.y1 {
        for x in window.x0..window.x1 {
            let pixel = image.get_pixel(x, y);
            for (total, channel) in totals.iter_mut().zip(pixel.0.iter()) {
                *total += *channel as u64;
            }
        }
    }

    let mean = |total: u64| ((total + pixel_count / 2) / pixel_count) as u8;
    Some(SampledColor::new(
        mean(totals[0]),
        mean(totals[1]),
        mean(totals[2]),
        mean(totals[3]),
    ))
}
