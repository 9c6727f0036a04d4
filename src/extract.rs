use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::ops::Deref;

use image::{DynamicImage, GenericImageView, RgbaImage, imageops::FilterType};
use serde::Serialize;

use crate::color::Color;
use crate::error::{Error, Result};

pub const DEFAULT_PALETTE_SIZE: usize = 10;

// ------------------------------------------------------------
// Configuration
// ------------------------------------------------------------

/// Decides whether a color is usable as a card background.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SuitabilityFilter {
    /// Colors with every channel above this are treated as white.
    pub white_above: u8,
    /// Colors with every channel below this are treated as black.
    pub black_below: u8,
    pub min_saturation: f64,
    pub min_lightness: f64,
    pub max_lightness: f64,
}

impl Default for SuitabilityFilter {
    fn default() -> Self {
        Self {
            white_above: 240,
            black_below: 20,
            min_saturation: 0.15,
            min_lightness: 0.15,
            max_lightness: 0.85,
        }
    }
}

impl SuitabilityFilter {
    pub fn is_usable(&self, color: Color) -> bool {
        let Color { red, green, blue } = color;
        let near_white =
            red > self.white_above && green > self.white_above && blue > self.white_above;
        let near_black =
            red < self.black_below && green < self.black_below && blue < self.black_below;
        if near_white || near_black {
            return false;
        }

        let hsl = color.to_hsl();
        hsl.s >= self.min_saturation
            && hsl.l >= self.min_lightness
            && hsl.l <= self.max_lightness
    }
}

/// Tunables for [`PaletteExtractor`]. The defaults are the ones the
/// catalogue editor uses.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExtractorConfig {
    /// Only every n-th pixel of the buffer is looked at.
    pub sample_stride: usize,
    /// Pixels with alpha below this are skipped as transparent.
    pub min_alpha: u8,
    /// Channel width of one histogram bucket.
    pub bucket_size: u8,
    /// Colors closer than this (Euclidean RGB) count as duplicates.
    pub min_distance: f64,
    /// Images wider than this are shrunk before sampling.
    pub sample_width: u32,
    pub filter: SuitabilityFilter,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            sample_stride: 10,
            min_alpha: 100,
            bucket_size: 10,
            min_distance: 60.0,
            sample_width: 100,
            filter: SuitabilityFilter::default(),
        }
    }
}

// ------------------------------------------------------------
// Palette
// ------------------------------------------------------------

/// Distinct background candidates, most frequent first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Palette {
    colors: Vec<Color>,
}

impl Palette {
    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn to_css_strings(&self) -> Vec<String> {
        self.colors.iter().map(Color::to_string).collect()
    }

    pub fn to_hex_strings(&self) -> Vec<String> {
        self.colors.iter().map(|c| c.to_hex()).collect()
    }
}

impl Deref for Palette {
    type Target = [Color];

    fn deref(&self) -> &[Color] {
        &self.colors
    }
}

impl<'a> IntoIterator for &'a Palette {
    type Item = &'a Color;
    type IntoIter = std::slice::Iter<'a, Color>;

    fn into_iter(self) -> Self::IntoIter {
        self.colors.iter()
    }
}

// ------------------------------------------------------------
// Histogram buckets
// ------------------------------------------------------------

/// Coarse histogram cell: every channel divided by the bucket size and
/// rounded. Coordinates are capped so the representative stays in 0..=255.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColorBucket([u8; 3]);

impl ColorBucket {
    pub fn quantize(color: Color, size: u8) -> Self {
        let size = size.max(1);
        let cap = u8::MAX / size;
        let q = |c: u8| ((c as f64 / size as f64).round() as u8).min(cap);
        Self([q(color.red), q(color.green), q(color.blue)])
    }

    pub fn representative(self, size: u8) -> Color {
        let size = size.max(1);
        let [r, g, b] = self.0;
        Color::new(r.saturating_mul(size), g.saturating_mul(size), b.saturating_mul(size))
    }
}

// ------------------------------------------------------------
// Sampling
// ------------------------------------------------------------

/// Every `stride`-th RGBA pixel of `pixels`, starting with the first.
///
/// Rejects buffers that do not hold whole pixels.
pub(crate) fn sample_pixels(
    pixels: &[u8],
    stride: usize,
) -> Result<impl Iterator<Item = [u8; 4]> + '_> {
    if pixels.len() % 4 != 0 {
        return Err(Error::invalid_input(format!(
            "pixel buffer length {} is not a multiple of 4",
            pixels.len()
        )));
    }

    Ok(pixels
        .chunks_exact(4)
        .step_by(stride.max(1))
        .map(|px| [px[0], px[1], px[2], px[3]]))
}

/// Tallest image, as a multiple of the sample width, that is sampled without
/// further shrinking.
pub const MAX_SAMPLE_ASPECT: u32 = 4;

/// Shrink to fit `width` x `MAX_SAMPLE_ASPECT * width`, keeping the aspect
/// ratio. Sides are truncated, never below one pixel. Images that already fit
/// are sampled at their own size.
pub fn downscale_for_sampling(img: &DynamicImage, width: u32) -> RgbaImage {
    let (orig_w, orig_h) = img.dimensions();
    if orig_w == 0 || orig_h == 0 {
        return RgbaImage::new(0, 0);
    }
    let width = width.max(1);
    let max_height = width.saturating_mul(MAX_SAMPLE_ASPECT);

    let ratio = (width as f64 / orig_w as f64).min(max_height as f64 / orig_h as f64);
    if ratio >= 1.0 {
        return img.to_rgba8();
    }
    let new_w = ((orig_w as f64 * ratio) as u32).max(1);
    let new_h = ((orig_h as f64 * ratio) as u32).max(1);
    image::imageops::resize(img, new_w, new_h, FilterType::Triangle)
}

// ------------------------------------------------------------
// Extraction
// ------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct PaletteExtractor {
    config: ExtractorConfig,
}

impl PaletteExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Build a palette of at most `count` colors from a raw RGBA buffer.
    ///
    /// Steps performed:
    /// 1. Sample every `sample_stride`-th pixel, skipping transparent ones.
    /// 2. Drop colors the [`SuitabilityFilter`] rejects.
    /// 3. Count the survivors per [`ColorBucket`].
    /// 4. Walk buckets by descending frequency (ties in first-seen order) and
    ///    keep representatives that are not too close to one already kept.
    pub fn extract(&self, pixels: &[u8], count: usize) -> Result<Palette> {
        let samples = sample_pixels(pixels, self.config.sample_stride)?;
        if count == 0 {
            return Ok(Palette::default());
        }

        let filter = &self.config.filter;
        let size = self.config.bucket_size;

        let mut slots: HashMap<ColorBucket, usize> = HashMap::new();
        let mut histogram: Vec<(ColorBucket, u32)> = Vec::new();
        let mut sampled = 0usize;

        for [r, g, b, a] in samples {
            sampled += 1;
            if a < self.config.min_alpha {
                continue;
            }
            let color = Color::new(r, g, b);
            if !filter.is_usable(color) {
                continue;
            }

            let bucket = ColorBucket::quantize(color, size);
            match slots.entry(bucket) {
                Entry::Occupied(slot) => histogram[*slot.get()].1 += 1,
                Entry::Vacant(slot) => {
                    slot.insert(histogram.len());
                    histogram.push((bucket, 1));
                }
            }
        }

        // Stable, so equal counts keep the order they were first seen in.
        histogram.sort_by(|a, b| b.1.cmp(&a.1));

        let mut colors: Vec<Color> = Vec::with_capacity(count.min(histogram.len()));
        for &(bucket, _) in &histogram {
            if colors.len() >= count {
                break;
            }
            let candidate = bucket.representative(size);
            // Rounding to the bucket grid can push a borderline color over a threshold.
            if !filter.is_usable(candidate) {
                continue;
            }
            if colors
                .iter()
                .any(|kept| kept.distance(candidate) < self.config.min_distance)
            {
                continue;
            }
            colors.push(candidate);
        }

        tracing::debug!(
            sampled,
            buckets = histogram.len(),
            kept = colors.len(),
            "Extracted palette"
        );

        Ok(Palette { colors })
    }

    /// Downscale a decoded image to the configured sample width and extract
    /// its palette.
    pub fn extract_from_image(&self, img: &DynamicImage, count: usize) -> Result<Palette> {
        let small = downscale_for_sampling(img, self.config.sample_width);
        self.extract(small.as_raw(), count)
    }
}

/// [`PaletteExtractor::extract`] with the default configuration.
pub fn extract_palette(pixels: &[u8], count: usize) -> Result<Palette> {
    PaletteExtractor::default().extract(pixels, count)
}

/// [`PaletteExtractor::extract_from_image`] with the default configuration.
pub fn extract_palette_from_image(img: &DynamicImage, count: usize) -> Result<Palette> {
    PaletteExtractor::default().extract_from_image(img, count)
}
