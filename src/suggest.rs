use std::collections::HashSet;

use kmeans_colors::{Sort, get_kmeans};
use palette::{IntoColor, Lab, Srgb};
use serde::{Deserialize, Serialize};

use crate::color::{BLACK, Color, Hsl, WHITE, hsl_to_rgb};
use crate::error::Result;
use crate::extract::sample_pixels;

/// Returned by [`suggest_background`] for an empty palette.
pub const FALLBACK_BACKGROUND: Color = Color::new(0xf4, 0xf4, 0xf4);
/// Price bar color before any image has been analysed.
pub const DEFAULT_DOMINANT: Color = Color::new(0xd1, 0xb3, 0xc4);

pub const DEFAULT_SWATCH_COUNT: usize = 5;

const MAX_BACKGROUND_SATURATION: f64 = 0.3;
const BACKGROUND_LIGHTNESS: f64 = 0.9;

const TONE_SAMPLE_STRIDE: usize = 10;
const TONE_MIN_ALPHA: u8 = 100;
const TONE_WHITE_ABOVE: u8 = 240;
const TONE_BLACK_BELOW: u8 = 15;

const SWATCH_CLUSTERS: usize = 6;
/// Upper bound on the pixels fed to k-means.
const SWATCH_MAX_SAMPLES: usize = 4096;
const SWATCH_MIN_BRIGHTNESS: f64 = 40.0;
const SWATCH_MAX_BRIGHTNESS: f64 = 220.0;
const SWATCH_MIN_DISTANCE: f64 = 60.0;

// ------------------------------------------------------------
// Pastel background
// ------------------------------------------------------------

/// Pastel background matching a palette.
///
/// Hue and saturation are plain arithmetic means over the palette, the
/// saturation is capped at 0.3 and the lightness pinned to 0.9. The hue mean
/// is linear, so palettes straddling 0°/360° average towards cyan (10° and
/// 350° give 180°).
pub fn suggest_background(colors: &[Color]) -> Color {
    if colors.is_empty() {
        return FALLBACK_BACKGROUND;
    }

    let (h, s) = colors.iter().fold((0.0, 0.0), |(h, s), c| {
        let hsl = c.to_hsl();
        (h + hsl.h, s + hsl.s)
    });
    let n = colors.len() as f64;

    hsl_to_rgb(Hsl {
        h: h / n,
        s: (s / n).min(MAX_BACKGROUND_SATURATION),
        l: BACKGROUND_LIGHTNESS,
    })
}

// ------------------------------------------------------------
// Dominant color and backdrop
// ------------------------------------------------------------

/// Which plain backdrop suits the photographed product.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Backdrop {
    #[default]
    White,
    Black,
}

impl Backdrop {
    pub fn color(self) -> Color {
        match self {
            Backdrop::White => WHITE,
            Backdrop::Black => BLACK,
        }
    }
}

/// Overall tone of an image, measured over the same sparse sample the
/// palette uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tone {
    /// Mean of the opaque pixels that are neither near-white nor near-black.
    pub dominant: Option<Color>,
    pub backdrop: Backdrop,
}

impl Tone {
    pub fn measure(pixels: &[u8]) -> Result<Self> {
        let mut sum = [0u64; 3];
        let mut count = 0u64;
        let mut whites = 0usize;
        let mut blacks = 0usize;

        for [r, g, b, a] in sample_pixels(pixels, TONE_SAMPLE_STRIDE)? {
            if a <= TONE_MIN_ALPHA {
                continue;
            }
            if r > TONE_WHITE_ABOVE && g > TONE_WHITE_ABOVE && b > TONE_WHITE_ABOVE {
                whites += 1;
            } else if r < TONE_BLACK_BELOW && g < TONE_BLACK_BELOW && b < TONE_BLACK_BELOW {
                blacks += 1;
            } else {
                sum[0] += r as u64;
                sum[1] += g as u64;
                sum[2] += b as u64;
                count += 1;
            }
        }

        let dominant = (count > 0).then(|| {
            Color::new(
                (sum[0] / count) as u8,
                (sum[1] / count) as u8,
                (sum[2] / count) as u8,
            )
        });
        let backdrop = if whites > blacks {
            Backdrop::White
        } else {
            Backdrop::Black
        };

        Ok(Self { dominant, backdrop })
    }
}

pub fn dominant_color(pixels: &[u8]) -> Result<Option<Color>> {
    Ok(Tone::measure(pixels)?.dominant)
}

pub fn image_backdrop(pixels: &[u8]) -> Result<Backdrop> {
    Ok(Tone::measure(pixels)?.backdrop)
}

// ------------------------------------------------------------
// k-means swatches
// ------------------------------------------------------------

/// Stride that keeps at most [`SWATCH_MAX_SAMPLES`] of `pixel_count` pixels.
fn swatch_stride(pixel_count: usize) -> usize {
    pixel_count.div_ceil(SWATCH_MAX_SAMPLES).max(1)
}

/// Up to `max` mid-brightness swatches found by clustering the opaque pixels
/// in Lab space, most populous cluster first. Large buffers are thinned out
/// evenly before clustering.
pub fn suggest_swatches(pixels: &[u8], max: usize) -> Result<Vec<Color>> {
    let mut distinct = HashSet::new();
    let lab_pixels: Vec<Lab> = sample_pixels(pixels, swatch_stride(pixels.len() / 4))?
        .filter(|px| px[3] != 0)
        .map(|[r, g, b, _]| {
            distinct.insert([r, g, b]);
            Srgb::<u8>::new(r, g, b).into_linear().into_color()
        })
        .collect();

    if lab_pixels.is_empty() || max == 0 {
        return Ok(Vec::new());
    }

    // k-means++ seeding needs at least k distinct points
    let k = SWATCH_CLUSTERS.min(distinct.len());
    let kmeans = get_kmeans(k, 20, 1e-4, false, &lab_pixels, 0);
    let mut clusters = Lab::sort_indexed_colors(&kmeans.centroids, &kmeans.indices);
    clusters.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));

    let mut swatches: Vec<Color> = Vec::with_capacity(max);
    for cluster in clusters {
        if swatches.len() >= max {
            break;
        }
        let rgb: Srgb<f32> = Srgb::from_linear(cluster.centroid.into_color());
        let color = Color::from(rgb.into_format::<u8>());

        let brightness = color.brightness();
        if !(SWATCH_MIN_BRIGHTNESS..=SWATCH_MAX_BRIGHTNESS).contains(&brightness) {
            continue;
        }
        if swatches
            .iter()
            .any(|kept| kept.distance(color) < SWATCH_MIN_DISTANCE)
        {
            continue;
        }
        swatches.push(color);
    }

    Ok(swatches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(px: [u8; 4], n: usize) -> Vec<u8> {
        px.iter().copied().cycle().take(n * 4).collect()
    }

    #[test]
    fn empty_palette_falls_back() {
        assert_eq!(suggest_background(&[]), FALLBACK_BACKGROUND);
        assert_eq!(suggest_background(&[]).to_hex(), "#f4f4f4");
    }

    #[test]
    fn background_is_pale_and_desaturated() {
        let bg = suggest_background(&[Color::new(250, 0, 0)]);
        // h = 0, s capped to 0.3, l = 0.9
        assert_eq!(bg, Color::new(237, 222, 222));
        let hsl = bg.to_hsl();
        assert!((hsl.l - 0.9).abs() < 0.01);
        assert!(hsl.s <= 0.31);
    }

    #[test]
    fn hue_mean_is_linear() {
        // 0° and 240° average to 120° (green) rather than 300°
        let bg = suggest_background(&[Color::new(255, 0, 0), Color::new(0, 0, 255)]);
        assert!(bg.green > bg.red && bg.green > bg.blue, "{bg}");
    }

    #[test]
    fn reds_either_side_of_zero_average_to_cyan() {
        // about 10° and 350°, mean 180°
        let reds = [Color::new(255, 43, 0), Color::new(255, 0, 43)];
        assert!((reds[0].to_hsl().h - 10.0).abs() < 0.5);
        assert!((reds[1].to_hsl().h - 350.0).abs() < 0.5);

        let bg = suggest_background(&reds);
        assert!(bg.red < bg.green, "{bg}");
        assert!(bg.green.abs_diff(bg.blue) <= 1, "{bg}");
        assert!((bg.to_hsl().h - 180.0).abs() < 2.0, "{bg}");
        assert!((bg.to_hsl().l - 0.9).abs() < 0.01, "{bg}");
    }

    #[test]
    fn tone_of_mixed_image() {
        let mut buf = solid([255, 255, 255, 255], 30);
        buf.extend(solid([10, 10, 10, 255], 10));
        buf.extend(solid([100, 50, 25, 255], 10));
        buf.extend(solid([201, 50, 26, 255], 10));
        let tone = Tone::measure(&buf).unwrap();
        assert_eq!(tone.backdrop, Backdrop::White);
        // floor((100 + 201) / 2) = 150
        assert_eq!(tone.dominant, Some(Color::new(150, 50, 25)));
    }

    #[test]
    fn tone_ties_pick_black_and_skip_translucent() {
        let mut buf = solid([255, 255, 255, 255], 10);
        buf.extend(solid([0, 0, 0, 255], 10));
        buf.extend(solid([90, 90, 200, 100], 10));
        let tone = Tone::measure(&buf).unwrap();
        assert_eq!(tone.backdrop, Backdrop::Black);
        assert_eq!(tone.dominant, None);
        assert_eq!(dominant_color(&[]).unwrap(), None);
        assert!(image_backdrop(&[0, 0]).is_err());
    }

    #[test]
    fn backdrop_parses() {
        assert_eq!("White".parse::<Backdrop>().unwrap(), Backdrop::White);
        assert_eq!(Backdrop::Black.to_string(), "black");
        assert_eq!(Backdrop::Black.color(), BLACK);
    }

    #[test]
    fn swatches_skip_extremes() {
        let mut buf = solid([255, 255, 255, 255], 200);
        buf.extend(solid([0, 0, 0, 255], 100));
        buf.extend(solid([200, 40, 40, 255], 80));
        buf.extend(solid([40, 60, 200, 255], 40));
        let swatches = suggest_swatches(&buf, DEFAULT_SWATCH_COUNT).unwrap();
        assert!(!swatches.is_empty());
        assert!(swatches.len() <= DEFAULT_SWATCH_COUNT);
        for c in &swatches {
            assert!((40.0..=220.0).contains(&c.brightness()), "{c}");
        }
        for (i, a) in swatches.iter().enumerate() {
            for b in &swatches[i + 1..] {
                assert!(a.distance(*b) >= 60.0);
            }
        }
    }

    #[test]
    fn swatches_of_flat_image() {
        let swatches = suggest_swatches(&solid([200, 40, 40, 255], 64), 5).unwrap();
        assert_eq!(swatches.len(), 1);
        assert!(swatches[0].distance(Color::new(200, 40, 40)) < 3.0);
    }

    #[test]
    fn swatch_input_is_bounded() {
        assert_eq!(swatch_stride(0), 1);
        assert_eq!(swatch_stride(SWATCH_MAX_SAMPLES), 1);
        assert_eq!(swatch_stride(SWATCH_MAX_SAMPLES + 1), 2);
        for n in [4097usize, 10_000, 400_000, 1_000_003] {
            assert!(n.div_ceil(swatch_stride(n)) <= SWATCH_MAX_SAMPLES, "{n}");
        }

        // a strip far larger than the budget still clusters to its one color
        let swatches = suggest_swatches(&solid([200, 40, 40, 255], 400_000), 5).unwrap();
        assert_eq!(swatches.len(), 1);
        assert!(swatches[0].distance(Color::new(200, 40, 40)) < 3.0);
    }

    #[test]
    fn swatches_of_transparent_image() {
        assert!(suggest_swatches(&solid([10, 200, 10, 0], 50), 5).unwrap().is_empty());
        assert!(suggest_swatches(&solid([10, 200, 10, 255], 50), 0).unwrap().is_empty());
    }
}
