use std::str::FromStr;

use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::error::{Error, Result};
use crate::extract::{Palette, PaletteExtractor, downscale_for_sampling};
use crate::suggest::{Backdrop, DEFAULT_SWATCH_COUNT, Tone, suggest_background, suggest_swatches};

/// Rectangle the user confirmed in the crop dialog, in source pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crop {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Crop {
    /// Cut the rectangle out of `img`, clamped to its bounds.
    pub fn apply(&self, img: &DynamicImage) -> Result<DynamicImage> {
        let (w, h) = img.dimensions();
        if self.width == 0 || self.height == 0 || self.x >= w || self.y >= h {
            return Err(Error::invalid_input(format!(
                "crop {self:?} selects nothing of a {w}x{h} image"
            )));
        }
        Ok(img.crop_imm(self.x, self.y, self.width, self.height))
    }
}

/// Parses `x,y,width,height`.
impl FromStr for Crop {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parse_error = || Error::ParseOption {
            kind: "crop",
            input: s.to_string(),
        };
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| parse_error())?;
        match parts.as_slice() {
            &[x, y, width, height] => Ok(Self {
                x,
                y,
                width,
                height,
            }),
            _ => Err(parse_error()),
        }
    }
}

/// Decode an uploaded file and apply the confirmed crop, if any.
pub fn decode(input: &[u8], crop: Option<Crop>) -> Result<DynamicImage> {
    let img = image::load_from_memory(input)?;
    match crop {
        Some(crop) => crop.apply(&img),
        None => Ok(img),
    }
}

/// Everything the editor derives from one (cropped) image.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysis {
    pub palette: Palette,
    pub dominant: Option<Color>,
    pub image_background: Backdrop,
    /// Pastel suggestion derived from `palette`.
    pub background: Color,
    pub swatches: Vec<Color>,
}

impl ImageAnalysis {
    pub fn of(img: &DynamicImage, extractor: &PaletteExtractor, count: usize) -> Result<Self> {
        let small = downscale_for_sampling(img, extractor.config().sample_width);
        let raw = small.as_raw();

        let palette = extractor.extract(raw, count)?;
        let tone = Tone::measure(raw)?;
        let swatches = suggest_swatches(raw, DEFAULT_SWATCH_COUNT)?;
        let background = suggest_background(&palette);

        tracing::debug!(
            width = small.width(),
            height = small.height(),
            palette = palette.len(),
            swatches = swatches.len(),
            "Analysed image"
        );

        Ok(Self {
            palette,
            dominant: tone.dominant,
            image_background: tone.backdrop,
            background,
            swatches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn two_tone() -> DynamicImage {
        // left half blue, right half white
        DynamicImage::ImageRgba8(RgbaImage::from_fn(200, 100, |x, _| {
            if x < 100 {
                Rgba([30, 60, 200, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        }))
    }

    #[test]
    fn parses_crop() {
        let crop: Crop = "10, 20,30,40".parse().unwrap();
        assert_eq!(
            crop,
            Crop {
                x: 10,
                y: 20,
                width: 30,
                height: 40
            }
        );
        assert!("1,2,3".parse::<Crop>().is_err());
        assert!("a,b,c,d".parse::<Crop>().is_err());
    }

    #[test]
    fn crop_is_clamped_and_validated() {
        let img = two_tone();
        let cropped = Crop {
            x: 150,
            y: 0,
            width: 500,
            height: 500,
        }
        .apply(&img)
        .unwrap();
        assert_eq!(cropped.dimensions(), (50, 100));

        let empty = Crop {
            x: 0,
            y: 0,
            width: 0,
            height: 10,
        };
        assert!(matches!(empty.apply(&img), Err(Error::InvalidInput { .. })));
    }

    #[test]
    fn analysis_of_cropped_image() {
        let img = two_tone();
        let analysis = ImageAnalysis::of(&img, &PaletteExtractor::default(), 12).unwrap();
        assert_eq!(analysis.palette.colors(), &[Color::new(30, 60, 200)]);
        assert_eq!(analysis.background, suggest_background(&analysis.palette));

        let blue_only = Crop {
            x: 0,
            y: 0,
            width: 90,
            height: 100,
        }
        .apply(&img)
        .unwrap();
        let analysis = ImageAnalysis::of(&blue_only, &PaletteExtractor::default(), 12).unwrap();
        assert_eq!(analysis.dominant, Some(Color::new(30, 60, 200)));
        assert_eq!(analysis.image_background, Backdrop::Black);
    }

    #[test]
    fn analysis_of_thin_strip() {
        let strip =
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 4000, Rgba([200, 40, 40, 255])));
        let analysis = ImageAnalysis::of(&strip, &PaletteExtractor::default(), 12).unwrap();
        assert_eq!(analysis.palette.colors(), &[Color::new(200, 40, 40)]);
        assert_eq!(analysis.dominant, Some(Color::new(200, 40, 40)));
        assert_eq!(analysis.swatches.len(), 1);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(decode(b"not an image", None), Err(Error::Decode(_))));
    }
}
