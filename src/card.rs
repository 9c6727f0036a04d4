//! Card state and the two audience renditions of it.
//!
//! [`CardEditor`] is the single owner of everything the user can change.
//! Rendering only ever sees an immutable [`CardSnapshot`], and
//! [`render_card`] builds each audience's card from scratch instead of
//! editing a shared one.

use serde::{Deserialize, Serialize};

use crate::color::{Color, WHITE};
use crate::error::Result;
use crate::extract::{Palette, PaletteExtractor};
use crate::source::{Crop, ImageAnalysis, decode};
use crate::suggest::{Backdrop, DEFAULT_DOMINANT};

/// Palette size offered as background suggestions in the editor.
pub const EDITOR_PALETTE_SIZE: usize = 12;
/// Added to every channel of the price bar color for the details panel.
const DETAIL_LIGHTEN: u8 = 40;

// ------------------------------------------------------------
// Form
// ------------------------------------------------------------

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
pub enum PriceUnit {
    #[default]
    #[serde(rename = "/ piece")]
    #[strum(serialize = "/ piece")]
    PerPiece,
    #[serde(rename = "/ dozen")]
    #[strum(serialize = "/ dozen")]
    PerDozen,
}

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
pub enum PackageUnit {
    #[default]
    #[serde(rename = "pcs / set")]
    #[strum(serialize = "pcs / set")]
    Set,
    #[serde(rename = "pcs / dozen")]
    #[strum(serialize = "pcs / dozen")]
    Dozen,
    #[serde(rename = "pcs / pack")]
    #[strum(serialize = "pcs / pack")]
    Pack,
}

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
pub enum AgeUnit {
    #[serde(rename = "Newborn")]
    #[strum(serialize = "Newborn")]
    Newborn,
    #[default]
    #[serde(rename = "months")]
    #[strum(serialize = "months")]
    Months,
    #[serde(rename = "years")]
    #[strum(serialize = "years")]
    Years,
}

/// Text fields and unit selectors as typed by the user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormState {
    pub model_name: String,
    pub subtitle: String,
    pub colours: String,
    pub age_group: String,
    pub package_info: String,
    pub wholesale_price: String,
    pub reseller_price: String,
    pub wholesale_unit: PriceUnit,
    pub reseller_unit: PriceUnit,
    pub package_unit: PackageUnit,
    pub age_group_unit: AgeUnit,
}

// ------------------------------------------------------------
// Editor
// ------------------------------------------------------------

/// Read-only view of the editor handed to [`render_card`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSnapshot {
    pub form: FormState,
    pub price_bar: Color,
    pub detail_background: Color,
    pub font_color: Color,
    pub image_background: Backdrop,
    #[serde(default)]
    pub has_image: bool,
}

#[derive(Clone, Debug)]
pub struct CardEditor {
    form: FormState,
    extractor: PaletteExtractor,
    dominant: Color,
    override_color: Option<Color>,
    suggested: Palette,
    swatches: Vec<Color>,
    font_color: Color,
    image_background: Backdrop,
    crop: Option<Crop>,
    has_image: bool,
}

impl Default for CardEditor {
    fn default() -> Self {
        Self::new(PaletteExtractor::default())
    }
}

impl CardEditor {
    pub fn new(extractor: PaletteExtractor) -> Self {
        Self {
            form: FormState::default(),
            extractor,
            dominant: DEFAULT_DOMINANT,
            override_color: None,
            suggested: Palette::default(),
            swatches: Vec::new(),
            font_color: WHITE,
            image_background: Backdrop::White,
            crop: None,
            has_image: false,
        }
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut FormState {
        &mut self.form
    }

    pub fn suggested(&self) -> &Palette {
        &self.suggested
    }

    pub fn swatches(&self) -> &[Color] {
        &self.swatches
    }

    /// Manual background pick; `None` goes back to the image's dominant color.
    pub fn set_override(&mut self, color: Option<Color>) {
        self.override_color = color;
    }

    pub fn set_font_color(&mut self, color: Color) {
        self.font_color = color;
    }

    pub fn set_image_background(&mut self, backdrop: Backdrop) {
        self.image_background = backdrop;
    }

    /// Crop applied to every image loaded from now on, until cleared with
    /// `None`.
    pub fn set_crop(&mut self, crop: Option<Crop>) {
        self.crop = crop;
    }

    /// Decode and analyse an uploaded image.
    ///
    /// On failure the error is logged and returned, and the editor keeps the
    /// colors of the previous image.
    pub fn load_image(&mut self, input: &[u8]) -> Result<()> {
        let analysis = decode(input, self.crop).and_then(|img| {
            ImageAnalysis::of(&img, &self.extractor, EDITOR_PALETTE_SIZE)
        });
        match analysis {
            Ok(analysis) => {
                self.apply_analysis(analysis);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Keeping previous colors, image could not be analysed: {e}");
                Err(e)
            }
        }
    }

    /// Replace every image-derived color with those of `analysis`.
    pub fn apply_analysis(&mut self, analysis: ImageAnalysis) {
        if let Some(dominant) = analysis.dominant {
            self.dominant = dominant;
        }
        self.image_background = analysis.image_background;
        self.suggested = analysis.palette;
        self.swatches = analysis.swatches;
        self.has_image = true;
    }

    pub fn price_bar_color(&self) -> Color {
        self.override_color.unwrap_or(self.dominant)
    }

    pub fn snapshot(&self) -> CardSnapshot {
        let price_bar = self.price_bar_color();
        CardSnapshot {
            form: self.form.clone(),
            price_bar,
            detail_background: price_bar.lighten(DETAIL_LIGHTEN),
            font_color: self.font_color,
            image_background: self.image_background,
            has_image: self.has_image,
        }
    }
}

// ------------------------------------------------------------
// Rendering
// ------------------------------------------------------------

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Audience {
    Wholesaler,
    Reseller,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DetailRow {
    pub label: &'static str,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Section {
    PriceBar {
        background: Color,
        foreground: Color,
        text: String,
    },
    Image {
        background: Color,
    },
    Details {
        background: Color,
        foreground: Color,
        title: String,
        subtitle: Option<String>,
        rows: Vec<DetailRow>,
    },
}

/// One audience's card, top to bottom.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDocument {
    pub audience: Audience,
    pub file_name: String,
    pub sections: Vec<Section>,
}

fn price_bar(card: &CardSnapshot, price: &str, unit: PriceUnit) -> Section {
    Section::PriceBar {
        background: card.price_bar,
        foreground: card.font_color,
        text: format!("Price : ₹{price} {unit}"),
    }
}

/// The wholesaler card carries the wholesale price bar on top, the reseller
/// card the reseller bar at the bottom. Everything in between is shared.
pub fn render_card(card: &CardSnapshot, audience: Audience) -> CardDocument {
    let form = &card.form;
    let mut sections = Vec::with_capacity(3);

    if audience == Audience::Wholesaler {
        sections.push(price_bar(card, &form.wholesale_price, form.wholesale_unit));
    }

    if card.has_image {
        sections.push(Section::Image {
            background: card.image_background.color(),
        });
    }

    sections.push(Section::Details {
        background: card.detail_background,
        foreground: card.font_color,
        title: form.model_name.clone(),
        subtitle: (!form.subtitle.is_empty()).then(|| format!("({})", form.subtitle)),
        rows: vec![
            DetailRow {
                label: "Colour",
                value: form.colours.clone(),
            },
            DetailRow {
                label: "Package",
                value: format!("{} {}", form.package_info, form.package_unit),
            },
            DetailRow {
                label: "Age Group",
                value: format!("{} {}", form.age_group, form.age_group_unit),
            },
        ],
    });

    if audience == Audience::Reseller {
        sections.push(price_bar(card, &form.reseller_price, form.reseller_unit));
    }

    let stem = if form.model_name.is_empty() {
        "catalogue"
    } else {
        form.model_name.as_str()
    };

    CardDocument {
        audience,
        file_name: format!("{stem}-{audience}.png"),
        sections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::BLACK;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use strum::IntoEnumIterator;

    fn png(color: [u8; 4]) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(60, 40, Rgba(color)));
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn filled_editor() -> CardEditor {
        let mut editor = CardEditor::default();
        let form = editor.form_mut();
        form.model_name = "Teddy".into();
        form.subtitle = "Soft toy".into();
        form.colours = "5 Colours".into();
        form.age_group = "6".into();
        form.package_info = "12".into();
        form.wholesale_price = "120".into();
        form.reseller_price = "150".into();
        form.wholesale_unit = PriceUnit::PerDozen;
        editor
    }

    fn price_bars(doc: &CardDocument) -> Vec<&str> {
        doc.sections
            .iter()
            .filter_map(|s| match s {
                Section::PriceBar { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn units_round_trip_through_strings() {
        assert_eq!(PriceUnit::PerPiece.to_string(), "/ piece");
        assert_eq!("pcs / pack".parse::<PackageUnit>().unwrap(), PackageUnit::Pack);
        assert_eq!("Newborn".parse::<AgeUnit>().unwrap(), AgeUnit::Newborn);
        assert!("pcs / crate".parse::<PackageUnit>().is_err());
        assert_eq!(FormState::default().age_group_unit, AgeUnit::Months);
    }

    #[test]
    fn each_audience_gets_only_its_price_bar() {
        let snapshot = filled_editor().snapshot();

        let wholesale = render_card(&snapshot, Audience::Wholesaler);
        assert_eq!(price_bars(&wholesale), vec!["Price : ₹120 / dozen"]);
        assert!(matches!(wholesale.sections.first(), Some(Section::PriceBar { .. })));
        assert_eq!(wholesale.file_name, "Teddy-wholesaler.png");

        let resale = render_card(&snapshot, Audience::Reseller);
        assert_eq!(price_bars(&resale), vec!["Price : ₹150 / piece"]);
        assert!(matches!(resale.sections.last(), Some(Section::PriceBar { .. })));
        assert_eq!(resale.file_name, "Teddy-reseller.png");
    }

    #[test]
    fn details_section() {
        let doc = render_card(&filled_editor().snapshot(), Audience::Reseller);
        let Some(Section::Details {
            title,
            subtitle,
            rows,
            background,
            ..
        }) = doc.sections.first()
        else {
            panic!("expected details first without an image: {doc:?}");
        };
        assert_eq!(title, "Teddy");
        assert_eq!(subtitle.as_deref(), Some("(Soft toy)"));
        assert_eq!(rows[1].value, "12 pcs / set");
        assert_eq!(rows[2].value, "6 months");
        assert_eq!(*background, DEFAULT_DOMINANT.lighten(40));
    }

    #[test]
    fn blank_form_uses_fallback_name() {
        let snapshot = CardEditor::default().snapshot();
        for audience in Audience::iter() {
            let doc = render_card(&snapshot, audience);
            assert_eq!(doc.file_name, format!("catalogue-{audience}.png"));
            assert_eq!(doc.sections.len(), 2);
        }
    }

    #[test]
    fn override_wins_over_dominant() {
        let mut editor = filled_editor();
        assert_eq!(editor.price_bar_color(), DEFAULT_DOMINANT);
        editor.set_override(Some(Color::new(230, 10, 10)));
        editor.set_font_color(BLACK);
        let snapshot = editor.snapshot();
        assert_eq!(snapshot.price_bar, Color::new(230, 10, 10));
        assert_eq!(snapshot.detail_background, Color::new(255, 50, 50));
        assert_eq!(snapshot.font_color, BLACK);
        editor.set_override(None);
        assert_eq!(editor.price_bar_color(), DEFAULT_DOMINANT);
    }

    #[test]
    fn loading_an_image_updates_colors() {
        let mut editor = filled_editor();
        editor.load_image(&png([40, 90, 200, 255])).unwrap();
        assert_eq!(editor.price_bar_color(), Color::new(40, 90, 200));
        assert_eq!(editor.suggested().colors(), &[Color::new(40, 90, 200)]);

        let doc = render_card(&editor.snapshot(), Audience::Wholesaler);
        assert!(matches!(
            doc.sections[1],
            Section::Image {
                background: BLACK
            }
        ));
    }

    #[test]
    fn failed_load_keeps_previous_colors() {
        let mut editor = filled_editor();
        editor.load_image(&png([40, 90, 200, 255])).unwrap();
        let before = editor.snapshot();

        assert!(editor.load_image(b"garbage").is_err());
        editor.set_crop(Some(Crop {
            x: 500,
            y: 0,
            width: 10,
            height: 10,
        }));
        assert!(editor.load_image(&png([200, 40, 40, 255])).is_err());

        assert_eq!(editor.snapshot(), before);
    }

    #[test]
    fn crop_stays_until_cleared() {
        let mut editor = CardEditor::default();
        editor.set_crop(Some(Crop {
            x: 500,
            y: 0,
            width: 10,
            height: 10,
        }));
        assert!(editor.load_image(&png([40, 90, 200, 255])).is_err());
        assert!(editor.load_image(&png([200, 40, 40, 255])).is_err());
        assert!(!editor.snapshot().has_image);

        editor.set_crop(None);
        editor.load_image(&png([200, 40, 40, 255])).unwrap();
        assert_eq!(editor.price_bar_color(), Color::new(200, 40, 40));
    }

    #[test]
    fn snapshot_survives_json() {
        let snapshot = filled_editor().snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"wholesaleUnit\":\"/ dozen\""));
        let back: CardSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
