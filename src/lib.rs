use js_sys::{Array, Object, Reflect};
use wasm_bindgen::prelude::*;

pub mod card;
pub mod color;
pub mod error;
pub mod extract;
pub mod source;
pub mod suggest;

pub use card::{Audience, CardDocument, CardEditor, CardSnapshot, FormState, render_card};
pub use color::{Color, Hsl, hsl_to_rgb, rgb_to_hsl};
pub use error::{Error, Result};
pub use extract::{
    DEFAULT_PALETTE_SIZE, ExtractorConfig, Palette, PaletteExtractor, SuitabilityFilter,
    extract_palette, extract_palette_from_image,
};
pub use source::{Crop, ImageAnalysis};
pub use suggest::{Backdrop, Tone, suggest_background, suggest_swatches};

/// Converts a caller-supplied palette size, rejecting negative values.
pub fn palette_size(count: i64) -> Result<usize> {
    usize::try_from(count).map_err(|_| {
        Error::invalid_input(format!("palette size must not be negative, got {count}"))
    })
}

// ------------------------------------------------------------
// JavaScript bindings
// ------------------------------------------------------------

fn js_error(e: Error) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn js_strings<I: IntoIterator<Item = String>>(items: I) -> Array {
    let array = Array::new();
    for item in items {
        array.push(&JsValue::from_str(&item));
    }
    array
}

fn colors_from_js(values: &Array) -> std::result::Result<Vec<Color>, JsValue> {
    values
        .iter()
        .map(|val| {
            let s = val
                .as_string()
                .ok_or_else(|| JsValue::from_str("Palette values must be strings"))?;
            s.parse::<Color>().map_err(js_error)
        })
        .collect()
}

/// Palette of a raw RGBA buffer (for example `ImageData.data` of a canvas the
/// image was drawn onto), as `rgb(r, g, b)` strings.
#[wasm_bindgen(js_name = extractPalette)]
pub fn extract_palette_js(rgba: Vec<u8>, count: i32) -> std::result::Result<Array, JsValue> {
    let count = palette_size(count.into()).map_err(js_error)?;
    let palette = extract_palette(&rgba, count).map_err(js_error)?;
    Ok(js_strings(palette.to_css_strings()))
}

/// Pastel background for a list of `#rrggbb` / `rgb(...)` strings, as hex.
#[wasm_bindgen(js_name = suggestBackground)]
pub fn suggest_background_js(palette: Array) -> std::result::Result<String, JsValue> {
    let colors = colors_from_js(&palette)?;
    Ok(suggest_background(&colors).to_hex())
}

/// Decode an uploaded file and derive every color the editor offers.
///
/// The returned object carries `palette`, `dominant` (or `null`),
/// `background`, `imageBackground` and `swatches`.
#[wasm_bindgen(js_name = analyzeImage)]
pub fn analyze_image_js(input: Vec<u8>, count: i32) -> std::result::Result<Object, JsValue> {
    let count = palette_size(count.into()).map_err(js_error)?;
    let img = source::decode(&input, None).map_err(js_error)?;
    let analysis =
        ImageAnalysis::of(&img, &PaletteExtractor::default(), count).map_err(js_error)?;

    let dominant = match analysis.dominant {
        Some(c) => JsValue::from_str(&c.to_string()),
        None => JsValue::NULL,
    };

    let result = Object::new();
    Reflect::set(
        &result,
        &JsValue::from_str("palette"),
        &js_strings(analysis.palette.to_css_strings()),
    )?;
    Reflect::set(&result, &JsValue::from_str("dominant"), &dominant)?;
    Reflect::set(
        &result,
        &JsValue::from_str("background"),
        &JsValue::from_str(&analysis.background.to_hex()),
    )?;
    Reflect::set(
        &result,
        &JsValue::from_str("imageBackground"),
        &JsValue::from_str(&analysis.image_background.to_string()),
    )?;
    Reflect::set(
        &result,
        &JsValue::from_str("swatches"),
        &js_strings(analysis.swatches.iter().map(|c| c.to_hex())),
    )?;

    Ok(result)
}

/// Render one audience's card from a JSON [`CardSnapshot`]; returns the
/// [`CardDocument`] as JSON.
#[wasm_bindgen(js_name = renderCard)]
pub fn render_card_js(snapshot: String, audience: String) -> std::result::Result<String, JsValue> {
    render_card_json(&snapshot, &audience).map_err(js_error)
}

pub fn render_card_json(snapshot: &str, audience: &str) -> Result<String> {
    let snapshot: CardSnapshot = serde_json::from_str(snapshot)?;
    let audience: Audience = audience.parse().map_err(|_| Error::ParseOption {
        kind: "audience",
        input: audience.to_string(),
    })?;
    Ok(serde_json::to_string(&render_card(&snapshot, audience))?)
}

// ------------------------------------------------------------
// Native entry points
// ------------------------------------------------------------

#[cfg(not(target_arch = "wasm32"))]
pub fn analyze_image_bytes(
    input: &[u8],
    count: usize,
    crop: Option<Crop>,
) -> Result<ImageAnalysis> {
    let img = source::decode(input, crop)?;
    ImageAnalysis::of(&img, &PaletteExtractor::default(), count)
}
