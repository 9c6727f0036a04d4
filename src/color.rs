use std::fmt;
use std::str::FromStr;

use palette::Srgb;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// An opaque 8-bit RGB color.
///
/// Displays as `rgb(r, g, b)`; [`Color::to_hex`] gives the `#rrggbb` form.
/// Both forms parse back through [`FromStr`], as do the named colors
/// `white` and `black`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

pub const WHITE: Color = Color::new(255, 255, 255);
pub const BLACK: Color = Color::new(0, 0, 0);

impl Color {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }

    /// Euclidean distance in raw RGB space.
    pub fn distance(self, other: Color) -> f64 {
        let dr = self.red as i32 - other.red as i32;
        let dg = self.green as i32 - other.green as i32;
        let db = self.blue as i32 - other.blue as i32;
        f64::from(dr * dr + dg * dg + db * db).sqrt()
    }

    /// Perceived brightness on a 0-255 scale (ITU-R BT.601 weights).
    pub fn brightness(self) -> f64 {
        (self.red as f64 * 299.0 + self.green as f64 * 587.0 + self.blue as f64 * 114.0) / 1000.0
    }

    /// Adds `amount` to every channel, saturating at 255.
    pub fn lighten(self, amount: u8) -> Self {
        Self::new(
            self.red.saturating_add(amount),
            self.green.saturating_add(amount),
            self.blue.saturating_add(amount),
        )
    }

    pub fn to_hsl(self) -> Hsl {
        rgb_to_hsl(self)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.red, self.green, self.blue)
    }
}

impl FromStr for Color {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_error = || Error::ParseColor {
            input: s.to_string(),
        };
        let trimmed = s.trim();

        match trimmed.to_ascii_lowercase().as_str() {
            "white" => return Ok(WHITE),
            "black" => return Ok(BLACK),
            _ => {}
        }

        if let Some(body) = trimmed
            .strip_prefix("rgb(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let channels = body
                .split(',')
                .map(|c| c.trim().parse::<u8>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| parse_error())?;
            return match channels.as_slice() {
                &[r, g, b] => Ok(Color::new(r, g, b)),
                _ => Err(parse_error()),
            };
        }

        let hex = trimmed.trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(parse_error());
        }
        let r = u8::from_str_radix(&hex[0..2], 16).map_err(|_| parse_error())?;
        let g = u8::from_str_radix(&hex[2..4], 16).map_err(|_| parse_error())?;
        let b = u8::from_str_radix(&hex[4..6], 16).map_err(|_| parse_error())?;
        Ok(Color::new(r, g, b))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl TryFrom<String> for Color {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Srgb<u8>> for Color {
    fn from(c: Srgb<u8>) -> Self {
        Self::new(c.red, c.green, c.blue)
    }
}

impl From<Color> for Srgb<u8> {
    fn from(c: Color) -> Self {
        Srgb::new(c.red, c.green, c.blue)
    }
}

/// Hue in degrees `[0, 360)`, saturation and lightness in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

pub fn rgb_to_hsl(color: Color) -> Hsl {
    let r = color.red as f64 / 255.0;
    let g = color.green as f64 / 255.0;
    let b = color.blue as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if max == min {
        return Hsl { h: 0.0, s: 0.0, l };
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };
    let sector = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };

    Hsl {
        h: sector / 6.0 * 360.0,
        s,
        l,
    }
}

/// Standard HSL to RGB conversion, `h` in degrees. Channels round half up.
pub fn hsl_to_rgb(hsl: Hsl) -> Color {
    let Hsl { h, s, l } = hsl;
    let h = h / 360.0;

    let (r, g, b) = if s == 0.0 {
        (l, l, l)
    } else {
        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        (
            hue_to_channel(p, q, h + 1.0 / 3.0),
            hue_to_channel(p, q, h),
            hue_to_channel(p, q, h - 1.0 / 3.0),
        )
    };

    Color::new(to_channel(r), to_channel(g), to_channel(b))
}

fn hue_to_channel(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 1.0 / 2.0 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

#[inline(always)]
fn to_channel(v: f64) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}
