use std::fmt;
use std::str::FromStr;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ERASE_MARKER: &str = "erase";

/// Quick palette offered next to the color picker.
pub const BASIC_COLORS: [&str; 20] = [
    "#FFFFFF", "#FF0000", "#028bed", "#0eeb15", "#000000", "#FFA500", "#82440a", "#f760ed",
    "#f9fc30", "#f59920", "#964B00", "#808080", "#FFFF00", "#00FF00", "#00FFFF", "#0000FF",
    "#800080", "#FFC0CB", "#A52A2A", "#808000",
];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid color {0:?}")]
pub struct ColorParseError(pub String);

#[derive(Encode, Decode, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
    pub const BLACK: Rgba = Rgba::opaque(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2], bytes[3])
    }

    pub fn to_bytes(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl FromStr for Rgba {
    type Err = ColorParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ColorParseError(value.to_string());
        let digits = value.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !digits.bytes().all(|byte| byte.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        parse_hex_digits(digits).ok_or_else(invalid)
    }
}

fn parse_hex_digits(digits: &str) -> Option<Rgba> {
    let channel = |index: usize, width: usize| -> Option<u8> {
        let value = u8::from_str_radix(digits.get(index..index + width)?, 16).ok()?;
        Some(if width == 1 { value * 17 } else { value })
    };
    match digits.len() {
        3 => Some(Rgba::opaque(channel(0, 1)?, channel(1, 1)?, channel(2, 1)?)),
        6 => Some(Rgba::opaque(channel(0, 2)?, channel(2, 2)?, channel(4, 2)?)),
        8 => Some(Rgba::new(
            channel(0, 2)?,
            channel(2, 2)?,
            channel(4, 2)?,
            channel(6, 2)?,
        )),
        _ => None,
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// What a draw operation puts into a cell: a color, or transparency for the
/// eraser. Serialized as a hex string or the literal `"erase"`.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(into = "String", try_from = "String")]
pub enum PaintColor {
    Color(Rgba),
    Erase,
}

impl PaintColor {
    pub fn to_rgba(self) -> Rgba {
        match self {
            PaintColor::Color(color) => color,
            PaintColor::Erase => Rgba::TRANSPARENT,
        }
    }
}

impl From<Rgba> for PaintColor {
    fn from(color: Rgba) -> Self {
        PaintColor::Color(color)
    }
}

impl From<PaintColor> for String {
    fn from(color: PaintColor) -> Self {
        match color {
            PaintColor::Color(color) => color.to_hex(),
            PaintColor::Erase => ERASE_MARKER.to_string(),
        }
    }
}

impl TryFrom<String> for PaintColor {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == ERASE_MARKER {
            return Ok(PaintColor::Erase);
        }
        value.parse().map(PaintColor::Color)
    }
}

/// Darkens `base` by scaling its HSL lightness with `1 - amount/100`.
pub fn shade_color(base: Rgba, amount: u8) -> Rgba {
    let amount = amount.min(100);
    if amount == 0 {
        return base;
    }
    let (h, s, l) = rgb_to_hsl(base.r, base.g, base.b);
    let l = l * (1.0 - f64::from(amount) / 100.0);
    let (r, g, b) = hsl_to_rgb(h, s, l);
    Rgba::new(r, g, b, base.a)
}

fn rgb_to_hsl(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let r = f64::from(r) / 255.0;
    let g = f64::from(g) / 255.0;
    let b = f64::from(b) / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    if max == min {
        return (0.0, 0.0, l);
    }
    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    (h / 6.0, s, l)
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (u8, u8, u8) {
    let (r, g, b) = if s == 0.0 {
        (l, l, l)
    } else {
        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        (
            hue_to_rgb(p, q, h + 1.0 / 3.0),
            hue_to_rgb(p, q, h),
            hue_to_rgb(p, q, h - 1.0 / 3.0),
        )
    };
    (to_channel(r), to_channel(g), to_channel(b))
}

fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 1.0 / 2.0 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
    }
    p
}

fn to_channel(value: f64) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(value: &str) -> Rgba {
        value.parse().unwrap()
    }

    #[test]
    fn parses_short_long_and_alpha_forms() {
        assert_eq!(hex("#f00"), Rgba::opaque(255, 0, 0));
        assert_eq!(hex("#FF0000"), Rgba::opaque(255, 0, 0));
        assert_eq!(hex("#028bed"), Rgba::opaque(2, 139, 237));
        assert_eq!(hex("#00000080"), Rgba::new(0, 0, 0, 128));
        assert!("ff0000".parse::<Rgba>().is_err());
        assert!("#ff00".parse::<Rgba>().is_err());
        assert!("#gg0000".parse::<Rgba>().is_err());
        assert!("#ff00é".parse::<Rgba>().is_err());
    }

    #[test]
    fn hex_output_is_lowercase() {
        assert_eq!(hex("#FFA500").to_hex(), "#ffa500");
        assert_eq!(Rgba::TRANSPARENT.to_hex(), "#00000000");
    }

    #[test]
    fn basic_palette_parses() {
        for color in BASIC_COLORS {
            assert!(color.parse::<Rgba>().is_ok(), "{color}");
        }
    }

    #[test]
    fn zero_shade_is_identity() {
        for color in BASIC_COLORS {
            let color = hex(color);
            assert_eq!(shade_color(color, 0), color);
        }
        let translucent = Rgba::new(10, 20, 30, 40);
        assert_eq!(shade_color(translucent, 0), translucent);
    }

    #[test]
    fn shade_halves_lightness() {
        assert_eq!(shade_color(hex("#ff0000"), 50), hex("#800000"));
        assert_eq!(shade_color(hex("#ffffff"), 50), hex("#808080"));
    }

    #[test]
    fn full_shade_is_black_and_keeps_alpha() {
        assert_eq!(shade_color(hex("#028bed"), 100), Rgba::BLACK);
        assert_eq!(shade_color(Rgba::new(200, 10, 10, 90), 100).a, 90);
        assert_eq!(shade_color(hex("#028bed"), 250), Rgba::BLACK);
    }

    #[test]
    fn hsl_round_trips_palette() {
        for color in BASIC_COLORS {
            let color = hex(color);
            let (h, s, l) = rgb_to_hsl(color.r, color.g, color.b);
            assert_eq!(hsl_to_rgb(h, s, l), (color.r, color.g, color.b));
        }
    }

    #[test]
    fn paint_color_strings() {
        assert_eq!(
            PaintColor::try_from("erase".to_string()),
            Ok(PaintColor::Erase)
        );
        assert_eq!(
            String::from(PaintColor::Color(hex("#FF0000"))),
            "#ff0000".to_string()
        );
        assert!(PaintColor::try_from("red".to_string()).is_err());
    }
}
