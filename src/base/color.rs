use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An RGB color with 8 bits per channel.
///
/// Parsing accepts a 6-digit hex string with an optional leading `#`
/// (case-insensitive) or one of the predefined color names. Invalid input is
/// rejected, never clamped into a different color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

pub const BLACK: Color = Color::new(0, 0, 0);
pub const WHITE: Color = Color::new(255, 255, 255);
pub const GRAY_50: Color = Color::new(127, 127, 127);
pub const WARM_WHITE: Color = Color::new(255, 200, 100);
pub const COOL_WHITE: Color = Color::new(200, 220, 255);
pub const RED: Color = Color::new(255, 0, 0);
pub const GREEN: Color = Color::new(0, 255, 0);
pub const BLUE: Color = Color::new(0, 0, 255);
pub const YELLOW: Color = Color::new(255, 255, 0);
pub const WARM_YELLOW: Color = Color::new(239, 138, 51);
pub const CYAN: Color = Color::new(0, 255, 255);
pub const MAGENTA: Color = Color::new(255, 0, 255);
pub const ORANGE: Color = Color::new(255, 165, 0);
pub const PURPLE: Color = Color::new(128, 0, 128);
pub const PINK: Color = Color::new(255, 192, 203);

static NAMED: [(&str, Color); 15] = [
    ("black", BLACK),
    ("white", WHITE),
    ("gray", GRAY_50),
    ("warm_white", WARM_WHITE),
    ("cool_white", COOL_WHITE),
    ("red", RED),
    ("green", GREEN),
    ("blue", BLUE),
    ("yellow", YELLOW),
    ("warm_yellow", WARM_YELLOW),
    ("cyan", CYAN),
    ("magenta", MAGENTA),
    ("orange", ORANGE),
    ("purple", PURPLE),
    ("pink", PINK),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorParseError {
    BadLength,
    BadDigit,
    Unknown(String),
}

impl std::error::Error for ColorParseError {}

impl fmt::Display for ColorParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorParseError::BadLength => write!(f, "Hex color must have 6 digits"),
            ColorParseError::BadDigit => write!(f, "Invalid hex digit in color"),
            ColorParseError::Unknown(s) => write!(f, "Unknown color '{}'", s),
        }
    }
}

impl Color {
    pub const fn new(red: u8, green: u8, blue: u8) -> Color {
        Color { red, green, blue }
    }

    pub fn from_hex(s: &str) -> Result<Color, ColorParseError> {
        let digits = s.strip_prefix('#').unwrap_or(s);
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(ColorParseError::BadLength);
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_err(|_| ColorParseError::BadDigit)
        };
        Ok(Color::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    /// Hex representation without a leading `#`, e.g. `FF9329`.
    pub fn to_hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.red, self.green, self.blue)
    }

    pub fn is_black(&self) -> bool {
        self.red == 0 && self.green == 0 && self.blue == 0
    }

    /// Component-wise linear blend. `t` is the amount of `other`, 0.0..=1.0.
    pub fn blend(&self, other: Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (f32::from(a) + (f32::from(b) - f32::from(a)) * t).round() as u8;
        Color::new(
            mix(self.red, other.red),
            mix(self.green, other.green),
            mix(self.blue, other.blue),
        )
    }
}

pub fn named(name: &str) -> Option<Color> {
    let name = name.to_ascii_lowercase();
    NAMED
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, color)| *color)
}

impl FromStr for Color {
    type Err = ColorParseError;
    fn from_str(s: &str) -> Result<Color, ColorParseError> {
        if let Some(color) = named(s) {
            return Ok(color);
        }
        Color::from_hex(s).map_err(|e| match e {
            // A word that is neither a name nor hex-shaped reads better as
            // an unknown color than as a malformed hex string.
            ColorParseError::BadLength | ColorParseError::BadDigit
                if !s.starts_with('#') && s.len() != 6 =>
            {
                ColorParseError::Unknown(s.to_string())
            }
            e => e,
        })
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}

impl Serialize for Color {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Color, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Hue, saturation and value, all in 0.0..=1.0. Hue is a fraction of a turn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    pub hue: f32,
    pub sat: f32,
    pub val: f32,
}

pub fn rgb_to_hsv(c: Color) -> Hsv {
    let r = f32::from(c.red) / 255.0;
    let g = f32::from(c.green) / 255.0;
    let b = f32::from(c.blue) / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta <= f32::EPSILON {
        0.0
    } else if max == r {
        (((g - b) / delta).rem_euclid(6.0)) / 6.0
    } else if max == g {
        ((b - r) / delta + 2.0) / 6.0
    } else {
        ((r - g) / delta + 4.0) / 6.0
    };
    let sat = if max <= f32::EPSILON { 0.0 } else { delta / max };
    Hsv { hue, sat, val: max }
}

pub fn hsv_to_rgb(hsv: Hsv) -> Color {
    let hue = hsv.hue.rem_euclid(1.0);
    let sat = hsv.sat.clamp(0.0, 1.0);
    let val = hsv.val.clamp(0.0, 1.0);

    let h6 = hue * 6.0;
    let sector = h6.floor();
    let frac = h6 - sector;
    let p = val * (1.0 - sat);
    let q = val * (1.0 - sat * frac);
    let t = val * (1.0 - sat * (1.0 - frac));
    let (r, g, b) = match sector as u32 % 6 {
        0 => (val, t, p),
        1 => (q, val, p),
        2 => (p, val, t),
        3 => (p, q, val),
        4 => (t, p, val),
        _ => (val, p, q),
    };
    let to_u8 = |v: f32| (v * 255.0).round() as u8;
    Color::new(to_u8(r), to_u8(g), to_u8(b))
}

/// Reshape a 0.0..=1.0 level with a gamma exponent so linear duty cycles
/// better match perceived intensity.
pub fn gamma_correct(level: f32, gamma: f32) -> f32 {
    level.clamp(0.0, 1.0).powf(gamma)
}
