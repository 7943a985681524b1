use palette::{Hsv, IntoColor, Srgb};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Straight-alpha RGBA color.
///
/// Serialized as a `#RRGGBB` or `#RRGGBBAA` hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WaveColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl WaveColor {
    pub const RED: Self = Self::rgb(255, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const LIGHT_GRAY: Self = Self::rgb(170, 170, 170);
    pub const CLEAR: Self = Self::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA` (the leading `#` is optional)
    pub fn from_hex(s: &str) -> Result<Self, String> {
        let hex = s.trim().trim_start_matches('#');
        if !matches!(hex.len(), 6 | 8) || !hex.is_ascii() {
            return Err(format!("Invalid color '{}': expected #RRGGBB or #RRGGBBAA", s));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| format!("Invalid color '{}': bad hex digit", s))
        };
        let a = if hex.len() == 8 { channel(6)? } else { 255 };
        Ok(Self::rgba(channel(0)?, channel(2)?, channel(4)?, a))
    }

    pub fn is_opaque(&self) -> bool {
        self.a == 255
    }

    /// Shift HSB brightness by `level`: up if the color is darker than `level`, down otherwise.
    ///
    /// Hue, saturation and alpha are kept.
    pub fn highlight(&self, level: f32) -> Self {
        let rgb = Srgb::new(
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        );
        let mut hsv: Hsv = rgb.into_color();
        let direction = if hsv.value < level { 1.0 } else { -1.0 };
        hsv.value = (hsv.value + level * direction).clamp(0.0, 1.0);
        let out: Srgb = hsv.into_color();

        Self::rgba(
            unit_to_u8(out.red),
            unit_to_u8(out.green),
            unit_to_u8(out.blue),
            self.a,
        )
    }

    /// Interpolate every channel, alpha included
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Self::rgba(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }
}

fn unit_to_u8(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl fmt::Display for WaveColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if !self.is_opaque() {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

impl FromStr for WaveColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "red" => Ok(Self::RED),
            "white" => Ok(Self::WHITE),
            "black" => Ok(Self::BLACK),
            "lightgray" | "light-gray" => Ok(Self::LIGHT_GRAY),
            "clear" | "transparent" => Ok(Self::CLEAR),
            _ => Self::from_hex(s),
        }
    }
}

impl TryFrom<String> for WaveColor {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<WaveColor> for String {
    fn from(color: WaveColor) -> Self {
        color.to_string()
    }
}
