use image::Rgba;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A color reduced from pixel data. Lives for one capture only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampledColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SampledColor {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// `#RRGGBB`, uppercase, alpha dropped.
    pub fn to_hex(&self) -> String {
        format!("#{}", self.clean_hex())
    }

    /// Six hex digits without the leading `#`.
    pub fn clean_hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Parses `#RRGGBB` or `RRGGBB`. Alpha is set to opaque.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let code = clean_hex_code(hex)?;
        let r = u8::from_str_radix(&code[0..2], 16).ok()?;
        let g = u8::from_str_radix(&code[2..4], 16).ok()?;
        let b = u8::from_str_radix(&code[4..6], 16).ok()?;
        Some(Self::opaque(r, g, b))
    }
}

impl From<Rgba<u8>> for SampledColor {
    fn from(pixel: Rgba<u8>) -> Self {
        Self::new(pixel[0], pixel[1], pixel[2], pixel[3])
    }
}

impl From<SampledColor> for Rgba<u8> {
    fn from(color: SampledColor) -> Self {
        Rgba([color.r, color.g, color.b, color.a])
    }
}

impl fmt::Display for SampledColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Strips an optional leading `#` and checks for exactly six hex digits.
pub fn clean_hex_code(hex: &str) -> Option<String> {
    let code = hex.trim().trim_start_matches('#');
    if code.len() == 6 && code.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(code.to_ascii_uppercase())
    } else {
        None
    }
}

/// A color as the naming service describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedColor {
    pub hex: HexCode,
    pub name: ColorName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HexCode {
    /// `#RRGGBB`
    pub value: String,
    /// `RRGGBB`
    pub clean: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorName {
    pub value: String,
    pub closest_named_hex: String,
    pub exact_match_name: bool,
    pub distance: i64,
}

impl NamedColor {
    pub fn new(
        hex: &str,
        name: &str,
        closest_named_hex: &str,
        exact_match_name: bool,
        distance: i64,
    ) -> Self {
        let clean = hex.trim_start_matches('#').to_string();
        Self {
            hex: HexCode {
                value: format!("#{}", clean),
                clean,
            },
            name: ColorName {
                value: name.to_string(),
                closest_named_hex: closest_named_hex.to_string(),
                exact_match_name,
                distance,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name.value
    }

    pub fn hex(&self) -> &str {
        &self.hex.value
    }
}

impl fmt::Display for NamedColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.hex.value, self.name.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_formatting() {
        let color = SampledColor::new(255, 128, 0, 10);
        assert_eq!(color.to_hex(), "#FF8000");
        assert_eq!(color.clean_hex(), "FF8000");
    }

    #[test]
    fn test_from_hex_accepts_both_forms() {
        assert_eq!(SampledColor::from_hex("#00ff7f"), Some(SampledColor::opaque(0, 255, 127)));
        assert_eq!(SampledColor::from_hex("00FF7F"), Some(SampledColor::opaque(0, 255, 127)));
        assert_eq!(SampledColor::from_hex("#FFF"), None);
        assert_eq!(SampledColor::from_hex("GGGGGG"), None);
    }

    #[test]
    fn test_named_color_json_field_names() {
        let body = r##"{
            "hex": {"value": "#FFFFFF", "clean": "FFFFFF"},
            "rgb": {"r": 255, "g": 255, "b": 255},
            "name": {
                "value": "White",
                "closest_named_hex": "#FFFFFF",
                "exact_match_name": true,
                "distance": 0
            }
        }"##;
        let color: NamedColor = serde_json::from_str(body).unwrap();
        assert_eq!(color, NamedColor::new("FFFFFF", "White", "#FFFFFF", true, 0));
    }
}
