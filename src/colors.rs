use std::collections::BTreeMap;

use anyhow::Result;
use sha2::Digest;

use crate::types::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Color {
        Color { r, g, b }
    }

    /// Parses `#rrggbb` or `rrggbb`.
    pub fn from_hex(text: &str) -> Result<Color> {
        let digits = text.trim().trim_start_matches('#');
        let bytes = hex::decode(digits)
            .map_err(|e| anyhow::anyhow!("Invalid color '{}': {}", text, e))?;
        let [r, g, b]: [u8; 3] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("Invalid color '{}': expected 3 bytes", text))?;
        Ok(Color { r, g, b })
    }

    pub fn to_hex(self) -> String {
        format!("#{}", hex::encode([self.r, self.g, self.b]))
    }
}

pub const BLUE: Color = Color::from_rgb(47, 128, 237);
pub const GREEN: Color = Color::from_rgb(39, 174, 96);
pub const PURPLE: Color = Color::from_rgb(155, 81, 224);
pub const ORANGE: Color = Color::from_rgb(242, 153, 74);
pub const YELLOW: Color = Color::from_rgb(242, 201, 76);
pub const CYAN: Color = Color::from_rgb(45, 156, 219);
pub const PINK: Color = Color::from_rgb(235, 87, 150);
pub const TEAL: Color = Color::from_rgb(33, 150, 143);
pub const INTENSE_RED: Color = Color::from_rgb(235, 87, 87);
pub const MILD_BLUE: Color = Color::from_rgb(55, 127, 153);
pub const DARK_YELLOW: Color = Color::from_rgb(242, 176, 34);
pub const LIGHT_BLUE: Color = Color::from_rgb(134, 202, 227);

pub const GRAY_180: Color = Color::from_rgb(180, 180, 180);

pub const DEFAULT_PALETTE: [Color; 12] = [
    BLUE,
    GREEN,
    PURPLE,
    ORANGE,
    YELLOW,
    CYAN,
    PINK,
    TEAL,
    INTENSE_RED,
    MILD_BLUE,
    DARK_YELLOW,
    LIGHT_BLUE,
];

impl serde::Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for Color {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Color, D::Error> {
        let text = <String as serde::Deserialize>::deserialize(deserializer)?;
        Color::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

/// Color used for missing span placeholders.
pub const MISSING_SPAN_COLOR: Color = GRAY_180;

/// Picks a palette entry for a service. Depends only on the service name and the palette.
pub fn color_for_service(service_name: &str, palette: &[Color]) -> Color {
    if palette.is_empty() {
        return Color::default();
    }
    let digest_bytes: [u8; 32] = sha2::Sha256::digest(service_name).into();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest_bytes[0..8]);
    let index = u64::from_be_bytes(prefix) % palette.len() as u64;
    palette[index as usize]
}

/// Service name to color lookup table, computed once per trace from the flat span list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceColors {
    colors: BTreeMap<String, Color>,
    fallback: Color,
}

impl ServiceColors {
    pub fn from_spans(spans: &[Span], palette: &[Color]) -> ServiceColors {
        let mut colors = BTreeMap::new();
        for span in spans {
            if !colors.contains_key(&span.service_name) {
                colors.insert(
                    span.service_name.clone(),
                    color_for_service(&span.service_name, palette),
                );
            }
        }
        ServiceColors {
            colors,
            fallback: palette.first().copied().unwrap_or_default(),
        }
    }

    pub fn get(&self, service_name: &str) -> Color {
        self.colors
            .get(service_name)
            .copied()
            .unwrap_or(self.fallback)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Color)> {
        self.colors.iter()
    }
}
