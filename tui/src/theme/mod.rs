//! Theme and Colors
//!
//! The widget's palette. The accent comes from the server's `primary_color`
//! when it parses; everything else is fixed.

use std::str::FromStr;

use ratatui::style::Color;

// ============================================================================
// Accent
// ============================================================================

/// Accent used when the server sends no usable `primary_color`
pub const DEFAULT_ACCENT: Color = Color::Rgb(13, 110, 253);

/// Parse a CSS-style hex color (`#rgb` or `#rrggbb`)
pub fn parse_hex_color(raw: &str) -> Option<Color> {
    let raw = raw.trim();
    let hex = raw.strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        6 => Color::from_str(raw).ok(),
        3 => {
            // #abc is #aabbcc
            let channel = |i: usize| u8::from_str_radix(&hex[i..=i], 16).ok().map(|v| v * 17);
            Some(Color::Rgb(channel(0)?, channel(1)?, channel(2)?))
        }
        _ => None,
    }
}

/// Accent for an optional configured color
pub fn accent(primary_color: Option<&str>) -> Color {
    primary_color
        .and_then(parse_hex_color)
        .unwrap_or(DEFAULT_ACCENT)
}

// ============================================================================
// UI Colors
// ============================================================================

/// Visitor messages
pub const USER_GREEN: Color = Color::Rgb(130, 220, 130);

/// System/dim text
pub const DIM_GRAY: Color = Color::Rgb(100, 100, 100);

/// Errors and field violations
pub const ERROR_RED: Color = Color::Rgb(255, 80, 80);

/// Welcome tooltip background
pub const TOOLTIP_BG: Color = Color::Rgb(40, 40, 48);
