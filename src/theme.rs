use crate::rich_text::{RunStyle, Tint};
use crate::settings::Settings;
use ratatui::style::{Color, Modifier, Style};

// Color palette structure
#[derive(Debug, Clone)]
pub struct Base16Palette {
    pub base_00: Color, // Background
    pub base_01: Color, // Lighter background
    pub base_02: Color, // Selection background
    pub base_03: Color, // Comments, invisibles
    pub base_04: Color, // Dark foreground
    pub base_05: Color, // Default foreground
    pub base_06: Color, // Light foreground
    pub base_07: Color, // Light background
    pub base_08: Color, // Red
    pub base_09: Color, // Orange
    pub base_0a: Color, // Yellow
    pub base_0b: Color, // Green
    pub base_0c: Color, // Cyan
    pub base_0d: Color, // Blue
    pub base_0e: Color, // Purple
    pub base_0f: Color, // Brown
}

// Oceanic Next
pub const OCEANIC_NEXT: Base16Palette = Base16Palette {
    base_00: Color::Rgb(0x1B, 0x2B, 0x34),
    base_01: Color::Rgb(0x34, 0x3D, 0x46),
    base_02: Color::Rgb(0x4F, 0x5B, 0x66),
    base_03: Color::Rgb(0x65, 0x73, 0x7E),
    base_04: Color::Rgb(0xA7, 0xAD, 0xBA),
    base_05: Color::Rgb(0xC0, 0xC5, 0xCE),
    base_06: Color::Rgb(0xCD, 0xD3, 0xDE),
    base_07: Color::Rgb(0xF0, 0xF4, 0xF8),
    base_08: Color::Rgb(0xEC, 0x5F, 0x67),
    base_09: Color::Rgb(0xF9, 0x91, 0x57),
    base_0a: Color::Rgb(0xFA, 0xC8, 0x63),
    base_0b: Color::Rgb(0x99, 0xC7, 0x94),
    base_0c: Color::Rgb(0x5F, 0xB3, 0xB3),
    base_0d: Color::Rgb(0x66, 0x99, 0xCC),
    base_0e: Color::Rgb(0xC5, 0x94, 0xC5),
    base_0f: Color::Rgb(0xAB, 0x79, 0x67),
};

/// Parses `RRGGBB` (with or without a leading `#`).
pub fn parse_hex_color(hex: &str) -> Option<Color> {
    let hex = hex.trim().trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    let value = u32::from_str_radix(hex, 16).ok()?;
    Some(Color::Rgb(
        (value >> 16) as u8,
        (value >> 8) as u8,
        value as u8,
    ))
}

/// Palette plus the two configurable review backgrounds.
#[derive(Debug, Clone)]
pub struct Theme {
    pub palette: Base16Palette,
    pub highlight_bg: Color,
    pub selection_bg: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl Theme {
    pub fn from_settings(settings: &Settings) -> Self {
        let palette = OCEANIC_NEXT;
        Self {
            highlight_bg: parse_hex_color(&settings.highlight_color).unwrap_or(palette.base_0f),
            selection_bg: parse_hex_color(&settings.selection_color).unwrap_or(palette.base_02),
            palette,
        }
    }

    pub fn tint(&self, tint: Tint) -> Color {
        let p = &self.palette;
        match tint {
            Tint::Heading => p.base_0d,
            Tint::Link => p.base_0c,
            Tint::Code => p.base_0b,
            Tint::Quote => p.base_04,
            Tint::Marker => p.base_0a,
            Tint::Muted => p.base_03,
        }
    }

    /// Terminal style of a rendered run. `highlighted` adds the comment background.
    pub fn run_style(&self, style: &RunStyle, highlighted: bool) -> Style {
        let mut out = Style::default().fg(style
            .foreground
            .map(|tint| self.tint(tint))
            .unwrap_or(self.palette.base_05));

        if let Some(tint) = style.background {
            out = out.bg(match tint {
                Tint::Code => self.palette.base_01,
                other => self.tint(other),
            });
        }
        if highlighted {
            out = out.bg(self.highlight_bg);
        }

        let mut modifiers = Modifier::empty();
        if style.bold {
            modifiers |= Modifier::BOLD;
        }
        if style.italic {
            modifiers |= Modifier::ITALIC;
        }
        if style.strikethrough {
            modifiers |= Modifier::CROSSED_OUT;
        }
        if style.underline || style.link.is_some() {
            modifiers |= Modifier::UNDERLINED;
        }
        out.add_modifier(modifiers)
    }

    // Get colors for focused/unfocused panels
    pub fn panel_colors(&self, is_focused: bool) -> (Color, Color) {
        if is_focused {
            (self.palette.base_07, self.palette.base_04)
        } else {
            (self.palette.base_03, self.palette.base_03)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colors() {
        assert_eq!(parse_hex_color("#102030"), Some(Color::Rgb(0x10, 0x20, 0x30)));
        assert_eq!(parse_hex_color("FFaa00"), Some(Color::Rgb(0xFF, 0xAA, 0x00)));
        assert_eq!(parse_hex_color("fff"), None);
        assert_eq!(parse_hex_color("zzzzzz"), None);
    }

    #[test]
    fn bad_settings_colors_fall_back() {
        let settings = Settings {
            highlight_color: "nope".to_string(),
            ..Settings::default()
        };
        let theme = Theme::from_settings(&settings);
        assert_eq!(theme.highlight_bg, OCEANIC_NEXT.base_0f);
    }

    #[test]
    fn highlight_keeps_text_attributes() {
        let theme = Theme::default();
        let style = theme.run_style(&RunStyle::bold(), true);
        assert_eq!(style.bg, Some(theme.highlight_bg));
        assert!(style.add_modifier.contains(Modifier::BOLD));
    }
}
