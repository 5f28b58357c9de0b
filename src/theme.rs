use ratatui::style::Color;

use crate::stylesheet::ThemeName;

// Color palette structure for the reader chrome (panels, status bar, popups).
// Book content takes its colours from the composed style sheet instead.
#[allow(dead_code)]
#[derive(Clone, Debug)]
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

const fn rgb(value: u32) -> Color {
    Color::Rgb(
        ((value >> 16) & 0xFF) as u8,
        ((value >> 8) & 0xFF) as u8,
        (value & 0xFF) as u8,
    )
}

/// Parses `#rrggbb` (or bare `rrggbb`) into a terminal colour.
pub fn parse_hex_color(hex: &str) -> Option<Color> {
    let hex = hex.trim().trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    u32::from_str_radix(hex, 16).ok().map(rgb)
}

pub fn palette_for(theme: ThemeName) -> &'static Base16Palette {
    match theme {
        ThemeName::Light => &LIGHT_PALETTE,
        ThemeName::Sepia => &SEPIA_PALETTE,
        ThemeName::Dark => &DARK_PALETTE,
    }
}

// ============================================================================
// Built-in chrome palettes
// ============================================================================

// GitHub-like light chrome around a white page
static LIGHT_PALETTE: Base16Palette = Base16Palette {
    base_00: rgb(0xFFFFFF),
    base_01: rgb(0xF6F8FA),
    base_02: rgb(0xD0D7DE),
    base_03: rgb(0x8C959F),
    base_04: rgb(0x57606A),
    base_05: rgb(0x1F2328),
    base_06: rgb(0x24292F),
    base_07: rgb(0x0D1117),
    base_08: rgb(0xCF222E),
    base_09: rgb(0xBC4C00),
    base_0a: rgb(0x9A6700),
    base_0b: rgb(0x1A7F37),
    base_0c: rgb(0x1B7C83),
    base_0d: rgb(0x0969DA),
    base_0e: rgb(0x8250DF),
    base_0f: rgb(0x953800),
};

// Warm paper tones
static SEPIA_PALETTE: Base16Palette = Base16Palette {
    base_00: rgb(0xF4ECD8),
    base_01: rgb(0xE9DDC1),
    base_02: rgb(0xD8C7A3),
    base_03: rgb(0xA89479),
    base_04: rgb(0x8A6F55),
    base_05: rgb(0x5B4636),
    base_06: rgb(0x4A3828),
    base_07: rgb(0x2E2218),
    base_08: rgb(0xB0413E),
    base_09: rgb(0xB8652B),
    base_0a: rgb(0x9C7A1C),
    base_0b: rgb(0x5F7A34),
    base_0c: rgb(0x3F7A73),
    base_0d: rgb(0x3D6A8F),
    base_0e: rgb(0x7D5A86),
    base_0f: rgb(0x8B5A3C),
};

// Editor-like dark chrome
static DARK_PALETTE: Base16Palette = Base16Palette {
    base_00: rgb(0x1E1E1E),
    base_01: rgb(0x252526),
    base_02: rgb(0x3A3D41),
    base_03: rgb(0x6A6A6A),
    base_04: rgb(0x9DA5B4),
    base_05: rgb(0xD4D4D4),
    base_06: rgb(0xE0E0E0),
    base_07: rgb(0xFFFFFF),
    base_08: rgb(0xF44747),
    base_09: rgb(0xCE9178),
    base_0a: rgb(0xDCDCAA),
    base_0b: rgb(0x6A9955),
    base_0c: rgb(0x4EC9B0),
    base_0d: rgb(0x569CD6),
    base_0e: rgb(0xC586C0),
    base_0f: rgb(0xD7BA7D),
};

// ============================================================================
// Color utilities for focus states
// ============================================================================

impl Base16Palette {
    /// (border, title, background) for a panel.
    pub fn get_panel_colors(&self, is_focused: bool) -> (Color, Color, Color) {
        if is_focused {
            (self.base_0d, self.base_05, self.base_00)
        } else {
            (self.base_03, self.base_04, self.base_00)
        }
    }

    /// (background, foreground) for the selected row of a list.
    pub fn get_selection_colors(&self, is_focused: bool) -> (Color, Color) {
        if is_focused {
            (self.base_02, self.base_06)
        } else {
            (self.base_01, self.base_04)
        }
    }
}
