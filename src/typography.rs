pub const FONT_SIZE_MIN: u16 = 90;
pub const FONT_SIZE_MAX: u16 = 150;
pub const FONT_SIZE_STEP: u16 = 5;
pub const LINE_SPACING_MIN: u16 = 120;
pub const LINE_SPACING_MAX: u16 = 220;
pub const LINE_SPACING_STEP: u16 = 10;

pub const CUSTOM_FONT_ID: &str = "custom";

pub struct FontOption {
    pub id: &'static str,
    pub label: &'static str,
    pub stack: &'static str,
}

// The first entry doubles as the fallback stack.
pub const FONT_OPTIONS: &[FontOption] = &[
    FontOption {
        id: "serif",
        label: "Serif",
        stack: "Georgia, 'Times New Roman', Times, serif",
    },
    FontOption {
        id: "sans",
        label: "Sans",
        stack: "-apple-system, 'Segoe UI', Helvetica, Arial, sans-serif",
    },
    FontOption {
        id: "mono",
        label: "Monospace",
        stack: "'SFMono-Regular', Menlo, Consolas, monospace",
    },
];

pub fn fallback_font_stack() -> &'static str {
    FONT_OPTIONS[0].stack
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontChoice {
    /// Id of a built-in option. Unknown ids can come from hand-edited settings.
    Builtin(String),
    Custom,
}

impl FontChoice {
    pub fn id(&self) -> &str {
        match self {
            FontChoice::Builtin(id) => id,
            FontChoice::Custom => CUSTOM_FONT_ID,
        }
    }

    pub fn from_id(id: &str) -> Self {
        if id == CUSTOM_FONT_ID {
            FontChoice::Custom
        } else {
            FontChoice::Builtin(id.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            FontChoice::Custom => "Custom",
            FontChoice::Builtin(id) => FONT_OPTIONS
                .iter()
                .find(|o| o.id == id)
                .map(|o| o.label)
                .unwrap_or("Unknown"),
        }
    }

    /// Cycles through the built-in options and then the custom option.
    pub fn next(&self) -> Self {
        let ids: Vec<&str> = FONT_OPTIONS
            .iter()
            .map(|o| o.id)
            .chain(std::iter::once(CUSTOM_FONT_ID))
            .collect();
        let current = ids.iter().position(|id| *id == self.id()).unwrap_or(0);
        FontChoice::from_id(ids[(current + 1) % ids.len()])
    }
}

impl Default for FontChoice {
    fn default() -> Self {
        FontChoice::Builtin(FONT_OPTIONS[0].id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypographyConfig {
    pub font_choice: FontChoice,
    pub custom_font_stack: Option<String>,
    pub font_size_percent: u16,
    pub line_spacing_percent: u16,
}

impl Default for TypographyConfig {
    fn default() -> Self {
        Self {
            font_choice: FontChoice::default(),
            custom_font_stack: None,
            font_size_percent: 100,
            line_spacing_percent: 160,
        }
    }
}

impl TypographyConfig {
    pub fn set_font_size_percent(&mut self, percent: u16) {
        self.font_size_percent = percent.clamp(FONT_SIZE_MIN, FONT_SIZE_MAX);
    }

    pub fn set_line_spacing_percent(&mut self, percent: u16) {
        self.line_spacing_percent = percent.clamp(LINE_SPACING_MIN, LINE_SPACING_MAX);
    }

    /// Brings values read from disk back into their slider ranges.
    pub fn clamped(mut self) -> Self {
        self.set_font_size_percent(self.font_size_percent);
        self.set_line_spacing_percent(self.line_spacing_percent);
        self
    }

    pub fn line_height(&self) -> f64 {
        f64::from(self.line_spacing_percent) / 100.0
    }

    pub fn line_height_label(&self) -> String {
        format!("{:.2}", self.line_height())
    }

    pub fn font_stack(&self) -> String {
        resolve_font_stack(&self.font_choice, self.custom_font_stack.as_deref())
    }
}

pub fn resolve_font_stack(choice: &FontChoice, custom: Option<&str>) -> String {
    match choice {
        FontChoice::Custom => match custom.map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => fallback_font_stack().to_string(),
        },
        FontChoice::Builtin(id) => FONT_OPTIONS
            .iter()
            .find(|o| o.id == id)
            .map(|o| o.stack)
            .unwrap_or_else(fallback_font_stack)
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_font_with_blank_text_falls_back() {
        let stack = resolve_font_stack(&FontChoice::Custom, Some("   "));
        assert_eq!(stack, FONT_OPTIONS[0].stack);
        assert_eq!(resolve_font_stack(&FontChoice::Custom, None), FONT_OPTIONS[0].stack);
    }

    #[test]
    fn test_custom_font_text_is_trimmed() {
        let stack = resolve_font_stack(&FontChoice::Custom, Some("  'Iowan Old Style', serif "));
        assert_eq!(stack, "'Iowan Old Style', serif");
    }

    #[test]
    fn test_builtin_and_unknown_font_ids() {
        let mono = resolve_font_stack(&FontChoice::Builtin("mono".into()), Some("ignored"));
        assert_eq!(mono, FONT_OPTIONS[2].stack);

        let unknown = resolve_font_stack(&FontChoice::Builtin("papyrus".into()), None);
        assert_eq!(unknown, FONT_OPTIONS[0].stack);
    }

    #[test]
    fn test_sliders_clamp_to_range() {
        let mut config = TypographyConfig::default();
        config.set_font_size_percent(400);
        assert_eq!(config.font_size_percent, FONT_SIZE_MAX);
        config.set_font_size_percent(10);
        assert_eq!(config.font_size_percent, FONT_SIZE_MIN);
        config.set_line_spacing_percent(500);
        assert_eq!(config.line_spacing_percent, LINE_SPACING_MAX);
        config.set_line_spacing_percent(0);
        assert_eq!(config.line_spacing_percent, LINE_SPACING_MIN);
    }

    #[test]
    fn test_line_height_label_has_two_decimals() {
        let mut config = TypographyConfig::default();
        config.set_line_spacing_percent(180);
        assert_eq!(config.line_height_label(), "1.80");
        config.set_line_spacing_percent(125);
        assert_eq!(config.line_height_label(), "1.25");
    }

    #[test]
    fn test_font_choice_cycles_through_custom() {
        let mut choice = FontChoice::default();
        let mut seen = vec![choice.id().to_string()];
        for _ in 0..FONT_OPTIONS.len() {
            choice = choice.next();
            seen.push(choice.id().to_string());
        }
        assert_eq!(seen, vec!["serif", "sans", "mono", "custom"]);
        assert_eq!(choice.next(), FontChoice::default());
    }
}
