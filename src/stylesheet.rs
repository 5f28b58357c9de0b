use std::collections::BTreeMap;
use std::fmt;

use crate::typography::TypographyConfig;

/// Name under which the composed sheet is registered with the engine.
pub const READER_THEME_NAME: &str = "pageturn";

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ThemeName {
    #[default]
    Light,
    Sepia,
    Dark,
}

impl ThemeName {
    pub fn all() -> &'static [ThemeName] {
        &[ThemeName::Light, ThemeName::Sepia, ThemeName::Dark]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeName::Light => "light",
            ThemeName::Sepia => "sepia",
            ThemeName::Dark => "dark",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ThemeName::Light => "Light",
            ThemeName::Sepia => "Sepia",
            ThemeName::Dark => "Dark",
        }
    }

    pub fn parse(name: &str) -> Option<ThemeName> {
        ThemeName::all()
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(name.trim()))
    }

    pub fn palette(&self) -> &'static PagePalette {
        match self {
            ThemeName::Light => &LIGHT_PAGE,
            ThemeName::Sepia => &SEPIA_PAGE,
            ThemeName::Dark => &DARK_PAGE,
        }
    }
}

impl fmt::Display for ThemeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Colours applied to rendered book content.
#[derive(Debug, PartialEq, Eq)]
pub struct PagePalette {
    pub background: &'static str,
    pub foreground: &'static str,
    pub caption: &'static str,
}

static LIGHT_PAGE: PagePalette = PagePalette {
    background: "#ffffff",
    foreground: "#1f2328",
    caption: "#57606a",
};

static SEPIA_PAGE: PagePalette = PagePalette {
    background: "#f4ecd8",
    foreground: "#5b4636",
    caption: "#8a6f55",
};

static DARK_PAGE: PagePalette = PagePalette {
    background: "#1e1e1e",
    foreground: "#d4d4d4",
    caption: "#9da5b4",
};

pub type Declarations = BTreeMap<String, String>;

/// Selector -> property -> value, in the shape engines accept for theming.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleSheet {
    rules: BTreeMap<String, Declarations>,
}

impl StyleSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges declarations into `selector`, later values overriding earlier ones.
    pub fn merge(&mut self, selector: &str, declarations: &[(&str, &str)]) {
        let rule = self.rules.entry(selector.to_string()).or_default();
        for (property, value) in declarations {
            rule.insert((*property).to_string(), (*value).to_string());
        }
    }

    pub fn rule(&self, selector: &str) -> Option<&Declarations> {
        self.rules.get(selector)
    }

    pub fn value(&self, selector: &str, property: &str) -> Option<&str> {
        self.rules
            .get(selector)
            .and_then(|rule| rule.get(property))
            .map(String::as_str)
    }

    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// CSS text, for engines that take a stylesheet string.
    pub fn to_css(&self) -> String {
        let mut css = String::new();
        for (selector, declarations) in &self.rules {
            css.push_str(selector);
            css.push_str(" {");
            for (property, value) in declarations {
                css.push_str(&format!(" {property}: {value};"));
            }
            css.push_str(" }\n");
        }
        css
    }
}

/// Theme plus typography: everything the composed sheet depends on.
/// Lives outside the reading session so it survives book replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Appearance {
    pub theme: ThemeName,
    pub typography: TypographyConfig,
}

impl Appearance {
    pub fn style_sheet(&self) -> StyleSheet {
        compose(
            self.theme,
            &self.typography.font_stack(),
            self.typography.line_height(),
        )
    }
}

const TYPOGRAPHY_SELECTORS: &[&str] = &["body", "p", "li"];
const CAPTION_SELECTORS: &[&str] = &["figcaption", "caption"];
const MEDIA_SELECTORS: &[&str] = &["img", "svg", "video"];

pub fn compose(theme: ThemeName, font_stack: &str, line_height: f64) -> StyleSheet {
    let palette = theme.palette();
    let mut sheet = StyleSheet::new();

    sheet.merge(
        "body",
        &[
            ("background", palette.background),
            ("color", palette.foreground),
        ],
    );
    for selector in CAPTION_SELECTORS {
        sheet.merge(selector, &[("color", palette.caption)]);
    }

    // Layout resets, independent of theme.
    for selector in ["html", "body"] {
        sheet.merge(
            selector,
            &[
                ("width", "100%"),
                ("max-width", "100%"),
                ("margin", "0"),
                ("padding", "0"),
                ("overflow-x", "hidden"),
            ],
        );
    }

    for selector in MEDIA_SELECTORS {
        sheet.merge(selector, &[("max-width", "100%"), ("height", "auto")]);
    }
    sheet.merge("table", &[("max-width", "100%")]);

    let line_height = format!("{line_height:.2}");
    for selector in TYPOGRAPHY_SELECTORS {
        sheet.merge(
            selector,
            &[("font-family", font_stack), ("line-height", line_height.as_str())],
        );
    }

    sheet
}

#[cfg(test)]
mod tests {
    use super::*;

    const STACK: &str = "Georgia, serif";

    #[test]
    fn test_compose_is_deterministic() {
        let a = compose(ThemeName::Dark, STACK, 1.8);
        let b = compose(ThemeName::Dark, STACK, 1.8);
        assert_eq!(a, b);
        assert_eq!(a.to_css(), b.to_css());
    }

    #[test]
    fn test_compose_applies_palette() {
        let sheet = compose(ThemeName::Sepia, STACK, 1.6);
        assert_eq!(sheet.value("body", "background"), Some("#f4ecd8"));
        assert_eq!(sheet.value("body", "color"), Some("#5b4636"));
        assert_eq!(sheet.value("figcaption", "color"), Some("#8a6f55"));
    }

    #[test]
    fn test_switching_themes_keeps_no_foreign_palette_values() {
        let dark = compose(ThemeName::Dark, STACK, 1.6);
        let light = compose(ThemeName::Light, STACK, 1.6);

        let light_values: Vec<&str> = [
            ThemeName::Light.palette().background,
            ThemeName::Light.palette().foreground,
            ThemeName::Light.palette().caption,
        ]
        .to_vec();
        for selector in dark.selectors() {
            let rule = dark.rule(selector).unwrap();
            for value in rule.values() {
                assert!(
                    !light_values.contains(&value.as_str()),
                    "dark sheet leaked light value {value} in {selector}"
                );
            }
        }
        assert_ne!(dark, light);
        let dark_selectors: Vec<&str> = dark.selectors().collect();
        let light_selectors: Vec<&str> = light.selectors().collect();
        assert_eq!(dark_selectors, light_selectors);
    }

    #[test]
    fn test_layout_and_media_rules_apply_to_every_theme() {
        for theme in ThemeName::all() {
            let sheet = compose(*theme, STACK, 1.2);
            assert_eq!(sheet.value("html", "overflow-x"), Some("hidden"));
            assert_eq!(sheet.value("body", "margin"), Some("0"));
            assert_eq!(sheet.value("body", "width"), Some("100%"));
            assert_eq!(sheet.value("img", "max-width"), Some("100%"));
            assert_eq!(sheet.value("table", "max-width"), Some("100%"));
        }
    }

    #[test]
    fn test_typography_overrides_are_uniform() {
        let sheet = compose(ThemeName::Light, "'Fira Sans', sans-serif", 1.8);
        for selector in TYPOGRAPHY_SELECTORS {
            assert_eq!(
                sheet.value(selector, "font-family"),
                Some("'Fira Sans', sans-serif")
            );
            assert_eq!(sheet.value(selector, "line-height"), Some("1.80"));
        }
        // body keeps its palette next to the typography override
        assert_eq!(sheet.value("body", "background"), Some("#ffffff"));
    }

    #[test]
    fn test_theme_name_parse() {
        assert_eq!(ThemeName::parse("Dark"), Some(ThemeName::Dark));
        assert_eq!(ThemeName::parse(" sepia "), Some(ThemeName::Sepia));
        assert_eq!(ThemeName::parse("solarized"), None);
    }
}
