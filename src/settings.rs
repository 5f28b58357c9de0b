use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::stylesheet::{Appearance, ThemeName};
use crate::typography::{FONT_OPTIONS, FontChoice, TypographyConfig};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = ".pageturn_settings.yaml";
pub const SETTINGS_PATH_ENV: &str = "PAGETURN_SETTINGS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_theme")]
    pub theme: String,

    #[serde(default = "default_font")]
    pub font: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_font: Option<String>,

    #[serde(default = "default_font_size")]
    pub font_size: u16,

    #[serde(default = "default_line_spacing")]
    pub line_spacing: u16,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_theme() -> String {
    ThemeName::default().as_str().to_string()
}

fn default_font() -> String {
    FontChoice::default().id().to_string()
}

fn default_font_size() -> u16 {
    TypographyConfig::default().font_size_percent
}

fn default_line_spacing() -> u16 {
    TypographyConfig::default().line_spacing_percent
}

impl Default for Settings {
    fn default() -> Self {
        Settings::from_appearance(&Appearance::default())
    }
}

impl Settings {
    pub fn from_appearance(appearance: &Appearance) -> Self {
        let typography = &appearance.typography;
        Self {
            version: CURRENT_VERSION,
            theme: appearance.theme.as_str().to_string(),
            font: typography.font_choice.id().to_string(),
            custom_font: typography.custom_font_stack.clone(),
            font_size: typography.font_size_percent,
            line_spacing: typography.line_spacing_percent,
        }
    }

    /// Unknown names fall back to defaults and numbers are clamped into
    /// their slider ranges, so a hand-edited file can't break the reader.
    pub fn appearance(&self) -> Appearance {
        let theme = ThemeName::parse(&self.theme).unwrap_or_else(|| {
            warn!("Unknown theme '{}' in settings, using default", self.theme);
            ThemeName::default()
        });
        let font_choice = match FontChoice::from_id(&self.font) {
            FontChoice::Builtin(id) if !FONT_OPTIONS.iter().any(|o| o.id == id) => {
                warn!("Unknown font '{id}' in settings, using default");
                FontChoice::default()
            }
            choice => choice,
        };
        let typography = TypographyConfig {
            font_choice,
            custom_font_stack: self
                .custom_font
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            font_size_percent: self.font_size,
            line_spacing_percent: self.line_spacing,
        }
        .clamped();
        Appearance { theme, typography }
    }
}

static SETTINGS: Lazy<RwLock<Settings>> = Lazy::new(|| RwLock::new(Settings::default()));

pub fn settings_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(SETTINGS_PATH_ENV) {
        return Some(PathBuf::from(path));
    }
    home::home_dir().map(|home| home.join(SETTINGS_FILENAME))
}

pub fn load_settings() {
    let Some(path) = settings_path() else {
        warn!("Could not determine home directory, using default settings");
        return;
    };
    let settings = load_settings_from(&path);
    if let Ok(mut global) = SETTINGS.write() {
        *global = settings;
    }
}

/// Reads settings from `path`, creating the file with defaults when it is
/// missing. Unreadable or malformed files yield defaults and are left alone.
pub fn load_settings_from(path: &Path) -> Settings {
    if !path.exists() {
        info!(
            "Settings file not found at {:?}, creating with defaults",
            path
        );
        let settings = Settings::default();
        save_settings_to_file(&settings, path);
        return settings;
    }

    match fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
            Ok(mut settings) => {
                debug!("Loaded settings from {:?}", path);

                if settings.version < CURRENT_VERSION {
                    migrate_settings(&mut settings);
                    save_settings_to_file(&settings, path);
                }
                settings
            }
            Err(e) => {
                error!("Failed to parse settings file {:?}: {}", path, e);
                Settings::default()
            }
        },
        Err(e) => {
            error!("Failed to read settings file {:?}: {}", path, e);
            Settings::default()
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    // v0 files predate the version field and need nothing beyond the
    // serde defaults.

    settings.version = CURRENT_VERSION;
}

pub fn save_settings() {
    let Some(path) = settings_path() else {
        warn!("Could not determine home directory, cannot save settings");
        return;
    };

    if let Ok(settings) = SETTINGS.read() {
        save_settings_to_file(&settings, &path);
    }
}

pub fn save_settings_to_file(settings: &Settings, path: &Path) {
    let content = generate_settings_yaml(settings);

    match fs::write(path, content) {
        Ok(()) => debug!("Saved settings to {:?}", path),
        Err(e) => error!("Failed to save settings to {:?}: {}", path, e),
    }
}

fn generate_settings_yaml(settings: &Settings) -> String {
    let mut content = String::from(SETTINGS_HEADER);

    content.push_str(&format!("version: {}\n", settings.version));
    content.push_str(&format!("theme: \"{}\"\n", settings.theme));
    content.push_str(&format!("font: \"{}\"\n", settings.font));
    if let Some(custom) = &settings.custom_font {
        content.push_str(&format!(
            "custom_font: \"{}\"\n",
            custom.replace('\\', "\\\\").replace('"', "\\\"")
        ));
    }
    content.push_str(&format!("font_size: {}\n", settings.font_size));
    content.push_str(&format!("line_spacing: {}\n", settings.line_spacing));

    content
}

const SETTINGS_HEADER: &str = r#"# ============================================================================
# pageturn settings
# ============================================================================
# theme:        light | sepia | dark
# font:         serif | sans | mono | custom
# custom_font:  font-family text used when font is "custom"
# font_size:    percent, 90-150
# line_spacing: percent of the font size, 120-220

"#;

// Public API for accessing/modifying settings

pub fn get_appearance() -> Appearance {
    SETTINGS
        .read()
        .map(|s| s.appearance())
        .unwrap_or_default()
}

pub fn set_appearance(appearance: &Appearance) {
    if let Ok(mut settings) = SETTINGS.write() {
        *settings = Settings::from_appearance(appearance);
    }
    save_settings();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.yaml");

        let settings = load_settings_from(&path);
        assert_eq!(settings, Settings::default());
        assert!(path.exists());

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("theme: \"light\""));
        assert!(written.contains("line_spacing: 160"));
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.yaml");

        let mut appearance = Appearance::default();
        appearance.theme = ThemeName::Sepia;
        appearance.typography.font_choice = FontChoice::Custom;
        appearance.typography.custom_font_stack = Some("\"Iowan Old Style\", serif".into());
        appearance.typography.font_size_percent = 120;
        appearance.typography.line_spacing_percent = 200;

        save_settings_to_file(&Settings::from_appearance(&appearance), &path);
        let loaded = load_settings_from(&path).appearance();
        assert_eq!(loaded, appearance);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(
            &path,
            "version: 1\ntheme: \"neon\"\nfont: \"comic\"\nfont_size: 400\nline_spacing: 50\n",
        )
        .unwrap();

        let appearance = load_settings_from(&path).appearance();
        assert_eq!(appearance.theme, ThemeName::Light);
        assert_eq!(appearance.typography.font_choice, FontChoice::default());
        assert_eq!(appearance.typography.font_size_percent, 150);
        assert_eq!(appearance.typography.line_spacing_percent, 120);
    }

    #[test]
    fn test_old_version_is_migrated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "version: 0\ntheme: \"dark\"\n").unwrap();

        let settings = load_settings_from(&path);
        assert_eq!(settings.version, CURRENT_VERSION);
        assert_eq!(settings.appearance().theme, ThemeName::Dark);
        assert!(fs::read_to_string(&path).unwrap().contains("version: 1"));
    }

    #[test]
    fn test_malformed_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "theme: [unclosed").unwrap();

        assert_eq!(load_settings_from(&path), Settings::default());
        assert_eq!(fs::read_to_string(&path).unwrap(), "theme: [unclosed");
    }
}
