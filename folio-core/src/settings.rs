use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ChromeConfig;
use crate::layout::Viewport;

pub const FONT_SIZE_LEVELS: (u8, u8) = (1, 8);
pub const MARGIN_LEVELS: (u8, u8) = (0, 3);
pub const LIGHT_LEVELS: (u8, u8) = (1, 24);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Theme {
    #[default]
    White,
    Sepia,
    Dark,
}

impl Theme {
    /// Unknown names fall back to the default theme instead of failing.
    pub fn from_name_lossy(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "sepia" => Theme::Sepia,
            "dark" | "black" | "night" => Theme::Dark,
            "white" | "light" => Theme::White,
            other => {
                debug!(theme = other, "unknown theme name, using default");
                Theme::default()
            }
        }
    }

    pub fn next(self) -> Self {
        match self {
            Theme::White => Theme::Sepia,
            Theme::Sepia => Theme::Dark,
            Theme::Dark => Theme::White,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Theme::White => "white",
            Theme::Sepia => "sepia",
            Theme::Dark => "dark",
        }
    }
}

impl From<String> for Theme {
    fn from(name: String) -> Self {
        Self::from_name_lossy(&name)
    }
}

/// Nominal screen size of a reader model, used only to seed the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum DeviceProfile {
    Basic,
    #[default]
    Paperwhite,
    Oasis,
    Scribe,
}

impl From<String> for DeviceProfile {
    fn from(name: String) -> Self {
        Self::from_name_lossy(&name)
    }
}

impl DeviceProfile {
    pub fn from_name_lossy(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "basic" => DeviceProfile::Basic,
            "oasis" => DeviceProfile::Oasis,
            "scribe" => DeviceProfile::Scribe,
            "paperwhite" => DeviceProfile::Paperwhite,
            other => {
                debug!(device = other, "unknown device profile, using default");
                DeviceProfile::default()
            }
        }
    }

    /// Nominal screen size in CSS pixels as `(width, height)`.
    pub fn screen_px(self) -> (f32, f32) {
        match self {
            DeviceProfile::Basic => (600.0, 800.0),
            DeviceProfile::Paperwhite => (680.0, 906.0),
            DeviceProfile::Oasis => (720.0, 960.0),
            DeviceProfile::Scribe => (930.0, 1240.0),
        }
    }

    /// Reader area left once the status and progress bars are drawn.
    pub fn viewport(self, chrome: &ChromeConfig) -> Viewport {
        let (width, height) = self.screen_px();
        Viewport::new(
            width,
            (height - chrome.status_bar_px - chrome.progress_bar_px).max(0.0),
        )
    }
}

/// Pulls any integer into `u8`; range checks happen in [`Settings::clamped`].
pub fn saturate_level(value: i64) -> u8 {
    value.clamp(0, i64::from(u8::MAX)) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredSettings")]
pub struct Settings {
    pub font_size_level: u8,
    pub margin_level: u8,
    pub theme: Theme,
    pub brightness: u8,
    pub warmth: u8,
    pub device_profile: DeviceProfile,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            font_size_level: 3,
            margin_level: 1,
            theme: Theme::White,
            brightness: 12,
            warmth: 1,
            device_profile: DeviceProfile::default(),
        }
    }
}

/// Wire form of [`Settings`]: levels may be any integer and are clamped on
/// the way in, so a bad value never discards the rest of the record.
#[derive(Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct StoredSettings {
    font_size_level: i64,
    margin_level: i64,
    theme: Theme,
    brightness: i64,
    warmth: i64,
    device_profile: DeviceProfile,
}

impl Default for StoredSettings {
    fn default() -> Self {
        let defaults = Settings::default();
        Self {
            font_size_level: defaults.font_size_level.into(),
            margin_level: defaults.margin_level.into(),
            theme: defaults.theme,
            brightness: defaults.brightness.into(),
            warmth: defaults.warmth.into(),
            device_profile: defaults.device_profile,
        }
    }
}

impl From<StoredSettings> for Settings {
    fn from(stored: StoredSettings) -> Self {
        Settings {
            font_size_level: saturate_level(stored.font_size_level),
            margin_level: saturate_level(stored.margin_level),
            theme: stored.theme,
            brightness: saturate_level(stored.brightness),
            warmth: saturate_level(stored.warmth),
            device_profile: stored.device_profile,
        }
        .clamped()
    }
}

impl Settings {
    /// Returns a copy with every numeric field pulled into its valid range.
    pub fn clamped(self) -> Self {
        let clamped = Self {
            font_size_level: self
                .font_size_level
                .clamp(FONT_SIZE_LEVELS.0, FONT_SIZE_LEVELS.1),
            margin_level: self.margin_level.clamp(MARGIN_LEVELS.0, MARGIN_LEVELS.1),
            brightness: self.brightness.clamp(LIGHT_LEVELS.0, LIGHT_LEVELS.1),
            warmth: self.warmth.clamp(LIGHT_LEVELS.0, LIGHT_LEVELS.1),
            ..self
        };
        if clamped != self {
            debug!(requested = ?self, applied = ?clamped, "clamped out-of-range settings");
        }
        clamped
    }

    pub fn merged(self, patch: &SettingsPatch) -> Self {
        Self {
            font_size_level: patch.font_size_level.unwrap_or(self.font_size_level),
            margin_level: patch.margin_level.unwrap_or(self.margin_level),
            theme: patch.theme.unwrap_or(self.theme),
            brightness: patch.brightness.unwrap_or(self.brightness),
            warmth: patch.warmth.unwrap_or(self.warmth),
            device_profile: patch.device_profile.unwrap_or(self.device_profile),
        }
        .clamped()
    }

    /// True when switching to `other` changes the page layout.
    pub fn affects_layout(&self, other: &Settings) -> bool {
        self.font_size_level != other.font_size_level
            || self.margin_level != other.margin_level
            || self.device_profile != other.device_profile
    }
}

/// Partial settings update; `None` keeps the current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsPatch {
    pub font_size_level: Option<u8>,
    pub margin_level: Option<u8>,
    pub theme: Option<Theme>,
    pub brightness: Option<u8>,
    pub warmth: Option<u8>,
    pub device_profile: Option<DeviceProfile>,
}

impl SettingsPatch {
    pub fn font_size(level: u8) -> Self {
        Self {
            font_size_level: Some(level),
            ..Self::default()
        }
    }

    pub fn margin(level: u8) -> Self {
        Self {
            margin_level: Some(level),
            ..Self::default()
        }
    }

    pub fn theme(theme: Theme) -> Self {
        Self {
            theme: Some(theme),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_values_to_nearest_bound() {
        let settings = Settings {
            font_size_level: 0,
            margin_level: 9,
            brightness: 40,
            warmth: 0,
            ..Settings::default()
        }
        .clamped();
        assert_eq!(settings.font_size_level, 1);
        assert_eq!(settings.margin_level, 3);
        assert_eq!(settings.brightness, 24);
        assert_eq!(settings.warmth, 1);
    }

    #[test]
    fn merge_keeps_unset_fields() {
        let base = Settings::default();
        let merged = base.merged(&SettingsPatch {
            font_size_level: Some(12),
            theme: Some(Theme::Dark),
            ..SettingsPatch::default()
        });
        assert_eq!(merged.font_size_level, 8);
        assert_eq!(merged.theme, Theme::Dark);
        assert_eq!(merged.margin_level, base.margin_level);
        assert_eq!(merged.device_profile, base.device_profile);
    }

    #[test]
    fn unknown_theme_falls_back_to_white() {
        assert_eq!(Theme::from_name_lossy("Sepia"), Theme::Sepia);
        assert_eq!(Theme::from_name_lossy("neon"), Theme::White);
    }

    #[test]
    fn theme_only_change_does_not_affect_layout() {
        let base = Settings::default();
        let themed = base.merged(&SettingsPatch::theme(Theme::Dark));
        assert!(!base.affects_layout(&themed));
        let bigger = base.merged(&SettingsPatch::font_size(6));
        assert!(base.affects_layout(&bigger));
    }

    #[test]
    fn bad_stored_values_are_clamped_not_rejected() {
        let settings: Settings = serde_json::from_str(
            r#"{"fontSizeLevel":300,"marginLevel":-1,"theme":"neon","brightness":99,"deviceProfile":"kindle"}"#,
        )
        .unwrap();
        assert_eq!(settings.font_size_level, 8);
        assert_eq!(settings.margin_level, 0);
        assert_eq!(settings.theme, Theme::White);
        assert_eq!(settings.brightness, 24);
        assert_eq!(settings.device_profile, DeviceProfile::Paperwhite);

        let dark: Settings = serde_json::from_str(r#"{"fontSizeLevel":300,"theme":"dark"}"#).unwrap();
        assert_eq!(dark.theme, Theme::Dark);
        assert_eq!(dark.warmth, Settings::default().warmth);
    }

    #[test]
    fn saturate_level_keeps_sign_and_width() {
        assert_eq!(saturate_level(-5), 0);
        assert_eq!(saturate_level(7), 7);
        assert_eq!(saturate_level(1_000), 255);
    }

    #[test]
    fn settings_serialize_with_camel_case_keys() {
        let json = serde_json::to_string(&Settings::default()).unwrap();
        assert!(json.contains("\"fontSizeLevel\":3"));
        assert!(json.contains("\"theme\":\"white\""));
        assert!(json.contains("\"deviceProfile\":\"paperwhite\""));
    }

    #[test]
    fn device_viewport_subtracts_chrome() {
        let chrome = ChromeConfig {
            status_bar_px: 40.0,
            progress_bar_px: 30.0,
        };
        let viewport = DeviceProfile::Basic.viewport(&chrome);
        assert_eq!(viewport.width, 600.0);
        assert_eq!(viewport.height, 730.0);
    }
}
