use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::app::infrastructure::error::AppError;

pub const MIN_OPACITY: f64 = 0.3;
pub const MAX_OPACITY: f64 = 1.0;

/// Every on-disk key, used to match keys case-insensitively.
const FIELD_NAMES: &[&str] = &[
    "WindowOpacity",
    "IsTopmost",
    "IsDarkTheme",
    "AutoSaveIntervalSeconds",
    "IsAutoSaveEnabled",
    "AutoSaveRetentionDays",
    "FontSize",
    "FontFamily",
    "WindowWidth",
    "WindowHeight",
    "WindowLeft",
    "WindowTop",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppSettings {
    #[serde(default = "default_opacity")]
    pub window_opacity: f64,

    #[serde(default)]
    pub is_topmost: bool,

    #[serde(default)]
    pub is_dark_theme: bool,

    #[serde(
        default = "default_auto_save_interval",
        deserialize_with = "positive_count"
    )]
    pub auto_save_interval_seconds: u32,

    #[serde(default = "default_auto_save_enabled")]
    pub is_auto_save_enabled: bool,

    /// Snapshot files older than this are purged by maintenance
    #[serde(default = "default_retention_days", deserialize_with = "positive_count")]
    pub auto_save_retention_days: u32,

    #[serde(default = "default_font_size")]
    pub font_size: f64,

    #[serde(default = "default_font_family")]
    pub font_family: String,

    #[serde(default = "default_window_width")]
    pub window_width: f64,

    #[serde(default = "default_window_height")]
    pub window_height: f64,

    #[serde(default = "default_window_offset")]
    pub window_left: f64,

    #[serde(default = "default_window_offset")]
    pub window_top: f64,
}

/// Window placement reported by the UI when the session closes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowGeometry {
    pub width: f64,
    pub height: f64,
    pub left: f64,
    pub top: f64,
}

/// Accepts any JSON number; values below 1 come back as 0 for `sanitize` to replace.
fn positive_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.is_finite() && value >= 1.0 {
        Ok(value.min(f64::from(u32::MAX)) as u32)
    } else {
        Ok(0)
    }
}

fn default_opacity() -> f64 {
    1.0
}

fn default_auto_save_interval() -> u32 {
    30
}

fn default_auto_save_enabled() -> bool {
    true
}

fn default_retention_days() -> u32 {
    7
}

fn default_font_size() -> f64 {
    14.0
}

fn default_font_family() -> String {
    "Microsoft YaHei UI".to_string()
}

fn default_window_width() -> f64 {
    800.0
}

fn default_window_height() -> f64 {
    600.0
}

fn default_window_offset() -> f64 {
    100.0
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            window_opacity: default_opacity(),
            is_topmost: false,
            is_dark_theme: false,
            auto_save_interval_seconds: default_auto_save_interval(),
            is_auto_save_enabled: default_auto_save_enabled(),
            auto_save_retention_days: default_retention_days(),
            font_size: default_font_size(),
            font_family: default_font_family(),
            window_width: default_window_width(),
            window_height: default_window_height(),
            window_left: default_window_offset(),
            window_top: default_window_offset(),
        }
    }
}

pub fn clamp_opacity(value: f64) -> f64 {
    if value.is_nan() {
        return default_opacity();
    }
    value.clamp(MIN_OPACITY, MAX_OPACITY)
}

impl AppSettings {
    /// Parse a settings document, matching keys case-insensitively and
    /// dropping keys that are not settings.
    pub fn from_json(json: &str) -> Result<Self, AppError> {
        let value: Value = serde_json::from_str(json)?;
        let Value::Object(raw) = value else {
            return Err(AppError::InvalidOperation(
                "settings file is not a JSON object".to_string(),
            ));
        };

        let mut normalized = Map::new();
        for (key, val) in raw {
            if let Some(name) = FIELD_NAMES.iter().find(|n| n.eq_ignore_ascii_case(&key)) {
                normalized.insert((*name).to_string(), val);
            }
        }

        let mut settings: AppSettings = serde_json::from_value(Value::Object(normalized))?;
        settings.sanitize();
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Pull out-of-range values back to something usable.
    pub fn sanitize(&mut self) {
        self.window_opacity = clamp_opacity(self.window_opacity);
        if self.auto_save_interval_seconds == 0 {
            self.auto_save_interval_seconds = default_auto_save_interval();
        }
        if self.auto_save_retention_days == 0 {
            self.auto_save_retention_days = default_retention_days();
        }
        if !(self.font_size.is_finite() && self.font_size > 0.0) {
            self.font_size = default_font_size();
        }
    }

    pub fn apply_geometry(&mut self, geometry: WindowGeometry) {
        self.window_width = geometry.width;
        self.window_height = geometry.height;
        self.window_left = geometry.left;
        self.window_top = geometry.top;
    }
}
