//! Settings file loading and atomic persistence
//!
//! The settings file is a flat key-value object used to seed a calibration
//! run and to record its result. Every key is optional:
//!
//! | key         | meaning                              |
//! |-------------|--------------------------------------|
//! | `x, y, z`   | per-tower trim offsets (M666)        |
//! | `r`         | delta radius (M665 R)                |
//! | `l`         | diagonal rod length (M665 L)         |
//! | `step`      | steps per mm                         |
//! | `max_runs`  | calibration iteration budget         |
//! | `max_error` | error limit after the first iteration |
//!
//! Files ending in `.toml` are read and written as TOML. Anything else is
//! treated as JSON, which is what earlier versions of the tool produced.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Flat calibration settings, every field optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_runs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_error: Option<f64>,
}

/// On-disk encoding of a settings file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsFormat {
    Json,
    Toml,
}

impl SettingsFormat {
    /// Pick the encoding from the file extension (`.toml` or JSON otherwise)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => SettingsFormat::Toml,
            _ => SettingsFormat::Json,
        }
    }
}

impl Settings {
    /// Load settings from `path`
    ///
    /// # Errors
    /// - `Error::Io` if the file cannot be read (including when it is missing)
    /// - `Error::Settings` if the content is not a valid settings object
    ///
    /// Callers decide the fallback policy; nothing here substitutes defaults
    /// for a broken file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let settings = Self::parse(&content, SettingsFormat::from_path(path))?;
        debug!("Loaded settings from {}: {:?}", path.display(), settings);
        Ok(settings)
    }

    /// Decode settings text in the given format
    pub fn parse(content: &str, format: SettingsFormat) -> Result<Self> {
        let settings: Settings = match format {
            SettingsFormat::Json => serde_json::from_str(content)
                .map_err(|e| Error::Settings(format!("Invalid JSON settings: {}", e)))?,
            SettingsFormat::Toml => toml::from_str(content)
                .map_err(|e| Error::Settings(format!("Invalid TOML settings: {}", e)))?,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Encode settings in the given format
    pub fn render(&self, format: SettingsFormat) -> Result<String> {
        match format {
            SettingsFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| Error::Settings(format!("Failed to encode JSON settings: {}", e))),
            SettingsFormat::Toml => toml::to_string(self)
                .map_err(|e| Error::Settings(format!("Failed to encode TOML settings: {}", e))),
        }
    }

    /// Write settings to `path` atomically
    ///
    /// Content goes to `<path>.tmp` first and is then renamed over the target,
    /// so a crash mid-write never leaves a truncated settings file behind.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = self.render(SettingsFormat::from_path(path))?;

        let temp_path = temp_path_for(path);
        fs::write(&temp_path, content)?;
        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        debug!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Reject values no calibration run could use
    fn validate(&self) -> Result<()> {
        let floats = [
            ("x", self.x),
            ("y", self.y),
            ("z", self.z),
            ("r", self.r),
            ("l", self.l),
            ("step", self.step),
            ("max_error", self.max_error),
        ];
        for (key, value) in floats {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(Error::Settings(format!("Key '{}' is not a finite number", key)));
                }
            }
        }
        Ok(())
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SettingsFormat::from_path(Path::new("cal.toml")), SettingsFormat::Toml);
        assert_eq!(SettingsFormat::from_path(Path::new("cal.TOML")), SettingsFormat::Toml);
        assert_eq!(SettingsFormat::from_path(Path::new("cal.json")), SettingsFormat::Json);
        assert_eq!(SettingsFormat::from_path(Path::new("settings")), SettingsFormat::Json);
    }

    #[test]
    fn test_parse_json_partial_keys() {
        let settings = Settings::parse(r#"{"x": -0.25, "max_runs": 10}"#, SettingsFormat::Json).unwrap();
        assert_eq!(settings.x, Some(-0.25));
        assert_eq!(settings.max_runs, Some(10));
        assert_eq!(settings.y, None);
        assert_eq!(settings.r, None);
    }

    #[test]
    fn test_parse_json_integer_for_float_key() {
        let settings = Settings::parse(r#"{"max_error": 1, "r": 62}"#, SettingsFormat::Json).unwrap();
        assert_eq!(settings.max_error, Some(1.0));
        assert_eq!(settings.r, Some(62.0));
    }

    #[test]
    fn test_parse_toml() {
        let settings = Settings::parse("x = 0.1\nl = 121.36\nmax_runs = 20\n", SettingsFormat::Toml).unwrap();
        assert_eq!(settings.x, Some(0.1));
        assert_eq!(settings.l, Some(121.36));
        assert_eq!(settings.max_runs, Some(20));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            Settings::parse("{not json", SettingsFormat::Json),
            Err(Error::Settings(_))
        ));
        assert!(matches!(
            Settings::parse(r#"{"x": "abc"}"#, SettingsFormat::Json),
            Err(Error::Settings(_))
        ));
        assert!(matches!(
            Settings::parse(r#"{"max_runs": -3}"#, SettingsFormat::Json),
            Err(Error::Settings(_))
        ));
    }

    #[test]
    fn test_render_skips_missing_keys() {
        let settings = Settings {
            x: Some(0.5),
            ..Default::default()
        };
        let json = settings.render(SettingsFormat::Json).unwrap();
        assert!(json.contains("\"x\""));
        assert!(!json.contains("\"y\""));
    }

    #[test]
    fn test_temp_path_for() {
        assert_eq!(
            temp_path_for(Path::new("/tmp/cal.json")),
            PathBuf::from("/tmp/cal.json.tmp")
        );
    }
}
