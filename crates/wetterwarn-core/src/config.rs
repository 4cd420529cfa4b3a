use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://warnungen.zamg.at/wsapp/api/getWarningsForCoords";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_GRACE_PERIOD_SECS: i64 = 3600;
pub const DEFAULT_EXTRA_COORDS: &str = "";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a single-line summary of all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where the daemon writes status and the latest result as JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,

    /// Upstream warning service
    #[serde(default)]
    pub service: ServiceConfig,

    /// The home zone used as the anchor query point.
    ///
    /// Left unset, every update cycle fails before any request is made.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<HomeZoneConfig>,

    /// Layered coordinator settings
    #[serde(default)]
    pub entry: EntrySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Endpoint queried with `lon`, `lat` and `lang` parameters
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// Raw attributes of the home zone.
///
/// Values are kept untyped so that a string like `"48.2"` or an invalid entry
/// reaches the coordinate resolver instead of failing the whole file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HomeZoneConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<serde_json::Value>,
}

impl HomeZoneConfig {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude.into()),
            longitude: Some(longitude.into()),
        }
    }

    /// Zone attributes in the shape a zone provider hands out.
    pub fn attributes(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut attributes = serde_json::Map::new();
        if let Some(latitude) = &self.latitude {
            attributes.insert("latitude".to_string(), latitude.clone());
        }
        if let Some(longitude) = &self.longitude {
            attributes.insert("longitude".to_string(), longitude.clone());
        }
        attributes
    }
}

/// One layer of coordinator settings. Unset fields fall through to the next layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsLayer {
    /// Seconds between update cycles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_interval: Option<u64>,

    /// Seconds a warning is kept alive past its end or its last sighting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_period: Option<i64>,

    /// Extra query points as `lat,lon;lat,lon`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_coords: Option<String>,
}

/// Coordinator settings: live options override persisted data, which overrides
/// the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntrySettings {
    #[serde(default)]
    pub data: SettingsLayer,
    #[serde(default)]
    pub options: SettingsLayer,
}

impl EntrySettings {
    pub fn scan_interval(&self) -> u64 {
        self.options
            .scan_interval
            .or(self.data.scan_interval)
            .unwrap_or(DEFAULT_SCAN_INTERVAL_SECS)
    }

    pub fn grace_period(&self) -> i64 {
        self.options
            .grace_period
            .or(self.data.grace_period)
            .unwrap_or(DEFAULT_GRACE_PERIOD_SECS)
    }

    pub fn extra_coords(&self) -> &str {
        self.options
            .extra_coords
            .as_deref()
            .or(self.data.extra_coords.as_deref())
            .unwrap_or(DEFAULT_EXTRA_COORDS)
    }
}

impl Config {
    /// Load configuration from the default location, creating it if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from `path`, writing defaults there if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No config at {}, writing defaults", path.display());
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.checked()?;
        Ok((config, validation))
    }

    /// Validate and log warnings, failing on errors.
    pub fn checked(&self) -> Result<ValidationResult> {
        let validation = self.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok(validation)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.service.base_url, "service.base_url", &mut result);

        if self.service.request_timeout_secs == 0 {
            result.add_error(
                "service.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        }

        let scan_interval = self.entry.scan_interval();
        if scan_interval == 0 {
            result.add_error("entry.scan_interval", "Scan interval must be greater than 0");
        } else if scan_interval > 86_400 {
            result.add_warning(
                "entry.scan_interval",
                "Scan interval is more than 24 hours",
            );
        }

        if self.entry.grace_period() <= 0 {
            result.add_warning(
                "entry.grace_period",
                "Grace period disabled - warnings vanish as soon as upstream drops them",
            );
        }

        match &self.home {
            None => result.add_warning(
                "home",
                "Home zone not configured - update cycles will fail",
            ),
            Some(home) if home.latitude.is_none() || home.longitude.is_none() => {
                result.add_warning("home", "Home zone is missing latitude or longitude")
            }
            Some(_) => {}
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;

        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::NotFound("platform config directory".to_string()))?
            .join("wetterwarn");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> Config {
        Config {
            home: Some(HomeZoneConfig::new(48.2082, 16.3738)),
            ..Config::default()
        }
    }

    #[test]
    fn test_valid_default_config() {
        let result = configured().validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_missing_home_is_warning() {
        let result = Config::default().validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "home"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = configured();
        config.service.base_url = "ftp://warnungen.zamg.at/api".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_zero_scan_interval_is_error() {
        let mut config = configured();
        config.entry.options.scan_interval = Some(0);
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "entry.scan_interval"));
        assert!(config.checked().is_err());
    }

    #[test]
    fn test_settings_precedence() {
        let mut settings = EntrySettings::default();
        assert_eq!(settings.scan_interval(), DEFAULT_SCAN_INTERVAL_SECS);
        assert_eq!(settings.grace_period(), DEFAULT_GRACE_PERIOD_SECS);
        assert_eq!(settings.extra_coords(), "");

        settings.data.grace_period = Some(600);
        settings.data.extra_coords = Some("47.0,15.4".to_string());
        assert_eq!(settings.grace_period(), 600);
        assert_eq!(settings.extra_coords(), "47.0,15.4");

        settings.options.grace_period = Some(0);
        settings.options.scan_interval = Some(60);
        assert_eq!(settings.grace_period(), 0);
        assert_eq!(settings.scan_interval(), 60);
        assert_eq!(settings.extra_coords(), "47.0,15.4");
    }

    #[test]
    fn test_home_attributes_keep_raw_values() {
        let home = HomeZoneConfig {
            latitude: Some(serde_json::json!("48.2")),
            longitude: None,
        };
        let attributes = home.attributes();
        assert_eq!(attributes.get("latitude"), Some(&serde_json::json!("48.2")));
        assert!(!attributes.contains_key("longitude"));
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.service.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = configured();
        config.entry.data.extra_coords = Some("47.07,15.44;46.62,14.31".to_string());
        config.entry.options.grace_period = Some(1800);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.entry, config.entry);
        assert_eq!(loaded.home, config.home);
    }

    #[test]
    fn test_parse_hand_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[home]
latitude = "48.2"
longitude = 16.37

[entry.options]
grace_period = 900
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.service.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.entry.grace_period(), 900);
        let home = config.home.unwrap();
        assert_eq!(home.latitude, Some(serde_json::json!("48.2")));
        assert_eq!(home.longitude, Some(serde_json::json!(16.37)));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[entry.options\ngrace_period = ").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        let config_error = err.downcast_ref::<ConfigError>().unwrap();
        assert!(matches!(config_error, ConfigError::ParseError(_)));
        assert!(config_error.user_message().contains("malformed"));
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert_eq!(summary, "field1: error1; field2: error2");
    }
}
