//! Provider configuration.
//!
//! # Responsibility
//! - Hold the fixed names a widget provider registers with the host.
//! - Load optional JSON overrides and validate them before use.
//!
//! # Invariants
//! - Defaults describe the rollershutter example widget and its icon set.
//! - `widget_id` must carry the reserved `widget.` prefix or the dashboard
//!   ignores the entry.

use crate::host::bundle::BUNDLED_WIDGET_FILE;
use crate::host::ConfigFilter;
use crate::icon::IconFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Filter selecting the dashboard's configuration object.
pub const HABPANEL_CONFIG_FILTER: &str = "(service.pid=org.openhab.habpanel)";
/// Key prefix the dashboard reserves for widget definitions.
pub const WIDGET_ID_PREFIX: &str = "widget.";
pub const WIDGET_ID: &str = "widget.rollershutter-example";
/// Alias under which static resources are served. Widget templates load
/// stylesheets and scripts from here through relative URLs.
pub const STATIC_RESOURCES_ALIAS: &str = "/habpanel-resources/example-widget";
pub const STATIC_RESOURCES_DIR: &str = "static";
pub const ICONS_DIR: &str = "icons";
pub const ICONSET_ID: &str = "knx-rollershutter";
pub const ICONSET_LABEL: &str = "KNX-Rollershutter";
pub const ICONSET_DESCRIPTION: &str = "KNX forum rollershutter icons in SVG format.";

/// Icon set declaration exposed through the icon provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IconSetConfig {
    pub id: String,
    pub label: String,
    pub description: String,
    pub formats: BTreeSet<IconFormat>,
}

impl Default for IconSetConfig {
    fn default() -> Self {
        Self {
            id: ICONSET_ID.to_string(),
            label: ICONSET_LABEL.to_string(),
            description: ICONSET_DESCRIPTION.to_string(),
            formats: BTreeSet::from([IconFormat::Svg]),
        }
    }
}

/// Names and paths used by one widget provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// HTTP alias for the static directory.
    pub static_alias: String,
    /// Bundle directory served at `static_alias`.
    pub static_dir: String,
    /// Filter locating the dashboard configuration object.
    pub config_filter: String,
    /// Property key the widget is stored under.
    pub widget_id: String,
    /// Bundle path of the widget definition JSON.
    pub widget_file: String,
    /// Bundle directory holding icon files.
    pub icons_dir: String,
    pub icon_set: IconSetConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            static_alias: STATIC_RESOURCES_ALIAS.to_string(),
            static_dir: STATIC_RESOURCES_DIR.to_string(),
            config_filter: HABPANEL_CONFIG_FILTER.to_string(),
            widget_id: WIDGET_ID.to_string(),
            widget_file: BUNDLED_WIDGET_FILE.to_string(),
            icons_dir: ICONS_DIR.to_string(),
            icon_set: IconSetConfig::default(),
        }
    }
}

impl ProviderConfig {
    /// Parses overrides from JSON; missing fields keep their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Reads and parses overrides from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&raw)
    }

    /// Parses `config_filter`.
    pub fn filter(&self) -> Result<ConfigFilter, ConfigValidationError> {
        ConfigFilter::parse(&self.config_filter)
            .map_err(|err| ConfigValidationError::InvalidFilter(err.to_string()))
    }

    /// Validates declaration-level invariants.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        require_non_empty(&self.static_alias, "static_alias")?;
        require_non_empty(&self.static_dir, "static_dir")?;
        require_non_empty(&self.config_filter, "config_filter")?;
        require_non_empty(&self.widget_id, "widget_id")?;
        require_non_empty(&self.widget_file, "widget_file")?;
        require_non_empty(&self.icons_dir, "icons_dir")?;
        require_non_empty(&self.icon_set.id, "icon_set.id")?;
        require_non_empty(&self.icon_set.label, "icon_set.label")?;

        if !self.static_alias.starts_with('/') {
            return Err(ConfigValidationError::InvalidAlias(
                self.static_alias.clone(),
            ));
        }
        if !self.widget_id.starts_with(WIDGET_ID_PREFIX)
            || self.widget_id.len() == WIDGET_ID_PREFIX.len()
        {
            return Err(ConfigValidationError::MissingWidgetPrefix(
                self.widget_id.clone(),
            ));
        }
        if self.icon_set.formats.is_empty() {
            return Err(ConfigValidationError::MissingIconFormats);
        }
        self.filter()?;
        Ok(())
    }
}

fn require_non_empty(value: &str, field: &'static str) -> Result<(), ConfigValidationError> {
    if value.trim().is_empty() {
        return Err(ConfigValidationError::EmptyField(field));
    }
    Ok(())
}

/// Provider configuration invariant violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    EmptyField(&'static str),
    InvalidAlias(String),
    MissingWidgetPrefix(String),
    MissingIconFormats,
    InvalidFilter(String),
}

impl Display for ConfigValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyField(field) => write!(f, "config field must not be empty: {field}"),
            Self::InvalidAlias(value) => {
                write!(f, "static alias must start with `/`: {value}")
            }
            Self::MissingWidgetPrefix(value) => write!(
                f,
                "widget id must start with `{WIDGET_ID_PREFIX}` followed by a name: {value}"
            ),
            Self::MissingIconFormats => write!(f, "icon set must declare at least one format"),
            Self::InvalidFilter(message) => write!(f, "config filter is invalid: {message}"),
        }
    }
}

impl Error for ConfigValidationError {}

/// Errors loading provider configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(ConfigValidationError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read provider config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse provider config: {err}"),
            Self::Invalid(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ConfigError, ConfigValidationError, ProviderConfig, HABPANEL_CONFIG_FILTER, ICONSET_ID,
        STATIC_RESOURCES_ALIAS, WIDGET_ID,
    };
    use crate::icon::IconFormat;

    #[test]
    fn defaults_describe_the_rollershutter_widget() {
        let config = ProviderConfig::default();
        assert_eq!(config.static_alias, STATIC_RESOURCES_ALIAS);
        assert_eq!(config.static_dir, "static");
        assert_eq!(config.config_filter, HABPANEL_CONFIG_FILTER);
        assert_eq!(config.widget_id, WIDGET_ID);
        assert_eq!(config.widget_file, "rollershutter-example.widget.json");
        assert_eq!(config.icon_set.id, ICONSET_ID);
        assert_eq!(
            config.icon_set.formats.iter().copied().collect::<Vec<_>>(),
            vec![IconFormat::Svg]
        );
        config.validate().expect("defaults should validate");
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let config = ProviderConfig::from_json_str(
            r#"{"widget_id": "widget.blinds", "icon_set": {"formats": ["svg", "png"]}}"#,
        )
        .expect("partial override should parse");
        assert_eq!(config.widget_id, "widget.blinds");
        assert_eq!(config.static_alias, STATIC_RESOURCES_ALIAS);
        assert_eq!(config.icon_set.id, ICONSET_ID);
        assert!(config.icon_set.formats.contains(&IconFormat::Png));
    }

    #[test]
    fn rejects_widget_id_without_reserved_prefix() {
        let err = ProviderConfig::from_json_str(r#"{"widget_id": "rollershutter"}"#)
            .expect_err("unprefixed widget id must fail");
        assert!(matches!(
            err,
            ConfigError::Invalid(ConfigValidationError::MissingWidgetPrefix(_))
        ));

        let mut config = ProviderConfig::default();
        config.widget_id = "widget.".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::MissingWidgetPrefix(_))
        ));
    }

    #[test]
    fn rejects_relative_alias_bad_filter_and_empty_fields() {
        let mut config = ProviderConfig::default();
        config.static_alias = "habpanel-resources".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidAlias(_))
        ));

        let mut config = ProviderConfig::default();
        config.config_filter = "service.pid=org.openhab.habpanel".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidFilter(_))
        ));

        let mut config = ProviderConfig::default();
        config.static_dir = "  ".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigValidationError::EmptyField("static_dir"))
        );

        let mut config = ProviderConfig::default();
        config.icon_set.formats.clear();
        assert_eq!(
            config.validate(),
            Err(ConfigValidationError::MissingIconFormats)
        );
    }

    #[test]
    fn reports_malformed_json_and_missing_files() {
        assert!(matches!(
            ProviderConfig::from_json_str("{not json"),
            Err(ConfigError::Parse(_))
        ));

        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            ProviderConfig::from_json_file(dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));

        let path = dir.path().join("provider.json");
        std::fs::write(&path, r#"{"static_dir": "web"}"#).expect("write config");
        let config = ProviderConfig::from_json_file(&path).expect("file config should load");
        assert_eq!(config.static_dir, "web");
    }
}
