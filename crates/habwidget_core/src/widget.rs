//! Widget definition entries.
//!
//! # Responsibility
//! - Load the bundled widget definition as verbatim JSON text.
//! - Insert/remove the definition in host configuration properties.
//!
//! # Invariants
//! - `content` is byte-for-byte the bundled file, decoded as UTF-8.
//! - `content` always parses as JSON; it is never re-serialized.

use crate::config::ProviderConfig;
use crate::host::{BundleResources, Properties};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One widget definition stored under a reserved-prefixed key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetEntry {
    pub id: String,
    pub content: String,
    name: Option<String>,
}

impl WidgetEntry {
    /// Reads the configured widget file from `bundle`.
    ///
    /// # Errors
    /// - `WidgetError::Missing` when the bundle has no such entry.
    /// - `WidgetError::Io` / `NotUtf8` when the entry cannot be decoded.
    /// - `WidgetError::InvalidJson` when the text is not a JSON document.
    pub fn load(
        bundle: &dyn BundleResources,
        config: &ProviderConfig,
    ) -> Result<Self, WidgetError> {
        let path = config.widget_file.as_str();
        let bytes = bundle
            .read_entry(path)
            .map_err(WidgetError::Io)?
            .ok_or_else(|| WidgetError::Missing(path.to_string()))?;
        let content =
            String::from_utf8(bytes).map_err(|_| WidgetError::NotUtf8(path.to_string()))?;
        let document: Value = serde_json::from_str(&content).map_err(WidgetError::InvalidJson)?;
        let name = document
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            id: config.widget_id.clone(),
            content,
            name,
        })
    }

    /// Builds an entry from already validated text; `name` is left unset.
    pub fn from_parts(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            name: None,
        }
    }

    /// Widget `name` declared inside the definition, captured at load time.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Upserts this entry; returns whether an older value was replaced.
    pub fn upsert_into(&self, properties: &mut Properties) -> bool {
        properties
            .insert(self.id.clone(), Value::String(self.content.clone()))
            .is_some()
    }
}

/// Removes the widget stored under `widget_id`; returns whether it existed.
pub fn remove_widget(properties: &mut Properties, widget_id: &str) -> bool {
    properties.remove(widget_id).is_some()
}

/// Widget definition load errors.
#[derive(Debug)]
pub enum WidgetError {
    Missing(String),
    Io(std::io::Error),
    NotUtf8(String),
    InvalidJson(serde_json::Error),
}

impl Display for WidgetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(path) => write!(f, "widget file not found in bundle: {path}"),
            Self::Io(err) => write!(f, "failed to read widget file: {err}"),
            Self::NotUtf8(path) => write!(f, "widget file is not valid UTF-8: {path}"),
            Self::InvalidJson(err) => write!(f, "widget file is not valid JSON: {err}"),
        }
    }
}

impl Error for WidgetError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::InvalidJson(err) => Some(err),
            Self::Missing(_) | Self::NotUtf8(_) => None,
        }
    }
}
