//! Icon set contracts.
//!
//! # Responsibility
//! - Describe icon sets the dashboard can render widget icons from.
//! - Define the provider contract the host queries by set id and name.
//!
//! # Invariants
//! - Icon set ids are stable across locales; only labels may vary.
//! - Providers with a higher priority win when two serve the same set id.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::io::Read;

mod bundle_provider;

pub use bundle_provider::BundleIconProvider;

/// Image formats an icon set can be delivered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconFormat {
    Svg,
    Png,
}

impl IconFormat {
    /// File extension used for resources in this format.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
        }
    }

    /// MIME type used when serving resources in this format.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Svg => "image/svg+xml",
            Self::Png => "image/png",
        }
    }
}

impl Display for IconFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Icon set descriptor, computed per lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconSet {
    pub id: String,
    pub label: String,
    pub description: String,
    pub formats: BTreeSet<IconFormat>,
}

/// Source of icon sets and their resources.
pub trait IconProvider: Send + Sync {
    /// Icon sets offered by this provider. `locale` may select labels.
    fn icon_sets(&self, locale: Option<&str>) -> Vec<IconSet>;

    /// Returns whether `resource_name` exists in icon set `icon_set_id`.
    fn has_resource(&self, icon_set_id: &str, resource_name: &str) -> bool;

    /// Opens `resource_name` from icon set `icon_set_id`.
    fn resource(&self, icon_set_id: &str, resource_name: &str) -> Option<Box<dyn Read + Send>>;

    /// Precedence among providers serving the same icon set id.
    fn priority(&self) -> i32;

    /// Finds the resource name for an icon `category` in `state`.
    ///
    /// Tries `<category>-<state>.<ext>` first. Numeric states fall back to
    /// the closest lower number that has an icon, so `rollershutter-37`
    /// resolves to `rollershutter-0` when only 0/50/100 exist. Finally
    /// tries the stateless `<category>.<ext>`.
    fn resolve_icon(
        &self,
        icon_set_id: &str,
        category: &str,
        state: Option<&str>,
        format: IconFormat,
    ) -> Option<String> {
        let category = category.trim().to_ascii_lowercase();
        if category.is_empty() {
            return None;
        }
        let ext = format.extension();

        if let Some(state) = state.map(|value| value.trim().to_ascii_lowercase()) {
            if !state.is_empty() {
                let exact = format!("{category}-{state}.{ext}");
                if self.has_resource(icon_set_id, &exact) {
                    return Some(exact);
                }
                if let Some(level) = numeric_level(&state) {
                    let found = (0..=level)
                        .rev()
                        .map(|lower| format!("{category}-{lower}.{ext}"))
                        .find(|name| self.has_resource(icon_set_id, name));
                    if found.is_some() {
                        return found;
                    }
                }
            }
        }

        let fallback = format!("{category}.{ext}");
        self.has_resource(icon_set_id, &fallback).then_some(fallback)
    }
}

// Percent-type states ("37", "37.5") map onto 0..=100.
fn numeric_level(state: &str) -> Option<u32> {
    let value: f64 = state.parse().ok()?;
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return None;
    }
    Some(value.floor() as u32)
}
