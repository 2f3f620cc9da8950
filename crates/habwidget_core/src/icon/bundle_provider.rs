//! Icon provider serving one icon set from bundle resources.

use crate::config::{IconSetConfig, ProviderConfig};
use crate::host::BundleResources;
use crate::icon::{IconProvider, IconSet};
use log::{debug, error, warn};
use std::io::Read;
use std::sync::Arc;

/// Priority of bundle icon providers: lowest among providers of the same id.
pub const DEFAULT_PRIORITY: i32 = 0;

/// Stateless icon provider over `<icons_dir>/<resource_name>` bundle entries.
#[derive(Clone)]
pub struct BundleIconProvider {
    bundle: Arc<dyn BundleResources>,
    icon_set: IconSetConfig,
    icons_dir: String,
}

impl BundleIconProvider {
    pub fn new(bundle: Arc<dyn BundleResources>, config: &ProviderConfig) -> Self {
        Self {
            bundle,
            icon_set: config.icon_set.clone(),
            icons_dir: config.icons_dir.trim_matches('/').to_string(),
        }
    }

    /// Id of the single icon set this provider serves.
    pub fn icon_set_id(&self) -> &str {
        &self.icon_set.id
    }

    fn entry_path(&self, resource_name: &str) -> String {
        format!("{}/{}", self.icons_dir, resource_name)
    }
}

impl IconProvider for BundleIconProvider {
    fn icon_sets(&self, _locale: Option<&str>) -> Vec<IconSet> {
        vec![IconSet {
            id: self.icon_set.id.clone(),
            label: self.icon_set.label.clone(),
            description: self.icon_set.description.clone(),
            formats: self.icon_set.formats.clone(),
        }]
    }

    fn has_resource(&self, icon_set_id: &str, resource_name: &str) -> bool {
        icon_set_id == self.icon_set.id && self.bundle.entry_exists(&self.entry_path(resource_name))
    }

    fn resource(&self, icon_set_id: &str, resource_name: &str) -> Option<Box<dyn Read + Send>> {
        if icon_set_id != self.icon_set.id {
            debug!(
                "event=icon_read module=icon status=skip reason=foreign_icon_set icon_set={} resource={}",
                icon_set_id, resource_name
            );
            return None;
        }

        match self.bundle.open_entry(&self.entry_path(resource_name)) {
            Ok(Some(reader)) => Some(reader),
            Ok(None) => {
                warn!(
                    "event=icon_read module=icon status=error error_code=icon_missing icon_set={} resource={}",
                    icon_set_id, resource_name
                );
                None
            }
            Err(err) => {
                error!(
                    "event=icon_read module=icon status=error error_code=icon_read_failed icon_set={} resource={} error={}",
                    icon_set_id, resource_name, err
                );
                None
            }
        }
    }

    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }
}
