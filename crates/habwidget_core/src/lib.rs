//! Dashboard widget provider core.
//! Registers a widget definition and its static files with a host framework
//! and serves the matching icon set.

pub mod config;
pub mod host;
pub mod icon;
pub mod logging;
pub mod registrar;
pub mod widget;

pub use config::{ConfigError, ConfigValidationError, IconSetConfig, ProviderConfig};
pub use host::{
    BundleResources, ConfigFilter, ConfigurationEntry, ConfigurationStore, DirectoryBundle,
    EmbeddedBundle, FilterParseError, HostError, HostResult, InMemoryConfigurationStore,
    Properties, ResourceHost, StaticResourceTable,
};
pub use icon::{BundleIconProvider, IconFormat, IconProvider, IconSet};
pub use logging::{
    default_log_level, init_console_logging, init_logging, logging_status, LogTarget,
};
pub use registrar::{
    activate, deactivate, ActivationReport, ActiveRegistrar, DeactivationReport, ProvisionError,
    RegistrarDeps, StepOutcome, WidgetRegistrar,
};
pub use widget::{WidgetEntry, WidgetError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
