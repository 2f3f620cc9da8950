//! Widget registrar lifecycle.
//!
//! # Responsibility
//! - On start, map the bundle's static directory into the HTTP host and
//!   upsert the widget definition into the dashboard configuration.
//! - On stop, undo both side effects.
//!
//! # Invariants
//! - Start and stop never fail; every collaborator error is logged and
//!   captured in the step report, never returned.
//! - Stop always unregisters the static alias, even when registration failed.
//! - The registrar keeps no configuration state of its own; it re-queries the
//!   store on stop.
//! - Dropping an `ActiveRegistrar` without calling `stop` still deactivates.
//!
//! # See also
//! - `crate::host` for the collaborator contracts.

use crate::config::{ConfigValidationError, ProviderConfig};
use crate::host::{BundleResources, ConfigurationStore, HostError, ResourceHost};
use crate::icon::BundleIconProvider;
use crate::widget::{remove_widget, WidgetEntry, WidgetError};
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

/// Host collaborators injected into a registrar.
#[derive(Clone)]
pub struct RegistrarDeps {
    pub config: ProviderConfig,
    pub http: Arc<dyn ResourceHost>,
    pub store: Arc<dyn ConfigurationStore>,
    pub bundle: Arc<dyn BundleResources>,
}

/// Outcome of one lifecycle step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    /// Nothing to do; carries the reason.
    Skipped(String),
    /// The step failed and was logged; carries the error message.
    Failed(String),
}

impl StepOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl Display for StepOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Done => write!(f, "done"),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
            Self::Failed(message) => write!(f, "failed ({message})"),
        }
    }
}

/// Per-step result of `activate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    pub static_resources: StepOutcome,
    pub widget: StepOutcome,
}

impl ActivationReport {
    /// Returns whether both side effects are in place.
    pub fn is_complete(&self) -> bool {
        self.static_resources.is_done() && self.widget.is_done()
    }
}

/// Per-step result of `deactivate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeactivationReport {
    pub static_resources: StepOutcome,
    pub widget: StepOutcome,
}

/// Registrar in the INACTIVE state.
pub struct WidgetRegistrar {
    deps: RegistrarDeps,
    icons: BundleIconProvider,
}

impl WidgetRegistrar {
    pub fn new(deps: RegistrarDeps) -> Self {
        if let Err(err) = deps.config.validate() {
            warn!(
                "event=registrar_config module=registrar status=error error_code=config_invalid error={}",
                err
            );
        }
        let icons = BundleIconProvider::new(Arc::clone(&deps.bundle), &deps.config);
        Self { deps, icons }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.deps.config
    }

    /// Icon provider backed by the bundle; usable in any state.
    pub fn icon_provider(&self) -> &BundleIconProvider {
        &self.icons
    }

    /// Runs `activate` and moves to the ACTIVE state.
    pub fn start(self) -> ActiveRegistrar {
        let report = activate(&self.deps);
        ActiveRegistrar {
            deps: self.deps,
            icons: self.icons,
            report,
            active: true,
        }
    }
}

/// Registrar in the ACTIVE state.
pub struct ActiveRegistrar {
    deps: RegistrarDeps,
    icons: BundleIconProvider,
    report: ActivationReport,
    active: bool,
}

impl ActiveRegistrar {
    pub fn activation_report(&self) -> &ActivationReport {
        &self.report
    }

    pub fn icon_provider(&self) -> &BundleIconProvider {
        &self.icons
    }

    /// Runs `deactivate` and returns to the INACTIVE state.
    pub fn stop(mut self) -> (WidgetRegistrar, DeactivationReport) {
        self.active = false;
        let report = deactivate(&self.deps);
        let inactive = WidgetRegistrar {
            deps: self.deps.clone(),
            icons: self.icons.clone(),
        };
        (inactive, report)
    }
}

impl Drop for ActiveRegistrar {
    fn drop(&mut self) {
        if self.active {
            self.active = false;
            info!("event=registrar_drop module=registrar status=ok action=implicit_stop");
            deactivate(&self.deps);
        }
    }
}

/// Registers static resources and provisions the widget.
pub fn activate(deps: &RegistrarDeps) -> ActivationReport {
    let started_at = Instant::now();
    let config = &deps.config;
    info!(
        "event=registrar_activate module=registrar status=start alias={} widget_id={}",
        config.static_alias, config.widget_id
    );

    let static_resources = match deps
        .http
        .register_static(&config.static_alias, &config.static_dir)
    {
        Ok(()) => {
            info!(
                "event=static_register module=registrar status=ok alias={} dir={}",
                config.static_alias, config.static_dir
            );
            StepOutcome::Done
        }
        Err(err) => {
            error!(
                "event=static_register module=registrar status=error error_code={} alias={} error={}",
                host_error_code(&err),
                config.static_alias,
                err
            );
            StepOutcome::Failed(err.to_string())
        }
    };

    let widget = match provision_widget(deps) {
        Ok(Provisioned::Stored { pid, replaced }) => {
            info!(
                "event=widget_provision module=registrar status=ok pid={} widget_id={} replaced={}",
                pid, config.widget_id, replaced
            );
            StepOutcome::Done
        }
        Ok(Provisioned::NoConfiguration) => {
            debug!(
                "event=widget_provision module=registrar status=skip reason=no_configuration filter={}",
                config.config_filter
            );
            StepOutcome::Skipped(format!("no configuration matches {}", config.config_filter))
        }
        Err(err) => {
            error!(
                "event=widget_provision module=registrar status=error error_code={} widget_id={} error={}",
                err.code(),
                config.widget_id,
                err
            );
            StepOutcome::Failed(err.to_string())
        }
    };

    let report = ActivationReport {
        static_resources,
        widget,
    };
    info!(
        "event=registrar_activate module=registrar status=ok duration_ms={} static={} widget={}",
        started_at.elapsed().as_millis(),
        report.static_resources,
        report.widget
    );
    report
}

/// Unregisters static resources and removes the widget.
pub fn deactivate(deps: &RegistrarDeps) -> DeactivationReport {
    let started_at = Instant::now();
    let config = &deps.config;

    deps.http.unregister(&config.static_alias);
    info!(
        "event=static_unregister module=registrar status=ok alias={}",
        config.static_alias
    );

    let widget = match unprovision_widget(deps) {
        Ok(Unprovisioned::Removed { pid, existed }) => {
            info!(
                "event=widget_unprovision module=registrar status=ok pid={} widget_id={} existed={}",
                pid, config.widget_id, existed
            );
            StepOutcome::Done
        }
        Ok(Unprovisioned::NoConfiguration) => {
            debug!(
                "event=widget_unprovision module=registrar status=skip reason=no_configuration filter={}",
                config.config_filter
            );
            StepOutcome::Skipped(format!("no configuration matches {}", config.config_filter))
        }
        Err(err) => {
            error!(
                "event=widget_unprovision module=registrar status=error error_code={} widget_id={} error={}",
                err.code(),
                config.widget_id,
                err
            );
            StepOutcome::Failed(err.to_string())
        }
    };

    let report = DeactivationReport {
        static_resources: StepOutcome::Done,
        widget,
    };
    info!(
        "event=registrar_deactivate module=registrar status=ok duration_ms={} widget={}",
        started_at.elapsed().as_millis(),
        report.widget
    );
    report
}

enum Provisioned {
    Stored { pid: String, replaced: bool },
    NoConfiguration,
}

enum Unprovisioned {
    Removed { pid: String, existed: bool },
    NoConfiguration,
}

fn provision_widget(deps: &RegistrarDeps) -> Result<Provisioned, ProvisionError> {
    let entry = WidgetEntry::load(deps.bundle.as_ref(), &deps.config)?;
    if let Some(name) = entry.name() {
        debug!("event=widget_load module=registrar status=ok name={name}");
    }

    let filter = deps.config.filter()?;
    let configurations = deps.store.find(&filter)?;
    let Some(target) = configurations.first() else {
        return Ok(Provisioned::NoConfiguration);
    };
    if configurations.len() > 1 {
        warn!(
            "event=widget_provision module=registrar status=warn reason=multiple_matches matches={} pid={}",
            configurations.len(),
            target.pid()
        );
    }

    let mut properties = target.properties()?;
    let replaced = entry.upsert_into(&mut properties);
    target.update(properties)?;
    Ok(Provisioned::Stored {
        pid: target.pid().to_string(),
        replaced,
    })
}

fn unprovision_widget(deps: &RegistrarDeps) -> Result<Unprovisioned, ProvisionError> {
    let filter = deps.config.filter()?;
    let configurations = deps.store.find(&filter)?;
    let Some(target) = configurations.first() else {
        return Ok(Unprovisioned::NoConfiguration);
    };

    let mut properties = target.properties()?;
    let existed = remove_widget(&mut properties, &deps.config.widget_id);
    target.update(properties)?;
    Ok(Unprovisioned::Removed {
        pid: target.pid().to_string(),
        existed,
    })
}

fn host_error_code(err: &HostError) -> &'static str {
    match err {
        HostError::MappingConflict(_) => "mapping_conflict",
        HostError::InvalidAlias(_) => "invalid_alias",
        HostError::ConfigurationUnavailable(_) => "configuration_unavailable",
        HostError::Io(_) => "io",
        HostError::Backend(_) => "host_backend",
    }
}

/// Failures inside the widget (un)provisioning sequence.
#[derive(Debug)]
pub enum ProvisionError {
    Widget(WidgetError),
    Config(ConfigValidationError),
    Host(HostError),
}

impl ProvisionError {
    /// Stable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Widget(WidgetError::Missing(_)) => "widget_missing",
            Self::Widget(_) => "widget_unreadable",
            Self::Config(_) => "config_invalid",
            Self::Host(err) => host_error_code(err),
        }
    }
}

impl Display for ProvisionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Widget(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
            Self::Host(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ProvisionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Widget(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::Host(err) => Some(err),
        }
    }
}

impl From<WidgetError> for ProvisionError {
    fn from(value: WidgetError) -> Self {
        Self::Widget(value)
    }
}

impl From<ConfigValidationError> for ProvisionError {
    fn from(value: ConfigValidationError) -> Self {
        Self::Config(value)
    }
}

impl From<HostError> for ProvisionError {
    fn from(value: HostError) -> Self {
        Self::Host(value)
    }
}
