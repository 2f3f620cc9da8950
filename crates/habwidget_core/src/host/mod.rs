//! Host framework collaborator contracts.
//!
//! # Responsibility
//! - Describe the three host services a widget provider consumes: the shared
//!   configuration store, the static resource host and the bundle loader.
//! - Ship in-process adapters so the provider runs outside a real host.
//!
//! # Invariants
//! - The provider never owns configuration state; it only reads, mutates and
//!   writes back properties of host-owned configuration objects.
//! - Collaborator errors are values; no contract method panics.
//!
//! # See also
//! - `crate::registrar` for the lifecycle that drives these contracts.

use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Read;

pub mod bundle;
pub mod filter;
pub mod memory;

pub use bundle::{normalize_entry_path, DirectoryBundle, EmbeddedBundle};
pub use filter::{ConfigFilter, FilterParseError};
pub use memory::{InMemoryConfigurationStore, StaticResourceTable};

/// Property key the host stores the persistent identity under.
pub const SERVICE_PID_KEY: &str = "service.pid";

/// Mutable key-value mapping held by one configuration object.
pub type Properties = BTreeMap<String, Value>;

pub type HostResult<T> = Result<T, HostError>;

/// Errors reported by host collaborators.
#[derive(Debug)]
pub enum HostError {
    /// The static alias is already bound by another registration.
    MappingConflict(String),
    /// The static alias is not a valid mount point.
    InvalidAlias(String),
    /// The configuration object disappeared or is not readable.
    ConfigurationUnavailable(String),
    Io(std::io::Error),
    /// Host-specific failure with a message only.
    Backend(String),
}

impl Display for HostError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MappingConflict(alias) => write!(f, "alias is already registered: {alias}"),
            Self::InvalidAlias(alias) => write!(
                f,
                "alias is invalid: `{alias}` (must start with `/` and must not end with `/`)"
            ),
            Self::ConfigurationUnavailable(pid) => {
                write!(f, "configuration is unavailable: {pid}")
            }
            Self::Io(err) => write!(f, "{err}"),
            Self::Backend(message) => write!(f, "host backend error: {message}"),
        }
    }
}

impl Error for HostError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for HostError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Handle to one configuration object owned by the host store.
pub trait ConfigurationEntry {
    /// Persistent identity of this configuration object.
    fn pid(&self) -> &str;

    /// Returns a snapshot of the current properties.
    fn properties(&self) -> HostResult<Properties>;

    /// Replaces the stored properties with `properties`.
    fn update(&self, properties: Properties) -> HostResult<()>;
}

/// Shared configuration store queried by filter expression.
///
/// Concurrent writers are serialized by the store, not by callers.
pub trait ConfigurationStore: Send + Sync {
    /// Returns all configuration objects matching `filter`, possibly empty.
    fn find(&self, filter: &ConfigFilter) -> HostResult<Vec<Box<dyn ConfigurationEntry>>>;
}

/// HTTP static resource host.
pub trait ResourceHost: Send + Sync {
    /// Serves files under `local_dir` of the calling bundle at `alias`.
    ///
    /// # Errors
    /// - `HostError::MappingConflict` when `alias` is already bound.
    /// - `HostError::InvalidAlias` when `alias` is not a valid mount point.
    fn register_static(&self, alias: &str, local_dir: &str) -> HostResult<()>;

    /// Removes the mapping at `alias`. Unknown aliases are ignored.
    fn unregister(&self, alias: &str);
}

/// Read-only view of the files packaged with the provider.
pub trait BundleResources: Send + Sync {
    /// Returns whether an entry exists at the bundle-relative `path`.
    fn entry_exists(&self, path: &str) -> bool;

    /// Opens the entry at `path`, or `Ok(None)` when there is no such entry.
    fn open_entry(&self, path: &str) -> std::io::Result<Option<Box<dyn Read + Send>>>;

    /// Reads the entry at `path` fully into memory.
    fn read_entry(&self, path: &str) -> std::io::Result<Option<Vec<u8>>> {
        let Some(mut reader) = self.open_entry(path)? else {
            return Ok(None);
        };
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(Some(bytes))
    }
}

/// Validates a static resource alias the way the HTTP host does.
pub fn validate_alias(alias: &str) -> HostResult<()> {
    if alias == "/" {
        return Ok(());
    }
    if !alias.starts_with('/') || alias.ends_with('/') {
        return Err(HostError::InvalidAlias(alias.to_string()));
    }
    Ok(())
}
