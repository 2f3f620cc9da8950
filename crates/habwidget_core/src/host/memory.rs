//! In-process host adapters.
//!
//! # Responsibility
//! - Provide a shared configuration store and a static resource table that
//!   behave like the host services, for embedding and tests.
//!
//! # Invariants
//! - Every stored configuration carries its own `service.pid` property.
//! - One alias maps to at most one local directory at a time.
//! - A static mapping is released only through a handle with the owner that
//!   registered it.
//! - Clones share state; the internal mutex serializes concurrent writers.

use crate::host::bundle::normalize_entry_path;
use crate::host::{
    validate_alias, BundleResources, ConfigFilter, ConfigurationEntry, ConfigurationStore,
    HostError, HostResult, Properties, ResourceHost, SERVICE_PID_KEY,
};
use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct StoreState {
    configurations: BTreeMap<String, Properties>,
    fail_next_find: Option<String>,
    fail_next_update: Option<String>,
    update_count: usize,
}

/// Shared in-memory configuration store keyed by persistent identity.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConfigurationStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryConfigurationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces the configuration object `pid`.
    pub fn insert(&self, pid: &str, mut properties: Properties) {
        properties.insert(SERVICE_PID_KEY.to_string(), Value::String(pid.to_string()));
        self.lock().configurations.insert(pid.to_string(), properties);
    }

    /// Builder-style variant of [`InMemoryConfigurationStore::insert`].
    pub fn with_configuration(self, pid: &str, properties: Properties) -> Self {
        self.insert(pid, properties);
        self
    }

    /// Deletes the configuration object `pid`.
    pub fn remove(&self, pid: &str) -> bool {
        self.lock().configurations.remove(pid).is_some()
    }

    /// Returns a snapshot of the properties of `pid`.
    pub fn properties(&self, pid: &str) -> Option<Properties> {
        self.lock().configurations.get(pid).cloned()
    }

    /// Makes the next `find` call fail with a backend error.
    pub fn fail_next_find(&self, message: &str) {
        self.lock().fail_next_find = Some(message.to_string());
    }

    /// Makes the next `update` call fail with a backend error.
    pub fn fail_next_update(&self, message: &str) {
        self.lock().fail_next_update = Some(message.to_string());
    }

    /// Number of successful `update` calls so far.
    pub fn update_count(&self) -> usize {
        self.lock().update_count
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        lock_state(&self.state)
    }
}

impl ConfigurationStore for InMemoryConfigurationStore {
    fn find(&self, filter: &ConfigFilter) -> HostResult<Vec<Box<dyn ConfigurationEntry>>> {
        let mut state = self.lock();
        if let Some(message) = state.fail_next_find.take() {
            return Err(HostError::Backend(message));
        }

        let entries = state
            .configurations
            .iter()
            .filter(|(_, properties)| filter.matches(properties))
            .map(|(pid, _)| {
                Box::new(InMemoryConfiguration {
                    pid: pid.clone(),
                    state: Arc::clone(&self.state),
                }) as Box<dyn ConfigurationEntry>
            })
            .collect::<Vec<_>>();
        debug!(
            "event=config_find module=host status=ok filter={} matches={}",
            filter,
            entries.len()
        );
        Ok(entries)
    }
}

struct InMemoryConfiguration {
    pid: String,
    state: Arc<Mutex<StoreState>>,
}

impl ConfigurationEntry for InMemoryConfiguration {
    fn pid(&self) -> &str {
        &self.pid
    }

    fn properties(&self) -> HostResult<Properties> {
        lock_state(&self.state)
            .configurations
            .get(&self.pid)
            .cloned()
            .ok_or_else(|| HostError::ConfigurationUnavailable(self.pid.clone()))
    }

    fn update(&self, mut properties: Properties) -> HostResult<()> {
        let mut state = lock_state(&self.state);
        if let Some(message) = state.fail_next_update.take() {
            return Err(HostError::Backend(message));
        }
        if !state.configurations.contains_key(&self.pid) {
            return Err(HostError::ConfigurationUnavailable(self.pid.clone()));
        }

        properties.insert(
            SERVICE_PID_KEY.to_string(),
            Value::String(self.pid.clone()),
        );
        state.configurations.insert(self.pid.clone(), properties);
        state.update_count += 1;
        Ok(())
    }
}

// A poisoned lock still holds consistent state: every mutation is one insert.
fn lock_state<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone)]
struct StaticMapping {
    local_dir: String,
    owner: String,
}

/// In-memory alias table for static resource mappings.
///
/// Each handle registers on behalf of one owner. Handles from
/// [`StaticResourceTable::scoped`] share the table but carry their own owner,
/// the way a host hands every bundle its own view of the HTTP service.
#[derive(Debug, Clone, Default)]
pub struct StaticResourceTable {
    mappings: Arc<Mutex<BTreeMap<String, StaticMapping>>>,
    owner: String,
}

impl StaticResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle over the same table that registers as `owner`.
    pub fn scoped(&self, owner: &str) -> Self {
        Self {
            mappings: Arc::clone(&self.mappings),
            owner: owner.to_string(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn is_registered(&self, alias: &str) -> bool {
        lock_state(&self.mappings).contains_key(alias)
    }

    /// Owner of the mapping bound at `alias`, if any.
    pub fn owner_of(&self, alias: &str) -> Option<String> {
        lock_state(&self.mappings)
            .get(alias)
            .map(|mapping| mapping.owner.clone())
    }

    /// Returns `(alias, local_dir)` pairs in alias order.
    pub fn mappings(&self) -> Vec<(String, String)> {
        lock_state(&self.mappings)
            .iter()
            .map(|(alias, mapping)| (alias.clone(), mapping.local_dir.clone()))
            .collect()
    }

    /// Maps a request path to the bundle entry path it serves.
    ///
    /// The longest registered alias wins. Returns `None` for unmapped paths,
    /// bare aliases and paths that try to leave the mapped directory.
    pub fn resolve(&self, request_path: &str) -> Option<String> {
        let mappings = lock_state(&self.mappings);
        let (alias, mapping) = mappings
            .iter()
            .filter(|(alias, _)| alias_covers(alias, request_path))
            .max_by_key(|(alias, _)| alias.len())?;

        let remainder = if alias.as_str() == "/" {
            request_path
        } else {
            &request_path[alias.len()..]
        };
        let relative = normalize_entry_path(remainder)?;
        let entry = match normalize_entry_path(&mapping.local_dir) {
            Some(base) => format!("{base}/{relative}"),
            None => relative,
        };
        Some(entry)
    }

    /// Reads the file served at `request_path` from `bundle`.
    pub fn fetch(
        &self,
        bundle: &dyn BundleResources,
        request_path: &str,
    ) -> std::io::Result<Option<Vec<u8>>> {
        match self.resolve(request_path) {
            Some(entry) => bundle.read_entry(&entry),
            None => Ok(None),
        }
    }
}

fn alias_covers(alias: &str, request_path: &str) -> bool {
    if alias == "/" {
        return request_path.starts_with('/');
    }
    request_path == alias
        || request_path
            .strip_prefix(alias)
            .is_some_and(|rest| rest.starts_with('/'))
}

impl ResourceHost for StaticResourceTable {
    fn register_static(&self, alias: &str, local_dir: &str) -> HostResult<()> {
        validate_alias(alias)?;
        let mut mappings = lock_state(&self.mappings);
        if mappings.contains_key(alias) {
            return Err(HostError::MappingConflict(alias.to_string()));
        }
        mappings.insert(
            alias.to_string(),
            StaticMapping {
                local_dir: local_dir.to_string(),
                owner: self.owner.clone(),
            },
        );
        debug!(
            "event=static_register module=host status=ok alias={alias} dir={local_dir} owner={}",
            self.owner
        );
        Ok(())
    }

    fn unregister(&self, alias: &str) {
        let mut mappings = lock_state(&self.mappings);
        match mappings.get(alias) {
            Some(mapping) if mapping.owner != self.owner => {
                debug!(
                    "event=static_unregister module=host status=skip reason=foreign_owner alias={alias} owner={} caller={}",
                    mapping.owner, self.owner
                );
            }
            Some(_) => {
                mappings.remove(alias);
                debug!("event=static_unregister module=host status=ok alias={alias}");
            }
            None => {
                debug!("event=static_unregister module=host status=skip reason=unbound alias={alias}");
            }
        }
    }
}
