use habwidget_core::{
    activate, deactivate, ConfigurationStore, DirectoryBundle, EmbeddedBundle, HostError,
    HostResult, InMemoryConfigurationStore, Properties, ProviderConfig, RegistrarDeps,
    ResourceHost, StaticResourceTable, StepOutcome, WidgetRegistrar,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

const HABPANEL_PID: &str = "org.openhab.habpanel";
const WIDGET_KEY: &str = "widget.rollershutter-example";
const ALIAS: &str = "/habpanel-resources/example-widget";
const BUNDLED_WIDGET: &str = include_str!("../bundle/rollershutter-example.widget.json");

/// Resource host that rejects every registration and records unregistrations.
#[derive(Default)]
struct ConflictingHost {
    unregistered: Mutex<Vec<String>>,
}

impl ResourceHost for ConflictingHost {
    fn register_static(&self, alias: &str, _local_dir: &str) -> HostResult<()> {
        Err(HostError::MappingConflict(alias.to_string()))
    }

    fn unregister(&self, alias: &str) {
        self.unregistered
            .lock()
            .expect("unregister log lock")
            .push(alias.to_string());
    }
}

fn habpanel_store() -> InMemoryConfigurationStore {
    let mut properties = Properties::new();
    properties.insert("lockEditing".to_string(), json!(false));
    InMemoryConfigurationStore::new().with_configuration(HABPANEL_PID, properties)
}

fn deps_with(
    store: Arc<dyn ConfigurationStore>,
    http: Arc<dyn ResourceHost>,
    bundle: EmbeddedBundle,
) -> RegistrarDeps {
    RegistrarDeps {
        config: ProviderConfig::default(),
        http,
        store,
        bundle: Arc::new(bundle),
    }
}

#[test]
fn activate_stores_verbatim_widget_json_under_widget_key() {
    let store = habpanel_store();
    let http = StaticResourceTable::new();
    let deps = deps_with(
        Arc::new(store.clone()),
        Arc::new(http.clone()),
        EmbeddedBundle::bundled(),
    );

    let report = activate(&deps);
    assert!(report.is_complete());

    let properties = store.properties(HABPANEL_PID).expect("habpanel configuration");
    assert_eq!(properties[WIDGET_KEY], Value::String(BUNDLED_WIDGET.to_string()));
    assert_eq!(properties["lockEditing"], json!(false));
    assert_eq!(
        http.mappings(),
        vec![(ALIAS.to_string(), "static".to_string())]
    );
}

#[test]
fn activate_overwrites_stale_widget_value() {
    let store = habpanel_store();
    let mut properties = store.properties(HABPANEL_PID).expect("habpanel configuration");
    properties.insert(WIDGET_KEY.to_string(), json!("{\"name\": \"old\"}"));
    store.insert(HABPANEL_PID, properties);

    let deps = deps_with(
        Arc::new(store.clone()),
        Arc::new(StaticResourceTable::new()),
        EmbeddedBundle::bundled(),
    );
    activate(&deps);

    let properties = store.properties(HABPANEL_PID).expect("habpanel configuration");
    assert_eq!(properties[WIDGET_KEY], Value::String(BUNDLED_WIDGET.to_string()));
}

#[test]
fn deactivate_removes_widget_key_whether_or_not_present() {
    let store = habpanel_store();
    let deps = deps_with(
        Arc::new(store.clone()),
        Arc::new(StaticResourceTable::new()),
        EmbeddedBundle::bundled(),
    );

    let report = deactivate(&deps);
    assert_eq!(report.widget, StepOutcome::Done);
    assert!(!store
        .properties(HABPANEL_PID)
        .expect("habpanel configuration")
        .contains_key(WIDGET_KEY));

    activate(&deps);
    deactivate(&deps);
    let properties = store.properties(HABPANEL_PID).expect("habpanel configuration");
    assert!(!properties.contains_key(WIDGET_KEY));
    assert_eq!(properties["lockEditing"], json!(false));
}

#[test]
fn deactivate_removes_stale_widget_even_when_activation_could_not_load_it() {
    let store = habpanel_store();
    let mut properties = store.properties(HABPANEL_PID).expect("habpanel configuration");
    properties.insert(WIDGET_KEY.to_string(), json!("{}"));
    store.insert(HABPANEL_PID, properties);

    let active = WidgetRegistrar::new(deps_with(
        Arc::new(store.clone()),
        Arc::new(StaticResourceTable::new()),
        EmbeddedBundle::new(),
    ))
    .start();
    assert!(active.activation_report().widget.is_failed());

    let (_, report) = active.stop();
    assert_eq!(report.widget, StepOutcome::Done);
    assert!(!store
        .properties(HABPANEL_PID)
        .expect("habpanel configuration")
        .contains_key(WIDGET_KEY));
}

#[test]
fn missing_configuration_skips_widget_but_still_maps_static_resources() {
    let store = InMemoryConfigurationStore::new();
    let http = StaticResourceTable::new();
    let active = WidgetRegistrar::new(deps_with(
        Arc::new(store.clone()),
        Arc::new(http.clone()),
        EmbeddedBundle::bundled(),
    ))
    .start();

    let report = active.activation_report();
    assert!(report.static_resources.is_done());
    assert!(matches!(report.widget, StepOutcome::Skipped(_)));
    assert!(http.is_registered(ALIAS));

    let (_, report) = active.stop();
    assert!(matches!(report.widget, StepOutcome::Skipped(_)));
    assert!(!http.is_registered(ALIAS));
    assert_eq!(store.update_count(), 0);
}

#[test]
fn mapping_conflict_is_not_fatal_and_stop_still_unregisters() {
    let store = habpanel_store();
    let host = Arc::new(ConflictingHost::default());
    let active = WidgetRegistrar::new(deps_with(
        Arc::new(store.clone()),
        host.clone(),
        EmbeddedBundle::bundled(),
    ))
    .start();

    let report = active.activation_report().clone();
    assert!(report.static_resources.is_failed());
    assert!(report.widget.is_done());

    let (_, report) = active.stop();
    assert_eq!(report.static_resources, StepOutcome::Done);
    assert_eq!(
        *host.unregistered.lock().expect("unregister log lock"),
        vec![ALIAS.to_string()]
    );
}

#[test]
fn alias_bound_by_another_provider_survives_our_start_and_stop() {
    let http = StaticResourceTable::new();
    http.scoped("org.openhab.other")
        .register_static(ALIAS, "other-static")
        .expect("other provider registers first");

    let active = WidgetRegistrar::new(deps_with(
        Arc::new(habpanel_store()),
        Arc::new(http.scoped("rollershutter-example")),
        EmbeddedBundle::bundled(),
    ))
    .start();
    assert!(matches!(
        active.activation_report().static_resources,
        StepOutcome::Failed(ref message) if message.contains(ALIAS)
    ));

    let (_, report) = active.stop();
    assert_eq!(report.static_resources, StepOutcome::Done);
    assert_eq!(
        http.mappings(),
        vec![(ALIAS.to_string(), "other-static".to_string())]
    );
    assert_eq!(http.owner_of(ALIAS).as_deref(), Some("org.openhab.other"));
}

#[test]
fn store_failures_are_captured_and_never_escape() {
    let store = habpanel_store();
    let deps = deps_with(
        Arc::new(store.clone()),
        Arc::new(StaticResourceTable::new()),
        EmbeddedBundle::bundled(),
    );

    store.fail_next_find("configuration admin offline");
    let report = activate(&deps);
    assert!(report.static_resources.is_done());
    assert!(matches!(
        report.widget,
        StepOutcome::Failed(ref message) if message.contains("offline")
    ));

    deactivate(&deps);
    store.fail_next_update("read-only store");
    let report = activate(&deps);
    assert!(report.widget.is_failed());
    assert!(!store
        .properties(HABPANEL_PID)
        .expect("habpanel configuration")
        .contains_key(WIDGET_KEY));

    store.fail_next_update("read-only store");
    let report = deactivate(&deps);
    assert!(report.widget.is_failed());
}

#[test]
fn multiple_matches_update_only_the_first_configuration() {
    let store = InMemoryConfigurationStore::new()
        .with_configuration("org.openhab.habpanel", Properties::new())
        .with_configuration("org.openhab.habpanel.backup", Properties::new());
    let mut deps = deps_with(
        Arc::new(store.clone()),
        Arc::new(StaticResourceTable::new()),
        EmbeddedBundle::bundled(),
    );
    deps.config.config_filter = "(service.pid=org.openhab.habpanel*)".to_string();

    assert!(activate(&deps).widget.is_done());
    assert!(store
        .properties("org.openhab.habpanel")
        .expect("first configuration")
        .contains_key(WIDGET_KEY));
    assert!(!store
        .properties("org.openhab.habpanel.backup")
        .expect("second configuration")
        .contains_key(WIDGET_KEY));
}

#[test]
fn lifecycle_works_with_directory_bundle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let widget = "{\n  \"name\": \"from-disk\"\n}\n";
    std::fs::write(dir.path().join("rollershutter-example.widget.json"), widget)
        .expect("write widget");

    let store = habpanel_store();
    let deps = RegistrarDeps {
        config: ProviderConfig::default(),
        http: Arc::new(StaticResourceTable::new()),
        store: Arc::new(store.clone()),
        bundle: Arc::new(DirectoryBundle::new(dir.path())),
    };

    assert!(activate(&deps).is_complete());
    assert_eq!(
        store.properties(HABPANEL_PID).expect("configuration")[WIDGET_KEY],
        json!(widget)
    );
}
