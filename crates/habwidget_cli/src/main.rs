//! Lifecycle smoke harness.
//!
//! # Responsibility
//! - Run one start/stop cycle of the widget registrar against the embedded
//!   bundle and in-process host adapters.
//! - Print each step outcome so provider packaging can be checked locally.
//!
//! Usage: `habwidget_cli [provider-config.json] [--log-dir DIR] [--log-level LEVEL]`

mod cli;

use clap::Parser;
use cli::Args;
use habwidget_core::{
    default_log_level, init_console_logging, init_logging, EmbeddedBundle, IconProvider,
    InMemoryConfigurationStore, Properties, ProviderConfig, RegistrarDeps, StaticResourceTable,
    WidgetRegistrar,
};
use log::error;
use std::process::ExitCode;
use std::sync::Arc;

const HABPANEL_PID: &str = "org.openhab.habpanel";
const PROVIDER_OWNER: &str = "rollershutter-example";

fn main() -> ExitCode {
    let args = Args::parse();
    let level = args.log_level.as_deref().unwrap_or(default_log_level());

    let logging = match args.log_dir.as_deref() {
        Some(dir) => init_logging(level, &dir.to_string_lossy()),
        None => init_console_logging(level),
    };
    if let Err(err) = logging {
        eprintln!("logging disabled: {err}");
    }

    let config = match args.config.as_deref() {
        Some(path) => match ProviderConfig::from_json_file(path) {
            Ok(config) => config,
            Err(err) => {
                let path = path.display();
                error!("event=cli_config module=cli status=error path={path} error={err}");
                eprintln!("failed to load provider config `{path}`: {err}");
                return ExitCode::from(2);
            }
        },
        None => ProviderConfig::default(),
    };

    println!("habwidget_core version={}", habwidget_core::core_version());
    run_cycle(config);
    ExitCode::SUCCESS
}

fn run_cycle(config: ProviderConfig) {
    let widget_id = config.widget_id.clone();
    let static_alias = config.static_alias.clone();
    let store =
        InMemoryConfigurationStore::new().with_configuration(HABPANEL_PID, Properties::new());
    let http = StaticResourceTable::new();
    let bundle = EmbeddedBundle::bundled();

    let registrar = WidgetRegistrar::new(RegistrarDeps {
        config,
        http: Arc::new(http.scoped(PROVIDER_OWNER)),
        store: Arc::new(store.clone()),
        bundle: Arc::new(bundle.clone()),
    });

    let active = registrar.start();
    let report = active.activation_report();
    println!("activate static_resources={}", report.static_resources);
    println!("activate widget={}", report.widget);

    for (alias, dir) in http.mappings() {
        println!("static alias={alias} dir={dir}");
    }
    for entry in bundle.entry_paths("static") {
        if let Some(relative) = entry.strip_prefix("static/") {
            let request = format!("{static_alias}/{relative}");
            let served = http
                .fetch(&bundle, &request)
                .ok()
                .flatten()
                .map(|bytes| bytes.len());
            println!("static request={request} bytes={served:?}");
        }
    }

    let stored_len = store
        .properties(HABPANEL_PID)
        .and_then(|properties| properties.get(&widget_id).cloned())
        .and_then(|value| value.as_str().map(str::len));
    println!("config pid={HABPANEL_PID} key={widget_id} stored_bytes={stored_len:?}");

    let icons = active.icon_provider();
    for icon_set in icons.icon_sets(None) {
        match serde_json::to_string(&icon_set) {
            Ok(json) => println!("iconset {json}"),
            Err(err) => println!("iconset id={} serialize_error={err}", icon_set.id),
        }
        for entry in bundle.entry_paths("icons") {
            if let Some(name) = entry.strip_prefix("icons/") {
                println!(
                    "icon set={} name={name} available={}",
                    icon_set.id,
                    icons.has_resource(&icon_set.id, name)
                );
            }
        }
    }

    let (_inactive, report) = active.stop();
    println!("deactivate static_resources={}", report.static_resources);
    println!("deactivate widget={}", report.widget);
    println!(
        "after stop static_mappings={} widget_present={}",
        http.mappings().len(),
        store
            .properties(HABPANEL_PID)
            .is_some_and(|properties| properties.contains_key(&widget_id))
    );
}
