use anyhow::{Context, Result};
use geopanes::loaders::register_builtin_loaders;
use geopanes::workspace::bus::EventBus;
use geopanes::workspace::registry::ComponentRegistry;
use geopanes::workspace::state::PanelView;
use geopanes::workspace::{persistence, settings, Workspace, WorkspaceOptions};
use geopanes_core::client::{ContentClient, SettingsClient};
use geopanes_core::events::{DomainEvent, DomainEventKind};
use std::sync::Arc;
use std::time::Duration;

/// How long startup waits for the remote preference before using the local one.
const PREFERENCE_TIMEOUT: Duration = Duration::from_secs(2);

fn main() -> Result<()> {
    env_logger::init();

    let settings = settings::load_settings();
    let config = persistence::load_root_config().context("Failed to load layout")?;
    let load_timeout = Duration::from_secs(settings.load_timeout_secs.max(1));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    // Duplicate registration is a programming error: refuse to start
    let client = ContentClient::new(&settings.backend_url).with_timeout(load_timeout);
    let mut registry = ComponentRegistry::new();
    register_builtin_loaders(&mut registry, &client).context("Failed to register panel loaders")?;

    let bus = EventBus::new();
    bus.subscribe(DomainEventKind::RecordSelected, |event: &DomainEvent| {
        if let Some(record) = event.record() {
            log::info!(
                "Selected geocache {} {}",
                record.record_id,
                record.code.as_deref().unwrap_or("")
            );
        }
        Ok(())
    });
    bus.subscribe(DomainEventKind::ZoneSelected, |event: &DomainEvent| {
        if let DomainEvent::ZoneSelected(zone) = event {
            log::info!("Selected zone {}", zone.zone_id);
        }
        Ok(())
    });

    let mut options = WorkspaceOptions::from(&settings);
    let settings_client = SettingsClient::new(&settings.backend_url).with_timeout(PREFERENCE_TIMEOUT);
    match runtime.block_on(settings_client.open_in_active_stack()) {
        Ok(Some(value)) => {
            log::info!("Backend preference: open panels in active stack = {}", value);
            options.open_in_active_stack = value;
        }
        Ok(None) => {}
        Err(e) => log::warn!("Could not read panel preference from backend: {:#}", e),
    }

    let mut workspace = Workspace::from_config(&config, Arc::new(registry), bus, runtime.handle().clone(), options);
    if !workspace.wait_for_loads(load_timeout) {
        log::warn!("Some panels did not finish loading");
    }

    for container in workspace.tree().containers() {
        let status = match container.view() {
            PanelView::Loading => "loading".to_string(),
            PanelView::Content(_) => "ready".to_string(),
            PanelView::Error(msg) => format!("error: {}", msg),
        };
        log::info!("{} [{}] {}: {}", container.id(), container.component_type(), container.title(), status);
    }

    let layout = serde_json::to_string_pretty(workspace.tree().root()).context("Failed to serialize layout")?;
    println!("{}", layout);
    Ok(())
}
