//! Built-in panel loaders backed by the remote content source.

use crate::workspace::registry::{ComponentRegistry, LoadPlan, PanelLoader, RegistryError};
use crate::workspace::state::Container;
use geopanes_core::api::PanelRequest;
use geopanes_core::client::ContentClient;
use geopanes_core::panel::{PanelKind, PanelState};

/// Loader that fetches a panel's HTML/JSON from the backend route for its state.
pub fn http_loader(client: ContentClient) -> impl PanelLoader {
    move |container: &mut Container, state: &PanelState| -> anyhow::Result<LoadPlan> {
        let request = PanelRequest::for_state(state);
        log::debug!("{} loads from {} {}", container.id(), client.base_url(), request.path);
        let client = client.clone();
        Ok(LoadPlan::Fetch(Box::pin(async move { client.fetch(request).await })))
    }
}

/// Register one HTTP loader per component type.
pub fn register_builtin_loaders(registry: &mut ComponentRegistry, client: &ContentClient) -> Result<(), RegistryError> {
    for kind in PanelKind::ALL {
        registry.register(kind, http_loader(client.clone()))?;
    }
    log::info!("Registered {} built-in panel loaders", PanelKind::ALL.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::bus::EventBus;
    use crate::workspace::state::PanelView;
    use crate::workspace::{Workspace, WorkspaceOptions};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn every_kind_gets_a_loader_once() {
        let client = ContentClient::new("http://127.0.0.1:9");
        let mut registry = ComponentRegistry::new();
        register_builtin_loaders(&mut registry, &client).unwrap();
        assert_eq!(registry.kinds().len(), PanelKind::ALL.len());

        let err = register_builtin_loaders(&mut registry, &client).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(_)));
    }

    #[test]
    fn unreachable_backend_renders_error_panel() {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let client = ContentClient::new("http://127.0.0.1:9").with_timeout(Duration::from_secs(2));
        let mut registry = ComponentRegistry::new();
        register_builtin_loaders(&mut registry, &client).unwrap();

        let mut ws = Workspace::new(
            Arc::new(registry),
            EventBus::new(),
            rt.handle().clone(),
            WorkspaceOptions::default(),
        );
        let id = ws
            .add_component(None, PanelState::plugin("caesar"), "Caesar")
            .unwrap();
        assert_eq!(ws.container(id).unwrap().view(), &PanelView::Loading);

        assert!(ws.wait_for_loads(Duration::from_secs(10)));
        assert!(ws.container(id).unwrap().view().is_error());
        assert_eq!(ws.container_count(), 1);
    }
}
