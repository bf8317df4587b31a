//! Component registry: component type → loader.
//!
//! Filled once at startup, then shared read-only with every workspace.

use crate::workspace::state::Container;
use futures::future::BoxFuture;
use geopanes_core::panel::{PanelContent, PanelKind, PanelKindError, PanelState};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("component type {0} is already registered")]
    Duplicate(PanelKind),
    #[error("no loader registered for component type {0}")]
    NotFound(PanelKind),
    #[error(transparent)]
    UnknownType(#[from] PanelKindError),
}

/// What a loader wants done to fill its container.
pub enum LoadPlan {
    /// Content is available right away
    Ready(PanelContent),
    /// Content arrives later; the container stays in its loading view meanwhile
    Fetch(BoxFuture<'static, anyhow::Result<PanelContent>>),
}

impl std::fmt::Debug for LoadPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadPlan::Ready(content) => f.debug_tuple("Ready").field(content).finish(),
            LoadPlan::Fetch(_) => f.write_str("Fetch(..)"),
        }
    }
}

/// Produces a container's visible content.
///
/// A loader may retitle the container or adjust its state before returning.
/// Errors (and panics) are rendered inside that container only.
pub trait PanelLoader: Send + Sync {
    fn load(&self, container: &mut Container, state: &PanelState) -> anyhow::Result<LoadPlan>;
}

impl<F> PanelLoader for F
where
    F: Fn(&mut Container, &PanelState) -> anyhow::Result<LoadPlan> + Send + Sync,
{
    fn load(&self, container: &mut Container, state: &PanelState) -> anyhow::Result<LoadPlan> {
        self(container, state)
    }
}

#[derive(Default)]
pub struct ComponentRegistry {
    loaders: HashMap<PanelKind, Arc<dyn PanelLoader>>,
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.loaders.keys().collect();
        kinds.sort();
        f.debug_struct("ComponentRegistry").field("kinds", &kinds).finish()
    }
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the loader for a component type. Re-registering is a
    /// programming error and is rejected rather than overwritten.
    pub fn register<L>(&mut self, kind: PanelKind, loader: L) -> Result<(), RegistryError>
    where
        L: PanelLoader + 'static,
    {
        if self.loaders.contains_key(&kind) {
            return Err(RegistryError::Duplicate(kind));
        }
        self.loaders.insert(kind, Arc::new(loader));
        log::debug!("Registered loader for {}", kind);
        Ok(())
    }

    pub fn resolve(&self, kind: PanelKind) -> Result<Arc<dyn PanelLoader>, RegistryError> {
        self.loaders
            .get(&kind)
            .cloned()
            .ok_or(RegistryError::NotFound(kind))
    }

    /// Resolve by component type name.
    pub fn resolve_name(&self, name: &str) -> Result<Arc<dyn PanelLoader>, RegistryError> {
        let kind: PanelKind = name.parse()?;
        self.resolve(kind)
    }

    pub fn contains(&self, kind: PanelKind) -> bool {
        self.loaders.contains_key(&kind)
    }

    pub fn kinds(&self) -> Vec<PanelKind> {
        let mut kinds: Vec<_> = self.loaders.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::state::{InsertTarget, LayoutTree};

    fn html_loader(body: &'static str) -> impl PanelLoader {
        move |_: &mut Container, _: &PanelState| -> anyhow::Result<LoadPlan> {
            Ok(LoadPlan::Ready(PanelContent::Html(body.to_string())))
        }
    }

    #[test]
    fn register_and_resolve() {
        let mut registry = ComponentRegistry::new();
        registry.register(PanelKind::Plugin, html_loader("<p/>")).unwrap();
        assert!(registry.contains(PanelKind::Plugin));
        assert!(registry.resolve(PanelKind::Plugin).is_ok());
        assert!(registry.resolve_name("plugin").is_ok());
        assert_eq!(registry.kinds(), vec![PanelKind::Plugin]);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ComponentRegistry::new();
        registry.register(PanelKind::Map, html_loader("first")).unwrap();
        let err = registry.register(PanelKind::Map, html_loader("second")).unwrap_err();
        assert_eq!(err, RegistryError::Duplicate(PanelKind::Map));

        // first registration survives
        let mut tree = LayoutTree::new();
        let id = tree
            .insert(InsertTarget::Root, PanelState::Map(Default::default()), "Map".into())
            .unwrap();
        let container = tree.container_mut(id).unwrap();
        let state = container.state().clone();
        match registry.resolve(PanelKind::Map).unwrap().load(container, &state).unwrap() {
            LoadPlan::Ready(PanelContent::Html(body)) => assert_eq!(body, "first"),
            other => panic!("unexpected plan {:?}", other),
        }
    }

    #[test]
    fn missing_and_unknown_types() {
        let registry = ComponentRegistry::new();
        assert_eq!(
            registry.resolve(PanelKind::Chat).err(),
            Some(RegistryError::NotFound(PanelKind::Chat))
        );
        match registry.resolve_name("sudoku") {
            Err(RegistryError::UnknownType(e)) => assert!(e.to_string().contains("sudoku")),
            other => panic!("expected unknown type, got {:?}", other.map(|_| ())),
        }
    }
}
