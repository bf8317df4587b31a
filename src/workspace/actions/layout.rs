//! Layout manipulation workspace actions
//!
//! Actions for adding, opening, closing and updating panels.

use crate::workspace::state::{Container, InsertTarget, LayoutError};
use crate::workspace::{OpenPanel, Placement, Workspace, WorkspaceError};
use geopanes_core::ids::{ContainerId, StackId};
use geopanes_core::panel::PanelState;
use serde_json::Map;

impl Workspace {
    /// Add a panel and make it active.
    ///
    /// With a target stack the panel joins it; without one it joins the
    /// first stack of the root row. A stale target falls back to the root.
    /// Fails only when no loader is registered for the panel's type.
    pub fn add_component(
        &mut self,
        target: Option<StackId>,
        state: PanelState,
        title: impl Into<String>,
    ) -> Result<ContainerId, WorkspaceError> {
        let target = target.map_or(InsertTarget::Root, InsertTarget::Stack);
        self.add_at(target, state, title.into())
    }

    fn add_at(&mut self, target: InsertTarget, state: PanelState, title: String) -> Result<ContainerId, WorkspaceError> {
        let loader = self.registry.resolve(state.kind())?;

        let id = match self.tree.insert(target, state.clone(), title.clone()) {
            Ok(id) => id,
            Err(LayoutError::TargetNotFound(stack_id)) => {
                log::warn!("Target {} is gone, adding {} panel at root", stack_id, state.kind());
                self.tree.insert(InsertTarget::Root, state, title)?
            }
            Err(e) => return Err(e.into()),
        };

        self.run_loader(id, loader);
        self.sync_layout_events();
        log::info!("Added {} panel {}", self.tree.container(id).map_or("?", |c| c.component_type().as_str()), id);
        Ok(id)
    }

    /// Open a panel, activating an existing match instead when the request's
    /// reuse policy finds one.
    ///
    /// Without an explicit target the `open_in_active_stack` preference
    /// decides between the active stack and a new stack.
    pub fn open_panel(&mut self, request: OpenPanel) -> Result<ContainerId, WorkspaceError> {
        let reuse = request.reuse;
        let existing = self
            .tree
            .find_by_predicate(|c| reuse.matches(c, &request.state))
            .map(|c| c.id());
        if let Some(id) = existing {
            log::debug!("Reusing {} for {} panel", id, request.state.kind());
            self.set_active(id);
            return Ok(id);
        }

        let title = request
            .title
            .unwrap_or_else(|| request.state.default_title());
        let target = match request.target {
            Some(stack_id) => InsertTarget::Stack(stack_id),
            None => match Placement::from_preference(self.open_in_active_stack) {
                Placement::ActiveStack => self
                    .active_stack()
                    .map_or(InsertTarget::Root, InsertTarget::Stack),
                Placement::NewStack => InsertTarget::NewStack,
            },
        };
        self.add_at(target, request.state, title)
    }

    /// Close a panel. Its load is aborted; if it was the current component
    /// the promoted sibling becomes current. Stale ids are ignored.
    pub fn remove_component(&mut self, id: ContainerId) -> bool {
        self.loads.cancel(id);
        let was_current = self.tracker.active_component_id() == Some(id.to_string().as_str());

        let Some(removal) = self.tree.remove(id) else {
            return false;
        };
        if was_current {
            if let Some(promoted) = removal.promoted {
                self.tree.set_active(promoted);
            }
        }
        self.sync_layout_events();
        log::info!("Removed {} panel {}", removal.container.component_type(), id);
        true
    }

    /// Replace a panel's state. The component type cannot change.
    /// Returns Ok(false) for a stale id.
    pub fn set_container_state(&mut self, id: ContainerId, state: PanelState) -> Result<bool, WorkspaceError> {
        let Some(container) = self.tree.container_mut(id) else {
            return Ok(false);
        };
        container.set_state(state)?;
        self.tracker.register_container(container, Map::new());
        Ok(true)
    }

    /// Returns false for a stale id.
    pub fn set_container_title(&mut self, id: ContainerId, title: impl Into<String>) -> bool {
        match self.tree.container_mut(id) {
            Some(container) => {
                container.set_title(title);
                true
            }
            None => false,
        }
    }

    /// First panel in document order matching the predicate.
    pub fn find_by_predicate<F>(&self, predicate: F) -> Option<ContainerId>
    where
        F: Fn(&Container) -> bool,
    {
        self.tree.find_by_predicate(predicate).map(|c| c.id())
    }

    pub fn container_count(&self) -> usize {
        self.tree.container_count()
    }
}
