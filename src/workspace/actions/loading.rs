//! Panel loading workspace actions
//!
//! Loaders run on the owning thread; fetches run on the runtime and their
//! completions are applied here. A failing or panicking loader only ever
//! turns its own panel into an error view.

use crate::workspace::loads::LoadEvent;
use crate::workspace::registry::{LoadPlan, PanelLoader};
use crate::workspace::state::PanelView;
use crate::workspace::{Workspace, WorkspaceError};
use geopanes_core::ids::ContainerId;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

impl Workspace {
    /// Run the registered loader of a panel, replacing any load in flight.
    /// Returns Ok(false) for a stale id.
    pub fn reload_component(&mut self, id: ContainerId) -> Result<bool, WorkspaceError> {
        if !self.tree.contains(id) {
            return Ok(false);
        }
        self.load_container(id)?;
        self.sync_layout_events();
        Ok(true)
    }

    pub(crate) fn load_container(&mut self, id: ContainerId) -> Result<(), WorkspaceError> {
        let Some(container) = self.tree.container(id) else {
            return Ok(());
        };
        let loader = self.registry.resolve(container.component_type())?;
        self.run_loader(id, loader);
        Ok(())
    }

    pub(crate) fn run_loader(&mut self, id: ContainerId, loader: Arc<dyn PanelLoader>) {
        let Some(container) = self.tree.container_mut(id) else {
            return;
        };
        let state = container.state().clone();
        let kind = state.kind();
        container.set_view(PanelView::Loading);

        match catch_unwind(AssertUnwindSafe(|| loader.load(container, &state))) {
            Ok(Ok(LoadPlan::Ready(content))) => {
                self.loads.cancel(id);
                container.set_view(PanelView::Content(content));
            }
            Ok(Ok(LoadPlan::Fetch(fetch))) => {
                self.loads.spawn(id, fetch);
            }
            Ok(Err(e)) => {
                log::warn!("{} loader failed for {}: {:#}", kind, id, e);
                self.loads.cancel(id);
                container.set_view(PanelView::Error(format!("{:#}", e)));
            }
            Err(_) => {
                log::error!("{} loader panicked for {}", kind, id);
                self.loads.cancel(id);
                container.set_view(PanelView::Error(format!("The {} panel failed to load", kind.display_name())));
            }
        }
    }

    /// Apply every completion that already arrived. Returns how many were applied.
    pub fn process_load_events(&mut self) -> usize {
        let mut applied = 0;
        for event in self.loads.drain() {
            if self.apply_load_event(event) {
                applied += 1;
            }
        }
        applied
    }

    fn apply_load_event(&mut self, event: LoadEvent) -> bool {
        if !self.loads.accept(&event) {
            log::debug!("Discarding stale load #{} for {}", event.generation, event.container_id);
            return false;
        }
        let Some(container) = self.tree.container_mut(event.container_id) else {
            log::debug!("Load finished for {} after it was closed", event.container_id);
            return false;
        };
        match event.result {
            Ok(content) => container.set_view(PanelView::Content(content)),
            Err(e) => {
                log::warn!("Failed to load {}: {:#}", event.container_id, e);
                container.set_view(PanelView::Error(format!("{:#}", e)));
            }
        }
        true
    }

    /// Block until every pending load completed or `timeout` passed.
    /// Returns true if nothing is left pending.
    pub fn wait_for_loads(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.process_load_events();
        while self.loads.pending_count() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.loads.recv_timeout(remaining) {
                Some(event) => {
                    self.apply_load_event(event);
                }
                None => break,
            }
        }
        let done = self.loads.pending_count() == 0;
        if !done {
            log::warn!("{} panel loads still pending after {:?}", self.loads.pending_count(), timeout);
        }
        done
    }
}
