//! Activation workspace actions
//!
//! Keeps the active-state tracker in step with the layout tree.

use crate::workspace::focus::ActivationInfo;
use crate::workspace::state::LayoutEvent;
use crate::workspace::Workspace;
use geopanes_core::ids::{ContainerId, StackId};
use serde_json::Map;

impl Workspace {
    /// Make a container its stack's active child and the current component.
    /// Stale ids are ignored (returns false).
    pub fn set_active(&mut self, id: ContainerId) -> bool {
        let changed = self.tree.set_active(id);
        self.sync_layout_events();
        changed
    }

    /// The live container the tracker considers current, if any.
    pub fn active_container(&self) -> Option<ContainerId> {
        self.tracker
            .active_component_info()
            .and_then(|record| record.container_id)
            .filter(|id| self.tree.contains(*id))
    }

    /// The stack holding the active component, if it is still in the layout.
    pub fn active_stack(&self) -> Option<StackId> {
        self.tracker
            .active_stack()
            .filter(|id| self.tree.stack(*id).is_some())
    }

    /// Forward queued layout events to the tracker until the queue is empty.
    pub(crate) fn sync_layout_events(&mut self) {
        loop {
            let events = self.tree.drain_events();
            if events.is_empty() {
                break;
            }
            for event in events {
                self.forward_layout_event(event);
            }
        }
    }

    fn forward_layout_event(&mut self, event: LayoutEvent) {
        match event {
            LayoutEvent::ContainerAdded { container_id, stack_id } => {
                self.refresh_stack(stack_id);
                if let Some(container) = self.tree.container(container_id) {
                    self.tracker.register_container(container, Map::new());
                }
            }
            LayoutEvent::ActiveChanged { container_id, stack_id } => {
                self.refresh_stack(stack_id);
                let Some(container) = self.tree.container(container_id) else {
                    return;
                };
                let info = ActivationInfo::for_container(container).in_stack(stack_id);
                self.tracker.set_active_component(info);
            }
            LayoutEvent::ContainerRemoved { container_id, stack_id, .. } => {
                self.tracker.component_removed(&container_id.to_string());
                self.refresh_stack(stack_id);
            }
            LayoutEvent::StackRemoved { stack_id } => {
                self.tracker.forget_stack(stack_id);
            }
        }
    }

    fn refresh_stack(&mut self, stack_id: StackId) {
        if let Some(stack) = self.tree.stack(stack_id) {
            self.tracker.register_stack(stack);
        }
    }
}
