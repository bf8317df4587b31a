//! Panel workspace: layout tree, component registry, active-state tracker,
//! event bus and in-flight loads, composed into one explicitly constructed
//! `Workspace`.
//!
//! Mutations live in `actions`, organized by domain.

pub mod actions;
pub mod bus;
pub mod focus;
pub mod loads;
pub mod persistence;
pub mod registry;
pub mod settings;
pub mod state;

use crate::workspace::bus::EventBus;
use crate::workspace::focus::{ActiveStateTracker, HistoryPolicy};
use crate::workspace::loads::LoadTasks;
use crate::workspace::persistence::RootConfig;
use crate::workspace::registry::{ComponentRegistry, RegistryError};
use crate::workspace::settings::AppSettings;
use crate::workspace::state::{Container, LayoutError, LayoutTree};
use geopanes_core::ids::{ContainerId, StackId};
use geopanes_core::panel::PanelState;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// Where `open_panel` puts a new panel when no target stack is given.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// Join the stack holding the active component
    ActiveStack,
    /// Open a fresh stack at the end of the root row
    NewStack,
}

impl Placement {
    pub fn from_preference(open_in_active_stack: bool) -> Self {
        if open_in_active_stack {
            Placement::ActiveStack
        } else {
            Placement::NewStack
        }
    }
}

/// When an already open panel is reused instead of opening a duplicate.
#[derive(Clone, Copy, Debug)]
pub enum ReusePolicy {
    /// Always open a new panel
    Never,
    /// Any open panel of the same component type
    SameKind,
    /// Same component type and same identity (plugin name, geocache id, …)
    SameIdentity,
    Custom(fn(&Container, &PanelState) -> bool),
}

impl ReusePolicy {
    pub fn matches(&self, container: &Container, state: &PanelState) -> bool {
        match self {
            ReusePolicy::Never => false,
            ReusePolicy::SameKind => container.component_type() == state.kind(),
            ReusePolicy::SameIdentity => {
                container.component_type() == state.kind()
                    && container.state().identity_key() == state.identity_key()
            }
            ReusePolicy::Custom(predicate) => predicate(container, state),
        }
    }
}

/// Request to open a panel, possibly reusing an existing one.
#[derive(Clone, Debug)]
pub struct OpenPanel {
    pub state: PanelState,
    pub title: Option<String>,
    pub target: Option<StackId>,
    pub reuse: ReusePolicy,
}

impl OpenPanel {
    pub fn new(state: PanelState) -> Self {
        Self {
            state,
            title: None,
            target: None,
            reuse: ReusePolicy::SameIdentity,
        }
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn in_stack(mut self, stack_id: StackId) -> Self {
        self.target = Some(stack_id);
        self
    }

    pub fn reuse(mut self, reuse: ReusePolicy) -> Self {
        self.reuse = reuse;
        self
    }
}

/// Knobs a workspace is built with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorkspaceOptions {
    pub open_in_active_stack: bool,
    pub history_policy: HistoryPolicy,
    pub load_timeout: Option<Duration>,
}

impl Default for WorkspaceOptions {
    fn default() -> Self {
        Self {
            open_in_active_stack: true,
            history_policy: HistoryPolicy::default(),
            load_timeout: None,
        }
    }
}

impl From<&AppSettings> for WorkspaceOptions {
    fn from(settings: &AppSettings) -> Self {
        Self {
            open_in_active_stack: settings.open_panels_in_active_stack,
            history_policy: settings.history_policy,
            load_timeout: Some(Duration::from_secs(settings.load_timeout_secs.max(1))),
        }
    }
}

/// One session's panels and everything that coordinates them.
pub struct Workspace {
    pub(crate) tree: LayoutTree,
    pub(crate) registry: Arc<ComponentRegistry>,
    pub(crate) tracker: ActiveStateTracker,
    pub(crate) loads: LoadTasks,
    pub(crate) open_in_active_stack: bool,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("containers", &self.tree.container_count())
            .field("registry", &self.registry)
            .field("loads", &self.loads)
            .field("open_in_active_stack", &self.open_in_active_stack)
            .finish()
    }
}

impl Workspace {
    /// Empty workspace. Loads run on `runtime`; domain events go to `bus`.
    pub fn new(registry: Arc<ComponentRegistry>, bus: EventBus, runtime: Handle, options: WorkspaceOptions) -> Self {
        let mut loads = LoadTasks::new(runtime);
        if let Some(timeout) = options.load_timeout {
            loads = loads.with_timeout(timeout);
        }
        Self {
            tree: LayoutTree::new(),
            registry,
            tracker: ActiveStateTracker::with_policy(bus, options.history_policy),
            loads,
            open_in_active_stack: options.open_in_active_stack,
        }
    }

    /// Build the session from a static root config and start loading every
    /// panel. Components without a registered loader are skipped.
    pub fn from_config(
        config: &RootConfig,
        registry: Arc<ComponentRegistry>,
        bus: EventBus,
        runtime: Handle,
        options: WorkspaceOptions,
    ) -> Self {
        let mut workspace = Self::new(registry, bus, runtime, options);
        let registry = workspace.registry.clone();
        workspace.tree = LayoutTree::from_config(config, |state| registry.contains(state.kind()));

        let ids: Vec<ContainerId> = workspace.tree.containers().iter().map(|c| c.id()).collect();
        for id in &ids {
            if let Err(e) = workspace.load_container(*id) {
                log::warn!("Cannot load {}: {}", id, e);
            }
        }
        workspace.sync_layout_events();
        log::info!("Workspace built with {} panels", ids.len());
        workspace
    }

    pub fn tree(&self) -> &LayoutTree {
        &self.tree
    }

    pub fn tracker(&self) -> &ActiveStateTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut ActiveStateTracker {
        &mut self.tracker
    }

    pub fn bus(&self) -> &EventBus {
        self.tracker.bus()
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    pub fn container(&self, id: ContainerId) -> Option<&Container> {
        self.tree.container(id)
    }

    pub fn open_in_active_stack(&self) -> bool {
        self.open_in_active_stack
    }

    pub fn set_open_in_active_stack(&mut self, value: bool) {
        self.open_in_active_stack = value;
    }

    pub fn pending_loads(&self) -> usize {
        self.loads.pending_count()
    }
}
