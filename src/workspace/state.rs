use crate::workspace::persistence::{ComponentConfig, ConfigNode, RootConfig};
use geopanes_core::ids::{ContainerId, StackId};
use geopanes_core::panel::{PanelContent, PanelKind, PanelState};
use serde::Serialize;
use std::collections::VecDeque;

/// Structural errors raised by the layout tree.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("target stack {0} not found in layout")]
    TargetNotFound(StackId),
    #[error("container {0} not found in layout")]
    ContainerNotFound(ContainerId),
    #[error("container holds a {expected} panel, got {actual} state")]
    KindMismatch { expected: PanelKind, actual: PanelKind },
}

/// What a container currently shows. Never persisted.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum PanelView {
    /// Content is being fetched
    #[default]
    Loading,
    Content(PanelContent),
    /// Load failed; rendered in place of the panel's content
    Error(String),
}

impl PanelView {
    pub fn is_error(&self) -> bool {
        matches!(self, PanelView::Error(_))
    }
}

/// One live panel instance. Owned by exactly one stack.
#[derive(Clone, Debug, Serialize)]
pub struct Container {
    id: ContainerId,
    title: String,
    state: PanelState,
    #[serde(skip)]
    view: PanelView,
    /// Back-reference to the owning stack (not ownership)
    parent_stack_id: StackId,
}

impl Container {
    fn new(id: ContainerId, parent_stack_id: StackId, state: PanelState, title: String) -> Self {
        Self {
            id,
            title,
            state,
            view: PanelView::Loading,
            parent_stack_id,
        }
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    pub fn component_type(&self) -> PanelKind {
        self.state.kind()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    /// Replace the container's state. The component type is fixed at creation,
    /// so state of another kind is rejected.
    pub fn set_state(&mut self, state: PanelState) -> Result<(), LayoutError> {
        if state.kind() != self.state.kind() {
            return Err(LayoutError::KindMismatch {
                expected: self.state.kind(),
                actual: state.kind(),
            });
        }
        self.state = state;
        Ok(())
    }

    pub fn view(&self) -> &PanelView {
        &self.view
    }

    pub fn set_view(&mut self, view: PanelView) {
        self.view = view;
    }

    pub fn parent_stack_id(&self) -> StackId {
        self.parent_stack_id
    }
}

/// Tabbed group of sibling containers. Insertion order is display order.
#[derive(Clone, Debug, Serialize)]
pub struct Stack {
    id: StackId,
    children: Vec<Container>,
    active: Option<ContainerId>,
}

impl Stack {
    fn new(id: StackId) -> Self {
        Self {
            id,
            children: Vec::new(),
            active: None,
        }
    }

    pub fn id(&self) -> StackId {
        self.id
    }

    pub fn children(&self) -> &[Container] {
        &self.children
    }

    pub fn child_ids(&self) -> Vec<ContainerId> {
        self.children.iter().map(|c| c.id).collect()
    }

    pub fn active_container_id(&self) -> Option<ContainerId> {
        self.active
    }

    pub fn active_container(&self) -> Option<&Container> {
        let active = self.active?;
        self.children.iter().find(|c| c.id == active)
    }

    pub fn contains(&self, id: ContainerId) -> bool {
        self.children.iter().any(|c| c.id == id)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Append a container and make it the active tab.
    fn push(&mut self, container: Container) {
        self.active = Some(container.id);
        self.children.push(container);
    }

    fn activate(&mut self, id: ContainerId) -> bool {
        if self.contains(id) {
            self.active = Some(id);
            true
        } else {
            false
        }
    }

    /// Remove a child. Returns the removed container and, if the active child
    /// was removed and siblings remain, the promoted child (first remaining).
    fn remove(&mut self, id: ContainerId) -> Option<(Container, Option<ContainerId>)> {
        let index = self.children.iter().position(|c| c.id == id)?;
        let removed = self.children.remove(index);
        let mut promoted = None;
        if self.active == Some(id) {
            self.active = self.children.first().map(|c| c.id);
            promoted = self.active;
        }
        Some((removed, promoted))
    }
}

/// Recursive layout tree node. Leaves are always stacks.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LayoutNode {
    Row { children: Vec<LayoutNode> },
    Column { children: Vec<LayoutNode> },
    Stack(Stack),
}

impl LayoutNode {
    fn empty_row() -> Self {
        LayoutNode::Row { children: Vec::new() }
    }

    pub fn children(&self) -> &[LayoutNode] {
        match self {
            LayoutNode::Row { children } | LayoutNode::Column { children } => children,
            LayoutNode::Stack(_) => &[],
        }
    }

    /// Collect all containers in document order (depth-first, tabs in display order).
    pub fn collect_containers<'a>(&'a self, out: &mut Vec<&'a Container>) {
        match self {
            LayoutNode::Row { children } | LayoutNode::Column { children } => {
                for child in children {
                    child.collect_containers(out);
                }
            }
            LayoutNode::Stack(stack) => out.extend(stack.children.iter()),
        }
    }

    pub fn collect_stacks<'a>(&'a self, out: &mut Vec<&'a Stack>) {
        match self {
            LayoutNode::Row { children } | LayoutNode::Column { children } => {
                for child in children {
                    child.collect_stacks(out);
                }
            }
            LayoutNode::Stack(stack) => out.push(stack),
        }
    }

    fn find_stack(&self, id: StackId) -> Option<&Stack> {
        match self {
            LayoutNode::Row { children } | LayoutNode::Column { children } => {
                children.iter().find_map(|c| c.find_stack(id))
            }
            LayoutNode::Stack(stack) => (stack.id == id).then_some(stack),
        }
    }

    fn find_stack_mut(&mut self, id: StackId) -> Option<&mut Stack> {
        match self {
            LayoutNode::Row { children } | LayoutNode::Column { children } => {
                children.iter_mut().find_map(|c| c.find_stack_mut(id))
            }
            LayoutNode::Stack(stack) => (stack.id == id).then_some(stack),
        }
    }

    fn find_stack_of(&self, container_id: ContainerId) -> Option<&Stack> {
        match self {
            LayoutNode::Row { children } | LayoutNode::Column { children } => {
                children.iter().find_map(|c| c.find_stack_of(container_id))
            }
            LayoutNode::Stack(stack) => stack.contains(container_id).then_some(stack),
        }
    }

    /// Detach a stack from whichever row/column holds it.
    /// Rows and columns left without children stay in place.
    fn detach_stack(&mut self, id: StackId) -> bool {
        match self {
            LayoutNode::Row { children } | LayoutNode::Column { children } => {
                let before = children.len();
                children.retain(|c| !matches!(c, LayoutNode::Stack(s) if s.id == id));
                if children.len() != before {
                    return true;
                }
                children.iter_mut().any(|c| c.detach_stack(id))
            }
            LayoutNode::Stack(_) => false,
        }
    }
}

/// Notification queued by every structural change, drained by the workspace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayoutEvent {
    ContainerAdded {
        container_id: ContainerId,
        stack_id: StackId,
    },
    ActiveChanged {
        container_id: ContainerId,
        stack_id: StackId,
    },
    ContainerRemoved {
        container_id: ContainerId,
        stack_id: StackId,
        promoted: Option<ContainerId>,
    },
    StackRemoved {
        stack_id: StackId,
    },
}

/// Where a new container goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertTarget {
    /// Append to this stack
    Stack(StackId),
    /// Append to the first stack of the root row, creating one if it has none
    Root,
    /// Open a fresh stack at the end of the root row
    NewStack,
}

/// Outcome of removing a container.
#[derive(Debug)]
pub struct Removal {
    pub container: Container,
    pub stack_id: StackId,
    pub promoted: Option<ContainerId>,
    pub stack_removed: bool,
}

/// The full arrangement of rows, columns and stacks for one session.
///
/// The root is always a row. Container and stack ids come from counters
/// owned by the tree and are never reused.
#[derive(Debug)]
pub struct LayoutTree {
    root: LayoutNode,
    next_container_id: u64,
    next_stack_id: u64,
    events: VecDeque<LayoutEvent>,
}

impl Default for LayoutTree {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutTree {
    pub fn new() -> Self {
        Self {
            root: LayoutNode::empty_row(),
            next_container_id: 1,
            next_stack_id: 1,
            events: VecDeque::new(),
        }
    }

    /// Build a tree from a static root config.
    ///
    /// Components whose state is rejected by `accept` (e.g. no loader
    /// registered for their kind) are skipped; stacks left empty are dropped.
    pub fn from_config<F>(config: &RootConfig, accept: F) -> Self
    where
        F: Fn(&PanelState) -> bool,
    {
        let mut tree = Self::new();
        let children = match &config.root {
            ConfigNode::Row { children } => children.as_slice(),
            other => std::slice::from_ref(other),
        };
        let mut built = Vec::new();
        for child in children {
            if let Some(node) = tree.build_node(child, &accept) {
                built.push(node);
            }
        }
        tree.root = LayoutNode::Row { children: built };
        tree
    }

    fn build_node<F>(&mut self, node: &ConfigNode, accept: &F) -> Option<LayoutNode>
    where
        F: Fn(&PanelState) -> bool,
    {
        match node {
            ConfigNode::Row { children } => Some(LayoutNode::Row {
                children: children.iter().filter_map(|c| self.build_node(c, accept)).collect(),
            }),
            ConfigNode::Column { children } => Some(LayoutNode::Column {
                children: children.iter().filter_map(|c| self.build_node(c, accept)).collect(),
            }),
            ConfigNode::Stack { children, active } => self.build_stack(children, *active, accept),
            ConfigNode::Component(component) => {
                self.build_stack(std::slice::from_ref(component), 0, accept)
            }
        }
    }

    fn build_stack<F>(&mut self, components: &[ComponentConfig], active: usize, accept: &F) -> Option<LayoutNode>
    where
        F: Fn(&PanelState) -> bool,
    {
        let mut stack = Stack::new(self.alloc_stack_id());
        let mut active_id = None;
        for (i, component) in components.iter().enumerate() {
            if !accept(&component.state) {
                log::warn!(
                    "Skipping {} panel in root config: no loader registered",
                    component.state.kind()
                );
                continue;
            }
            let title = component
                .title
                .clone()
                .unwrap_or_else(|| component.state.default_title());
            let container = Container::new(self.alloc_container_id(), stack.id, component.state.clone(), title);
            if i == active || active_id.is_none() {
                active_id = Some(container.id);
            }
            self.events.push_back(LayoutEvent::ContainerAdded {
                container_id: container.id,
                stack_id: stack.id,
            });
            stack.children.push(container);
        }
        let active_id = active_id?;
        stack.active = Some(active_id);
        self.events.push_back(LayoutEvent::ActiveChanged {
            container_id: active_id,
            stack_id: stack.id,
        });
        Some(LayoutNode::Stack(stack))
    }

    fn alloc_container_id(&mut self) -> ContainerId {
        let id = ContainerId::new(self.next_container_id);
        self.next_container_id += 1;
        id
    }

    fn alloc_stack_id(&mut self) -> StackId {
        let id = StackId::new(self.next_stack_id);
        self.next_stack_id += 1;
        id
    }

    pub fn root(&self) -> &LayoutNode {
        &self.root
    }

    /// All containers in document order.
    pub fn containers(&self) -> Vec<&Container> {
        let mut out = Vec::new();
        self.root.collect_containers(&mut out);
        out
    }

    pub fn stacks(&self) -> Vec<&Stack> {
        let mut out = Vec::new();
        self.root.collect_stacks(&mut out);
        out
    }

    pub fn container_count(&self) -> usize {
        self.containers().len()
    }

    pub fn container(&self, id: ContainerId) -> Option<&Container> {
        self.root
            .find_stack_of(id)
            .and_then(|stack| stack.children.iter().find(|c| c.id == id))
    }

    pub fn container_mut(&mut self, id: ContainerId) -> Option<&mut Container> {
        let stack_id = self.stack_of(id)?;
        self.root
            .find_stack_mut(stack_id)?
            .children
            .iter_mut()
            .find(|c| c.id == id)
    }

    pub fn contains(&self, id: ContainerId) -> bool {
        self.root.find_stack_of(id).is_some()
    }

    pub fn stack(&self, id: StackId) -> Option<&Stack> {
        self.root.find_stack(id)
    }

    pub fn stack_of(&self, container_id: ContainerId) -> Option<StackId> {
        self.root.find_stack_of(container_id).map(|s| s.id)
    }

    /// First stack directly inside the root row.
    pub fn first_stack_in_root(&self) -> Option<StackId> {
        self.root.children().iter().find_map(|c| match c {
            LayoutNode::Stack(stack) => Some(stack.id),
            _ => None,
        })
    }

    /// First container (document order) matching the predicate.
    pub fn find_by_predicate<F>(&self, predicate: F) -> Option<&Container>
    where
        F: Fn(&Container) -> bool,
    {
        self.containers().into_iter().find(|c| predicate(*c))
    }

    /// Create a container and make it the active child of its stack.
    pub fn insert(
        &mut self,
        target: InsertTarget,
        state: PanelState,
        title: String,
    ) -> Result<ContainerId, LayoutError> {
        let stack_id = match target {
            InsertTarget::Stack(id) => {
                if self.stack(id).is_none() {
                    return Err(LayoutError::TargetNotFound(id));
                }
                id
            }
            InsertTarget::Root => match self.first_stack_in_root() {
                Some(id) => id,
                None => self.push_root_stack(),
            },
            InsertTarget::NewStack => self.push_root_stack(),
        };

        let container = Container::new(self.alloc_container_id(), stack_id, state, title);
        let container_id = container.id;
        let stack = self
            .root
            .find_stack_mut(stack_id)
            .ok_or(LayoutError::TargetNotFound(stack_id))?;
        stack.push(container);

        log::debug!("Added {} to {}", container_id, stack_id);
        self.events.push_back(LayoutEvent::ContainerAdded { container_id, stack_id });
        self.events.push_back(LayoutEvent::ActiveChanged { container_id, stack_id });
        Ok(container_id)
    }

    fn push_root_stack(&mut self) -> StackId {
        let id = self.alloc_stack_id();
        if let LayoutNode::Row { children } | LayoutNode::Column { children } = &mut self.root {
            children.push(LayoutNode::Stack(Stack::new(id)));
        }
        id
    }

    /// Detach a container from its stack, promoting a sibling if it was active
    /// and dropping the stack once empty. Stale ids are a no-op.
    pub fn remove(&mut self, id: ContainerId) -> Option<Removal> {
        let Some(stack_id) = self.stack_of(id) else {
            log::debug!("remove: {} no longer in layout", id);
            return None;
        };
        let stack = self.root.find_stack_mut(stack_id)?;
        let (container, promoted) = stack.remove(id)?;
        let now_empty = stack.is_empty();

        self.events.push_back(LayoutEvent::ContainerRemoved {
            container_id: id,
            stack_id,
            promoted,
        });

        let stack_removed = now_empty && self.root.detach_stack(stack_id);
        if stack_removed {
            log::debug!("Removed empty {}", stack_id);
            self.events.push_back(LayoutEvent::StackRemoved { stack_id });
        }

        Some(Removal {
            container,
            stack_id,
            promoted,
            stack_removed,
        })
    }

    /// Mark a container as its stack's active child. Display order is unchanged.
    ///
    /// Queues exactly one `ActiveChanged` per successful call, even when the
    /// container already was active.
    pub fn set_active(&mut self, id: ContainerId) -> bool {
        let Some(stack_id) = self.stack_of(id) else {
            log::debug!("set_active: {} no longer in layout", id);
            return false;
        };
        let Some(stack) = self.root.find_stack_mut(stack_id) else {
            return false;
        };
        if !stack.activate(id) {
            return false;
        }
        self.events.push_back(LayoutEvent::ActiveChanged {
            container_id: id,
            stack_id,
        });
        true
    }

    pub fn drain_events(&mut self) -> Vec<LayoutEvent> {
        self.events.drain(..).collect()
    }

    /// Describe every broken structural invariant (empty when consistent).
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !matches!(self.root, LayoutNode::Row { .. }) {
            issues.push("root is not a row".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        for stack in self.stacks() {
            if stack.is_empty() {
                issues.push(format!("{} has no children", stack.id));
            }
            match stack.active {
                Some(active) if !stack.contains(active) => {
                    issues.push(format!("{} active {} is not a child", stack.id, active));
                }
                None if !stack.is_empty() => {
                    issues.push(format!("{} has children but no active child", stack.id));
                }
                _ => {}
            }
            for child in &stack.children {
                if child.parent_stack_id != stack.id {
                    issues.push(format!("{} points at {} but lives in {}", child.id, child.parent_stack_id, stack.id));
                }
                if !seen.insert(child.id) {
                    issues.push(format!("{} appears twice", child.id));
                }
            }
        }
        issues
    }
}
