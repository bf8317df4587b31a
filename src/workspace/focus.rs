//! Active-state tracking for panels
//!
//! ActiveStateTracker is the single source of truth for:
//! - Which component is active (the "current" record)
//! - Which stack holds it (active_stack)
//! - Every component seen this session, for type-wide lookups
//!
//! Activating a domain-significant component also publishes a domain event on
//! the injected bus, so unrelated panels react to a simple tab switch.

use crate::workspace::bus::EventBus;
use crate::workspace::state::{Container, Stack};
use geopanes_core::events::{DomainEvent, RecordRef, ZoneRef};
use geopanes_core::ids::{synthesize_component_id, ContainerId, StackId};
use geopanes_core::panel::{PanelKind, PanelState};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use time::OffsetDateTime;

/// Default number of records kept before least-recently-activated eviction.
pub const DEFAULT_HISTORY_CAP: usize = 256;

/// Projects an activated record onto a domain event, if it qualifies.
pub type Projector = fn(&ActiveComponentRecord) -> Option<DomainEvent>;

/// How records of closed or long-inactive components are dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum HistoryPolicy {
    /// Keep every record for the whole session
    Retain,
    /// Drop a record as soon as its container is removed from the layout
    PruneOnRemove,
    /// Keep at most `limit` records, evicting the least recently activated
    Capped { limit: usize },
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        HistoryPolicy::Capped {
            limit: DEFAULT_HISTORY_CAP,
        }
    }
}

/// Denormalized snapshot of one component known to the tracker.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveComponentRecord {
    pub id: String,
    pub component_type: PanelKind,
    pub state: PanelState,
    /// Caller-supplied extras, merged across registrations
    pub metadata: Map<String, Value>,
    /// metadata ∪ state (state keys win)
    pub merged_state: Map<String, Value>,
    pub last_active: Option<OffsetDateTime>,
    pub parent_stack_id: Option<StackId>,
    pub container_id: Option<ContainerId>,
    /// Activation order for LRU eviction; 0 = never activated
    activation: u64,
}

impl ActiveComponentRecord {
    fn new(id: String, state: PanelState) -> Self {
        let mut record = Self {
            id,
            component_type: state.kind(),
            state,
            metadata: Map::new(),
            merged_state: Map::new(),
            last_active: None,
            parent_stack_id: None,
            container_id: None,
            activation: 0,
        };
        record.remerge();
        record
    }

    /// Overwrite the state and merge in metadata (existing keys are replaced,
    /// other keys are kept).
    fn update(&mut self, state: PanelState, metadata: Map<String, Value>) {
        self.component_type = state.kind();
        self.state = state;
        self.metadata.extend(metadata);
        self.remerge();
    }

    fn remerge(&mut self) {
        let mut merged = self.metadata.clone();
        merged.extend(self.state.to_json_map());
        self.merged_state = merged;
    }

    /// String value of a merged-state key, if present and non-empty.
    pub fn merged_str(&self, key: &str) -> Option<&str> {
        self.merged_state
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// What the tracker remembers about a stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackRecord {
    pub id: StackId,
    pub child_ids: Vec<ContainerId>,
    pub active_container_id: Option<ContainerId>,
}

/// Input of `set_active_component`.
#[derive(Clone, Debug)]
pub struct ActivationInfo {
    /// Stable record id; synthesized from the kind when absent
    pub id: Option<String>,
    pub state: PanelState,
    pub metadata: Map<String, Value>,
    pub parent_stack_id: Option<StackId>,
    /// Live container backing the component, if any
    pub container_id: Option<ContainerId>,
}

impl ActivationInfo {
    pub fn new(state: PanelState) -> Self {
        Self {
            id: None,
            state,
            metadata: Map::new(),
            parent_stack_id: None,
            container_id: None,
        }
    }

    /// Activation of a live container: the record is keyed by the container id.
    pub fn for_container(container: &Container) -> Self {
        Self {
            id: Some(container.id().to_string()),
            state: container.state().clone(),
            metadata: Map::new(),
            parent_stack_id: Some(container.parent_stack_id()),
            container_id: Some(container.id()),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn in_stack(mut self, stack_id: StackId) -> Self {
        self.parent_stack_id = Some(stack_id);
        self
    }
}

/// `geocache-details` → `RecordSelected`. The short code may come from the
/// state or from metadata.
fn project_record_selected(record: &ActiveComponentRecord) -> Option<DomainEvent> {
    let PanelState::GeocacheDetails(details) = &record.state else {
        return None;
    };
    if details.geocache_id.is_empty() {
        return None;
    }
    let code = details
        .gc_code
        .clone()
        .or_else(|| record.merged_str("code").map(str::to_string));
    Some(DomainEvent::RecordSelected(RecordRef {
        record_id: details.geocache_id.clone(),
        code,
    }))
}

/// `geocaches-table` → `ZoneSelected`.
fn project_zone_selected(record: &ActiveComponentRecord) -> Option<DomainEvent> {
    let zone_id = record.merged_str("zoneId")?;
    Some(DomainEvent::ZoneSelected(ZoneRef {
        zone_id: zone_id.to_string(),
    }))
}

/// Tracks every known component and stack plus the current activation.
#[derive(Debug)]
pub struct ActiveStateTracker {
    records: HashMap<String, ActiveComponentRecord>,
    /// Record ids in first-registration order
    order: Vec<String>,
    stacks: HashMap<StackId, StackRecord>,
    active_component: Option<String>,
    active_stack: Option<StackId>,
    projectors: HashMap<PanelKind, Projector>,
    bus: EventBus,
    policy: HistoryPolicy,
    activation_seq: u64,
    id_seq: u64,
}

impl ActiveStateTracker {
    pub fn new(bus: EventBus) -> Self {
        Self::with_policy(bus, HistoryPolicy::default())
    }

    pub fn with_policy(bus: EventBus, policy: HistoryPolicy) -> Self {
        let mut projectors: HashMap<PanelKind, Projector> = HashMap::new();
        projectors.insert(PanelKind::GeocacheDetails, project_record_selected);
        projectors.insert(PanelKind::GeocachesTable, project_zone_selected);
        Self {
            records: HashMap::new(),
            order: Vec::new(),
            stacks: HashMap::new(),
            active_component: None,
            active_stack: None,
            projectors,
            bus,
            policy,
            activation_seq: 0,
            id_seq: 0,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn policy(&self) -> HistoryPolicy {
        self.policy
    }

    /// Install or replace the domain projector for a component type.
    /// Returns the one it replaced.
    pub fn register_projector(&mut self, kind: PanelKind, projector: Projector) -> Option<Projector> {
        self.projectors.insert(kind, projector)
    }

    pub fn remove_projector(&mut self, kind: PanelKind) -> Option<Projector> {
        self.projectors.remove(&kind)
    }

    // --- Stacks ---

    /// Upsert a stack snapshot. Safe to call repeatedly.
    pub fn register_stack(&mut self, stack: &Stack) {
        self.stacks.insert(
            stack.id(),
            StackRecord {
                id: stack.id(),
                child_ids: stack.child_ids(),
                active_container_id: stack.active_container_id(),
            },
        );
    }

    /// Forget a stack that left the layout. Clears the active stack pointer
    /// if it pointed there.
    pub fn forget_stack(&mut self, id: StackId) {
        self.stacks.remove(&id);
        if self.active_stack == Some(id) {
            self.active_stack = None;
        }
    }

    pub fn stack(&self, id: StackId) -> Option<&StackRecord> {
        self.stacks.get(&id)
    }

    pub fn active_stack(&self) -> Option<StackId> {
        self.active_stack
    }

    // --- Components ---

    /// Upsert the record of a live container, keyed by its container id.
    ///
    /// Metadata is merged into what earlier calls supplied. Does not change
    /// the current activation.
    pub fn register_container(&mut self, container: &Container, metadata: Map<String, Value>) -> String {
        let id = container.id().to_string();
        let record = self.upsert(&id, container.state().clone(), metadata);
        record.container_id = Some(container.id());
        record.parent_stack_id = Some(container.parent_stack_id());
        self.enforce_history_cap(&id);
        id
    }

    /// Make a component the current one and project it onto the bus.
    ///
    /// Without an explicit id a fresh one is synthesized, so two calls never
    /// share a record. Returns the record id.
    pub fn set_active_component(&mut self, info: ActivationInfo) -> String {
        let kind = info.state.kind();
        let now = OffsetDateTime::now_utc();
        let id = match info.id {
            Some(id) => id,
            None => {
                self.id_seq += 1;
                synthesize_component_id(kind.as_str(), now.unix_timestamp_nanos() / 1_000_000, self.id_seq)
            }
        };

        let known_stack = info
            .parent_stack_id
            .filter(|stack_id| self.stacks.contains_key(stack_id));

        self.activation_seq += 1;
        let activation = self.activation_seq;
        let record = self.upsert(&id, info.state, info.metadata);
        record.last_active = Some(now);
        record.activation = activation;
        if info.parent_stack_id.is_some() {
            record.parent_stack_id = info.parent_stack_id;
        }
        if info.container_id.is_some() {
            record.container_id = info.container_id;
        }

        self.active_component = Some(id.clone());
        if let Some(stack_id) = known_stack {
            self.active_stack = Some(stack_id);
        }
        log::debug!("Active component: {} ({})", id, kind);

        self.enforce_history_cap(&id);
        self.project(&id);
        id
    }

    fn upsert(&mut self, id: &str, state: PanelState, metadata: Map<String, Value>) -> &mut ActiveComponentRecord {
        if !self.records.contains_key(id) {
            self.order.push(id.to_string());
        }
        let record = self
            .records
            .entry(id.to_string())
            .or_insert_with(|| ActiveComponentRecord::new(id.to_string(), state.clone()));
        record.update(state, metadata);
        record
    }

    fn project(&self, id: &str) {
        let Some(record) = self.records.get(id) else {
            return;
        };
        let Some(projector) = self.projectors.get(&record.component_type) else {
            return;
        };
        if let Some(event) = projector(record) {
            log::debug!("{} projected to {}", id, event.kind());
            self.bus.publish(&event);
        }
    }

    /// The container left the layout. Under `PruneOnRemove` its record goes
    /// away; otherwise it stays queryable. Either way it stops being current.
    pub fn component_removed(&mut self, id: &str) {
        if self.active_component.as_deref() == Some(id) {
            self.active_component = None;
        }
        if self.policy == HistoryPolicy::PruneOnRemove {
            self.drop_record(id);
        }
    }

    fn drop_record(&mut self, id: &str) {
        if self.records.remove(id).is_some() {
            self.order.retain(|o| o != id);
        }
    }

    /// Evict down to the cap. `keep` (the record just touched) and the
    /// current record are never victims.
    fn enforce_history_cap(&mut self, keep: &str) {
        let HistoryPolicy::Capped { limit } = self.policy else {
            return;
        };
        while self.records.len() > limit.max(1) {
            // Least recently activated, oldest registration first on ties
            let victim = self
                .order
                .iter()
                .filter(|id| id.as_str() != keep && self.active_component.as_deref() != Some(id.as_str()))
                .filter_map(|id| self.records.get(id))
                .min_by_key(|r| r.activation)
                .map(|r| r.id.clone());
            match victim {
                Some(id) => {
                    log::debug!("Evicting component record {}", id);
                    self.drop_record(&id);
                }
                None => break,
            }
        }
    }

    // --- Queries ---

    pub fn active_component_info(&self) -> Option<&ActiveComponentRecord> {
        self.active_component.as_deref().and_then(|id| self.records.get(id))
    }

    pub fn active_component_id(&self) -> Option<&str> {
        self.active_component.as_deref()
    }

    pub fn record(&self, id: &str) -> Option<&ActiveComponentRecord> {
        self.records.get(id)
    }

    /// Every known record of a type (current and historical) in
    /// first-registration order. Callers must check liveness against the
    /// layout before reusing one.
    pub fn components_by_type(&self, kind: PanelKind) -> Vec<&ActiveComponentRecord> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .filter(|r| r.component_type == kind)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::state::{InsertTarget, LayoutTree};
    use geopanes_core::events::DomainEventKind;
    use geopanes_core::panel::TablePanelState;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    fn tracker() -> ActiveStateTracker {
        ActiveStateTracker::new(EventBus::new())
    }

    fn capture(bus: &EventBus, kind: DomainEventKind) -> Arc<Mutex<Vec<DomainEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(kind, move |event: &DomainEvent| {
            sink.lock().push(event.clone());
            Ok(())
        });
        seen
    }

    #[test]
    fn new_tracker_has_no_active_component() {
        let t = tracker();
        assert!(t.active_component_info().is_none());
        assert!(t.active_stack().is_none());
        assert!(t.is_empty());
    }

    #[test]
    fn synthesized_ids_never_collide() {
        let mut t = tracker();
        let a = t.set_active_component(ActivationInfo::new(PanelState::plugin("caesar")));
        let b = t.set_active_component(ActivationInfo::new(PanelState::plugin("caesar")));
        assert_ne!(a, b);
        assert!(a.starts_with("plugin-"));
        assert_eq!(t.components_by_type(PanelKind::Plugin).len(), 2);
        assert_eq!(t.active_component_id(), Some(b.as_str()));
    }

    #[test]
    fn explicit_id_is_idempotent() {
        let mut t = tracker();
        let info = ActivationInfo::new(PanelState::plugin("caesar")).with_id("p1");
        t.set_active_component(info.clone());
        let first = t.active_component_info().unwrap().clone();
        t.set_active_component(info);
        let second = t.active_component_info().unwrap();

        assert_eq!(t.len(), 1);
        assert_eq!(second.id, "p1");
        assert_eq!(second.merged_state, first.merged_state);
        assert_eq!(second.parent_stack_id, first.parent_stack_id);
        assert!(second.activation > first.activation);
    }

    #[test]
    fn merged_state_prefers_state_keys() {
        let mut t = tracker();
        let info = ActivationInfo::new(PanelState::plugin("caesar"))
            .with_id("p1")
            .with_metadata("pluginName", json!("overridden"))
            .with_metadata("source", json!("menu"));
        t.set_active_component(info);
        let record = t.record("p1").unwrap();
        assert_eq!(record.merged_state["pluginName"], json!("caesar"));
        assert_eq!(record.merged_state["source"], json!("menu"));
        assert_eq!(record.merged_state["kind"], json!("plugin"));
    }

    #[test]
    fn register_container_merges_metadata() {
        let mut tree = LayoutTree::new();
        let id = tree.insert(InsertTarget::Root, PanelState::plugin("a"), "A".into()).unwrap();
        let container = tree.container(id).unwrap();

        let mut t = tracker();
        let mut first = Map::new();
        first.insert("x".into(), json!(1));
        first.insert("y".into(), json!(1));
        let record_id = t.register_container(container, first);
        let mut second = Map::new();
        second.insert("y".into(), json!(2));
        t.register_container(container, second);

        let record = t.record(&record_id).unwrap();
        assert_eq!(record_id, id.to_string());
        assert_eq!(record.metadata["x"], json!(1));
        assert_eq!(record.metadata["y"], json!(2));
        assert_eq!(record.container_id, Some(id));
        assert!(record.last_active.is_none());
        assert!(t.active_component_info().is_none());
    }

    #[test]
    fn active_stack_follows_known_parent_only() {
        let mut tree = LayoutTree::new();
        let id = tree.insert(InsertTarget::Root, PanelState::plugin("a"), "A".into()).unwrap();
        let stack_id = tree.stack_of(id).unwrap();

        let mut t = tracker();
        t.set_active_component(ActivationInfo::new(PanelState::plugin("a")).in_stack(stack_id));
        assert!(t.active_stack().is_none());

        t.register_stack(tree.stack(stack_id).unwrap());
        t.set_active_component(ActivationInfo::new(PanelState::plugin("a")).in_stack(stack_id));
        assert_eq!(t.active_stack(), Some(stack_id));
        assert_eq!(t.stack(stack_id).unwrap().child_ids, vec![id]);

        t.forget_stack(stack_id);
        assert!(t.active_stack().is_none());
        assert!(t.stack(stack_id).is_none());
    }

    #[test]
    fn detail_activation_publishes_record_selected() {
        let bus = EventBus::new();
        let first = capture(&bus, DomainEventKind::RecordSelected);
        let second = capture(&bus, DomainEventKind::RecordSelected);
        let mut t = ActiveStateTracker::new(bus);

        t.set_active_component(
            ActivationInfo::new(PanelState::geocache_details("GC123", None))
                .with_metadata("code", json!("GC123")),
        );

        for seen in [first, second] {
            let events = seen.lock();
            assert_eq!(events.len(), 1);
            let record = events[0].record().unwrap();
            assert_eq!(record.record_id, "GC123");
            assert_eq!(record.code.as_deref(), Some("GC123"));
        }
    }

    #[test]
    fn table_activation_publishes_zone_selected() {
        let bus = EventBus::new();
        let seen = capture(&bus, DomainEventKind::ZoneSelected);
        let mut t = ActiveStateTracker::new(bus);
        t.set_active_component(ActivationInfo::new(PanelState::GeocachesTable(TablePanelState {
            zone_id: "z1".into(),
            zone_name: None,
        })));
        assert_eq!(
            *seen.lock(),
            vec![DomainEvent::ZoneSelected(ZoneRef { zone_id: "z1".into() })]
        );
    }

    #[test]
    fn non_significant_types_publish_nothing() {
        let bus = EventBus::new();
        let seen = capture(&bus, DomainEventKind::RecordSelected);
        let mut t = ActiveStateTracker::new(bus);
        t.set_active_component(ActivationInfo::new(PanelState::geocache_notes("GC1", None)));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn custom_projector_can_be_registered() {
        fn notes_projector(record: &ActiveComponentRecord) -> Option<DomainEvent> {
            match &record.state {
                PanelState::GeocacheNotes(s) => Some(DomainEvent::record_selected(&s.geocache_id, None)),
                _ => None,
            }
        }
        let bus = EventBus::new();
        let seen = capture(&bus, DomainEventKind::RecordSelected);
        let mut t = ActiveStateTracker::new(bus);
        assert!(t.register_projector(PanelKind::GeocacheNotes, notes_projector).is_none());
        t.set_active_component(ActivationInfo::new(PanelState::geocache_notes("GC7", None)));
        assert_eq!(seen.lock()[0].record().unwrap().record_id, "GC7");

        assert!(t.remove_projector(PanelKind::GeocacheDetails).is_some());
        t.set_active_component(ActivationInfo::new(PanelState::geocache_details("GC8", None)));
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn removed_components_stay_queryable_by_default() {
        let mut t = ActiveStateTracker::with_policy(EventBus::new(), HistoryPolicy::Retain);
        let id = t.set_active_component(ActivationInfo::new(PanelState::plugin("a")).with_id("c1"));
        t.component_removed(&id);
        assert!(t.active_component_info().is_none());
        assert_eq!(t.components_by_type(PanelKind::Plugin).len(), 1);
        assert!(t.record("c1").is_some());
    }

    #[test]
    fn prune_on_remove_drops_record() {
        let mut t = ActiveStateTracker::with_policy(EventBus::new(), HistoryPolicy::PruneOnRemove);
        t.set_active_component(ActivationInfo::new(PanelState::plugin("a")).with_id("c1"));
        t.set_active_component(ActivationInfo::new(PanelState::plugin("b")).with_id("c2"));
        t.component_removed("c1");
        assert!(t.record("c1").is_none());
        assert_eq!(t.active_component_id(), Some("c2"));
        assert_eq!(t.components_by_type(PanelKind::Plugin).len(), 1);
    }

    #[test]
    fn capped_history_evicts_least_recently_activated() {
        let mut t = ActiveStateTracker::with_policy(EventBus::new(), HistoryPolicy::Capped { limit: 2 });
        t.set_active_component(ActivationInfo::new(PanelState::plugin("a")).with_id("a"));
        t.set_active_component(ActivationInfo::new(PanelState::plugin("b")).with_id("b"));
        // touch "a" so "b" becomes the oldest activation
        t.set_active_component(ActivationInfo::new(PanelState::plugin("a")).with_id("a"));
        t.set_active_component(ActivationInfo::new(PanelState::plugin("c")).with_id("c"));

        assert_eq!(t.len(), 2);
        assert!(t.record("b").is_none());
        let ids: Vec<_> = t.components_by_type(PanelKind::Plugin).iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(t.active_component_id(), Some("c"));
    }

    #[test]
    fn capped_history_keeps_freshly_registered_container() {
        let mut tree = LayoutTree::new();
        let mut t = ActiveStateTracker::with_policy(EventBus::new(), HistoryPolicy::Capped { limit: 2 });
        let mut last = None;
        for name in ["a", "b", "c"] {
            let id = tree.insert(InsertTarget::Root, PanelState::plugin(name), name.into()).unwrap();
            let container = tree.container(id).unwrap();
            let record_id = t.register_container(container, Map::new());
            assert!(t.record(&record_id).is_some(), "{} evicted on registration", record_id);
            t.set_active_component(ActivationInfo::for_container(container));
            last = Some(id);
        }

        assert_eq!(t.len(), 2);
        assert!(t.record("container-1").is_none());
        let current = t.active_component_info().unwrap();
        assert_eq!(current.container_id, last);
        assert_eq!(current.parent_stack_id, tree.stack_of(last.unwrap()));
    }

    #[test]
    fn activating_a_container_links_its_record() {
        let mut tree = LayoutTree::new();
        let id = tree.insert(InsertTarget::Root, PanelState::plugin("a"), "A".into()).unwrap();
        let container = tree.container(id).unwrap();

        // no prior register_container: the record is created by activation
        let mut t = tracker();
        t.set_active_component(ActivationInfo::for_container(container));
        let record = t.active_component_info().unwrap();
        assert_eq!(record.id, id.to_string());
        assert_eq!(record.container_id, Some(id));
    }

    #[test]
    fn history_policy_serde_shape() {
        let json = serde_json::to_value(HistoryPolicy::default()).unwrap();
        assert_eq!(json, json!({"mode": "capped", "limit": DEFAULT_HISTORY_CAP}));
        let parsed: HistoryPolicy = serde_json::from_value(json!({"mode": "prune_on_remove"})).unwrap();
        assert_eq!(parsed, HistoryPolicy::PruneOnRemove);
    }
}
