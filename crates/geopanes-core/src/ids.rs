use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one container (panel instance) inside a layout tree.
///
/// Ids are handed out by the owning tree from a monotonically increasing
/// counter and are never reused for the lifetime of that tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(u64);

impl ContainerId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "container-{}", self.0)
    }
}

/// Identifier of a stack (tabbed group of containers).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackId(u64);

impl StackId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stack-{}", self.0)
    }
}

/// Build an activation id for a component that was activated without one.
///
/// Format: "{kind}-{unix_millis}-{sequence}". The sequence keeps two calls
/// within the same millisecond distinct.
pub fn synthesize_component_id(kind: &str, unix_millis: i128, sequence: u64) -> String {
    format!("{}-{}-{}", kind, unix_millis, sequence)
}
