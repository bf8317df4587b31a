//! Domain events exchanged between otherwise unrelated panels.
//!
//! These are application-level notifications ("a geocache was selected"),
//! derived from but distinct from raw UI focus changes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a domain event, used as the subscription key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DomainEventKind {
    RecordSelected,
    ZoneSelected,
}

impl DomainEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainEventKind::RecordSelected => "recordSelected",
            DomainEventKind::ZoneSelected => "zoneSelected",
        }
    }
}

impl fmt::Display for DomainEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimal shape of a selected record: its id and an optional short code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRef {
    pub record_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneRef {
    pub zone_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "detail", rename_all = "camelCase")]
pub enum DomainEvent {
    RecordSelected(RecordRef),
    ZoneSelected(ZoneRef),
}

impl DomainEvent {
    pub fn kind(&self) -> DomainEventKind {
        match self {
            DomainEvent::RecordSelected(_) => DomainEventKind::RecordSelected,
            DomainEvent::ZoneSelected(_) => DomainEventKind::ZoneSelected,
        }
    }

    pub fn record_selected(record_id: &str, code: Option<&str>) -> Self {
        DomainEvent::RecordSelected(RecordRef {
            record_id: record_id.to_string(),
            code: code.map(str::to_string),
        })
    }

    /// The selected record, if this event carries one.
    pub fn record(&self) -> Option<&RecordRef> {
        match self {
            DomainEvent::RecordSelected(record) => Some(record),
            DomainEvent::ZoneSelected(_) => None,
        }
    }
}
