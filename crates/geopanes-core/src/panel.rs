//! Panel kinds and their typed state.
//!
//! Every panel type has its own state schema. The state is the only part of
//! a container that survives a reload, so it stays plain serializable data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// The closed set of component types a layout can instantiate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PanelKind {
    GeocacheDetails,
    GeocacheNotes,
    GeocachesTable,
    Map,
    Plugin,
    ImageEditor,
    Alphabet,
    Chat,
    Settings,
}

impl PanelKind {
    pub const ALL: [PanelKind; 9] = [
        PanelKind::GeocacheDetails,
        PanelKind::GeocacheNotes,
        PanelKind::GeocachesTable,
        PanelKind::Map,
        PanelKind::Plugin,
        PanelKind::ImageEditor,
        PanelKind::Alphabet,
        PanelKind::Chat,
        PanelKind::Settings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PanelKind::GeocacheDetails => "geocache-details",
            PanelKind::GeocacheNotes => "geocache-notes",
            PanelKind::GeocachesTable => "geocaches-table",
            PanelKind::Map => "map",
            PanelKind::Plugin => "plugin",
            PanelKind::ImageEditor => "image-editor",
            PanelKind::Alphabet => "alphabet",
            PanelKind::Chat => "chat",
            PanelKind::Settings => "settings",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PanelKind::GeocacheDetails => "Geocache",
            PanelKind::GeocacheNotes => "Notes",
            PanelKind::GeocachesTable => "Geocaches",
            PanelKind::Map => "Map",
            PanelKind::Plugin => "Plugin",
            PanelKind::ImageEditor => "Image Editor",
            PanelKind::Alphabet => "Alphabet",
            PanelKind::Chat => "Chat",
            PanelKind::Settings => "Settings",
        }
    }
}

impl fmt::Display for PanelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown component type: {0}")]
pub struct PanelKindError(pub String);

impl FromStr for PanelKind {
    type Err = PanelKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PanelKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| PanelKindError(s.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailPanelState {
    pub geocache_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gc_code: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotesPanelState {
    pub geocache_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gc_code: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePanelState {
    pub zone_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapPanelState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geocache_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginPanelState {
    pub plugin_name: String,
    /// Last form values entered in the plugin panel.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub inputs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geocache_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageEditorPanelState {
    pub geocache_id: String,
    pub image_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlphabetPanelState {
    pub alphabet_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPanelState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPanelState {
    pub category: String,
}

/// Typed state of one panel, tagged by its component type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PanelState {
    GeocacheDetails(DetailPanelState),
    GeocacheNotes(NotesPanelState),
    GeocachesTable(TablePanelState),
    Map(MapPanelState),
    Plugin(PluginPanelState),
    ImageEditor(ImageEditorPanelState),
    Alphabet(AlphabetPanelState),
    Chat(ChatPanelState),
    Settings(SettingsPanelState),
}

impl PanelState {
    pub fn kind(&self) -> PanelKind {
        match self {
            PanelState::GeocacheDetails(_) => PanelKind::GeocacheDetails,
            PanelState::GeocacheNotes(_) => PanelKind::GeocacheNotes,
            PanelState::GeocachesTable(_) => PanelKind::GeocachesTable,
            PanelState::Map(_) => PanelKind::Map,
            PanelState::Plugin(_) => PanelKind::Plugin,
            PanelState::ImageEditor(_) => PanelKind::ImageEditor,
            PanelState::Alphabet(_) => PanelKind::Alphabet,
            PanelState::Chat(_) => PanelKind::Chat,
            PanelState::Settings(_) => PanelKind::Settings,
        }
    }

    pub fn plugin(name: &str) -> Self {
        PanelState::Plugin(PluginPanelState {
            plugin_name: name.to_string(),
            inputs: Map::new(),
            geocache_id: None,
        })
    }

    pub fn geocache_details(geocache_id: &str, gc_code: Option<&str>) -> Self {
        PanelState::GeocacheDetails(DetailPanelState {
            geocache_id: geocache_id.to_string(),
            gc_code: gc_code.map(str::to_string),
        })
    }

    pub fn geocache_notes(geocache_id: &str, gc_code: Option<&str>) -> Self {
        PanelState::GeocacheNotes(NotesPanelState {
            geocache_id: geocache_id.to_string(),
            gc_code: gc_code.map(str::to_string),
        })
    }

    /// Value that distinguishes two panels of the same kind.
    ///
    /// Two panels with the same kind and identity key show the same thing,
    /// e.g. the same plugin or the same geocache.
    pub fn identity_key(&self) -> Option<String> {
        match self {
            PanelState::GeocacheDetails(s) => Some(s.geocache_id.clone()),
            PanelState::GeocacheNotes(s) => Some(s.geocache_id.clone()),
            PanelState::GeocachesTable(s) => Some(s.zone_id.clone()),
            PanelState::Map(s) => s.geocache_id.clone().or_else(|| s.zone_id.clone()),
            PanelState::Plugin(s) => Some(s.plugin_name.clone()),
            PanelState::ImageEditor(s) => Some(format!("{}/{}", s.geocache_id, s.image_id)),
            PanelState::Alphabet(s) => Some(s.alphabet_id.clone()),
            PanelState::Chat(s) => s.conversation_id.clone(),
            PanelState::Settings(s) => Some(s.category.clone()),
        }
    }

    /// Title used when a panel is opened without an explicit one.
    pub fn default_title(&self) -> String {
        match self {
            PanelState::GeocacheDetails(s) => s
                .gc_code
                .clone()
                .unwrap_or_else(|| format!("Geocache {}", s.geocache_id)),
            PanelState::GeocacheNotes(s) => match &s.gc_code {
                Some(code) => format!("Notes {}", code),
                None => "Notes".to_string(),
            },
            PanelState::GeocachesTable(s) => s.zone_name.clone().unwrap_or_else(|| "Geocaches".to_string()),
            PanelState::Plugin(s) => s.plugin_name.clone(),
            other => other.kind().display_name().to_string(),
        }
    }

    /// The state as a JSON object (the `kind` tag included).
    pub fn to_json_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Content produced for a panel: an HTML fragment to inject or JSON to render.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "lowercase")]
pub enum PanelContent {
    Html(String),
    Json(Value),
}

impl PanelContent {
    pub fn is_html(&self) -> bool {
        matches!(self, PanelContent::Html(_))
    }
}
