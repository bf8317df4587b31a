use crate::panel::{MapPanelState, PanelState};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Remote content source ───────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// One request against the remote content source, built from a panel's state.
#[derive(Clone, Debug, PartialEq)]
pub struct PanelRequest {
    pub method: HttpMethod,
    /// Path relative to the backend base URL, always starting with '/'.
    pub path: String,
    pub body: Option<Value>,
}

impl PanelRequest {
    fn get(path: String) -> Self {
        Self { method: HttpMethod::Get, path, body: None }
    }

    /// Route a panel state to the request that produces its content.
    pub fn for_state(state: &PanelState) -> Self {
        match state {
            PanelState::GeocacheDetails(s) => {
                Self::get(format!("/api/geocaches/{}/details-panel", encode_segment(&s.geocache_id)))
            }
            PanelState::GeocacheNotes(s) => {
                Self::get(format!("/api/geocaches/{}/notes-panel", encode_segment(&s.geocache_id)))
            }
            PanelState::GeocachesTable(s) => {
                Self::get(format!("/api/zones/{}/geocaches-panel", encode_segment(&s.zone_id)))
            }
            PanelState::Map(MapPanelState { geocache_id: Some(id), .. }) => {
                Self::get(format!("/api/geocaches/{}/map-panel", encode_segment(id)))
            }
            PanelState::Map(MapPanelState { zone_id: Some(id), .. }) => {
                Self::get(format!("/api/zones/{}/map-panel", encode_segment(id)))
            }
            PanelState::Map(_) => Self::get("/api/map-panel".to_string()),
            PanelState::Plugin(s) => {
                let mut body = Map::new();
                body.insert("inputs".to_string(), Value::Object(s.inputs.clone()));
                if let Some(id) = &s.geocache_id {
                    body.insert("geocacheId".to_string(), Value::String(id.clone()));
                }
                Self {
                    method: HttpMethod::Post,
                    path: format!("/api/plugins/{}/interface", encode_segment(&s.plugin_name)),
                    body: Some(Value::Object(body)),
                }
            }
            PanelState::ImageEditor(s) => Self::get(format!(
                "/api/geocaches/{}/images/{}/editor",
                encode_segment(&s.geocache_id),
                encode_segment(&s.image_id)
            )),
            PanelState::Alphabet(s) => {
                Self::get(format!("/api/alphabets/{}/panel", encode_segment(&s.alphabet_id)))
            }
            PanelState::Chat(s) => match &s.conversation_id {
                Some(id) => Self::get(format!("/api/chat/{}/panel", encode_segment(id))),
                None => Self::get("/api/chat/panel".to_string()),
            },
            PanelState::Settings(s) => {
                Self::get(format!("/api/settings/{}/panel", encode_segment(&s.category)))
            }
        }
    }
}

/// Error body returned by the backend on non-2xx responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ── Settings store ──────────────────────────────────────────────────────────

/// Key of the preference deciding where newly opened panels go.
pub const OPEN_IN_ACTIVE_STACK_KEY: &str = "layout.open_in_active_stack";

/// GET /api/settings/{key} response
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SettingResponse {
    pub key: String,
    pub value: Value,
}

/// GET /api/settings?category={category} response
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SettingsCategoryResponse {
    pub category: String,
    #[serde(default)]
    pub settings: Map<String, Value>,
}

/// POST /api/settings request body
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SaveSettingRequest {
    pub key: String,
    pub value: Value,
}

/// Interpret a "boolean-ish" preference value.
///
/// The settings store is loosely typed: the same flag may come back as a
/// JSON bool, a number, or a string. Anything unrecognised yields None.
pub fn parse_bool_preference(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Percent-encode one path segment (RFC 3986 unreserved characters pass through).
pub fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}
