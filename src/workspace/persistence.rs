use geopanes_core::panel::{MapPanelState, PanelState};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current root config schema version - increment when making breaking changes
pub const ROOT_CONFIG_VERSION: u32 = 1;

/// Get the config directory path
pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("geopanes")
}

/// Get the static root layout file path
pub fn get_layout_path() -> PathBuf {
    get_config_dir().join("layout.json")
}

/// One component entry in the root config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
    pub state: PanelState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Recursive node of the static root layout.
///
/// A bare `component` gets wrapped in an implicit stack when the tree is built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConfigNode {
    Row {
        #[serde(default)]
        children: Vec<ConfigNode>,
    },
    Column {
        #[serde(default)]
        children: Vec<ConfigNode>,
    },
    Stack {
        #[serde(default)]
        children: Vec<ComponentConfig>,
        #[serde(default)]
        active: usize,
    },
    Component(ComponentConfig),
}

/// The static layout the session is rebuilt from on startup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RootConfig {
    /// Schema version for migration support
    #[serde(default = "default_root_config_version")]
    pub version: u32,
    pub root: ConfigNode,
}

fn default_root_config_version() -> u32 {
    0 // pre-versioning layout files
}

/// Normalize a config node in-place:
/// - Flatten rows directly inside rows and columns directly inside columns
/// - Drop stacks without components
/// - Clamp out-of-range active indices
pub(crate) fn normalize_config(node: &mut ConfigNode) {
    match node {
        ConfigNode::Row { children } | ConfigNode::Column { children } => {
            for child in children.iter_mut() {
                normalize_config(child);
            }
        }
        ConfigNode::Stack { children, active } => {
            if *active >= children.len() {
                *active = children.len().saturating_sub(1);
            }
            return;
        }
        ConfigNode::Component(_) => return,
    }

    let is_row = matches!(node, ConfigNode::Row { .. });
    if let ConfigNode::Row { children } | ConfigNode::Column { children } = node {
        let mut flattened = Vec::with_capacity(children.len());
        for child in children.drain(..) {
            match child {
                ConfigNode::Row { children: inner } if is_row => flattened.extend(inner),
                ConfigNode::Column { children: inner } if !is_row => flattened.extend(inner),
                ConfigNode::Stack { ref children, .. } if children.is_empty() => {
                    log::warn!("Dropping empty stack from root config");
                }
                other => flattened.push(other),
            }
        }
        *children = flattened;
    }
}

/// Validate and fix root config consistency.
/// Called after deserialization in all load paths.
pub(crate) fn validate_root_config(config: &mut RootConfig) {
    if !matches!(config.root, ConfigNode::Row { .. }) {
        log::warn!("Root config does not start with a row, wrapping it");
        let inner = std::mem::replace(&mut config.root, ConfigNode::Row { children: Vec::new() });
        config.root = ConfigNode::Row { children: vec![inner] };
    }
    normalize_config(&mut config.root);
}

/// Migrate root config from older versions to the current version
pub(crate) fn migrate_root_config(mut config: RootConfig) -> RootConfig {
    let original_version = config.version;

    if config.version == 0 {
        log::info!("Migrating root config from pre-versioning (v0) to v1");
        config.version = 1;
    }

    if original_version != config.version {
        log::info!("Root config migrated from v{} to v{}", original_version, config.version);
    }

    config
}

/// Parse a root config from JSON, migrating and validating it.
pub fn parse_root_config(content: &str) -> Result<RootConfig> {
    let config: RootConfig = serde_json::from_str(content)?;
    let mut config = migrate_root_config(config);
    validate_root_config(&mut config);
    Ok(config)
}

/// Load the root config from a file, or the default one when it does not exist.
pub fn load_root_config_from(path: &Path) -> Result<RootConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        parse_root_config(&content)
    } else {
        log::info!("No layout file at {}, using default layout", path.display());
        Ok(default_root_config())
    }
}

/// Load the root config from the standard location
pub fn load_root_config() -> Result<RootConfig> {
    load_root_config_from(&get_layout_path())
}

/// Default layout: map | chat over settings.
pub fn default_root_config() -> RootConfig {
    RootConfig {
        version: ROOT_CONFIG_VERSION,
        root: ConfigNode::Row {
            children: vec![
                ConfigNode::Component(ComponentConfig {
                    state: PanelState::Map(MapPanelState::default()),
                    title: Some("Map".to_string()),
                }),
                ConfigNode::Column {
                    children: vec![
                        ConfigNode::Component(ComponentConfig {
                            state: PanelState::Chat(Default::default()),
                            title: Some("Chat".to_string()),
                        }),
                        ConfigNode::Component(ComponentConfig {
                            state: PanelState::Settings(geopanes_core::panel::SettingsPanelState {
                                category: "general".to_string(),
                            }),
                            title: Some("Settings".to_string()),
                        }),
                    ],
                },
            ],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let json = r#"{
            "root": {"type": "row", "children": [
                {"type": "component", "state": {"kind": "plugin", "pluginName": "caesar"}, "title": "Caesar"}
            ]}
        }"#;
        let config = parse_root_config(json).unwrap();
        assert_eq!(config.version, ROOT_CONFIG_VERSION);
        match &config.root {
            ConfigNode::Row { children } => {
                assert_eq!(children.len(), 1);
                assert!(matches!(&children[0], ConfigNode::Component(c) if c.title.as_deref() == Some("Caesar")));
            }
            other => panic!("Expected row, got {:?}", other),
        }
    }

    #[test]
    fn non_row_root_is_wrapped() {
        let json = r#"{"version": 1, "root": {"type": "stack", "children": [
            {"state": {"kind": "chat"}}
        ]}}"#;
        let config = parse_root_config(json).unwrap();
        match &config.root {
            ConfigNode::Row { children } => assert!(matches!(children[0], ConfigNode::Stack { .. })),
            other => panic!("Expected row, got {:?}", other),
        }
    }

    #[test]
    fn nested_same_axis_is_flattened_and_empty_stacks_dropped() {
        let mut node = ConfigNode::Row {
            children: vec![
                ConfigNode::Row {
                    children: vec![ConfigNode::Component(ComponentConfig {
                        state: PanelState::plugin("a"),
                        title: None,
                    })],
                },
                ConfigNode::Stack { children: vec![], active: 0 },
                ConfigNode::Column { children: vec![] },
            ],
        };
        normalize_config(&mut node);
        match node {
            ConfigNode::Row { children } => {
                assert_eq!(children.len(), 2);
                assert!(matches!(children[0], ConfigNode::Component(_)));
                assert!(matches!(children[1], ConfigNode::Column { .. }));
            }
            other => panic!("Expected row, got {:?}", other),
        }
    }

    #[test]
    fn active_index_is_clamped() {
        let mut node = ConfigNode::Stack {
            children: vec![ComponentConfig { state: PanelState::plugin("a"), title: None }],
            active: 5,
        };
        normalize_config(&mut node);
        assert!(matches!(node, ConfigNode::Stack { active: 0, .. }));
    }

    #[test]
    fn missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_root_config_from(&dir.path().join("layout.json")).unwrap();
        assert_eq!(config, default_root_config());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_root_config_from(&path).is_err());
    }

    #[test]
    fn default_config_round_trips() {
        let config = default_root_config();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(parse_root_config(&json).unwrap(), config);
    }
}
