//! The scene document: the canonical output describing one game level.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::entity::Entity;

/// Version tag stamped into processed scene metadata.
pub const SCENE_FORMAT_VERSION: &str = "1.0.0";

/// Game genre a scene is authored for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GameStyle {
    Platformer,
    Shooter,
    Puzzle,
    Rpg,
    Adventure,
    Custom(String),
}

impl GameStyle {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Platformer => "platformer",
            Self::Shooter => "shooter",
            Self::Puzzle => "puzzle",
            Self::Rpg => "rpg",
            Self::Adventure => "adventure",
            Self::Custom(s) => s,
        }
    }
}

impl Default for GameStyle {
    fn default() -> Self {
        Self::Platformer
    }
}

impl From<String> for GameStyle {
    fn from(s: String) -> Self {
        match s.as_str() {
            "platformer" => Self::Platformer,
            "shooter" => Self::Shooter,
            "puzzle" => Self::Puzzle,
            "rpg" => Self::Rpg,
            "adventure" => Self::Adventure,
            _ => Self::Custom(s),
        }
    }
}

impl From<&str> for GameStyle {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<GameStyle> for String {
    fn from(style: GameStyle) -> Self {
        match style {
            GameStyle::Custom(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for GameStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canvas settings plus counts derived during postprocessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneMetadata {
    pub width: f64,
    pub height: f64,
    pub background_color: String,
    #[serde(default)]
    pub entity_count: usize,
    #[serde(default)]
    pub asset_count: usize,
    #[serde(default)]
    pub style: GameStyle,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_version() -> String {
    SCENE_FORMAT_VERSION.to_string()
}

impl Default for SceneMetadata {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            background_color: "#87CEEB".to_string(),
            entity_count: 0,
            asset_count: 0,
            style: GameStyle::default(),
            version: default_version(),
            processed_at: None,
            extra: Map::new(),
        }
    }
}

/// Lightweight pointer from a scene to a project asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRef {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub color: String,
    pub intensity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lighting {
    pub ambient: Light,
    pub directional: Light,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient: Light {
                color: "#ffffff".to_string(),
                intensity: 0.5,
                angle: None,
            },
            directional: Light {
                color: "#ffff00".to_string(),
                intensity: 0.8,
                angle: Some(45.0),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioCues {
    pub background_music: String,
    pub ambient_sounds: Vec<String>,
}

impl Default for AudioCues {
    fn default() -> Self {
        Self {
            background_music: "assets/audio/theme.mp3".to_string(),
            ambient_sounds: vec!["assets/audio/wind.mp3".to_string()],
        }
    }
}

/// A processed, validated scene. Produced by the postprocessor and owned
/// by the caller afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    pub id: String,
    pub name: String,
    pub style: GameStyle,
    pub project_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: SceneMetadata,
    pub entities: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<Vec<AssetRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lighting: Option<Lighting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioCues>,
    /// Authored top-level fields the pipeline does not interpret
    /// (layers, events, validation hints, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SceneDocument {
    /// The JSON form of this document, as persisted and validated.
    pub fn to_value(&self) -> Value {
        // Non-finite floats serialize to null, which validation rejects.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::entity::{EntityKind, Position, Size};
    use serde_json::json;

    fn make_scene() -> SceneDocument {
        SceneDocument {
            id: "scene_1".to_string(),
            name: "Test".to_string(),
            style: GameStyle::Platformer,
            project_id: "p1".to_string(),
            created_at: Utc::now(),
            description: None,
            metadata: SceneMetadata::default(),
            entities: vec![Entity::new(
                "hero",
                EntityKind::Player,
                Position::new(0.0, 0.0),
                Size::new(32.0, 48.0),
            )],
            assets: None,
            lighting: None,
            audio: None,
            extra: Map::new(),
        }
    }

    #[test]
    fn style_parsing() {
        assert_eq!(GameStyle::from("rpg"), GameStyle::Rpg);
        assert_eq!(GameStyle::from("metroidvania").as_str(), "metroidvania");
        assert_eq!(GameStyle::default().to_string(), "platformer");
    }

    #[test]
    fn to_value_shape() {
        let mut scene = make_scene();
        scene.extra.insert("layers".to_string(), json!(["bg", "fg"]));
        let value = scene.to_value();
        assert_eq!(value["style"], "platformer");
        assert_eq!(value["entities"][0]["type"], "player");
        assert_eq!(value["layers"], json!(["bg", "fg"]));
        assert!(value.get("lighting").is_none());
        assert_eq!(value["metadata"]["version"], SCENE_FORMAT_VERSION);
    }

    #[test]
    fn entity_lookup() {
        let scene = make_scene();
        assert!(scene.entity("hero").is_some());
        assert!(scene.entity("ghost").is_none());
    }

    #[test]
    fn fixed_enhancement_blocks() {
        let lighting = serde_json::to_value(Lighting::default()).unwrap();
        assert_eq!(lighting["ambient"]["intensity"], 0.5);
        assert_eq!(lighting["directional"]["angle"], 45.0);
        assert!(lighting["ambient"].get("angle").is_none());

        let audio = AudioCues::default();
        assert_eq!(audio.background_music, "assets/audio/theme.mp3");
        assert_eq!(audio.ambient_sounds.len(), 1);
    }
}
