//! Fixed documents used when nothing better is available.

use chrono::Utc;
use serde_json::{json, Value};

use crate::schema::entity::{Entity, EntityKind, Position, Size};
use crate::schema::scene::{GameStyle, SceneDocument, SceneMetadata};

/// Raw two-entity scene (player + ground) returned when inference breaks or
/// the reference library is empty.
pub fn error_scene() -> Value {
    json!({
        "id": format!("scene_error_{}", Utc::now().timestamp()),
        "name": "Error Fallback Scene",
        "description": "Minimal scene generated due to processing error",
        "style": "platformer",
        "metadata": {
            "width": 800,
            "height": 600,
            "background_color": "#333333",
            "error_fallback": true
        },
        "entities": [
            {
                "id": "player_default",
                "type": "player",
                "name": "Default Player",
                "position": {"x": 100, "y": 300},
                "size": {"width": 32, "height": 48},
                "properties": {"health": 100, "color": "#FF0000"}
            },
            {
                "id": "platform_default",
                "type": "platform",
                "name": "Default Ground",
                "position": {"x": 0, "y": 400},
                "size": {"width": 800, "height": 200},
                "properties": {"color": "#654321", "collision": true}
            }
        ]
    })
}

/// Processed single-player scene substituted when postprocessing cannot
/// produce a valid document.
pub fn minimal_scene(project_id: &str) -> SceneDocument {
    let player = Entity::new(
        "player_default",
        EntityKind::Player,
        Position::new(100.0, 100.0),
        Size::new(32.0, 48.0),
    )
    .with_property("health", json!(100));

    SceneDocument {
        id: generated_id("scene"),
        name: "Minimal Scene".to_string(),
        style: GameStyle::Platformer,
        project_id: project_id.to_string(),
        created_at: Utc::now(),
        description: None,
        metadata: SceneMetadata {
            entity_count: 1,
            asset_count: 0,
            ..SceneMetadata::default()
        },
        entities: vec![player],
        assets: None,
        lighting: None,
        audio: None,
        extra: Default::default(),
    }
}

/// `{prefix}_` followed by eight hex characters.
pub fn generated_id(prefix: &str) -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &uuid[..8])
}
