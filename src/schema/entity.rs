//! Placed scene objects: kind, geometry, physics and open properties.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The kind of an entity.
///
/// Known kinds drive default sizes, default properties and physics; any
/// other string is kept verbatim as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityKind {
    Player,
    Enemy,
    Platform,
    Item,
    Background,
    Object,
    Custom(String),
}

impl EntityKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Player => "player",
            Self::Enemy => "enemy",
            Self::Platform => "platform",
            Self::Item => "item",
            Self::Background => "background",
            Self::Object => "object",
            Self::Custom(s) => s,
        }
    }

    /// Default footprint used when an entity arrives without a usable size.
    pub fn default_size(&self) -> Size {
        match self {
            Self::Player => Size::new(32.0, 48.0),
            Self::Enemy => Size::new(32.0, 32.0),
            Self::Platform => Size::new(100.0, 20.0),
            Self::Item => Size::new(16.0, 16.0),
            Self::Background => Size::new(800.0, 600.0),
            Self::Object | Self::Custom(_) => Size::new(32.0, 32.0),
        }
    }
}

impl Default for EntityKind {
    fn default() -> Self {
        Self::Object
    }
}

impl From<String> for EntityKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "player" => Self::Player,
            "enemy" => Self::Enemy,
            "platform" => Self::Platform,
            "item" => Self::Item,
            "background" => Self::Background,
            "object" => Self::Object,
            _ => Self::Custom(s),
        }
    }
}

impl From<&str> for EntityKind {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<EntityKind> for String {
    fn from(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Custom(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Rigid-body settings consumed by the game runtime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Physics {
    pub gravity: bool,
    #[serde(default = "default_collision")]
    pub collision: bool,
    #[serde(default)]
    pub mass: f64,
    #[serde(default)]
    pub friction: f64,
    #[serde(default)]
    pub restitution: f64,
}

fn default_collision() -> bool {
    true
}

impl Physics {
    /// Physics an entity of `kind` receives when none was authored.
    pub fn defaults_for(kind: &EntityKind) -> Self {
        let mass = match kind {
            EntityKind::Player => 1.0,
            EntityKind::Platform => 0.0,
            _ => 0.5,
        };
        Self {
            gravity: *kind != EntityKind::Platform,
            collision: true,
            mass,
            friction: 0.8,
            restitution: 0.2,
        }
    }
}

/// Collision bounds relative to the entity position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollisionBox {
    pub offset: Position,
    pub size: Size,
}

/// An entity is anything placed in a scene: the player, enemies, terrain,
/// pickups, backdrops or arbitrary props.
///
/// Typed fields cover what the pipeline reasons about. `properties` holds
/// gameplay values (type defaults merged under authored ones) and `extra`
/// keeps any other authored field so documents survive a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: EntityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub position: Position,
    pub size: Size,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprite: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physics: Option<Physics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collision_box: Option<CollisionBox>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity {
    pub fn new(id: impl Into<String>, kind: EntityKind, position: Position, size: Size) -> Self {
        Self {
            id: id.into(),
            kind,
            name: None,
            position,
            size,
            sprite: None,
            color: None,
            physics: None,
            collision_box: None,
            properties: Map::new(),
            extra: Map::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Axis-aligned bounding-box overlap; touching edges do not overlap.
    pub fn overlaps(&self, other: &Entity) -> bool {
        self.position.x < other.position.x + other.size.width
            && self.position.x + self.size.width > other.position.x
            && self.position.y < other.position.y + other.size.height
            && self.position.y + self.size.height > other.position.y
    }
}
