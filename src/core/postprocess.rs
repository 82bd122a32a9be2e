//! Postprocessing: turn a raw scene of unknown quality into a valid
//! [`SceneDocument`], and optionally enhance it.
//!
//! `process` never fails. Anything it cannot repair is replaced wholesale by
//! [`fallback::minimal_scene`].

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::core::fallback;
use crate::schema::asset::AssetDescriptor;
use crate::schema::entity::{CollisionBox, Entity, EntityKind, Physics, Position, Size};
use crate::schema::scene::{
    AssetRef, AudioCues, GameStyle, Lighting, SceneDocument, SceneMetadata,
};

/// Maximum number of asset references attached to a scene.
pub const DEFAULT_MAX_SCENE_ASSETS: usize = 10;

/// Horizontal gap left between entities separated by the de-overlap pass.
pub const OVERLAP_GAP: f64 = 10.0;

const DEFAULT_SCENE_NAME: &str = "Generated Scene";

const SCENE_KEYS: &[&str] = &[
    "id",
    "name",
    "style",
    "project_id",
    "created_at",
    "description",
    "metadata",
    "entities",
    "assets",
    "lighting",
    "audio",
];

const ENTITY_KEYS: &[&str] = &[
    "id",
    "type",
    "name",
    "position",
    "size",
    "sprite",
    "color",
    "physics",
    "collision_box",
    "properties",
];

/// Metadata keys recomputed on every pass; authored values are dropped.
const DERIVED_METADATA_KEYS: &[&str] = &[
    "entity_count",
    "asset_count",
    "style",
    "version",
    "processed_at",
];

#[derive(Debug, Error)]
pub enum PostprocessError {
    #[error("scene is not a JSON object")]
    NotAnObject,
    #[error("scene object is empty")]
    EmptyDocument,
    #[error("entities is not a sequence")]
    EntitiesNotSequence,
    #[error("entity at index {0} is not an object")]
    EntityNotObject(usize),
    #[error("processed scene failed validation")]
    Invalid,
}

/// Optional extras applied by [`Postprocessor::enhance`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhanceOptions {
    pub add_lighting: bool,
    pub add_audio: bool,
}

impl EnhanceOptions {
    pub fn with_lighting(mut self) -> Self {
        self.add_lighting = true;
        self
    }

    pub fn with_audio(mut self) -> Self {
        self.add_audio = true;
        self
    }
}

/// Gameplay properties an entity of `kind` starts with. Authored values
/// are merged over these.
pub fn default_properties(kind: &EntityKind) -> Map<String, Value> {
    let defaults = match kind {
        EntityKind::Player => json!({"health": 100, "speed": 5, "jump_power": 10}),
        EntityKind::Enemy => json!({"health": 50, "damage": 10, "speed": 3}),
        EntityKind::Platform => json!({"solid": true, "friction": 0.8}),
        EntityKind::Item => json!({"collectable": true, "value": 1}),
        EntityKind::Background => json!({"parallax": false, "depth": 0}),
        EntityKind::Object | EntityKind::Custom(_) => json!({}),
    };
    match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[derive(Debug, Clone)]
pub struct Postprocessor {
    max_assets: usize,
}

impl Default for Postprocessor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SCENE_ASSETS)
    }
}

impl Postprocessor {
    pub fn new(max_assets: usize) -> Self {
        Self { max_assets }
    }

    /// Normalize `raw` into a valid scene for `project_id`.
    ///
    /// When `assets` is non-empty, up to the configured cap are attached as
    /// references and the first image with a path becomes the first
    /// player's sprite. A result that fails [`validate`] is discarded in
    /// favour of the minimal scene.
    pub fn process(
        &self,
        raw: Value,
        project_id: &str,
        assets: Option<&[AssetDescriptor]>,
    ) -> SceneDocument {
        match self.normalize(raw, project_id, assets) {
            Ok(scene) => scene,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    project_id,
                    "unusable scene, substituting minimal scene"
                );
                fallback::minimal_scene(project_id)
            }
        }
    }

    /// [`process`](Self::process) without the substitution: reports why a
    /// document cannot be used.
    pub fn normalize(
        &self,
        raw: Value,
        project_id: &str,
        assets: Option<&[AssetDescriptor]>,
    ) -> Result<SceneDocument, PostprocessError> {
        let scene = self.try_process(raw, project_id, assets)?;
        if validate(&scene.to_value()) {
            Ok(scene)
        } else {
            Err(PostprocessError::Invalid)
        }
    }

    fn try_process(
        &self,
        raw: Value,
        project_id: &str,
        assets: Option<&[AssetDescriptor]>,
    ) -> Result<SceneDocument, PostprocessError> {
        let mut obj = match raw {
            Value::Object(map) if map.is_empty() => return Err(PostprocessError::EmptyDocument),
            Value::Object(map) => map,
            _ => return Err(PostprocessError::NotAnObject),
        };

        let id = coerce_id(obj.get("id")).unwrap_or_else(|| fallback::generated_id("scene"));
        let name = non_empty_str(obj.get("name"))
            .unwrap_or(DEFAULT_SCENE_NAME)
            .to_string();
        let style = non_empty_str(obj.get("style"))
            .map(GameStyle::from)
            .unwrap_or_default();
        let description = obj
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut entities = match obj.remove("entities") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Object(map) => Ok(normalize_entity(map)),
                    _ => Err(PostprocessError::EntityNotObject(i)),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(PostprocessError::EntitiesNotSequence),
        };

        let scene_assets = match assets {
            Some(descriptors) if !descriptors.is_empty() => {
                let attached = &descriptors[..descriptors.len().min(self.max_assets)];
                bind_player_sprite(&mut entities, attached);
                Some(attached.iter().map(asset_ref).collect())
            }
            _ => parse_raw_assets(obj.remove("assets")),
        };

        let lighting = take_typed::<Lighting>(&mut obj, "lighting");
        let audio = take_typed::<AudioCues>(&mut obj, "audio");
        let mut extra = Map::new();
        let raw_metadata = obj.remove("metadata");
        for (key, value) in obj {
            if !SCENE_KEYS.contains(&key.as_str()) {
                extra.insert(key, value);
            }
        }

        let metadata = SceneMetadata {
            entity_count: entities.len(),
            asset_count: scene_assets.as_ref().map(Vec::len).unwrap_or(0),
            style: style.clone(),
            processed_at: Some(Utc::now()),
            ..canvas_metadata(raw_metadata)
        };

        Ok(SceneDocument {
            id,
            name,
            style,
            project_id: project_id.to_string(),
            created_at: Utc::now(),
            description,
            metadata,
            entities,
            assets: scene_assets,
            lighting,
            audio,
            extra,
        })
    }

    /// Whether `scene` has the shape of a processed document.
    pub fn validate(&self, scene: &Value) -> bool {
        validate(scene)
    }

    /// Additive pass: default physics and collision boxes where absent, a
    /// single forward de-overlap sweep, then the requested extras.
    ///
    /// The sweep shifts the later entity of each overlapping pair right by
    /// the earlier entity's width plus [`OVERLAP_GAP`]. A shift can create a
    /// new overlap with a third entity; that overlap is left in place.
    pub fn enhance(&self, mut scene: SceneDocument, options: &EnhanceOptions) -> SceneDocument {
        for entity in &mut scene.entities {
            if entity.physics.is_none() {
                entity.physics = Some(Physics::defaults_for(&entity.kind));
            }
            if entity.collision_box.is_none() {
                entity.collision_box = Some(CollisionBox {
                    offset: Position::default(),
                    size: entity.size,
                });
            }
        }

        let shifted = separate_overlaps(&mut scene.entities);
        if shifted > 0 {
            tracing::debug!(scene_id = %scene.id, shifted, "separated overlapping entities");
        }

        if options.add_lighting {
            scene.lighting = Some(Lighting::default());
        }
        if options.add_audio {
            scene.audio = Some(AudioCues::default());
        }
        scene
    }
}

/// Structural check on the JSON form of a scene.
///
/// Requires `id`, `name`, `style` and an `entities` array. Every entity
/// needs `id`, `type`, a `position` with `x`/`y` and a `size` with
/// `width`/`height`. Present means the key exists and is not null; value
/// types and ranges are the normalizer's concern.
pub fn validate(scene: &Value) -> bool {
    let Some(obj) = scene.as_object() else {
        return false;
    };
    if !["id", "name", "style"].iter().all(|k| present(obj.get(*k))) {
        return false;
    }
    match obj.get("entities") {
        Some(Value::Array(entities)) => entities.iter().all(validate_entity),
        _ => false,
    }
}

fn validate_entity(entity: &Value) -> bool {
    let Some(obj) = entity.as_object() else {
        return false;
    };
    present(obj.get("id"))
        && present(obj.get("type"))
        && has_fields(obj.get("position"), &["x", "y"])
        && has_fields(obj.get("size"), &["width", "height"])
}

fn present(value: Option<&Value>) -> bool {
    value.map_or(false, |v| !v.is_null())
}

fn has_fields(value: Option<&Value>, keys: &[&str]) -> bool {
    match value {
        Some(Value::Object(obj)) => keys.iter().all(|k| present(obj.get(*k))),
        _ => false,
    }
}

/// Single forward sweep; returns the number of shifts applied.
fn separate_overlaps(entities: &mut [Entity]) -> usize {
    let mut shifted = 0;
    for i in 0..entities.len() {
        for j in (i + 1)..entities.len() {
            let shift = {
                let (earlier, later) = (&entities[i], &entities[j]);
                earlier
                    .overlaps(later)
                    .then(|| earlier.size.width + OVERLAP_GAP)
            };
            if let Some(dx) = shift {
                entities[j].position.x += dx;
                shifted += 1;
            }
        }
    }
    shifted
}

fn normalize_entity(mut obj: Map<String, Value>) -> Entity {
    let id = coerce_id(obj.get("id")).unwrap_or_else(|| fallback::generated_id("entity"));
    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .map(EntityKind::from)
        .unwrap_or_default();
    let name = obj.get("name").and_then(Value::as_str).map(str::to_string);
    let sprite = obj.get("sprite").and_then(Value::as_str).map(str::to_string);
    let color = obj.get("color").and_then(Value::as_str).map(str::to_string);
    let position = normalize_position(obj.get("position"));
    let size = normalize_size(obj.get("size"), &kind);

    let mut properties = default_properties(&kind);
    let mut authored = match obj.remove("properties") {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    let mut physics = obj
        .remove("physics")
        .and_then(|value| merged_physics(value, &kind));
    if physics.is_none() {
        // Physics authored inside properties is lifted to the typed field.
        if let Some(parsed) = authored
            .get("physics")
            .cloned()
            .and_then(|value| merged_physics(value, &kind))
        {
            physics = Some(parsed);
            authored.remove("physics");
        }
    }
    let collision_box = take_typed::<CollisionBox>(&mut obj, "collision_box");

    properties.extend(authored);
    let mut extra = Map::new();
    for (key, value) in obj {
        if !ENTITY_KEYS.contains(&key.as_str()) {
            extra.insert(key, value);
        }
    }

    Entity {
        id,
        kind,
        name,
        position,
        size,
        sprite,
        color,
        physics,
        collision_box,
        properties,
        extra,
    }
}

/// Result of reading one numeric component.
enum Component {
    Number(f64),
    Blank,
    Invalid,
}

fn component(value: Option<&Value>) -> Component {
    match value {
        None | Some(Value::Null) => Component::Blank,
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if f.is_finite() => Component::Number(f),
            _ => Component::Invalid,
        },
        Some(Value::String(s)) if s.trim().is_empty() => Component::Blank,
        Some(Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => Component::Number(f),
            _ => Component::Invalid,
        },
        Some(_) => Component::Invalid,
    }
}

/// Missing or blank components read as zero. Any unparsable component, or
/// a non-object position, yields the origin.
pub fn normalize_position(value: Option<&Value>) -> Position {
    let Some(Value::Object(obj)) = value else {
        return Position::default();
    };
    let read = |key: &str| match component(obj.get(key)) {
        Component::Number(n) => Some(n),
        Component::Blank => Some(0.0),
        Component::Invalid => None,
    };
    match (read("x"), read("y")) {
        (Some(x), Some(y)) => Position::new(x, y),
        _ => Position::default(),
    }
}

/// Missing, blank or negative components take the kind's default. A
/// non-object size, or any unparsable component, yields the kind's default
/// size.
pub fn normalize_size(value: Option<&Value>, kind: &EntityKind) -> Size {
    let default = kind.default_size();
    let Some(Value::Object(obj)) = value else {
        return default;
    };
    let read = |key: &str, fallback: f64| match component(obj.get(key)) {
        Component::Number(n) if n >= 0.0 => Some(n),
        Component::Number(_) | Component::Blank => Some(fallback),
        Component::Invalid => None,
    };
    match (read("width", default.width), read("height", default.height)) {
        (Some(width), Some(height)) => Size::new(width, height),
        _ => default,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn coerce_id(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Remove `key` from `obj` and parse it as `T`. Values that do not parse
/// are dropped, so the typed field is the only copy of the key.
fn take_typed<T: DeserializeOwned>(obj: &mut Map<String, Value>, key: &str) -> Option<T> {
    match obj.remove(key) {
        None | Some(Value::Null) => None,
        Some(value) => match serde_json::from_value::<T>(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::debug!(key, error = %e, "dropping unparsable authored block");
                None
            }
        },
    }
}

/// Authored physics merged over the kind's defaults, so a partial block
/// like `{"mass": 2.0}` keeps the remaining default fields.
fn merged_physics(value: Value, kind: &EntityKind) -> Option<Physics> {
    let Value::Object(authored) = value else {
        tracing::debug!(%kind, "dropping non-object physics block");
        return None;
    };
    let mut merged = match serde_json::to_value(Physics::defaults_for(kind)) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    merged.extend(authored);
    match serde_json::from_value(Value::Object(merged)) {
        Ok(physics) => Some(physics),
        Err(e) => {
            tracing::debug!(%kind, error = %e, "dropping unparsable physics block");
            None
        }
    }
}

fn asset_ref(descriptor: &AssetDescriptor) -> AssetRef {
    AssetRef {
        id: descriptor.id.clone(),
        kind: descriptor.kind.clone(),
        path: descriptor.path.clone(),
    }
}

fn parse_raw_assets(value: Option<Value>) -> Option<Vec<AssetRef>> {
    match value {
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
        ),
        _ => None,
    }
}

fn bind_player_sprite(entities: &mut [Entity], assets: &[AssetDescriptor]) {
    let Some(path) = assets
        .iter()
        .filter(|a| a.is_image())
        .find_map(|a| a.path.as_deref())
    else {
        return;
    };
    if let Some(player) = entities.iter_mut().find(|e| e.kind == EntityKind::Player) {
        player.sprite = Some(path.to_string());
    }
}

/// Canvas settings carried over from authored metadata; everything else
/// authored there except derived keys lands in `extra`.
fn canvas_metadata(raw: Option<Value>) -> SceneMetadata {
    let mut metadata = SceneMetadata::default();
    let Some(Value::Object(obj)) = raw else {
        return metadata;
    };
    for (key, value) in obj {
        match key.as_str() {
            "width" => {
                if let Some(w) = value.as_f64() {
                    metadata.width = w;
                }
            }
            "height" => {
                if let Some(h) = value.as_f64() {
                    metadata.height = h;
                }
            }
            "background_color" => {
                if let Some(c) = value.as_str() {
                    metadata.background_color = c.to_string();
                }
            }
            k if DERIVED_METADATA_KEYS.contains(&k) => {}
            _ => {
                metadata.extra.insert(key, value);
            }
        }
    }
    metadata
}
