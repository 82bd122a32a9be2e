//! Asset records flowing into generation.
//!
//! `AssetDescriptor` is what the surrounding service resolves from asset ids
//! before a request reaches the pipeline. `AssetSummary` is the reduced form
//! embedded in a generation context.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata keys that survive into a generation context. Everything else
/// (EXIF remnants, uploader info, storage keys) is dropped.
pub const METADATA_WHITELIST: &[&str] = &["width", "height", "duration", "format", "size"];

/// A project asset as known to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl AssetDescriptor {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            name: String::new(),
            path: None,
            metadata: Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn is_image(&self) -> bool {
        self.kind == "image"
    }
}

/// Privacy-filtered view of an asset for prompt construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub metadata: Map<String, Value>,
}

impl From<&AssetDescriptor> for AssetSummary {
    fn from(asset: &AssetDescriptor) -> Self {
        let metadata = asset
            .metadata
            .iter()
            .filter(|(k, _)| METADATA_WHITELIST.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self {
            id: asset.id.clone(),
            kind: asset.kind.clone(),
            name: asset.name.clone(),
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summary_keeps_only_whitelisted_metadata() {
        let asset = AssetDescriptor::new("a1", "image")
            .with_name("hero.png")
            .with_path("assets/hero.png")
            .with_metadata("width", json!(64))
            .with_metadata("height", json!(64))
            .with_metadata("format", json!("png"))
            .with_metadata("gps_latitude", json!(52.1))
            .with_metadata("uploader_email", json!("someone@example.com"));

        let summary = AssetSummary::from(&asset);
        assert_eq!(summary.id, "a1");
        assert_eq!(summary.kind, "image");
        assert_eq!(summary.name, "hero.png");
        assert_eq!(summary.metadata.len(), 3);
        assert!(summary.metadata.contains_key("width"));
        assert!(!summary.metadata.contains_key("gps_latitude"));
        assert!(!summary.metadata.contains_key("uploader_email"));
    }

    #[test]
    fn descriptor_deserializes_with_defaults() {
        let asset: AssetDescriptor =
            serde_json::from_value(json!({"id": "s1", "type": "audio"})).unwrap();
        assert_eq!(asset.kind, "audio");
        assert!(asset.name.is_empty());
        assert!(asset.path.is_none());
        assert!(!asset.is_image());
    }
}
