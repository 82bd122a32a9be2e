//! Reference library: curated scene documents used in place of model output.
//!
//! Loaded once at startup from a directory of JSON documents. Each file is
//! annotated with keywords, a complexity ordinal and a description taken
//! from a lookup table keyed by file name. An optional `annotations.ron`
//! in the same directory extends or overrides the built-in table.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the optional annotation manifest inside a reference directory.
pub const ANNOTATIONS_FILE: &str = "annotations.ron";

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("reference document is not a JSON object: {0}")]
    NotAnObject(PathBuf),
}

/// Structural richness of a reference scene on a 0..=3 scale.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Complexity(pub f64);

impl Complexity {
    pub const EMPTY: Complexity = Complexity(0.0);
    pub const SINGLE_ENTITY: Complexity = Complexity(0.5);
    pub const SIMPLE: Complexity = Complexity(1.0);
    pub const ASSET_HEAVY: Complexity = Complexity(2.0);
    pub const COMPLEX: Complexity = Complexity(3.0);

    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Selection hints attached to a reference document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub keywords: Vec<String>,
    pub complexity: Complexity,
    pub description: String,
}

impl Default for Annotation {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            complexity: Complexity::SIMPLE,
            description: "Custom reference scene".to_string(),
        }
    }
}

fn annotation(keywords: &[&str], complexity: Complexity, description: &str) -> Annotation {
    Annotation {
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        complexity,
        description: description.to_string(),
    }
}

/// Annotations for the reference scenes shipped with the crate.
pub fn builtin_annotations() -> FxHashMap<String, Annotation> {
    let mut table = FxHashMap::default();
    table.insert(
        "sample_simple_geometry.json".to_string(),
        annotation(
            &["simple", "basic", "geometry", "platform", "block", "minimal", "test"],
            Complexity::SIMPLE,
            "Basic geometric shapes and simple platformer elements",
        ),
    );
    table.insert(
        "sample_asset_intensive.json".to_string(),
        annotation(
            &[
                "asset", "texture", "sprite", "image", "audio", "resource", "forest", "animated",
                "detailed",
            ],
            Complexity::ASSET_HEAVY,
            "Asset-heavy scene with textures, sprites, and audio resources",
        ),
    );
    table.insert(
        "sample_complex_structure.json".to_string(),
        annotation(
            &[
                "complex", "advanced", "layer", "nested", "puzzle", "mechanism", "trigger", "event",
                "script",
            ],
            Complexity::COMPLEX,
            "Complex nested structures with layers, events, and scripts",
        ),
    );
    table.insert(
        "sample_minimal_empty.json".to_string(),
        annotation(
            &["empty", "blank", "none", "minimal", "sandbox", "clean", "start"],
            Complexity::EMPTY,
            "Empty scene for testing edge cases and sandbox initialization",
        ),
    );
    table.insert(
        "sample_single_entity.json".to_string(),
        annotation(
            &["single", "one", "solo", "minimal", "basic", "simple"],
            Complexity::SINGLE_ENTITY,
            "Minimal viable scene with a single entity",
        ),
    );
    table
}

/// A curated scene document with its selection hints.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceScene {
    pub name: String,
    pub keywords: FxHashSet<String>,
    pub complexity: Complexity,
    pub description: String,
    /// The raw document, as the postprocessor expects model output.
    pub document: Value,
}

impl ReferenceScene {
    pub fn new(name: impl Into<String>, annotation: Annotation, document: Value) -> Self {
        Self {
            name: name.into(),
            keywords: annotation
                .keywords
                .into_iter()
                .map(|k| k.to_lowercase())
                .collect(),
            complexity: annotation.complexity,
            description: annotation.description,
            document,
        }
    }

    pub fn summary(&self) -> ReferenceSummary {
        let mut keywords: Vec<String> = self.keywords.iter().cloned().collect();
        keywords.sort();
        ReferenceSummary {
            name: self.name.clone(),
            complexity: self.complexity,
            description: self.description.clone(),
            keywords,
        }
    }
}

/// Listing entry for introspection endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSummary {
    pub name: String,
    pub complexity: Complexity,
    pub description: String,
    pub keywords: Vec<String>,
}

/// The immutable set of reference scenes, in load order.
#[derive(Debug, Clone, Default)]
pub struct ReferenceLibrary {
    scenes: Vec<ReferenceScene>,
}

impl ReferenceLibrary {
    pub fn new() -> Self {
        Self { scenes: Vec::new() }
    }

    pub fn from_scenes(scenes: Vec<ReferenceScene>) -> Self {
        Self { scenes }
    }

    /// Load every `.json` document in `dir`, in file-name order.
    ///
    /// Never fails: unreadable or malformed files are logged and skipped,
    /// and a missing directory yields an empty library.
    pub fn load_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            tracing::warn!(path = %dir.display(), "reference scene directory not found");
            tracing::error!("no reference scenes loaded; selection will use the error fallback");
            return Self::new();
        }

        let mut annotations = builtin_annotations();
        let manifest = dir.join(ANNOTATIONS_FILE);
        if manifest.is_file() {
            match load_annotations(&manifest) {
                Ok(extra) => annotations.extend(extra),
                Err(e) => tracing::error!(
                    path = %manifest.display(),
                    error = %e,
                    "failed to load reference annotations"
                ),
            }
        }

        let files = match json_files_in(dir) {
            Ok(files) => files,
            Err(e) => {
                tracing::error!(path = %dir.display(), error = %e, "failed to list reference scenes");
                return Self::new();
            }
        };

        let mut scenes = Vec::new();
        for path in files {
            match load_scene(&path, &annotations) {
                Ok(scene) => {
                    tracing::info!(name = %scene.name, "loaded reference scene");
                    scenes.push(scene);
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "failed to load reference scene")
                }
            }
        }

        if scenes.is_empty() {
            tracing::error!("no reference scenes loaded; selection will use the error fallback");
        } else {
            tracing::info!(count = scenes.len(), path = %dir.display(), "reference library ready");
        }
        Self { scenes }
    }

    pub fn scenes(&self) -> &[ReferenceScene] {
        &self.scenes
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ReferenceScene> {
        self.scenes.iter().find(|s| s.name == name)
    }

    pub fn summaries(&self) -> Vec<ReferenceSummary> {
        self.scenes.iter().map(ReferenceScene::summary).collect()
    }
}

/// Parse an annotation manifest: a RON map from file name to annotation.
pub fn load_annotations(path: &Path) -> Result<FxHashMap<String, Annotation>, LibraryError> {
    let contents = std::fs::read_to_string(path)?;
    parse_annotations(&contents)
}

pub fn parse_annotations(input: &str) -> Result<FxHashMap<String, Annotation>, LibraryError> {
    Ok(ron::from_str(input)?)
}

fn json_files_in(dir: &Path) -> Result<Vec<PathBuf>, LibraryError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn load_scene(
    path: &Path,
    annotations: &FxHashMap<String, Annotation>,
) -> Result<ReferenceScene, LibraryError> {
    let contents = std::fs::read_to_string(path)?;
    let document: Value = serde_json::from_str(&contents)?;
    if !document.is_object() {
        return Err(LibraryError::NotAnObject(path.to_path_buf()));
    }

    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string();
    let annotation = annotations.get(file_name).cloned().unwrap_or_default();

    Ok(ReferenceScene::new(name, annotation, document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn missing_directory_gives_empty_library() {
        let lib = ReferenceLibrary::load_dir("/definitely/not/here");
        assert!(lib.is_empty());
    }

    #[test]
    fn loads_in_name_order_and_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "sample_single_entity.json", r#"{"id": "b", "entities": []}"#);
        write(dir.path(), "custom_arena.json", r#"{"id": "a", "entities": []}"#);
        write(dir.path(), "broken.json", "{ not json");
        write(dir.path(), "array.json", "[1, 2, 3]");
        write(dir.path(), "notes.txt", "ignored");

        let lib = ReferenceLibrary::load_dir(dir.path());
        let names: Vec<&str> = lib.scenes().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["custom_arena", "sample_single_entity"]);

        let custom = lib.get("custom_arena").unwrap();
        assert_eq!(custom.complexity, Complexity::SIMPLE);
        assert!(custom.keywords.is_empty());
        assert_eq!(custom.description, "Custom reference scene");

        let single = lib.get("sample_single_entity").unwrap();
        assert_eq!(single.complexity, Complexity::SINGLE_ENTITY);
        assert!(single.keywords.contains("solo"));
        assert_eq!(single.document["id"], "b");
    }

    #[test]
    fn annotation_manifest_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "custom_arena.json", r#"{"id": "a"}"#);
        write(
            dir.path(),
            ANNOTATIONS_FILE,
            r#"{
                "custom_arena.json": (
                    keywords: ["Arena", "boss"],
                    complexity: 2.5,
                    description: "Boss arena",
                ),
            }"#,
        );

        let lib = ReferenceLibrary::load_dir(dir.path());
        let arena = lib.get("custom_arena").unwrap();
        assert_eq!(arena.complexity, Complexity(2.5));
        assert!(arena.keywords.contains("arena"));
        assert!(arena.keywords.contains("boss"));
        assert_eq!(arena.description, "Boss arena");
    }

    #[test]
    fn bad_manifest_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "sample_minimal_empty.json", r#"{"id": "e"}"#);
        write(dir.path(), ANNOTATIONS_FILE, "not ron at all {");
        let lib = ReferenceLibrary::load_dir(dir.path());
        assert_eq!(lib.len(), 1);
        assert_eq!(lib.scenes()[0].complexity, Complexity::EMPTY);
    }

    #[test]
    fn builtin_table_covers_shipped_samples() {
        let table = builtin_annotations();
        assert_eq!(table.len(), 5);
        assert_eq!(table["sample_complex_structure.json"].complexity, Complexity::COMPLEX);
        assert!(table["sample_asset_intensive.json"]
            .keywords
            .contains(&"forest".to_string()));
    }

    #[test]
    fn summaries_are_sorted_keywords() {
        let scene = ReferenceScene::new(
            "x",
            annotation(&["zeta", "alpha"], Complexity::SIMPLE, "d"),
            json!({}),
        );
        let lib = ReferenceLibrary::from_scenes(vec![scene]);
        let summary = &lib.summaries()[0];
        assert_eq!(summary.keywords, vec!["alpha".to_string(), "zeta".to_string()]);
    }
}
