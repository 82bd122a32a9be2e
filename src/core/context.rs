//! Generation context: the structured, hashed input to inference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::schema::asset::{AssetDescriptor, AssetSummary};
use crate::schema::scene::GameStyle;

/// Maximum number of assets embedded into a context.
pub const DEFAULT_MAX_CONTEXT_ASSETS: usize = 50;

const PROMPT_INSTRUCTION: &str =
    " Generate a structured JSON scene with entities, positions, and properties.";

/// Caller-side description of a generation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<GameStyle>,
    #[serde(default)]
    pub assets: Vec<AssetDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Map<String, Value>>,
    /// Free-form keys merged into the context as-is.
    #[serde(default)]
    pub additional: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            project_id: project_id.into(),
            ..Self::default()
        }
    }

    pub fn with_style(mut self, style: impl Into<GameStyle>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn with_assets(mut self, assets: Vec<AssetDescriptor>) -> Self {
        self.assets = assets;
        self
    }

    pub fn with_constraints(mut self, constraints: Map<String, Value>) -> Self {
        self.constraints = Some(constraints);
        self
    }

    pub fn with_additional(mut self, key: impl Into<String>, value: Value) -> Self {
        self.additional.insert(key.into(), value);
        self
    }

    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = Some(version.into());
        self
    }

    /// Short deduplication key over the raw request inputs.
    pub fn input_hash(&self) -> String {
        let style = self
            .style
            .as_ref()
            .map(GameStyle::as_str)
            .unwrap_or("default");
        let mut input = format!("{}_{}_{}", self.prompt, self.project_id, style);
        if !self.assets.is_empty() {
            let ids: Vec<&str> = self.assets.iter().map(|a| a.id.as_str()).collect();
            input.push('_');
            input.push_str(&ids.join("_"));
        }
        let digest = Sha256::digest(input.as_bytes());
        hex::encode(&digest[..8])
    }
}

/// Everything inference needs for one request.
///
/// `asset_count` is the number of assets supplied; `assets` holds at most
/// the configured cap of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationContext {
    pub user_prompt: String,
    pub project_id: String,
    pub style: GameStyle,
    pub assets: Vec<AssetSummary>,
    pub asset_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub additional: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
    pub prompt_hash: String,
    pub engineered_prompt: String,
}

impl GenerationContext {
    /// Text the fallback selector scores: the engineered prompt, or the raw
    /// prompt when no engineered one exists.
    pub fn selection_prompt(&self) -> &str {
        if self.engineered_prompt.is_empty() {
            &self.user_prompt
        } else {
            &self.engineered_prompt
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextOperation {
    Generate,
    Edit,
}

/// Context for modifying an existing scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditingContext {
    pub scene_id: String,
    pub modifications: Map<String, Value>,
    pub current_state: Value,
    pub operation: ContextOperation,
    pub timestamp: DateTime<Utc>,
}

/// Builds generation and editing contexts.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    max_assets: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONTEXT_ASSETS)
    }
}

impl ContextBuilder {
    pub fn new(max_assets: usize) -> Self {
        Self { max_assets }
    }

    pub fn build(&self, request: &GenerationRequest) -> GenerationContext {
        let style = request.style.clone().unwrap_or_default();
        let asset_count = request.assets.len();
        let assets: Vec<AssetSummary> = request
            .assets
            .iter()
            .take(self.max_assets)
            .map(AssetSummary::from)
            .collect();

        let prompt_hash = prompt_hash(&request.prompt, &style, asset_count);
        let engineered_prompt = engineer_prompt(&request.prompt, &style, asset_count);

        tracing::debug!(
            project_id = %request.project_id,
            %prompt_hash,
            asset_count,
            "built generation context"
        );

        GenerationContext {
            user_prompt: request.prompt.clone(),
            project_id: request.project_id.clone(),
            style,
            assets,
            asset_count,
            constraints: request.constraints.clone().filter(|c| !c.is_empty()),
            additional: request.additional.clone(),
            timestamp: Utc::now(),
            prompt_hash,
            engineered_prompt,
        }
    }

    pub fn build_editing_context(
        &self,
        scene_id: impl Into<String>,
        modifications: Map<String, Value>,
        current_scene: Value,
    ) -> EditingContext {
        EditingContext {
            scene_id: scene_id.into(),
            modifications,
            current_state: current_scene,
            operation: ContextOperation::Edit,
            timestamp: Utc::now(),
        }
    }

    /// A context is usable when both the prompt and the project id are
    /// non-empty.
    pub fn validate(&self, context: &GenerationContext) -> bool {
        !context.user_prompt.is_empty() && !context.project_id.is_empty()
    }
}

/// Content digest over prompt, style and asset count with sorted keys.
/// Identical inputs always hash identically.
pub fn prompt_hash(prompt: &str, style: &GameStyle, asset_count: usize) -> String {
    let mut fields: BTreeMap<&str, Value> = BTreeMap::new();
    fields.insert("assets", Value::from(asset_count));
    fields.insert("prompt", Value::from(prompt));
    fields.insert("style", Value::from(style.as_str()));
    // A BTreeMap of JSON values always serializes.
    let canonical = serde_json::to_string(&fields).unwrap_or_default();
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

fn engineer_prompt(prompt: &str, style: &GameStyle, asset_count: usize) -> String {
    let mut engineered = format!(
        "Create a {} game scene based on the following description: {}",
        style, prompt
    );
    if asset_count > 0 {
        engineered.push_str(&format!(
            " The scene should incorporate {} available assets.",
            asset_count
        ));
    }
    engineered.push_str(PROMPT_INSTRUCTION);
    engineered
}
