//! The scene pipeline: request → context → inference → postprocess → enhance.
//!
//! Each request runs as one sequential flow. The only state shared between
//! requests is the orchestrator's counters and the selector's RNG.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::core::config::{ConfigError, EngineConfig};
use crate::core::context::{ContextBuilder, GenerationRequest};
use crate::core::gateway::{GatewayConfig, GatewayError, HttpGateway, SceneModel};
use crate::core::library::ReferenceLibrary;
use crate::core::orchestrator::{InferenceOrchestrator, ModelStatus};
use crate::core::postprocess::{EnhanceOptions, Postprocessor};
use crate::core::selector::{FallbackSelector, ScoringRules};
use crate::schema::inference::InferenceMetadata;
use crate::schema::scene::SceneDocument;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid generation request: prompt and project id are required")]
    InvalidContext,
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("gateway setup failed: {0}")]
    Gateway(#[from] GatewayError),
}

/// A finished scene plus a record of how it was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedScene {
    pub scene: SceneDocument,
    pub inference: InferenceMetadata,
    pub prompt_hash: String,
    /// Deduplication key over the raw request.
    pub input_hash: String,
    pub generation_time_ms: u64,
}

/// The top-level scene engine. Built via `SceneEngine::builder()`.
#[derive(Debug)]
pub struct SceneEngine {
    contexts: ContextBuilder,
    orchestrator: InferenceOrchestrator,
    postprocessor: Postprocessor,
}

/// Builder for constructing a `SceneEngine`.
pub struct SceneEngineBuilder {
    config: EngineConfig,
    config_path: Option<PathBuf>,
    env_overrides: bool,
    reference_dir: Option<PathBuf>,
    seed: Option<u64>,
    rules: Option<ScoringRules>,
    /// Directly provided library (for testing without files).
    library: Option<ReferenceLibrary>,
    /// Directly provided model (for testing without a server).
    model: Option<Arc<dyn SceneModel>>,
}

impl SceneEngine {
    pub fn builder() -> SceneEngineBuilder {
        SceneEngineBuilder {
            config: EngineConfig::default(),
            config_path: None,
            env_overrides: false,
            reference_dir: None,
            seed: None,
            rules: None,
            library: None,
            model: None,
        }
    }

    /// Generate a scene for `request`.
    ///
    /// Fails only when the request lacks a prompt or project id. Every
    /// inference path, including model failure, yields a valid scene.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        options: &EnhanceOptions,
    ) -> Result<GeneratedScene, PipelineError> {
        let started = Instant::now();

        let context = self.contexts.build(request);
        if !self.contexts.validate(&context) {
            tracing::warn!(project_id = %request.project_id, "rejected invalid generation request");
            return Err(PipelineError::InvalidContext);
        }

        let inference = self
            .orchestrator
            .generate(&context, request.model_version.as_deref())
            .await;

        let assets = (!request.assets.is_empty()).then_some(request.assets.as_slice());
        let scene = self
            .postprocessor
            .process(inference.scene, &request.project_id, assets);
        let scene = self.postprocessor.enhance(scene, options);

        let generation_time_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            scene_id = %scene.id,
            status = %inference.metadata.status,
            entities = scene.entities.len(),
            generation_time_ms,
            "scene generated"
        );

        Ok(GeneratedScene {
            scene,
            inference: inference.metadata,
            prompt_hash: context.prompt_hash,
            input_hash: request.input_hash(),
            generation_time_ms,
        })
    }

    pub async fn status(&self) -> ModelStatus {
        self.orchestrator.status().await
    }

    pub fn context_builder(&self) -> &ContextBuilder {
        &self.contexts
    }

    pub fn orchestrator(&self) -> &InferenceOrchestrator {
        &self.orchestrator
    }

    pub fn postprocessor(&self) -> &Postprocessor {
        &self.postprocessor
    }

    pub fn library(&self) -> &ReferenceLibrary {
        self.orchestrator.selector().library()
    }
}

impl SceneEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Load configuration from a RON file at build time, replacing
    /// `config`.
    pub fn config_file(mut self, path: &str) -> Self {
        self.config_path = Some(PathBuf::from(path));
        self
    }

    /// Apply `USE_LOCAL_MODEL`, `MODEL_ENDPOINT`, `MODEL_NAME` and
    /// `MODEL_TIMEOUT` at build time.
    pub fn env_overrides(mut self) -> Self {
        self.env_overrides = true;
        self
    }

    pub fn reference_dir(mut self, path: &str) -> Self {
        self.reference_dir = Some(PathBuf::from(path));
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn rules(mut self, rules: ScoringRules) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Provide the reference library directly (for testing without files).
    pub fn with_library(mut self, library: ReferenceLibrary) -> Self {
        self.library = Some(library);
        self
    }

    /// Provide the model directly. Takes precedence over `use_local_model`.
    pub fn with_model(mut self, model: Arc<dyn SceneModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn build(self) -> Result<SceneEngine, PipelineError> {
        let mut config = match &self.config_path {
            Some(path) => EngineConfig::load_from_ron(path)?,
            None => self.config,
        };
        if self.env_overrides {
            config.apply_env(|name| std::env::var(name).ok())?;
        }
        if let Some(dir) = self.reference_dir {
            config.reference_dir = dir;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }

        let library = match self.library {
            Some(library) => library,
            None => ReferenceLibrary::load_dir(&config.reference_dir),
        };

        let mut selector = FallbackSelector::new(Arc::new(library));
        if let Some(seed) = config.seed {
            selector = selector.with_seed(seed);
        }
        if let Some(rules) = self.rules {
            selector = selector.with_rules(rules);
        }

        let model: Option<Arc<dyn SceneModel>> = match self.model {
            Some(model) => Some(model),
            None if config.use_local_model => Some(Arc::new(HttpGateway::new(
                GatewayConfig::from_engine(&config),
            )?)),
            None => None,
        };

        let mut orchestrator = InferenceOrchestrator::new(selector);
        if let Some(model) = model {
            tracing::info!(
                endpoint = model.endpoint(),
                model = model.model_name(),
                "local model enabled"
            );
            orchestrator = orchestrator.with_model(model);
        }

        Ok(SceneEngine {
            contexts: ContextBuilder::new(config.max_context_assets),
            orchestrator,
            postprocessor: Postprocessor::new(config.max_scene_assets),
        })
    }
}
