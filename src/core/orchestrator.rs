//! Inference orchestration: try the model, fall back to reference scenes,
//! and never fail.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::core::context::GenerationContext;
use crate::core::fallback;
use crate::core::gateway::{Connectivity, SceneModel};
use crate::core::library::ReferenceSummary;
use crate::core::selector::{FallbackSelector, ERROR_FALLBACK_NAME};
use crate::schema::inference::{InferenceMetadata, InferenceResult, InferenceStatus};

/// Model version reported for scenes taken from the reference library
/// without trying a model.
pub const FALLBACK_MODEL_VERSION: &str = "fallback";

/// Cumulative request counters, shared by every request on an orchestrator.
#[derive(Debug, Default)]
pub struct InferenceStats {
    total_requests: AtomicU64,
    model_successes: AtomicU64,
    model_failures: AtomicU64,
    fallback_uses: AtomicU64,
    last_request_time: Mutex<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub model_successes: u64,
    pub model_failures: u64,
    pub fallback_uses: u64,
    pub last_request_time: Option<DateTime<Utc>>,
}

impl InferenceStats {
    fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        *self.last_request_time.lock() = Some(Utc::now());
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            model_successes: self.model_successes.load(Ordering::Relaxed),
            model_failures: self.model_failures.load(Ordering::Relaxed),
            fallback_uses: self.fallback_uses.load(Ordering::Relaxed),
            last_request_time: *self.last_request_time.lock(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    Ready,
    /// No reference scenes loaded; fallbacks use the fixed error scene.
    Degraded,
}

/// Configuration and health report for status endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub use_local_model: bool,
    pub model_endpoint: Option<String>,
    pub model_name: Option<String>,
    pub model_timeout_secs: Option<u64>,
    pub fallback_samples_loaded: usize,
    pub samples: Vec<ReferenceSummary>,
    pub status: ReadyState,
    pub statistics: StatsSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_connectivity: Option<Connectivity>,
}

struct Outcome {
    scene: Value,
    status: InferenceStatus,
    model_version: String,
    fallback_sample: Option<String>,
    fallback_reason: Option<String>,
}

/// Decides between model output and fallback scenes for each request.
///
/// When a model is attached it is always tried first; without one every
/// request is served from the reference library.
pub struct InferenceOrchestrator {
    selector: FallbackSelector,
    model: Option<Arc<dyn SceneModel>>,
    stats: InferenceStats,
}

impl std::fmt::Debug for InferenceOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceOrchestrator")
            .field("selector", &self.selector)
            .field("model", &self.model.as_ref().map(|m| m.model_name().to_string()))
            .field("stats", &self.stats)
            .finish()
    }
}

impl InferenceOrchestrator {
    pub fn new(selector: FallbackSelector) -> Self {
        Self {
            selector,
            model: None,
            stats: InferenceStats::default(),
        }
    }

    pub fn with_model(mut self, model: Arc<dyn SceneModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn use_local_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn selector(&self) -> &FallbackSelector {
        &self.selector
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Produce a raw scene for `context`. Never fails: model errors fall
    /// back to a reference scene and panics yield the fixed error scene
    /// with status [`InferenceStatus::Error`].
    pub async fn generate(
        &self,
        context: &GenerationContext,
        model_version: Option<&str>,
    ) -> InferenceResult {
        let started = Instant::now();
        self.stats.record_request();

        let outcome = AssertUnwindSafe(self.run(context, model_version))
            .catch_unwind()
            .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(outcome) => InferenceResult {
                scene: outcome.scene,
                metadata: InferenceMetadata {
                    status: outcome.status,
                    model_version: outcome.model_version,
                    latency_ms,
                    use_local_model: self.use_local_model(),
                    prompt_hash: Some(context.prompt_hash.clone()),
                    fallback_sample: outcome.fallback_sample,
                    fallback_reason: outcome.fallback_reason,
                    error: None,
                    timestamp: Utc::now(),
                },
            },
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(error = %message, "critical failure during scene inference");
                self.stats.model_failures.fetch_add(1, Ordering::Relaxed);
                InferenceResult {
                    scene: fallback::error_scene(),
                    metadata: InferenceMetadata {
                        status: InferenceStatus::Error,
                        model_version: ERROR_FALLBACK_NAME.to_string(),
                        latency_ms,
                        use_local_model: self.use_local_model(),
                        prompt_hash: Some(context.prompt_hash.clone()),
                        fallback_sample: None,
                        fallback_reason: None,
                        error: Some(message),
                        timestamp: Utc::now(),
                    },
                }
            }
        }
    }

    async fn run(&self, context: &GenerationContext, model_version: Option<&str>) -> Outcome {
        let Some(model) = &self.model else {
            tracing::info!("no model configured, serving reference scene");
            let selection = self.selector.select(context.selection_prompt());
            self.stats.fallback_uses.fetch_add(1, Ordering::Relaxed);
            return Outcome {
                scene: selection.document,
                status: InferenceStatus::CachedFallback,
                model_version: FALLBACK_MODEL_VERSION.to_string(),
                fallback_sample: Some(selection.reference_name),
                fallback_reason: None,
            };
        };

        match model.generate(context, model_version).await {
            Ok(output) => {
                self.stats.model_successes.fetch_add(1, Ordering::Relaxed);
                Outcome {
                    scene: output.scene,
                    status: InferenceStatus::Success,
                    model_version: output.model_version,
                    fallback_sample: None,
                    fallback_reason: None,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "model call failed, using reference scene");
                let selection = self.selector.select(context.selection_prompt());
                self.stats.model_failures.fetch_add(1, Ordering::Relaxed);
                self.stats.fallback_uses.fetch_add(1, Ordering::Relaxed);
                Outcome {
                    scene: selection.document,
                    status: InferenceStatus::FailFallback,
                    model_version: model_version.unwrap_or(model.model_name()).to_string(),
                    fallback_sample: Some(selection.reference_name),
                    fallback_reason: Some(e.to_string()),
                }
            }
        }
    }

    /// Configuration, library contents and counters. Probes the model when
    /// one is attached.
    pub async fn status(&self) -> ModelStatus {
        let library = self.selector.library();
        let connectivity = match &self.model {
            Some(model) => Some(model.probe().await),
            None => None,
        };
        ModelStatus {
            use_local_model: self.use_local_model(),
            model_endpoint: self.model.as_ref().map(|m| m.endpoint().to_string()),
            model_name: self.model.as_ref().map(|m| m.model_name().to_string()),
            model_timeout_secs: self.model.as_ref().map(|m| m.timeout().as_secs()),
            fallback_samples_loaded: library.len(),
            samples: library.summaries(),
            status: if library.is_empty() {
                ReadyState::Degraded
            } else {
                ReadyState::Ready
            },
            statistics: self.stats.snapshot(),
            model_connectivity: connectivity,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::{ContextBuilder, GenerationRequest};
    use crate::core::gateway::{GatewayError, ModelOutput};
    use crate::core::library::{Annotation, Complexity, ReferenceLibrary, ReferenceScene};
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    enum Behaviour {
        Succeed,
        Refuse,
        Panic,
    }

    struct MockModel(Behaviour);

    #[async_trait]
    impl SceneModel for MockModel {
        fn model_name(&self) -> &str {
            "mock-model"
        }

        fn endpoint(&self) -> &str {
            "http://mock"
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(3)
        }

        async fn generate(
            &self,
            _context: &GenerationContext,
            _model_version: Option<&str>,
        ) -> Result<ModelOutput, GatewayError> {
            match self.0 {
                Behaviour::Succeed => Ok(ModelOutput {
                    scene: json!({"id": "from_model", "entities": []}),
                    model_version: "mock-model:7b".to_string(),
                }),
                Behaviour::Refuse => Err(GatewayError::Connect {
                    endpoint: "http://mock".to_string(),
                }),
                Behaviour::Panic => panic!("model exploded"),
            }
        }

        async fn probe(&self) -> Connectivity {
            Connectivity::Connected
        }
    }

    fn selector() -> FallbackSelector {
        let scene = ReferenceScene::new(
            "forest",
            Annotation {
                keywords: vec!["forest".to_string()],
                complexity: Complexity::SIMPLE,
                description: "Trees".to_string(),
            },
            json!({"id": "ref_forest", "entities": []}),
        );
        FallbackSelector::new(Arc::new(ReferenceLibrary::from_scenes(vec![scene]))).with_seed(1)
    }

    fn context() -> GenerationContext {
        ContextBuilder::default().build(&GenerationRequest::new("a forest", "p1"))
    }

    #[tokio::test]
    async fn no_model_serves_cached_fallback() {
        let orch = InferenceOrchestrator::new(selector());
        let result = orch.generate(&context(), None).await;
        assert_eq!(result.metadata.status, InferenceStatus::CachedFallback);
        assert_eq!(result.metadata.model_version, FALLBACK_MODEL_VERSION);
        assert_eq!(result.metadata.fallback_sample.as_deref(), Some("forest"));
        assert!(!result.metadata.use_local_model);
        assert_eq!(result.scene["id"], "ref_forest");

        let stats = orch.stats();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.fallback_uses, 1);
        assert!(stats.last_request_time.is_some());
    }

    #[tokio::test]
    async fn model_success() {
        let orch =
            InferenceOrchestrator::new(selector()).with_model(Arc::new(MockModel(Behaviour::Succeed)));
        let ctx = context();
        let result = orch.generate(&ctx, None).await;
        assert_eq!(result.metadata.status, InferenceStatus::Success);
        assert_eq!(result.metadata.model_version, "mock-model:7b");
        assert_eq!(result.metadata.prompt_hash.as_deref(), Some(ctx.prompt_hash.as_str()));
        assert_eq!(result.scene["id"], "from_model");
        assert_eq!(orch.stats().model_successes, 1);
    }

    #[tokio::test]
    async fn model_failure_falls_back_with_reason() {
        let orch =
            InferenceOrchestrator::new(selector()).with_model(Arc::new(MockModel(Behaviour::Refuse)));
        let result = orch.generate(&context(), Some("custom:1b")).await;
        assert_eq!(result.metadata.status, InferenceStatus::FailFallback);
        assert_eq!(result.metadata.model_version, "custom:1b");
        assert_eq!(
            result.metadata.fallback_reason.as_deref(),
            Some("Cannot connect to model at http://mock")
        );
        assert_eq!(result.scene["id"], "ref_forest");

        let stats = orch.stats();
        assert_eq!(stats.model_failures, 1);
        assert_eq!(stats.fallback_uses, 1);
    }

    #[tokio::test]
    async fn panic_becomes_error_status() {
        let orch =
            InferenceOrchestrator::new(selector()).with_model(Arc::new(MockModel(Behaviour::Panic)));
        let result = orch.generate(&context(), None).await;
        assert_eq!(result.metadata.status, InferenceStatus::Error);
        assert_eq!(result.metadata.model_version, ERROR_FALLBACK_NAME);
        assert_eq!(result.metadata.error.as_deref(), Some("model exploded"));
        assert_eq!(result.scene["name"], "Error Fallback Scene");
        assert_eq!(orch.stats().model_failures, 1);
        assert_eq!(orch.stats().total_requests, 1);
    }

    #[tokio::test]
    async fn status_report() {
        let orch = InferenceOrchestrator::new(selector());
        let status = orch.status().await;
        assert!(!status.use_local_model);
        assert!(status.model_endpoint.is_none());
        assert!(status.model_connectivity.is_none());
        assert_eq!(status.fallback_samples_loaded, 1);
        assert_eq!(status.status, ReadyState::Ready);

        let orch =
            InferenceOrchestrator::new(FallbackSelector::new(Arc::new(ReferenceLibrary::new())))
                .with_model(Arc::new(MockModel(Behaviour::Succeed)));
        let status = orch.status().await;
        assert_eq!(status.status, ReadyState::Degraded);
        assert_eq!(status.model_name.as_deref(), Some("mock-model"));
        assert_eq!(status.model_timeout_secs, Some(3));
        assert_eq!(status.model_connectivity, Some(Connectivity::Connected));
    }

    #[tokio::test]
    async fn counters_are_shared_across_tasks() {
        let orch = Arc::new(InferenceOrchestrator::new(selector()));
        let ctx = Arc::new(context());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let orch = orch.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move { orch.generate(&ctx, None).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        let stats = orch.stats();
        assert_eq!(stats.total_requests, 8);
        assert_eq!(stats.fallback_uses, 8);
    }
}
