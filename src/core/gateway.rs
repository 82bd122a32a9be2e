//! Model gateway: the single network call to a generative backend.
//!
//! [`SceneModel`] is the seam the orchestrator talks to. [`HttpGateway`] is
//! the production implementation against an Ollama-style `/api/generate`
//! endpoint. Tests substitute their own models.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::core::config::EngineConfig;
use crate::core::context::GenerationContext;

/// Bound on the connectivity probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Distinct failure kinds so the orchestrator can report a specific
/// fallback reason. The `Display` text becomes that reason.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Cannot connect to model at {endpoint}")]
    Connect { endpoint: String },
    #[error("Model request timed out after {secs}s")]
    Timeout { secs: u64 },
    #[error("Model inference failed: HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Model inference failed: {0}")]
    Protocol(String),
    #[error("Model inference failed: {0}")]
    Client(#[from] reqwest::Error),
}

/// A raw scene plus the model version the backend reported.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    pub scene: Value,
    pub model_version: String,
}

/// Something that can turn a generation context into a raw scene.
#[async_trait]
pub trait SceneModel: Send + Sync {
    /// Configured model name, reported when no version was requested.
    fn model_name(&self) -> &str;

    fn endpoint(&self) -> &str;

    fn timeout(&self) -> Duration;

    async fn generate(
        &self,
        context: &GenerationContext,
        model_version: Option<&str>,
    ) -> Result<ModelOutput, GatewayError>;

    /// Reachability of the backend, for status reports.
    async fn probe(&self) -> Connectivity;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Connected,
    /// The server answered, but not with a success status.
    Unreachable,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn from_engine(config: &EngineConfig) -> Self {
        Self {
            endpoint: config.model_endpoint.trim_end_matches('/').to_string(),
            model: config.model_name.clone(),
            timeout: config.model_timeout(),
        }
    }
}

/// Gateway to an Ollama-compatible HTTP server.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    config: GatewayConfig,
    client: Client,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder().build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn payload(&self, context: &GenerationContext, model_version: Option<&str>) -> Value {
        json!({
            "model": model_version.unwrap_or(&self.config.model),
            "prompt": model_prompt(context.selection_prompt()),
            "stream": false,
            "options": {
                "temperature": 0.7,
                "top_p": 0.9,
                "max_tokens": 2048
            }
        })
    }

    async fn request(
        &self,
        context: &GenerationContext,
        model_version: Option<&str>,
    ) -> Result<ModelOutput, GatewayError> {
        let url = format!("{}/api/generate", self.config.endpoint);
        let body = self.payload(context, model_version);

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Status { status, body });
        }

        let reply: Value = resp.json().await.map_err(|e| self.classify(e))?;
        let scene = parse_scene(&reply)?;
        let model_version = reply
            .get("model")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| model_version.unwrap_or(&self.config.model).to_string());

        Ok(ModelOutput {
            scene,
            model_version,
        })
    }

    fn classify(&self, err: reqwest::Error) -> GatewayError {
        if err.is_connect() {
            GatewayError::Connect {
                endpoint: self.config.endpoint.clone(),
            }
        } else if err.is_timeout() {
            GatewayError::Timeout {
                secs: self.config.timeout.as_secs(),
            }
        } else if err.is_decode() {
            GatewayError::Protocol(err.to_string())
        } else {
            GatewayError::Client(err)
        }
    }
}

#[async_trait]
impl SceneModel for HttpGateway {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn timeout(&self) -> Duration {
        self.config.timeout
    }

    async fn generate(
        &self,
        context: &GenerationContext,
        model_version: Option<&str>,
    ) -> Result<ModelOutput, GatewayError> {
        tracing::info!(
            endpoint = %self.config.endpoint,
            model = model_version.unwrap_or(&self.config.model),
            "requesting scene from model"
        );
        match tokio::time::timeout(self.config.timeout, self.request(context, model_version)).await
        {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout {
                secs: self.config.timeout.as_secs(),
            }),
        }
    }

    async fn probe(&self) -> Connectivity {
        let url = format!("{}/api/tags", self.config.endpoint);
        match tokio::time::timeout(PROBE_TIMEOUT, self.client.get(&url).send()).await {
            Ok(Ok(resp)) if resp.status().is_success() => Connectivity::Connected,
            Ok(Ok(_)) => Connectivity::Unreachable,
            Ok(Err(_)) | Err(_) => Connectivity::Disconnected,
        }
    }
}

/// Instruction sent to the model around the engineered prompt.
pub fn model_prompt(prompt: &str) -> String {
    format!(
        "Generate a game scene JSON for the following request:\n{}\n\n\
         The scene should include entities, positions, sizes, and properties.\n\
         Return only valid JSON without any explanation.",
        prompt
    )
}

/// Extract the scene object from a `/api/generate` reply. A reply without a
/// `response` field yields an empty scene.
fn parse_scene(reply: &Value) -> Result<Value, GatewayError> {
    let text = match reply.get("response") {
        None | Some(Value::Null) => return Ok(json!({})),
        Some(Value::String(s)) => s,
        Some(_) => {
            return Err(GatewayError::Protocol(
                "response field is not a string".to_string(),
            ))
        }
    };
    let scene: Value = serde_json::from_str(text.trim())
        .map_err(|e| GatewayError::Protocol(format!("response is not valid JSON: {}", e)))?;
    if scene.is_object() {
        Ok(scene)
    } else {
        Err(GatewayError::Protocol(
            "response is not a JSON object".to_string(),
        ))
    }
}
