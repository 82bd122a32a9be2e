//! Output of the inference stage, before postprocessing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// How the raw scene in an [`InferenceResult`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceStatus {
    /// The generative backend answered with a usable scene.
    Success,
    /// The backend was tried and failed; a reference scene was substituted.
    FailFallback,
    /// No backend is configured; a reference scene was used directly.
    CachedFallback,
    /// Inference broke unexpectedly; the fixed error scene was returned.
    Error,
}

impl InferenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::FailFallback => "fail_fallback",
            Self::CachedFallback => "cached_fallback",
            Self::Error => "error",
        }
    }

    pub fn is_fallback(&self) -> bool {
        !matches!(self, Self::Success)
    }
}

impl fmt::Display for InferenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceMetadata {
    pub status: InferenceStatus,
    pub model_version: String,
    pub latency_ms: u64,
    pub use_local_model: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_sample: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A raw scene plus a record of how it was obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub scene: Value,
    pub metadata: InferenceMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_names() {
        assert_eq!(
            serde_json::to_value(InferenceStatus::FailFallback).unwrap(),
            "fail_fallback"
        );
        assert_eq!(
            serde_json::to_value(InferenceStatus::CachedFallback).unwrap(),
            "cached_fallback"
        );
        assert_eq!(InferenceStatus::Error.to_string(), "error");
    }

    #[test]
    fn only_success_is_not_fallback() {
        assert!(!InferenceStatus::Success.is_fallback());
        assert!(InferenceStatus::FailFallback.is_fallback());
        assert!(InferenceStatus::CachedFallback.is_fallback());
        assert!(InferenceStatus::Error.is_fallback());
    }
}
