//! Scene Forge: prompt-to-scene generation for 2D games.
//!
//! A request flows through context building, inference (a generative model
//! when one is configured, curated reference scenes otherwise), then
//! postprocessing that guarantees a structurally valid scene document.

pub mod core;
pub mod schema;

pub use crate::core::config::EngineConfig;
pub use crate::core::context::{ContextBuilder, GenerationContext, GenerationRequest};
pub use crate::core::pipeline::{GeneratedScene, PipelineError, SceneEngine};
pub use crate::core::postprocess::{EnhanceOptions, Postprocessor};
pub use crate::schema::scene::SceneDocument;
