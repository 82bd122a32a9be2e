pub mod config;
pub mod context;
pub mod fallback;
pub mod gateway;
pub mod library;
pub mod orchestrator;
pub mod pipeline;
pub mod postprocess;
pub mod selector;
