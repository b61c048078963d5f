//! Content resolution and guided generation for Schemes of Work.
//!
//! # Architecture
//!
//! - **provider**: `TextBackend` trait with OpenAI-compatible and generic endpoint implementations
//! - **generator**: prompt construction and tolerant parsing of backend responses
//! - **validator**: pedagogical rule checks on candidate lesson content
//! - **orchestrator**: bounded generate → validate → retry loop per slot
//! - **resolver**: tiered cascade from authoritative content down to emergency fallback
//! - **pipeline**: `generate_scheme`, from calendar and topics to an assembled `Scheme`
//! - **progress**: progress events and a terminal progress bar via `indicatif`

pub mod cancel;
pub mod generator;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod provider;
pub mod resolver;
pub mod usage;
pub mod validator;

pub use cancel::CancelToken;
pub use pipeline::{PipelineError, SchemeConfig, generate_scheme};
pub use provider::{
    Completion, GenerateOptions, ProviderError, TextBackend, available_providers, create_provider,
};
pub use validator::{ValidationReport, validate};
