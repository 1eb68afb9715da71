//! Prompt lifecycle: kinds, versions, and the generators that build prompts
//! and validate model responses.
//!
//! Every prompt kind carries its own version, sampling temperature, output
//! budget, and input ceiling. Templates instruct the model to echo the
//! version back in its JSON payload so schema drift is observable without
//! being fatal.

mod chunk_summary;
mod domain;
mod file_summary;
pub mod registry;

pub use chunk_summary::{ChunkSummary, ChunkSummaryGenerator, ChunkSummaryRequest};
pub use domain::{Domain, DomainClassification, DomainClassifier, DomainClassificationRequest};
pub use file_summary::{FileSummary, FileSummaryGenerator, FileSummaryRequest};
pub use registry::PromptRegistry;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::tokens::count_tokens;

/// Semantic role of a prompt. Closed enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    FileSummary,
    ChunkSummary,
    DomainClassification,
    /// Reserved for a future pipeline stage.
    ActionGeneration,
}

impl PromptKind {
    pub const ALL: [PromptKind; 4] = [
        PromptKind::FileSummary,
        PromptKind::ChunkSummary,
        PromptKind::DomainClassification,
        PromptKind::ActionGeneration,
    ];

    /// Section tag stamped into error records and parse-failure envelopes.
    pub fn section_tag(self) -> &'static str {
        match self {
            Self::FileSummary => "file_summary",
            Self::ChunkSummary => "chunk_summary",
            Self::DomainClassification => "domain_classification",
            Self::ActionGeneration => "action_generation",
        }
    }

    /// Version the registry is seeded with.
    pub fn default_version(self) -> &'static str {
        match self {
            Self::FileSummary => "1.1",
            Self::ChunkSummary => "1.0",
            Self::DomainClassification => "1.0",
            Self::ActionGeneration => "0.1",
        }
    }

    /// Sampling temperature for this kind.
    pub fn temperature(self) -> f64 {
        match self {
            Self::FileSummary => 0.3,
            Self::ChunkSummary => 0.2,
            Self::DomainClassification => 0.0,
            Self::ActionGeneration => 0.0,
        }
    }

    /// Output token budget for this kind.
    pub fn max_output_tokens(self) -> u32 {
        match self {
            Self::FileSummary => 600,
            Self::ChunkSummary => 150,
            Self::DomainClassification => 300,
            Self::ActionGeneration => 300,
        }
    }

    /// Largest input prompt this kind will dispatch.
    pub fn input_token_ceiling(self) -> usize {
        match self {
            Self::FileSummary => 100_000,
            Self::ChunkSummary => 50_000,
            Self::DomainClassification => 50_000,
            Self::ActionGeneration => 50_000,
        }
    }
}

impl std::fmt::Display for PromptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.section_tag())
    }
}

/// Envelope emitted on unrecoverable JSON parse failure, so downstream
/// stages can tell structural failure from missing content.
pub fn parse_error_envelope(kind: PromptKind) -> serde_json::Value {
    serde_json::json!({
        "error": "parse_failed",
        "prompt_section": kind.section_tag(),
    })
}

/// Reject prompts over the kind's input ceiling before dispatch.
pub(crate) fn ensure_input_budget(kind: PromptKind, prompt: &str) -> Result<()> {
    let tokens = count_tokens(prompt);
    let ceiling = kind.input_token_ceiling();
    if tokens > ceiling {
        return Err(Error::invalid_request(format!(
            "{kind} prompt is {tokens} tokens, over the {ceiling} ceiling"
        )));
    }
    Ok(())
}

/// Version-check a parsed response. Incompatibility is a recoverable
/// warning: the mismatch metric is incremented and processing continues.
pub(crate) fn note_version(
    registry: &PromptRegistry,
    metrics: Option<&Metrics>,
    kind: PromptKind,
    received: &str,
) {
    if !registry.validate(kind, received) && !registry.is_compatible(kind, received) {
        if let Some(metrics) = metrics {
            metrics.record_version_mismatch();
        }
    }
}
