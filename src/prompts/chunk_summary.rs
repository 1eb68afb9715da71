//! Chunk-summary prompt generation and response validation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::error_log::{ErrorLog, ErrorRecord};
use crate::llm::{CompletionRequest, CompletionResponse, ResponseFormat};
use crate::metrics::Metrics;
use crate::tokens::count_tokens;

use super::{ensure_input_budget, note_version, PromptKind, PromptRegistry};

const KIND: PromptKind = PromptKind::ChunkSummary;

/// Longest accepted summary sentence, in tokens.
const MAX_SUMMARY_TOKENS: usize = 80;
/// At most this many focus entities survive validation.
const MAX_FOCUS_ENTITIES: usize = 3;
/// Accepted confidence range, endpoints included.
const CONFIDENCE_RANGE: std::ops::RangeInclusive<f64> = 0.2..=0.85;

/// Typed input for one chunk summarisation.
#[derive(Debug, Clone)]
pub struct ChunkSummaryRequest {
    pub file_path: String,
    /// The chunk itself
    pub content: String,
    /// Summary of the enclosing parent chunk, when one exists
    pub parent_summary: Option<String>,
}

/// Validated chunk-summary payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSummary {
    /// One declarative sentence
    pub summary: String,
    #[serde(default)]
    pub focus_entities: Vec<String>,
    pub confidence: f64,
    #[serde(default)]
    pub version: String,
}

/// Builds chunk-summary prompts and validates the model's JSON response.
pub struct ChunkSummaryGenerator {
    registry: Arc<PromptRegistry>,
    error_log: Arc<ErrorLog>,
    metrics: Option<Arc<Metrics>>,
}

impl ChunkSummaryGenerator {
    pub fn new(registry: Arc<PromptRegistry>, error_log: Arc<ErrorLog>) -> Self {
        Self {
            registry,
            error_log,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build_request(&self, input: &ChunkSummaryRequest) -> Result<CompletionRequest> {
        let version = self.registry.get(KIND)?;
        let parent = match &input.parent_summary {
            Some(summary) => format!("Enclosing context: {summary}\n\n"),
            None => String::new(),
        };
        let prompt = format!(
            "Summarise this code chunk for a retrieval index.\n\
             \n\
             Respond with exactly one JSON object:\n\
             {{\n\
             \x20 \"version\": \"{version}\",\n\
             \x20 \"summary\": \"one declarative sentence, at most {MAX_SUMMARY_TOKENS} tokens\",\n\
             \x20 \"focus_entities\": [\"up to {MAX_FOCUS_ENTITIES} symbols the chunk is about\"],\n\
             \x20 \"confidence\": 0.5\n\
             }}\n\
             Confidence must fall between {low} and {high}.\n\
             \n\
             {parent}Chunk from {path}:\n\
             ---\n\
             {content}\n",
            version = version,
            low = CONFIDENCE_RANGE.start(),
            high = CONFIDENCE_RANGE.end(),
            parent = parent,
            path = input.file_path,
            content = input.content,
        );
        ensure_input_budget(KIND, &prompt)?;
        Ok(CompletionRequest::new(prompt)
            .with_temperature(KIND.temperature())
            .with_max_tokens(KIND.max_output_tokens())
            .with_format(ResponseFormat::Json)
            .with_kind(KIND))
    }

    pub fn parse_response(
        &self,
        request: &CompletionRequest,
        response: &CompletionResponse,
    ) -> Result<ChunkSummary> {
        match self.try_parse(&response.content) {
            Ok(summary) => Ok(summary),
            Err(error) => {
                self.error_log.record(&ErrorRecord::from_error(
                    &error,
                    Some(KIND),
                    &request.prompt,
                    &response.content,
                ));
                Err(error)
            }
        }
    }

    fn try_parse(&self, content: &str) -> Result<ChunkSummary> {
        let mut summary: ChunkSummary =
            serde_json::from_str(content).map_err(|e| Error::JsonParse(e.to_string()))?;

        if summary.summary.trim().is_empty() {
            return Err(Error::validation("summary sentence must not be empty"));
        }
        let tokens = count_tokens(&summary.summary);
        if tokens > MAX_SUMMARY_TOKENS {
            return Err(Error::validation(format!(
                "summary sentence is {tokens} tokens, over the {MAX_SUMMARY_TOKENS} cap"
            )));
        }
        if !CONFIDENCE_RANGE.contains(&summary.confidence) {
            return Err(Error::validation(format!(
                "confidence {} outside [{}, {}]",
                summary.confidence,
                CONFIDENCE_RANGE.start(),
                CONFIDENCE_RANGE.end()
            )));
        }
        // An over-long entity list is trimmed, not rejected.
        summary.focus_entities.truncate(MAX_FOCUS_ENTITIES);

        note_version(&self.registry, self.metrics.as_deref(), KIND, &summary.version);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn generator() -> ChunkSummaryGenerator {
        ChunkSummaryGenerator::new(
            Arc::new(PromptRegistry::with_defaults()),
            Arc::new(ErrorLog::disabled()),
        )
    }

    fn input() -> ChunkSummaryRequest {
        ChunkSummaryRequest {
            file_path: "src/limiter.rs".to_string(),
            content: "pub async fn acquire(&self) { /* ... */ }".to_string(),
            parent_summary: None,
        }
    }

    fn response(content: &str) -> CompletionResponse {
        CompletionResponse {
            content: content.to_string(),
            tokens_used: 40,
            prompt_version: "1.0".to_string(),
            model: "mock".to_string(),
        }
    }

    fn payload(confidence: f64, entities: &[&str]) -> String {
        serde_json::json!({
            "version": "1.0",
            "summary": "Acquires one admission from the limiter.",
            "focus_entities": entities,
            "confidence": confidence,
        })
        .to_string()
    }

    #[test]
    fn test_build_request_stamps_kind_parameters() {
        let request = generator().build_request(&input()).unwrap();
        assert_eq!(request.temperature, 0.2);
        assert_eq!(request.max_tokens, 150);
        assert_eq!(request.response_format, ResponseFormat::Json);
        assert_eq!(request.kind, Some(PromptKind::ChunkSummary));
    }

    #[test]
    fn test_parent_context_is_folded_into_the_prompt() {
        let mut with_parent = input();
        with_parent.parent_summary = Some("Rate limiter internals.".to_string());
        let request = generator().build_request(&with_parent).unwrap();
        assert!(request.prompt.contains("Enclosing context: Rate limiter internals."));
    }

    #[test]
    fn test_confidence_endpoints_are_accepted() {
        let generator = generator();
        let request = generator.build_request(&input()).unwrap();
        for confidence in [0.2, 0.85] {
            let parsed = generator
                .parse_response(&request, &response(&payload(confidence, &["acquire"])))
                .unwrap();
            assert_eq!(parsed.confidence, confidence);
        }
    }

    #[test]
    fn test_confidence_just_outside_is_rejected() {
        let generator = generator();
        let request = generator.build_request(&input()).unwrap();
        for confidence in [0.19, 0.86] {
            let result =
                generator.parse_response(&request, &response(&payload(confidence, &[])));
            assert!(matches!(result, Err(Error::Validation(_))));
        }
    }

    #[test]
    fn test_fourth_focus_entity_is_truncated_not_rejected() {
        let generator = generator();
        let request = generator.build_request(&input()).unwrap();
        let parsed = generator
            .parse_response(
                &request,
                &response(&payload(0.5, &["acquire", "refill", "release", "status"])),
            )
            .unwrap();
        assert_eq!(parsed.focus_entities.len(), 3);
        assert_eq!(parsed.focus_entities[2], "release");
    }

    #[test]
    fn test_overlong_sentence_is_rejected() {
        let generator = generator();
        let request = generator.build_request(&input()).unwrap();
        let long_sentence = "acquires a permit and then some ".repeat(30);
        let content = serde_json::json!({
            "version": "1.0",
            "summary": long_sentence,
            "confidence": 0.5,
        })
        .to_string();
        let result = generator.parse_response(&request, &response(&content));
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_malformed_json_is_a_parse_failure() {
        let generator = generator();
        let request = generator.build_request(&input()).unwrap();
        let result = generator.parse_response(&request, &response("no json here"));
        assert!(matches!(result, Err(Error::JsonParse(_))));
    }
}
