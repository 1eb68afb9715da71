//! File-summary prompt generation and response validation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::error_log::{ErrorLog, ErrorRecord};
use crate::llm::{CompletionRequest, CompletionResponse, ResponseFormat};
use crate::metrics::Metrics;

use super::{ensure_input_budget, note_version, PromptKind, PromptRegistry};

const KIND: PromptKind = PromptKind::FileSummary;

/// Typed input for one file summarisation.
#[derive(Debug, Clone)]
pub struct FileSummaryRequest {
    /// Repository-relative path
    pub path: String,
    /// Detected language, free-form
    pub language: String,
    /// Full file content
    pub content: String,
}

/// Validated file-summary payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSummary {
    /// Ordered summary items, each at most two source lines
    pub summary: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub primary_topics: Vec<String>,
    #[serde(default)]
    pub key_symbols: Vec<String>,
    #[serde(default)]
    pub version: String,
}

/// Builds file-summary prompts and validates the model's JSON response.
pub struct FileSummaryGenerator {
    registry: Arc<PromptRegistry>,
    error_log: Arc<ErrorLog>,
    metrics: Option<Arc<Metrics>>,
}

impl FileSummaryGenerator {
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

    /// Build the completion request, enforcing the input token ceiling
    /// before anything is dispatched.
    pub fn build_request(&self, input: &FileSummaryRequest) -> Result<CompletionRequest> {
        let version = self.registry.get(KIND)?;
        let prompt = format!(
            "You are indexing a source repository for retrieval. Summarise the file below.\n\
             \n\
             Respond with exactly one JSON object:\n\
             {{\n\
             \x20 \"version\": \"{version}\",\n\
             \x20 \"summary\": [\"ordered list of what the file does; each item at most 2 lines\"],\n\
             \x20 \"risks\": [\"failure modes, footguns, or notable TODOs; each item at most 2 lines\"],\n\
             \x20 \"primary_topics\": [\"short topical labels\"],\n\
             \x20 \"key_symbols\": [\"most important functions, types, or constants\"]\n\
             }}\n\
             \n\
             File: {path} ({language})\n\
             ---\n\
             {content}\n",
            version = version,
            path = input.path,
            language = input.language,
            content = input.content,
        );
        ensure_input_budget(KIND, &prompt)?;
        Ok(CompletionRequest::new(prompt)
            .with_temperature(KIND.temperature())
            .with_max_tokens(KIND.max_output_tokens())
            .with_format(ResponseFormat::Json)
            .with_kind(KIND))
    }

    /// Parse and validate a response. Any failure is appended to the error
    /// log under this kind's section tag before surfacing.
    pub fn parse_response(
        &self,
        request: &CompletionRequest,
        response: &CompletionResponse,
    ) -> Result<FileSummary> {
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

    fn try_parse(&self, content: &str) -> Result<FileSummary> {
        let summary: FileSummary =
            serde_json::from_str(content).map_err(|e| Error::JsonParse(e.to_string()))?;

        if summary.summary.is_empty() {
            return Err(Error::validation("summary list must not be empty"));
        }
        for item in summary.summary.iter().chain(summary.risks.iter()) {
            if item.lines().count() > 2 {
                return Err(Error::validation("summary items are capped at 2 lines"));
            }
        }
        note_version(&self.registry, self.metrics.as_deref(), KIND, &summary.version);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn generator() -> FileSummaryGenerator {
        FileSummaryGenerator::new(
            Arc::new(PromptRegistry::with_defaults()),
            Arc::new(ErrorLog::disabled()),
        )
    }

    fn input(content: &str) -> FileSummaryRequest {
        FileSummaryRequest {
            path: "src/lib.rs".to_string(),
            language: "rust".to_string(),
            content: content.to_string(),
        }
    }

    fn response(content: &str) -> CompletionResponse {
        CompletionResponse {
            content: content.to_string(),
            tokens_used: 100,
            prompt_version: "1.1".to_string(),
            model: "mock".to_string(),
        }
    }

    #[test]
    fn test_build_request_stamps_kind_parameters() {
        let request = generator().build_request(&input("fn main() {}")).unwrap();
        assert_eq!(request.temperature, 0.3);
        assert_eq!(request.max_tokens, 600);
        assert_eq!(request.response_format, ResponseFormat::Json);
        assert_eq!(request.kind, Some(PromptKind::FileSummary));
        assert!(request.prompt.contains("src/lib.rs"));
        assert!(request.prompt.contains("\"version\": \"1.1\""));
    }

    #[test]
    fn test_oversized_file_fails_before_dispatch() {
        let huge = "line of source\n".repeat(40_000);
        let result = generator().build_request(&input(&huge));
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_valid_response_parses() {
        let generator = generator();
        let request = generator.build_request(&input("fn main() {}")).unwrap();
        let payload = r#"{
            "version": "1.1",
            "summary": ["Entry point of the binary.", "Delegates to the run loop."],
            "risks": ["Panics on malformed config."],
            "primary_topics": ["cli"],
            "key_symbols": ["main"]
        }"#;
        let summary = generator.parse_response(&request, &response(payload)).unwrap();
        assert_eq!(summary.summary.len(), 2);
        assert_eq!(summary.key_symbols, vec!["main".to_string()]);
    }

    #[test]
    fn test_three_line_item_is_rejected() {
        let generator = generator();
        let request = generator.build_request(&input("x")).unwrap();
        let payload = r#"{"version": "1.1", "summary": ["one\ntwo\nthree"]}"#;
        let result = generator.parse_response(&request, &response(payload));
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_parse_failure_is_logged() {
        let dir = tempfile::tempdir().unwrap();
        let error_log = Arc::new(ErrorLog::new(dir.path()));
        let generator = FileSummaryGenerator::new(
            Arc::new(PromptRegistry::with_defaults()),
            Arc::clone(&error_log),
        );

        let request = generator.build_request(&input("x")).unwrap();
        let result = generator.parse_response(&request, &response("{truncated"));
        assert!(matches!(result, Err(Error::JsonParse(_))));

        let path = error_log
            .file_for(chrono::Utc::now().date_naive())
            .unwrap();
        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        let record: ErrorRecord = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(record.prompt_kind, Some(PromptKind::FileSummary));
        assert_eq!(record.kind, crate::error::ErrorKind::JsonParseFailed);
    }

    #[test]
    fn test_incompatible_version_counts_a_mismatch_but_succeeds() {
        let metrics = Arc::new(Metrics::new());
        let generator = FileSummaryGenerator::new(
            Arc::new(PromptRegistry::with_defaults()),
            Arc::new(ErrorLog::disabled()),
        )
        .with_metrics(Arc::clone(&metrics));

        let request = generator.build_request(&input("x")).unwrap();
        let payload = r#"{"version": "2.0", "summary": ["Still processed."]}"#;
        let summary = generator.parse_response(&request, &response(payload)).unwrap();
        assert_eq!(summary.version, "2.0");
        assert_eq!(metrics.snapshot().version_mismatches, 1);
    }
}
