//! Domain classification prompts and response validation.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::error_log::{ErrorLog, ErrorRecord};
use crate::llm::{CompletionRequest, CompletionResponse, ResponseFormat};
use crate::metrics::Metrics;

use super::{ensure_input_budget, note_version, PromptKind, PromptRegistry};

const KIND: PromptKind = PromptKind::DomainClassification;

/// Categorical tag assigned to a file.
///
/// The conventional fallback when classification fails is [`Domain::Code`],
/// but that policy belongs to callers; this component only rejects tags
/// outside the set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    #[default]
    Code,
    Architecture,
    Ops,
    Tests,
    Infra,
}

impl FromStr for Domain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "code" => Ok(Self::Code),
            "architecture" => Ok(Self::Architecture),
            "ops" => Ok(Self::Ops),
            "tests" => Ok(Self::Tests),
            "infra" => Ok(Self::Infra),
            other => Err(Error::validation(format!("unknown domain {other:?}"))),
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Code => write!(f, "code"),
            Self::Architecture => write!(f, "architecture"),
            Self::Ops => write!(f, "ops"),
            Self::Tests => write!(f, "tests"),
            Self::Infra => write!(f, "infra"),
        }
    }
}

/// Typed input for one classification.
#[derive(Debug, Clone)]
pub struct DomainClassificationRequest {
    pub path: String,
    pub content: String,
}

/// Validated classification payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainClassification {
    pub domain: Domain,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub version: String,
}

/// Raw payload as the model emits it; the domain string is validated
/// separately so an out-of-set tag is a constraint violation, not a parse
/// failure.
#[derive(Debug, Deserialize)]
struct RawClassification {
    domain: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    version: String,
}

/// Builds classification prompts and validates the model's JSON response.
pub struct DomainClassifier {
    registry: Arc<PromptRegistry>,
    error_log: Arc<ErrorLog>,
    metrics: Option<Arc<Metrics>>,
}

impl DomainClassifier {
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

    pub fn build_request(&self, input: &DomainClassificationRequest) -> Result<CompletionRequest> {
        let version = self.registry.get(KIND)?;
        let prompt = format!(
            "Classify the file below into exactly one domain:\n\
             code | architecture | ops | tests | infra\n\
             \n\
             Respond with exactly one JSON object:\n\
             {{\n\
             \x20 \"version\": \"{version}\",\n\
             \x20 \"domain\": \"code\",\n\
             \x20 \"reason\": \"one short sentence\"\n\
             }}\n\
             \n\
             File: {path}\n\
             ---\n\
             {content}\n",
            version = version,
            path = input.path,
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
    ) -> Result<DomainClassification> {
        match self.try_parse(&response.content) {
            Ok(classification) => Ok(classification),
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

    fn try_parse(&self, content: &str) -> Result<DomainClassification> {
        let raw: RawClassification =
            serde_json::from_str(content).map_err(|e| Error::JsonParse(e.to_string()))?;
        let domain = Domain::from_str(&raw.domain)?;

        note_version(&self.registry, self.metrics.as_deref(), KIND, &raw.version);
        Ok(DomainClassification {
            domain,
            reason: raw.reason,
            version: raw.version,
        })
    }
}
