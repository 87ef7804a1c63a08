use crate::core::state::Stage;
use std::time::Duration;
use thiserror::Error;

/// Failure of a call into an LLM or vision backend.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("{backend} API error ({status}): {body}")]
    Api {
        backend: &'static str,
        status: u16,
        body: String,
    },

    /// Backend answered 200 but the payload carries an error object.
    #[error("{backend} API returned error: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },

    #[error("{backend} response empty: {reason}")]
    EmptyResponse {
        backend: &'static str,
        reason: String,
    },

    #[error("failed to parse {backend} response body: {body}")]
    Decode { backend: &'static str, body: String },

    #[error("invalid endpoint URL: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("invalid media: {0}")]
    InvalidMedia(String),

    #[error("call did not finish within {0:?}")]
    Timeout(Duration),
}

impl ServiceError {
    /// Whether repeating the same call could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Http(_) | ServiceError::Timeout(_) => true,
            ServiceError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Failure of a plan request, as seen by the caller of the orchestrator.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("creative brief is empty")]
    EmptyBrief,

    #[error("plan generation failed at stage '{stage}': {source}")]
    Generation {
        stage: Stage,
        #[source]
        source: ServiceError,
    },

    /// Final model output was not JSON after code-fence stripping.
    #[error("model output is not valid JSON: {source}")]
    Format {
        raw_text: String,
        #[source]
        source: serde_json::Error,
    },

    /// JSON parsed but does not describe a complete plan.
    #[error("{}", schema_message(.missing_fields, .invalid_fields))]
    Schema {
        missing_fields: Vec<String>,
        invalid_fields: Vec<String>,
        parsed_json: serde_json::Value,
    },

    #[error("failed to caption media: {0}")]
    Captioning(#[source] ServiceError),

    #[error("no vision backend configured")]
    VisionUnavailable,

    #[error("failed to start blocking runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("blocking plan request made from inside an async runtime; await `plan_from_brief` instead")]
    InsideRuntime,
}

impl PlanError {
    pub fn is_format(&self) -> bool {
        matches!(self, PlanError::Format { .. })
    }

    pub fn is_schema(&self) -> bool {
        matches!(self, PlanError::Schema { .. })
    }

    /// Stage at which generation broke, if it broke inside the pipeline.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PlanError::Generation { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

fn schema_message(missing: &[String], invalid: &[String]) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing required fields: {}", missing.join(", ")));
    }
    if !invalid.is_empty() {
        parts.push(format!("invalid fields: {}", invalid.join(", ")));
    }
    format!("plan JSON failed validation ({})", parts.join("; "))
}
