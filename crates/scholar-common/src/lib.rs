use serde::{Deserialize, Serialize};

/// Error taxonomy shared across the workspace.
///
/// Every variant that can reach the chat boundary has a user-facing
/// rendering via [`ScholarError::user_message`]; nothing here is fatal to
/// the process.
#[derive(thiserror::Error, Debug)]
pub enum ScholarError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("LLM API error: {0}")]
    Llm(String),

    #[error("could not confidently classify the request: {0}")]
    ClassificationAmbiguous(String),

    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    #[error("external service failure: {0}")]
    ExternalService(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl ScholarError {
    /// Render the error as a message suitable for the chat surface.
    pub fn user_message(&self) -> String {
        match self {
            ScholarError::MissingParameter(what) => {
                format!("I need a bit more information: please provide {}.", what)
            }
            ScholarError::ClassificationAmbiguous(detail) => format!(
                "I wasn't sure how to handle that request ({}). Could you rephrase it?",
                detail
            ),
            ScholarError::Llm(detail) => {
                format!("The language model request failed: {}", detail)
            }
            ScholarError::ExternalService(detail) => {
                format!("An external service call failed: {}", detail)
            }
            ScholarError::UnsupportedOperation(detail) => {
                format!("That operation isn't supported: {}", detail)
            }
            other => format!("Sorry, I encountered an error: {}", other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScholarError>;

/// Outcome of a single tool invocation. Produced by a wrapper, consumed
/// immediately by the invoking agent; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub status: ToolStatus,
    /// Text (or serialized structured) payload on success; best-effort
    /// partial output otherwise.
    pub payload: String,
    /// Failure detail when `status == Error`.
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolStatus {
    Ok,
    Error,
}

impl ToolResult {
    pub fn ok(payload: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Ok,
            payload: payload.into(),
            detail: None,
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            payload: String::new(),
            detail: Some(detail.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ToolStatus::Ok
    }

    /// Convert an error-status result into the shared error type, keeping
    /// ok-status results untouched.
    pub fn into_payload(self) -> Result<String> {
        match self.status {
            ToolStatus::Ok => Ok(self.payload),
            ToolStatus::Error => Err(ScholarError::ExternalService(
                self.detail.unwrap_or_else(|| "unknown tool failure".to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_result_converts_to_external_service() {
        let result = ToolResult::error("connection refused");
        match result.into_payload() {
            Err(ScholarError::ExternalService(detail)) => {
                assert!(detail.contains("connection refused"))
            }
            other => panic!("unexpected outcome: {:?}", other.err()),
        }
    }

    #[test]
    fn user_message_is_never_empty() {
        let errors = vec![
            ScholarError::MissingParameter("a URL to crawl".to_string()),
            ScholarError::ExternalService("HTTP 503".to_string()),
            ScholarError::Llm("quota exceeded".to_string()),
            ScholarError::UnsupportedOperation("tool calling".to_string()),
        ];
        for e in errors {
            assert!(!e.user_message().is_empty());
        }
    }
}
