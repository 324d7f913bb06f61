pub mod types;
pub mod prompt;
pub mod sanitize;
pub mod parser;
pub mod heuristic;
pub mod openai;
pub mod orchestrator;
pub mod completion;

pub use types::*;
pub use prompt::*;
pub use sanitize::*;
pub use parser::*;
pub use heuristic::*;
pub use openai::*;
pub use orchestrator::*;
pub use completion::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StructuringError {
    #[error("Completion API is not reachable at {0}")]
    Connection(String),

    #[error("Completion API returned error (status {status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("Completion request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("No completion client configured")]
    NoClient,

    #[error("Malformed completion response: {0}")]
    MalformedResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),

    #[error("Recipe JSON is missing required fields: {0}")]
    SchemaMismatch(String),

    #[error("Input text is empty")]
    InputEmpty,
}

impl StructuringError {
    /// The model answered, but not with a usable recipe.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            StructuringError::MalformedResponse(_)
                | StructuringError::JsonParsing(_)
                | StructuringError::SchemaMismatch(_)
        )
    }
}
