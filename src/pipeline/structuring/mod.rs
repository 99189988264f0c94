pub mod types;
pub mod prompt;
pub mod json_extract;
pub mod parser;
pub mod gemini;
pub mod orchestrator;

pub use types::*;
pub use prompt::*;
pub use json_extract::*;
pub use parser::*;
pub use gemini::*;
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StructuringError {
    #[error("Gemini API is unreachable at {0}")]
    Connection(String),

    #[error("Gemini returned error (status {status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("Gemini request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Gemini returned no candidate text")]
    EmptyResponse,

    #[error("Malformed classifier response: {0}")]
    MalformedResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),

    #[error("Required field missing from classification: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Category not in the allowed set: {0:?}")]
    UnknownCategory(String),

    #[error("No text to classify")]
    InputEmpty,
}
