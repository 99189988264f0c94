pub mod types;
pub mod ledger;
pub mod upload;
pub mod archiver;

pub use types::*;
pub use ledger::*;
pub use upload::*;
pub use archiver::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Service unreachable at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Ledger rejected the entry (status {status}): {body}")]
    Ledger { status: u16, body: String },

    #[error("Object store rejected the upload (status {status}): {body}")]
    Upload { status: u16, body: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    /// Shared mapping for reqwest transport failures.
    pub(crate) fn from_transport(e: reqwest::Error, endpoint: &str, timeout_secs: u64) -> Self {
        if e.is_timeout() {
            ArchiveError::Timeout(timeout_secs)
        } else if e.is_connect() {
            ArchiveError::Connection(endpoint.to_string())
        } else {
            ArchiveError::HttpClient(e.to_string())
        }
    }
}
