//! WhatsApp messaging through Twilio.
//!
//! Two capabilities: sending a text back to a sender, and downloading the
//! media attached to an inbound message. Both are blocking and are called
//! from pipeline workers, never from the request path.

pub mod twilio;
pub mod memory;

pub use twilio::*;
pub use memory::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Twilio is unreachable at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Twilio rejected the message (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Media download failed with status {0}")]
    Download(u16),

    #[error("Media download returned an empty body")]
    EmptyMedia,
}

/// Outbound text channel. Delivery is best effort.
pub trait Messenger {
    fn send_text(&self, to: &str, body: &str) -> Result<(), MessagingError>;
}

/// Authenticated download of inbound attachments.
pub trait MediaFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, MessagingError>;
}
