//! HTTP surface: Twilio webhook plus liveness and health routes.
//!
//! The webhook never waits for receipt processing. It validates the
//! inbound form, hands image attachments to the batch dispatcher, and
//! answers Twilio straight away.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use router::app_router;
pub use server::{start_server, GastobotServer};
pub use types::ApiContext;
