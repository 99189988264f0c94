use std::collections::HashMap;
use std::sync::Mutex;

use super::{MediaFetcher, MessagingError, Messenger};

/// Messenger that keeps every message in memory instead of sending it.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the attempt, then fails as if Twilio refused it.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// `(to, body)` pairs in send order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Messenger for RecordingMessenger {
    fn send_text(&self, to: &str, body: &str) -> Result<(), MessagingError> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((to.to_string(), body.to_string()));
        if self.fail {
            return Err(MessagingError::Rejected {
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(())
    }
}

/// Serves fixed bytes per URL; unknown URLs answer 404.
#[derive(Default)]
pub struct StaticMediaFetcher {
    media: HashMap<String, Vec<u8>>,
}

impl StaticMediaFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.media.insert(url.to_string(), bytes);
        self
    }
}

impl MediaFetcher for StaticMediaFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, MessagingError> {
        self.media
            .get(url)
            .cloned()
            .ok_or(MessagingError::Download(404))
    }
}
