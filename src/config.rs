//! Application constants and runtime configuration.
//!
//! Settings come from the process environment. `run()` loads a `.env` file
//! first (if present) so local development works without exporting variables.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Gastobot";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Twilio WhatsApp sandbox sender.
pub const DEFAULT_WHATSAPP_FROM: &str = "whatsapp:+14155238886";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_TWILIO_API_BASE: &str = "https://api.twilio.com";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,gastobot=debug,gastobot_lib=debug,tower_http=info"
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Twilio account credentials and sender number.
#[derive(Debug, Clone)]
pub struct TwilioSettings {
    pub account_sid: String,
    pub auth_token: String,
    pub whatsapp_from: String,
    pub api_base: String,
}

/// Gemini classifier settings.
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

/// Downstream expense ledger.
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub base_url: String,
    pub api_token: String,
}

/// Optional object storage for receipt images.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub upload_base_url: String,
    pub public_base_url: String,
    pub api_token: Option<String>,
}

/// Tesseract command-line OCR.
#[derive(Debug, Clone)]
pub struct OcrSettings {
    pub command: String,
    pub language: String,
}

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub twilio: TwilioSettings,
    pub gemini: GeminiSettings,
    pub ledger: LedgerSettings,
    pub storage: Option<StorageSettings>,
    pub ocr: OcrSettings,
    /// Applied to every outbound HTTP call and to the OCR process.
    pub http_timeout: Duration,
    /// Where downloaded attachments are staged while a worker runs.
    pub temp_dir: PathBuf,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let port = match get("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                var: "PORT",
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };
        let host = match get("BIND_HOST") {
            Some(raw) => raw.parse::<IpAddr>().map_err(|e| ConfigError::Invalid {
                var: "BIND_HOST",
                reason: e.to_string(),
            })?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        let timeout_secs = match get("HTTP_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                    var: "HTTP_TIMEOUT_SECS",
                    reason: e.to_string(),
                })?;
                if secs == 0 {
                    return Err(ConfigError::Invalid {
                        var: "HTTP_TIMEOUT_SECS",
                        reason: "must be greater than zero".into(),
                    });
                }
                secs
            }
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        let storage = match (get("STORAGE_UPLOAD_URL"), get("STORAGE_PUBLIC_URL")) {
            (Some(upload), Some(public)) => Some(StorageSettings {
                upload_base_url: upload,
                public_base_url: public,
                api_token: get("STORAGE_API_TOKEN"),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("STORAGE_PUBLIC_URL")),
            (None, Some(_)) => return Err(ConfigError::Missing("STORAGE_UPLOAD_URL")),
        };

        Ok(Self {
            bind_addr: SocketAddr::new(host, port),
            twilio: TwilioSettings {
                account_sid: require("TWILIO_ACCOUNT_SID")?,
                auth_token: require("TWILIO_AUTH_TOKEN")?,
                whatsapp_from: get("TWILIO_WHATSAPP_FROM")
                    .unwrap_or_else(|| DEFAULT_WHATSAPP_FROM.to_string()),
                api_base: get("TWILIO_API_BASE")
                    .unwrap_or_else(|| DEFAULT_TWILIO_API_BASE.to_string()),
            },
            gemini: GeminiSettings {
                api_key: require("GEMINI_API_KEY")?,
                model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
                base_url: get("GEMINI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            },
            ledger: LedgerSettings {
                base_url: require("LEDGER_BASE_URL")?,
                api_token: require("LEDGER_API_TOKEN")?,
            },
            storage,
            ocr: OcrSettings {
                command: get("TESSERACT_CMD").unwrap_or_else(|| "tesseract".to_string()),
                language: get("OCR_LANG").unwrap_or_else(|| "spa".to_string()),
            },
            http_timeout: Duration::from_secs(timeout_secs),
            temp_dir: get("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
        })
    }
}
