use std::time::Duration;

use super::{MediaFetcher, MessagingError, Messenger};
use crate::config::TwilioSettings;

/// Twilio REST client: message send and media download with account auth.
pub struct TwilioClient {
    account_sid: String,
    auth_token: String,
    from: String,
    api_base: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl TwilioClient {
    pub fn new(settings: &TwilioSettings, timeout: Duration) -> Result<Self, MessagingError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MessagingError::HttpClient(e.to_string()))?;

        Ok(Self {
            account_sid: settings.account_sid.clone(),
            auth_token: settings.auth_token.clone(),
            from: settings.whatsapp_from.clone(),
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            client,
            timeout_secs: timeout.as_secs(),
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }

    fn map_send_error(&self, e: reqwest::Error, endpoint: &str) -> MessagingError {
        if e.is_timeout() {
            MessagingError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            MessagingError::Connection(endpoint.to_string())
        } else {
            MessagingError::HttpClient(e.to_string())
        }
    }
}

impl Messenger for TwilioClient {
    fn send_text(&self, to: &str, body: &str) -> Result<(), MessagingError> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from.as_str()), ("Body", body)])
            .send()
            .map_err(|e| self.map_send_error(e, &self.api_base))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(MessagingError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

impl MediaFetcher for TwilioClient {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, MessagingError> {
        let response = self
            .client
            .get(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .map_err(|e| self.map_send_error(e, url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MessagingError::Download(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .map_err(|e| MessagingError::HttpClient(e.to_string()))?;
        if bytes.is_empty() {
            return Err(MessagingError::EmptyMedia);
        }
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_http_stub;
    use axum::extract::Path;
    use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Form, Router};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn settings(api_base: &str) -> TwilioSettings {
        TwilioSettings {
            account_sid: "AC123".into(),
            auth_token: "secret".into(),
            whatsapp_from: "whatsapp:+14155238886".into(),
            api_base: api_base.into(),
        }
    }

    type Seen = Arc<Mutex<Vec<(String, Option<String>, HashMap<String, String>)>>>;

    #[test]
    fn send_text_posts_form_with_basic_auth() {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let app = Router::new().route(
            "/2010-04-01/Accounts/:sid/Messages.json",
            post(
                move |Path(sid): Path<String>,
                      headers: HeaderMap,
                      Form(form): Form<HashMap<String, String>>| {
                    let sink = sink.clone();
                    async move {
                        let auth = headers
                            .get(AUTHORIZATION)
                            .and_then(|v| v.to_str().ok())
                            .map(String::from);
                        sink.lock().unwrap().push((sid, auth, form));
                        (StatusCode::CREATED, "{}")
                    }
                },
            ),
        );
        let base = spawn_http_stub(app);
        let client = TwilioClient::new(&settings(&base), Duration::from_secs(5)).unwrap();

        client.send_text("whatsapp:+5491100000000", "hola").unwrap();

        let seen = seen.lock().unwrap();
        let (sid, auth, form) = &seen[0];
        assert_eq!(sid, "AC123");
        // base64("AC123:secret")
        assert_eq!(auth.as_deref(), Some("Basic QUMxMjM6c2VjcmV0"));
        assert_eq!(form["To"], "whatsapp:+5491100000000");
        assert_eq!(form["From"], "whatsapp:+14155238886");
        assert_eq!(form["Body"], "hola");
    }

    #[test]
    fn rejected_send_keeps_status() {
        let app = Router::new().route(
            "/2010-04-01/Accounts/:sid/Messages.json",
            post(|| async { (StatusCode::BAD_REQUEST, "invalid To") }),
        );
        let base = spawn_http_stub(app);
        let client = TwilioClient::new(&settings(&base), Duration::from_secs(5)).unwrap();

        assert!(matches!(
            client.send_text("nobody", "x"),
            Err(MessagingError::Rejected { status: 400, .. })
        ));
    }

    #[test]
    fn fetch_downloads_media_bytes() {
        let app = Router::new()
            .route("/media/ok", get(|| async { vec![0xFFu8, 0xD8, 0xFF, 0xE0] }))
            .route("/media/gone", get(|| async { StatusCode::NOT_FOUND }));
        let base = spawn_http_stub(app);
        let client = TwilioClient::new(&settings(&base), Duration::from_secs(5)).unwrap();

        let bytes = client.fetch(&format!("{base}/media/ok")).unwrap();
        assert_eq!(bytes, vec![0xFF, 0xD8, 0xFF, 0xE0]);

        assert!(matches!(
            client.fetch(&format!("{base}/media/gone")),
            Err(MessagingError::Download(404))
        ));
    }
}
