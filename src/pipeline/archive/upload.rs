use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;

use super::types::ImageUploader;
use super::ArchiveError;

/// Generic object store: `PUT {upload_base}/{key}`, served at `{public_base}/{key}`.
pub struct HttpObjectStore {
    upload_base: String,
    public_base: String,
    api_token: Option<String>,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpObjectStore {
    pub fn new(
        upload_base: &str,
        public_base: &str,
        api_token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ArchiveError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ArchiveError::HttpClient(e.to_string()))?;

        Ok(Self {
            upload_base: upload_base.trim_end_matches('/').to_string(),
            public_base: public_base.trim_end_matches('/').to_string(),
            api_token: api_token.map(String::from),
            client,
            timeout_secs: timeout.as_secs(),
        })
    }
}

impl ImageUploader for HttpObjectStore {
    fn upload(&self, bytes: &[u8], content_type: &str, key: &str) -> Result<String, ArchiveError> {
        let key = key.trim_start_matches('/');
        let url = format!("{}/{}", self.upload_base, key);

        let mut request = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes.to_vec());
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .map_err(|e| ArchiveError::from_transport(e, &self.upload_base, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ArchiveError::Upload {
                status: status.as_u16(),
                body,
            });
        }

        Ok(format!("{}/{}", self.public_base, key))
    }
}

/// Mock uploader returning `{base}/{key}` or a fixed failure.
pub struct MockImageUploader {
    public_base: String,
    fail: bool,
    calls: AtomicUsize,
}

impl MockImageUploader {
    pub fn new(public_base: &str) -> Self {
        Self {
            public_base: public_base.to_string(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageUploader for MockImageUploader {
    fn upload(&self, _bytes: &[u8], _content_type: &str, key: &str) -> Result<String, ArchiveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ArchiveError::Upload {
                status: 503,
                body: "bucket unavailable".into(),
            });
        }
        Ok(format!("{}/{}", self.public_base, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_http_stub;
    use axum::body::Bytes;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::put;
    use axum::Router;
    use std::sync::{Arc, Mutex};

    #[test]
    fn upload_puts_bytes_and_returns_public_url() {
        let seen: Arc<Mutex<Option<(String, String, usize, Option<String>)>>> =
            Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let app = Router::new().route(
            "/bucket/*key",
            put(move |Path(key): Path<String>, headers: HeaderMap, body: Bytes| {
                let sink = sink.clone();
                async move {
                    let ct = headers
                        .get("content-type")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(String::from);
                    *sink.lock().unwrap() = Some((key, ct, body.len(), auth));
                    StatusCode::OK
                }
            }),
        );
        let base = spawn_http_stub(app);

        let store = HttpObjectStore::new(
            &format!("{base}/bucket"),
            "https://cdn.example.com/",
            Some("up-token"),
            Duration::from_secs(5),
        )
        .unwrap();

        let url = store
            .upload(&[1, 2, 3, 4], "image/jpeg", "receipts/2024-05-02/abc.jpg")
            .unwrap();
        assert_eq!(url, "https://cdn.example.com/receipts/2024-05-02/abc.jpg");

        let (key, ct, len, auth) = seen.lock().unwrap().clone().unwrap();
        assert_eq!(key, "receipts/2024-05-02/abc.jpg");
        assert_eq!(ct, "image/jpeg");
        assert_eq!(len, 4);
        assert_eq!(auth.as_deref(), Some("Bearer up-token"));
    }

    #[test]
    fn rejected_upload_is_error() {
        let app = Router::new().route("/*key", put(|| async { (StatusCode::FORBIDDEN, "denied") }));
        let base = spawn_http_stub(app);
        let store =
            HttpObjectStore::new(&base, "https://cdn.example.com", None, Duration::from_secs(5))
                .unwrap();

        match store.upload(&[0], "image/png", "x.png").unwrap_err() {
            ArchiveError::Upload { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "denied");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn mock_failing_counts_calls() {
        let mock = MockImageUploader::failing();
        assert!(mock.upload(&[], "image/png", "k").is_err());
        assert_eq!(mock.call_count(), 1);
    }
}
