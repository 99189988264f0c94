use std::sync::Mutex;
use std::time::Duration;

use super::types::{ExpenseRecord, LedgerClient, LedgerEntry};
use super::ArchiveError;

/// Expense ledger reached over HTTP with a bearer token.
pub struct HttpLedgerClient {
    base_url: String,
    api_token: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpLedgerClient {
    pub fn new(base_url: &str, api_token: &str, timeout: Duration) -> Result<Self, ArchiveError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ArchiveError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
            client,
            timeout_secs: timeout.as_secs(),
        })
    }

    fn entries_url(&self) -> String {
        format!("{}/api/gastos", self.base_url)
    }
}

impl LedgerClient for HttpLedgerClient {
    fn submit(&self, record: &ExpenseRecord) -> Result<(), ArchiveError> {
        let url = self.entries_url();
        let entry = LedgerEntry::from(record);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&entry)
            .send()
            .map_err(|e| ArchiveError::from_transport(e, &self.base_url, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ArchiveError::Ledger {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(status = status.as_u16(), fecha = %entry.fecha, "Ledger accepted entry");
        Ok(())
    }
}

/// Mock ledger that keeps every submitted record.
pub struct MockLedgerClient {
    reject_with: Option<(u16, String)>,
    submitted: Mutex<Vec<ExpenseRecord>>,
}

impl MockLedgerClient {
    pub fn accepting() -> Self {
        Self {
            reject_with: None,
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting(status: u16, body: &str) -> Self {
        Self {
            reject_with: Some((status, body.to_string())),
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// Records seen so far, including rejected ones.
    pub fn submitted(&self) -> Vec<ExpenseRecord> {
        self.submitted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl LedgerClient for MockLedgerClient {
    fn submit(&self, record: &ExpenseRecord) -> Result<(), ArchiveError> {
        self.submitted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record.clone());
        match &self.reject_with {
            Some((status, body)) => Err(ArchiveError::Ledger {
                status: *status,
                body: body.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::structuring::ExpenseCategory;
    use crate::test_support::spawn_http_stub;
    use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use chrono::NaiveDate;
    use std::sync::Arc;

    type Captured = Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>;

    fn ledger_stub(status: StatusCode) -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(Vec::new()));
        let sink = captured.clone();
        let app = Router::new().route(
            "/api/gastos",
            post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                let sink = sink.clone();
                async move {
                    let auth = headers
                        .get(AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .map(String::from);
                    sink.lock().unwrap().push((auth, body));
                    (status, "ledger says no")
                }
            }),
        );
        (spawn_http_stub(app), captured)
    }

    fn record() -> ExpenseRecord {
        ExpenseRecord {
            date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            amount: 1520.75,
            category: ExpenseCategory::Bebidas,
            reference: "N/A".into(),
            merchant: None,
            items: vec![],
        }
    }

    #[test]
    fn submit_posts_entry_with_bearer_token() {
        let (base, captured) = ledger_stub(StatusCode::CREATED);
        let client = HttpLedgerClient::new(&base, "tok-123", Duration::from_secs(5)).unwrap();

        client.submit(&record()).unwrap();

        let seen = captured.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.as_deref(), Some("Bearer tok-123"));
        assert_eq!(seen[0].1["fecha"], "2024-05-02");
        assert_eq!(seen[0].1["categoria"], "Bebidas");
        assert_eq!(seen[0].1["concepto"], "N/A");
        assert_eq!(seen[0].1["monto"], 1520.75);
    }

    #[test]
    fn non_2xx_keeps_status_and_body() {
        let (base, _) = ledger_stub(StatusCode::UNPROCESSABLE_ENTITY);
        let client = HttpLedgerClient::new(&base, "tok", Duration::from_secs(5)).unwrap();

        match client.submit(&record()).unwrap_err() {
            ArchiveError::Ledger { status, body } => {
                assert_eq!(status, 422);
                assert_eq!(body, "ledger says no");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unreachable_ledger_is_transport_error() {
        let client =
            HttpLedgerClient::new("http://127.0.0.1:1", "tok", Duration::from_secs(2)).unwrap();
        assert!(matches!(
            client.submit(&record()),
            Err(ArchiveError::Connection(_) | ArchiveError::HttpClient(_))
        ));
    }

    #[test]
    fn mock_rejecting_still_records() {
        let mock = MockLedgerClient::rejecting(500, "boom");
        assert!(mock.submit(&record()).is_err());
        assert_eq!(mock.submitted().len(), 1);
    }
}
