use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;

/// Build the service router.
pub fn app_router(ctx: ApiContext) -> Router {
    Router::new()
        .route("/", get(endpoints::health::root))
        .route("/health", get(endpoints::health::check))
        .route("/whatsapp", post(endpoints::webhook::receive))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{RecordingMessenger, StaticMediaFetcher};
    use crate::pipeline::archive::{Archiver, MockLedgerClient};
    use crate::pipeline::batch::{BatchCoordinator, BatchDispatcher};
    use crate::pipeline::extraction::{MockOcrEngine, ReceiptTextExtractor};
    use crate::pipeline::processor::ReceiptProcessor;
    use crate::pipeline::structuring::{LlmReceiptClassifier, MockLlmClient};
    use crate::test_support::receipt_png_bytes;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        messenger: Arc<RecordingMessenger>,
        ctx: ApiContext,
        _tmp: tempfile::TempDir,
    }

    fn test_app() -> TestApp {
        let tmp = tempfile::tempdir().unwrap();
        let messenger = Arc::new(RecordingMessenger::new());
        let processor = Arc::new(ReceiptProcessor::new(
            Box::new(ReceiptTextExtractor::new(Box::new(MockOcrEngine::new(
                "PANADERIA\nTOTAL 340",
            )))),
            Box::new(LlmReceiptClassifier::new(
                Box::new(MockLlmClient::new(
                    r#"{"total": 340.0, "categoria": "Materia Prima"}"#,
                )),
                "gemini-test",
            )),
            Archiver::new(None, Box::new(MockLedgerClient::accepting())),
        ));
        let fetcher = StaticMediaFetcher::new().with("https://media.test/0", receipt_png_bytes());
        let dispatcher = Arc::new(BatchDispatcher::new(
            Arc::new(BatchCoordinator::new(messenger.clone())),
            processor,
            messenger.clone(),
            Arc::new(fetcher),
            tmp.path().to_path_buf(),
        ));
        let ctx = ApiContext::new(dispatcher);
        TestApp {
            router: app_router(ctx.clone()),
            messenger,
            ctx,
            _tmp: tmp,
        }
    }

    fn webhook_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/whatsapp")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn wait_for_messages(messenger: &RecordingMessenger, count: usize) {
        for _ in 0..200 {
            if messenger.sent().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} messages, got {:?}", messenger.sent());
    }

    #[tokio::test]
    async fn root_is_plain_text_liveness() {
        let app = test_app();
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Gastobot"));
    }

    #[tokio::test]
    async fn health_reports_in_flight_batches() {
        let app = test_app();
        app.ctx.coordinator().register_batch("whatsapp:+1", 2).unwrap();

        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], crate::config::APP_VERSION);
        assert_eq!(json["batches_in_flight"], 1);
    }

    #[tokio::test]
    async fn image_message_returns_204_and_summarizes() {
        let app = test_app();
        let req = webhook_request(
            "From=whatsapp%3A%2B5491100000000&NumMedia=1\
             &MediaUrl0=https%3A%2F%2Fmedia.test%2F0&MediaContentType0=image%2Fjpeg",
        );

        let response = app.router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(body_text(response).await.is_empty());

        wait_for_messages(&app.messenger, 2).await;
        let sent = app.messenger.sent();
        assert_eq!(sent[1].0, "whatsapp:+5491100000000");
        assert!(sent[1].1.contains("1 succeeded, 0 failed"));
    }

    #[tokio::test]
    async fn text_only_message_gets_twiml_instructions() {
        let app = test_app();
        let response = app
            .router
            .oneshot(webhook_request("From=whatsapp%3A%2B1&NumMedia=0&Body=hola"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let ct = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(ct.starts_with("application/xml"));
        let body = body_text(response).await;
        assert!(body.contains("<Response><Message>"));
        assert!(body.contains("photo of the receipt"));
        assert!(app.messenger.sent().is_empty());
        assert_eq!(app.ctx.coordinator().in_flight(), 0);
    }

    #[tokio::test]
    async fn audio_only_message_treated_as_no_image() {
        let app = test_app();
        let response = app
            .router
            .oneshot(webhook_request(
                "From=s&NumMedia=1&MediaUrl0=https%3A%2F%2Fmedia.test%2F0&MediaContentType0=audio%2Fogg",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("<Message>"));
    }

    #[tokio::test]
    async fn missing_sender_is_400() {
        let app = test_app();
        let response = app
            .router
            .oneshot(webhook_request("NumMedia=1&MediaUrl0=x"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = test_app();
        let req = Request::builder().uri("/nope").body(Body::empty()).unwrap();
        let response = app.router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
