//! Meta webhook endpoint handlers
//!
//! Implements both the verification endpoint (GET) and the event receiver (POST).
//!
//! # Security
//!
//! The POST endpoint verifies the `X-Hub-Signature-256` HMAC over the raw body
//! before anything is routed. The GET handshake is protected only by the
//! pre-shared verify token.

use super::{
    handshake::{self, HandshakeOutcome, HandshakeQuery},
    raw_body::RawRequest,
    security,
};
use crate::{front::AppState, metric, webhook::errors::WebhookError};
use ntex::{util::Bytes, web};
use uuid::Uuid;

/// Webhook verification endpoint (GET)
///
/// # Returns
/// - 200 with the literal challenge if mode and token match
/// - 403 on a mode or token mismatch
/// - 400 if mode or token is absent
#[web::get("")]
pub async fn verify(
    query: web::types::Query<HandshakeQuery>,
    app_state: web::types::State<AppState>,
) -> Result<impl web::Responder, web::Error> {
    match handshake::answer_handshake(&query, &app_state.config.meta_verify_token) {
        HandshakeOutcome::Verified(challenge) => Ok(web::HttpResponse::Ok()
            .content_type("text/plain")
            .body(challenge)),
        HandshakeOutcome::Rejected => Err(WebhookError::HandshakeRejected.into()),
        HandshakeOutcome::MissingParams => Err(WebhookError::MissingHandshakeParams.into()),
    }
}

/// Webhook receiver endpoint (POST)
///
/// Parses the raw body, checks its signature and hands every event to the
/// dispatch queue. Responds as soon as dispatch has been initiated, handlers
/// run afterwards on the dispatch worker.
///
/// # Returns
/// - 200 with an empty body once events are queued
/// - 400 if the body is not valid JSON
/// - 403 if the signature is missing or invalid and verification is required
#[web::post("")]
pub async fn receive(
    req: web::HttpRequest,
    body: Bytes,
    app_state: web::types::State<AppState>,
) -> Result<impl web::Responder, web::Error> {
    let delivery_id = Uuid::new_v4();
    let _span = logfire::span!(
        "meta_webhook {delivery_id}",
        delivery_id = delivery_id.to_string()
    )
    .entered();

    let request = RawRequest::capture(&req, body)?;

    let verification = security::verify_signature(
        request.signature_header(),
        request.raw(),
        &app_state.config.meta_app_secret,
    );
    metric::incr_signature_statds(verification.as_str());
    app_state.config.signature_policy().enforce(verification)?;

    let report = app_state.router.route(delivery_id, request.json());
    logfire::info!(
        "Received {object} webhook: entries={entries}, dispatched={dispatched}, unhandled={unhandled}, malformed={malformed}, dropped={dropped}",
        object = report.object,
        entries = report.entries as i64,
        dispatched = report.dispatched as i64,
        unhandled = report.unhandled as i64,
        malformed = report.malformed as i64,
        dropped = report.dropped as i64
    );

    Ok(web::HttpResponse::Ok().finish())
}

#[cfg(test)]
mod tests {
    use crate::{
        config::AppConfig,
        consts,
        front::{self, AppState},
        webhook::{
            self,
            dispatcher::{DispatchWorker, Dispatcher},
            registry::{HandlerRegistry, handler_fn},
            router::EventRouter,
            schemas::ObjectType,
            security,
        },
    };
    use ntex::{
        http,
        web::{self, test},
    };
    use std::{
        collections::HashMap,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    const SECRET: &str = "app-secret";
    const TOKEN: &str = "verify-token";

    fn test_config(require_signature: bool) -> AppConfig {
        let env = HashMap::from([
            ("META_VERIFY_TOKEN".to_string(), TOKEN.to_string()),
            ("META_APP_SECRET".to_string(), SECRET.to_string()),
            ("META_ACCESS_TOKEN".to_string(), "access".to_string()),
            (
                "REQUIRE_SIGNATURE".to_string(),
                require_signature.to_string(),
            ),
        ]);
        AppConfig::load_from(&env).unwrap()
    }

    fn test_state(require_signature: bool, counter: &Arc<AtomicUsize>) -> (AppState, DispatchWorker) {
        let counter = counter.clone();
        let mut registry = HandlerRegistry::new();
        registry.register(
            ObjectType::Instagram,
            "mentions",
            handler_fn(move |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    anyhow::Ok(())
                }
            }),
        );

        let (dispatcher, worker) = Dispatcher::new(16, Duration::from_secs(1));
        let state = AppState::new(
            Arc::new(test_config(require_signature)),
            EventRouter::new(Arc::new(registry), dispatcher),
        );
        (state, worker)
    }

    const MENTION_BODY: &[u8] = br#"{"object":"instagram","entry":[{"id":"1","changes":[{"field":"mentions","value":{"media_id":"m1","comment_id":"c1"}}]}]}"#;

    #[ntex::test]
    async fn test_handshake_endpoint() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (state, _worker) = test_state(true, &counter);
        let app = test::init_service(
            web::App::new()
                .state(state)
                .configure(webhook::routes::webhook),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/webhook?hub.mode=subscribe&hub.verify_token=verify-token&hub.challenge=CHALLENGE_ACCEPTED")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), http::StatusCode::OK);
        let body = test::read_body(resp).await;
        assert_eq!(&body[..], b"CHALLENGE_ACCEPTED");

        let req = test::TestRequest::get()
            .uri("/webhook?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=x")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), http::StatusCode::FORBIDDEN);

        let req = test::TestRequest::get()
            .uri("/webhook?hub.verify_token=verify-token&hub.challenge=x")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), http::StatusCode::BAD_REQUEST);
    }

    #[ntex::test]
    async fn test_signed_delivery_is_acknowledged_and_dispatched() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (state, mut worker) = test_state(true, &counter);
        let app = test::init_service(
            web::App::new()
                .state(state)
                .configure(webhook::routes::webhook),
        )
        .await;

        let signature = security::sign(MENTION_BODY, SECRET).unwrap();
        let req = test::TestRequest::post()
            .uri("/webhook")
            .header(consts::SIGNATURE_HEADER, signature.as_str())
            .set_payload(MENTION_BODY)
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), http::StatusCode::OK);
        assert!(test::read_body(resp).await.is_empty());
        // the ack does not wait for the handler
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        assert_eq!(worker.run_pending().await, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[ntex::test]
    async fn test_bad_signatures_are_forbidden() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (state, mut worker) = test_state(true, &counter);
        let app = test::init_service(
            web::App::new()
                .state(state)
                .configure(webhook::routes::webhook),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/webhook")
            .set_payload(MENTION_BODY)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), http::StatusCode::FORBIDDEN);

        let signature = security::sign(MENTION_BODY, "other-secret").unwrap();
        let req = test::TestRequest::post()
            .uri("/webhook")
            .header(consts::SIGNATURE_HEADER, signature.as_str())
            .set_payload(MENTION_BODY)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), http::StatusCode::FORBIDDEN);
        assert!(test::read_body(resp).await.is_empty());

        assert_eq!(worker.run_pending().await, 0);
    }

    #[ntex::test]
    async fn test_optional_signature_still_routes() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (state, mut worker) = test_state(false, &counter);
        let app = test::init_service(
            web::App::new()
                .state(state)
                .configure(webhook::routes::webhook),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/webhook")
            .set_payload(MENTION_BODY)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), http::StatusCode::OK);
        assert_eq!(worker.run_pending().await, 1);
    }

    #[ntex::test]
    async fn test_invalid_json_is_bad_request() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (state, _worker) = test_state(true, &counter);
        let app = test::init_service(
            web::App::new()
                .state(state)
                .configure(webhook::routes::webhook),
        )
        .await;

        let body: &[u8] = b"{\"object\": \"instagram\", ";
        let signature = security::sign(body, SECRET).unwrap();
        let req = test::TestRequest::post()
            .uri("/webhook")
            .header(consts::SIGNATURE_HEADER, signature.as_str())
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), http::StatusCode::BAD_REQUEST);
    }

    #[ntex::test]
    async fn test_unknown_object_is_acknowledged() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (state, mut worker) = test_state(true, &counter);
        let app = test::init_service(
            web::App::new()
                .state(state)
                .configure(webhook::routes::webhook),
        )
        .await;

        let body: &[u8] = br#"{"object":"unknown_type","entry":[]}"#;
        let signature = security::sign(body, SECRET).unwrap();
        let req = test::TestRequest::post()
            .uri("/webhook")
            .header(consts::SIGNATURE_HEADER, signature.as_str())
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), http::StatusCode::OK);
        assert_eq!(worker.run_pending().await, 0);
    }

    #[ntex::test]
    async fn test_liveness_and_not_found() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (state, _worker) = test_state(true, &counter);
        let app = test::init_service(
            web::App::new()
                .state(state)
                .configure(webhook::routes::webhook)
                .service(front::server::index)
                .default_service(web::route().to(front::server::serve_not_found)),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), http::StatusCode::OK);
        assert_eq!(&test::read_body(resp).await[..], consts::LIVENESS_TEXT.as_bytes());

        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/nope").to_request()).await;
        assert_eq!(resp.status(), http::StatusCode::NOT_FOUND);
    }
}
