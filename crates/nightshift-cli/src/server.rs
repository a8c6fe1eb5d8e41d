//! Webhook server.
//!
//! - `POST /webhook` runs one submission through the pipeline.
//! - `GET /plans/{key}` returns the stored record for a delivery key.
//! - `GET /plans/{key}/html` renders it as a page.
//! - `GET /health` answers liveness checks.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use nightshift_core::{DeliveryKey, DeliveryRecord};
use nightshift_pipeline::{DeliveryOutcome, Pipeline, PipelineError, SinkKind, Stage, render_plan_html};
use ring::{hmac, rand};
use serde::Serialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub const SECRET_HEADER: &str = "x-webhook-secret";

/// Shared secret held as an HMAC tag under a per-process key, so checks
/// compare tags in constant time.
pub struct SharedSecret {
    key: hmac::Key,
    tag: hmac::Tag,
}

impl SharedSecret {
    pub fn new(secret: &str) -> anyhow::Result<Self> {
        let rng = rand::SystemRandom::new();
        let key = hmac::Key::generate(hmac::HMAC_SHA256, &rng)
            .map_err(|_| anyhow::anyhow!("could not generate secret key"))?;
        let tag = hmac::sign(&key, secret.as_bytes());
        Ok(Self { key, tag })
    }

    pub fn matches(&self, provided: &str) -> bool {
        hmac::verify(&self.key, provided.as_bytes(), self.tag.as_ref()).is_ok()
    }
}

pub struct AppState {
    pub pipeline: Pipeline,
    pub secret: Option<SharedSecret>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", post(webhook))
        .route("/plans/{key}", get(plan))
        .route("/plans/{key}/html", get(plan_html))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(listener: tokio::net::TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    info!(
        addr = %listener.local_addr()?,
        sink = %state.pipeline.orchestrator().sink_kind(),
        secret = state.secret.is_some(),
        "nightshift listening"
    );
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    error: String,
    stage: Option<Stage>,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            stage: None,
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        Self {
            status: status_for(&e),
            error: e.to_string(),
            stage: Some(e.failed_stage()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "error": self.error, "stage": self.stage })),
        )
            .into_response()
    }
}

pub fn status_for(e: &PipelineError) -> StatusCode {
    match e {
        PipelineError::MalformedPayload(_) | PipelineError::MissingRequiredField(_) => {
            StatusCode::BAD_REQUEST
        }
        e if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
        PipelineError::DownstreamFailure(_) => StatusCode::BAD_GATEWAY,
        PipelineError::DeliveryFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Serialize)]
struct WebhookResponse {
    submission_id: String,
    key: DeliveryKey,
    sink: SinkKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    plan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<String>,
}

impl From<DeliveryOutcome> for WebhookResponse {
    fn from(outcome: DeliveryOutcome) -> Self {
        let sink = outcome.sink();
        let (record, plan, html) = match outcome {
            DeliveryOutcome::Inline { record, html } => {
                let plan = record.content.clone();
                (record, Some(plan), Some(html))
            }
            DeliveryOutcome::Stored { record } => {
                let plan = record.content.clone();
                (record, Some(plan), None)
            }
            DeliveryOutcome::Emailed { record, .. } => (record, None, None),
        };
        Self {
            submission_id: record.submission_id,
            key: record.key,
            sink,
            plan,
            html,
        }
    }
}

async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    if let Some(secret) = &state.secret {
        let provided = headers
            .get(SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !secret.matches(provided) {
            warn!("webhook rejected: bad or missing secret");
            return Err(ApiError {
                status: StatusCode::UNAUTHORIZED,
                error: "invalid webhook secret".into(),
                stage: Some(Stage::Received),
            });
        }
    }

    let receipt = state.pipeline.run(&body).await?;
    for warning in &receipt.warnings {
        info!(submission_id = %receipt.intake.submission_id, warning = %warning, "normalization warning");
    }
    Ok(Json(receipt.outcome.into()))
}

async fn stored_record(state: &AppState, key: &str) -> Result<DeliveryRecord, ApiError> {
    let not_found = || ApiError::new(StatusCode::NOT_FOUND, format!("no plan for {key}"));
    let key = DeliveryKey::from_address(key).ok_or_else(not_found)?;
    match state.pipeline.orchestrator().stored(&key).await {
        Ok(Some(record)) => Ok(record),
        Ok(None) => Err(not_found()),
        Err(e) => {
            error!(key = %key, error = %e, "plan lookup failed");
            Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "plan lookup failed"))
        }
    }
}

async fn plan(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<DeliveryRecord>, ApiError> {
    stored_record(&state, &key).await.map(Json)
}

async fn plan_html(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Html<String>, ApiError> {
    let record = stored_record(&state, &key).await?;
    Ok(Html(render_plan_html(&record.content, Some(record.key.as_str()))))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "sink": state.pipeline.orchestrator().sink_kind(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nightshift_ai::{GenerationError, PlanGenerator};
    use nightshift_core::{GenerationRequest, IntakeNormalizer};
    use nightshift_pipeline::{DeliveryOrchestrator, Sink};
    use nightshift_store::{FileStore, KeyedStore, StoreError};
    use serde_json::Value;
    use std::time::Duration;

    enum Behaviour {
        Echo,
        Hang,
        Fail,
    }

    struct FakeGenerator(Behaviour);

    #[async_trait]
    impl PlanGenerator for FakeGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
            match self.0 {
                Behaviour::Echo => Ok(format!("# Plan\n{}", request.prompt)),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok("late".into())
                }
                Behaviour::Fail => Err(GenerationError::Provider {
                    status: 503,
                    body: "overloaded".into(),
                }),
            }
        }

        fn model_name(&self) -> &str {
            "fake"
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl KeyedStore for BrokenStore {
        async fn put(&self, _record: &DeliveryRecord) -> Result<(), StoreError> {
            Err(StoreError::Other("read-only".into()))
        }

        async fn get(&self, _key: &DeliveryKey) -> Result<Option<DeliveryRecord>, StoreError> {
            Ok(None)
        }
    }

    async fn spawn(behaviour: Behaviour, sink: Sink, secret: Option<&str>) -> String {
        let pipeline = Pipeline::new(
            IntakeNormalizer::default(),
            Arc::new(FakeGenerator(behaviour)),
            DeliveryOrchestrator::new(sink),
        )
        .with_timeout(Duration::from_millis(50));
        let state = Arc::new(AppState {
            pipeline,
            secret: secret.map(|s| SharedSecret::new(s).unwrap()),
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            serve(listener, state).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn submission(id: &str, challenge: &str, email: Option<&str>) -> Value {
        let mut fields = vec![
            json!({"key": "q1", "label": "What time do you start your shift?", "type": "INPUT_TIME", "value": "22:00"}),
            json!({"key": "q2", "label": "What time does your shift end?", "type": "INPUT_TIME", "value": "06:00"}),
            json!({
                "key": "q3", "label": "Which days do you work?", "type": "CHECKBOXES",
                "value": ["d1", "d3", "d5"],
                "options": [
                    {"id": "d1", "text": "Monday"}, {"id": "d2", "text": "Tuesday"},
                    {"id": "d3", "text": "Wednesday"}, {"id": "d4", "text": "Thursday"},
                    {"id": "d5", "text": "Friday"}
                ]
            }),
            json!({
                "key": "q4", "label": "What is your biggest sleep challenge?", "type": "MULTIPLE_CHOICE",
                "value": [challenge],
                "options": [
                    {"id": "c1", "text": "Falling asleep"},
                    {"id": "c2", "text": "Staying asleep"}
                ]
            }),
        ];
        if let Some(email) = email {
            fields.push(json!({"key": "q5", "label": "Email", "type": "INPUT_EMAIL", "value": email}));
        }
        json!({"eventId": "evt", "data": {"submissionId": id, "fields": fields}})
    }

    async fn post(base: &str, body: &Value, secret: Option<&str>) -> (u16, Value) {
        let mut req = reqwest::Client::new().post(format!("{base}/webhook")).json(body);
        if let Some(secret) = secret {
            req = req.header(SECRET_HEADER, secret);
        }
        let resp = req.send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    #[tokio::test]
    async fn scenario_a_inline() {
        let base = spawn(Behaviour::Echo, Sink::Inline, None).await;
        let (status, body) = post(&base, &submission("sub_a", "c2", Some("A@Example.com")), None).await;

        assert_eq!(status, 200);
        assert_eq!(body["submission_id"], "sub_a");
        assert_eq!(body["key"], "a@example.com");
        assert_eq!(body["sink"], "inline");
        let plan = body["plan"].as_str().unwrap();
        for value in ["22:00", "06:00", "Monday, Wednesday, Friday", "Staying asleep", "A@Example.com"] {
            assert!(plan.contains(value), "plan missing {value}");
        }
        assert!(body["html"].as_str().unwrap().contains("<h2>Plan</h2>"));
    }

    #[tokio::test]
    async fn scenario_b_store_and_read_back() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = FileStore::open(tmp.path()).await.unwrap();
        let base = spawn(Behaviour::Echo, Sink::Store(Arc::new(store)), None).await;

        let (status, _) = post(&base, &submission("s1", "c2", Some("a@example.com")), None).await;
        assert_eq!(status, 200);
        let (status, body) = post(&base, &submission("s2", "c1", Some("a@example.com")), None).await;
        assert_eq!(status, 200);
        assert_eq!(body["sink"], "store");
        assert!(body.get("html").is_none());

        let record: Value = reqwest::get(format!("{base}/plans/A@example.com"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(record["submission_id"], "s2");
        let content = record["content"].as_str().unwrap();
        assert!(content.contains("Falling asleep"));
        assert!(!content.contains("Staying asleep"));

        let html = reqwest::get(format!("{base}/plans/a@example.com/html"))
            .await
            .unwrap();
        assert_eq!(html.status().as_u16(), 200);
        assert!(html.text().await.unwrap().contains("Falling asleep"));

        let missing = reqwest::get(format!("{base}/plans/nobody@example.com")).await.unwrap();
        assert_eq!(missing.status().as_u16(), 404);
    }

    #[tokio::test]
    async fn scenario_c_missing_contact_is_400() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = FileStore::open(tmp.path()).await.unwrap();
        let base = spawn(Behaviour::Echo, Sink::Store(Arc::new(store.clone())), None).await;

        let (status, body) = post(&base, &submission("s1", "c2", None), None).await;
        assert_eq!(status, 400);
        assert_eq!(body["stage"], "Normalized");
        assert!(body["error"].as_str().unwrap().contains("ContactAddress"));
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scenario_d_timeout_is_504() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = FileStore::open(tmp.path()).await.unwrap();
        let base = spawn(Behaviour::Hang, Sink::Store(Arc::new(store.clone())), None).await;

        let (status, body) = post(&base, &submission("s1", "c2", Some("a@example.com")), None).await;
        assert_eq!(status, 504);
        assert_eq!(body["stage"], "Generated");
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn provider_failure_is_502() {
        let base = spawn(Behaviour::Fail, Sink::Inline, None).await;
        let (status, body) = post(&base, &submission("s1", "c2", Some("a@example.com")), None).await;
        assert_eq!(status, 502);
        assert_eq!(body["stage"], "Generated");
    }

    #[tokio::test]
    async fn delivery_failure_is_500() {
        let base = spawn(Behaviour::Echo, Sink::Store(Arc::new(BrokenStore)), None).await;
        let (status, body) = post(&base, &submission("s1", "c2", Some("a@example.com")), None).await;
        assert_eq!(status, 500);
        assert_eq!(body["stage"], "Delivered");
    }

    #[tokio::test]
    async fn non_json_body_is_400() {
        let base = spawn(Behaviour::Echo, Sink::Inline, None).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/webhook"))
            .body("name=value")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().starts_with("malformed payload"));
    }

    #[tokio::test]
    async fn secret_is_enforced() {
        let base = spawn(Behaviour::Echo, Sink::Inline, Some("s3cret")).await;
        let body = submission("s1", "c2", Some("a@example.com"));

        let (status, _) = post(&base, &body, None).await;
        assert_eq!(status, 401);
        let (status, _) = post(&base, &body, Some("wrong")).await;
        assert_eq!(status, 401);
        let (status, _) = post(&base, &body, Some("s3cret")).await;
        assert_eq!(status, 200);
    }

    #[tokio::test]
    async fn plans_are_404_without_store() {
        let base = spawn(Behaviour::Echo, Sink::Inline, None).await;
        post(&base, &submission("s1", "c2", Some("a@example.com")), None).await;
        let resp = reqwest::get(format!("{base}/plans/a@example.com")).await.unwrap();
        assert_eq!(resp.status().as_u16(), 404);
    }

    #[tokio::test]
    async fn health_reports_sink() {
        let base = spawn(Behaviour::Echo, Sink::Inline, None).await;
        let body: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["sink"], "inline");
    }

    #[test]
    fn shared_secret_compare() {
        let secret = SharedSecret::new("abc").unwrap();
        assert!(secret.matches("abc"));
        assert!(!secret.matches("abd"));
        assert!(!secret.matches(""));
    }
}
