//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use storyloom_api::state::AppState;
use storyloom_core::clock::Clock;
use storyloom_core::narration::NarrationClient;
use storyloom_core::rng::DeterministicRng;
use storyloom_narrative::application::orchestrator::{TurnConfig, TurnOrchestrator};
use storyloom_narrative::domain::prompts::PromptTemplates;
use storyloom_store::memory::InMemoryCampaignRepository;
use storyloom_test_support::{FixedClock, MockRng};
use storyloom_world_state::application::synchronizer::GameStateManager;
use storyloom_world_state::domain::repository::CampaignRepository;
use tower::ServiceExt;

/// Build the full app router over an in-memory repository with a fixed
/// clock, a deterministic RNG and the given narration client.
pub fn build_test_app(narration: Arc<dyn NarrationClient>, streaming: bool) -> Router {
    build_test_app_with_rng(narration, streaming, MockRng)
}

/// Like [`build_test_app`] with a custom RNG for tests that force combat
/// outcomes.
pub fn build_test_app_with_rng(
    narration: Arc<dyn NarrationClient>,
    streaming: bool,
    rng: impl DeterministicRng + Send + 'static,
) -> Router {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::default());
    let rng: Arc<Mutex<dyn DeterministicRng + Send>> = Arc::new(Mutex::new(rng));
    let repository: Arc<dyn CampaignRepository> = Arc::new(InMemoryCampaignRepository::new());
    let orchestrator = TurnOrchestrator::new(
        narration,
        Arc::new(GameStateManager::new(Arc::clone(&repository))),
        Arc::new(PromptTemplates::from_fn(|t| format!("template:{t}"))),
        rng,
        Arc::clone(&clock),
    )
    .with_config(TurnConfig { streaming });

    storyloom_api::app(AppState::new(clock, repository, orchestrator))
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let (status, text) = post_text(app, uri, body).await;
    let json = serde_json::from_str(&text).unwrap();
    (status, json)
}

/// Send a POST request with a JSON body and return the raw response text.
pub async fn post_text(app: Router, uri: &str, body: &serde_json::Value) -> (StatusCode, String) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();

    (status, String::from_utf8(body_bytes.to_vec()).unwrap())
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Create a campaign and return its id.
pub async fn create_campaign(app: Router) -> String {
    let (status, json) = post_json(
        app,
        "/api/v1/campaigns",
        &serde_json::json!({
            "player_name": "Aria",
            "player_description": "A wandering knight",
            "start_scenario": "You wake in a dark forest."
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["campaign_id"].as_str().unwrap().to_owned()
}

/// Event names of an SSE body, in order.
pub fn sse_event_names(body: &str) -> Vec<&str> {
    body.lines()
        .filter_map(|line| line.strip_prefix("event:"))
        .map(str::trim)
        .collect()
}
