//! Storyloom API server entry point.

use std::error::Error;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use sqlx::postgres::PgPoolOptions;
use storyloom_api::config::AppConfig;
use storyloom_api::error::AppError;
use storyloom_api::state::AppState;
use storyloom_core::clock::{Clock, SystemClock};
use storyloom_core::narration::NarrationClient;
use storyloom_core::rng::{DeterministicRng, SeededRng};
use storyloom_narrative::application::orchestrator::TurnOrchestrator;
use storyloom_narrative::domain::prompts::PromptTemplates;
use storyloom_narrative::infrastructure::mock_narration::MockNarrationClient;
use storyloom_narrative::infrastructure::openai_narration::OpenAiNarrationClient;
use storyloom_rules::domain::CombatResolver;
use storyloom_store::memory::InMemoryCampaignRepository;
use storyloom_store::pg_campaign_repository::PgCampaignRepository;
use storyloom_world_state::application::synchronizer::GameStateManager;
use storyloom_world_state::domain::repository::CampaignRepository;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    let tracer_provider = storyloom_api::telemetry::init(config.otlp_endpoint.as_deref())?;

    info!("Starting Storyloom API server");

    let repository = connect_repository(&config).await?;
    let templates = PromptTemplates::load(&config.prompts_path).map_err(AppError::from)?;

    let narration: Arc<dyn NarrationClient> = if config.use_mock_responses {
        warn!("USE_MOCK_RESPONSES is set; narration is canned");
        Arc::new(MockNarrationClient::new())
    } else {
        Arc::new(OpenAiNarrationClient::new(config.narration.clone()).map_err(AppError::from)?)
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let rng: Arc<Mutex<dyn DeterministicRng + Send>> =
        Arc::new(Mutex::new(SeededRng::from_entropy()));
    let orchestrator = TurnOrchestrator::new(
        narration,
        Arc::new(GameStateManager::new(Arc::clone(&repository))),
        Arc::new(templates),
        rng,
        Arc::clone(&clock),
    )
    .with_resolver(CombatResolver::new(config.combat_rules))
    .with_config(config.turn_config());
    info!(
        streaming = orchestrator.config().streaming,
        model = %config.narration.model,
        "turn orchestrator ready"
    );

    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = storyloom_api::app(AppState::new(clock, repository, orchestrator))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(AppError::from)?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::from)?;

    if let Some(provider) = tracer_provider {
        if let Err(e) = provider.shutdown() {
            warn!(error = %e, "failed to flush traces");
        }
    }
    Ok(())
}

async fn connect_repository(config: &AppConfig) -> Result<Arc<dyn CampaignRepository>, AppError> {
    let Some(database_url) = &config.database_url else {
        warn!("DATABASE_URL not set; campaigns are kept in memory");
        return Ok(Arc::new(InMemoryCampaignRepository::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;
    Ok(Arc::new(PgCampaignRepository::new(pool)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
