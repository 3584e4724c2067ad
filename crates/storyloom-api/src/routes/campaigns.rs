//! Routes for campaigns and their turns.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::Stream;
use futures_util::stream;
use serde::{Deserialize, Serialize};
use storyloom_core::error::DomainError;
use storyloom_core::message::Message;
use storyloom_narrative::application::dispatcher::EventDispatcher;
use storyloom_narrative::application::orchestrator::TurnOutcome;
use storyloom_narrative::domain::events::TurnEvent;
use storyloom_narrative::domain::prompts::SystemPromptType;
use storyloom_world_state::application::command_handlers;
use storyloom_world_state::application::query_handlers::{self, CampaignView};
use storyloom_world_state::domain::commands::CreateCampaign;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::sessions::SharedSession;
use crate::state::AppState;

/// Request body for `POST /`.
#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    /// The player character's name.
    pub player_name: String,
    /// The player character's description.
    #[serde(default)]
    pub player_description: String,
    /// Opening scenario handed to the narrator.
    pub start_scenario: String,
}

/// Response body for `GET /{campaign_id}/conversation`.
#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    /// The campaign the transcript belongs to.
    pub campaign_id: Uuid,
    /// Messages, oldest first.
    pub messages: Vec<Message>,
}

/// Request body for `POST /{campaign_id}/turns`.
#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    /// What the player does or says.
    pub prompt: String,
}

/// Response body for a buffered turn.
#[derive(Debug, Serialize)]
pub struct TurnResponse {
    /// The narrator's reply.
    pub message: Message,
    /// Template the reply was requested with.
    pub prompt_type: SystemPromptType,
    /// Whether the player died; the campaign is then over.
    pub player_died: bool,
}

/// Response body for a blank prompt.
#[derive(Debug, Serialize)]
pub struct SkippedResponse {
    /// Always `true`.
    pub skipped: bool,
}

/// POST /
#[instrument(skip(state, request))]
async fn create_campaign(
    State(state): State<AppState>,
    Json(request): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<CampaignView>), ApiError> {
    let command = CreateCampaign {
        correlation_id: Uuid::new_v4(),
        player_name: request.player_name,
        player_description: request.player_description,
        start_scenario: request.start_scenario,
    };

    info!(correlation_id = %command.correlation_id, "handling create_campaign command");

    let campaign = command_handlers::handle_create_campaign(&command, &*state.repository).await?;
    let view = CampaignView::from_campaign(&campaign);
    state.sessions.open(campaign, &*state.clock).await;

    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /{campaign_id}
#[instrument(skip(state))]
async fn get_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<CampaignView>, ApiError> {
    if let Some(session) = state.sessions.get(campaign_id).await {
        let session = session.lock().await;
        return Ok(Json(CampaignView::from_campaign(&session.campaign)));
    }
    let view = query_handlers::get_campaign_by_id(campaign_id, &*state.repository).await?;
    Ok(Json(view))
}

/// GET /{campaign_id}/conversation
#[instrument(skip(state))]
async fn get_conversation(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let session = state
        .sessions
        .get_or_load(campaign_id, &*state.repository, &*state.clock)
        .await?;
    let messages = session.lock().await.conversation.messages().to_vec();
    Ok(Json(ConversationResponse {
        campaign_id,
        messages,
    }))
}

/// POST /{campaign_id}/turns
#[instrument(skip(state, request))]
async fn take_turn(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
    Json(request): Json<TurnRequest>,
) -> Result<Response, ApiError> {
    let session = state
        .sessions
        .get_or_load(campaign_id, &*state.repository, &*state.clock)
        .await?;

    if request.prompt.trim().is_empty() {
        return Ok(Json(SkippedResponse { skipped: true }).into_response());
    }

    if state.orchestrator.config().streaming {
        return Ok(stream_turn(&state, session, request.prompt).into_response());
    }

    let outcome = session
        .lock()
        .await
        .take_turn(&state.orchestrator, &request.prompt, &EventDispatcher::detached())
        .await?;

    let response = match outcome {
        TurnOutcome::Skipped => Json(SkippedResponse { skipped: true }).into_response(),
        TurnOutcome::Narrated {
            message,
            prompt_type,
            player_died,
        } => Json(TurnResponse {
            message,
            prompt_type,
            player_died,
        })
        .into_response(),
    };
    Ok(response)
}

enum TurnStream {
    Running(
        UnboundedReceiver<TurnEvent>,
        JoinHandle<Result<TurnOutcome, DomainError>>,
    ),
    Finished,
}

/// Runs the turn on its own task and relays its events as SSE. The turn
/// completes and persists even if the client goes away.
fn stream_turn(
    state: &AppState,
    session: SharedSession,
    prompt: String,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + use<>> {
    let (dispatcher, receiver) = EventDispatcher::channel();
    let orchestrator = Arc::clone(&state.orchestrator);
    let turn = tokio::spawn(async move {
        let mut session = session.lock_owned().await;
        session.take_turn(&orchestrator, &prompt, &dispatcher).await
    });

    let events = stream::unfold(TurnStream::Running(receiver, turn), |state| async move {
        let TurnStream::Running(mut receiver, turn) = state else {
            return None;
        };
        if let Some(event) = receiver.recv().await {
            return Some((
                Ok::<_, Infallible>(sse_event(&event)),
                TurnStream::Running(receiver, turn),
            ));
        }
        let failure = match turn.await {
            Ok(Ok(_)) => return None,
            Ok(Err(e)) => e,
            Err(e) => DomainError::Infrastructure(format!("turn task failed: {e}")),
        };
        Some((Ok(error_event(&failure)), TurnStream::Finished))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

fn sse_event(event: &TurnEvent) -> Event {
    let name = match event {
        TurnEvent::MessageStarted { .. } => "message_started",
        TurnEvent::MessageReceived { .. } => "message",
        TurnEvent::ChunkReceived { is_done: true, .. } => "done",
        TurnEvent::ChunkReceived { .. } => "chunk",
    };
    Event::default()
        .event(name)
        .json_data(event)
        .unwrap_or_else(|e| error_event(&DomainError::Infrastructure(e.to_string())))
}

fn error_event(err: &DomainError) -> Event {
    let body = ErrorBody::from_domain(err);
    Event::default()
        .event("error")
        .json_data(&body)
        .unwrap_or_else(|_| Event::default().event("error").data(body.message))
}

/// Returns the router for campaigns.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_campaign))
        .route("/{campaign_id}", get(get_campaign))
        .route("/{campaign_id}/conversation", get(get_conversation))
        .route("/{campaign_id}/turns", post(take_turn))
}
