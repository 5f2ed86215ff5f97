use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use futures::StreamExt;
use scholar_agent::{AgentDescriptor, AgentDispatcher};
use scholar_core::{SessionStore, TurnRole};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Shared server state: the dispatcher plus the per-connection session
/// map. Sessions are taken out of the store for the duration of a turn,
/// which is what serializes requests within one session.
struct AppState {
    dispatcher: Arc<AgentDispatcher>,
    sessions: Mutex<SessionStore>,
}

pub async fn serve(dispatcher: Arc<AgentDispatcher>, bind: String) -> anyhow::Result<()> {
    let state = Arc::new(AppState {
        dispatcher,
        sessions: Mutex::new(SessionStore::new()),
    });

    let app = Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", delete(destroy_session))
        .route("/api/agents", get(list_agents))
        .route("/api/chat", post(chat))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!("chat server listening on http://{}", bind);
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct SessionCreated {
    session_id: Uuid,
}

async fn create_session(State(state): State<Arc<AppState>>) -> Json<SessionCreated> {
    let session_id = state.sessions.lock().await.create();
    Json(SessionCreated { session_id })
}

async fn destroy_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> StatusCode {
    if state.sessions.lock().await.remove(&id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn list_agents(State(state): State<Arc<AppState>>) -> Json<Vec<AgentDescriptor>> {
    Json(state.dispatcher.registry().descriptors().to_vec())
}

#[derive(Deserialize)]
struct ChatRequest {
    session_id: Uuid,
    message: String,
}

#[derive(Serialize)]
struct TokenPayload<'a> {
    text: &'a str,
}

type EventStream = UnboundedReceiverStream<Result<Event, Infallible>>;

/// One chat turn: tokens stream out as `token` SSE events, terminated by
/// a `done` event. The session is absent from the store while its turn
/// is in flight, so a second concurrent request for it is rejected.
async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<EventStream>, StatusCode> {
    let Some(mut session) = state.sessions.lock().await.take(&request.session_id) else {
        // Unknown id, or a turn for this session is already in flight.
        return Err(StatusCode::NOT_FOUND);
    };

    let (tx, rx) = mpsc::unbounded_channel::<Result<Event, Infallible>>();

    let state = state.clone();
    tokio::spawn(async move {
        let mut full_response = String::new();
        let mut stream = state
            .dispatcher
            .dispatch_stream(&request.message, &mut session)
            .await;

        while let Some(fragment) = stream.next().await {
            full_response.push_str(&fragment);

            let event = Event::default()
                .event("token")
                .json_data(TokenPayload { text: &fragment })
                .unwrap_or_else(|_| Event::default().event("token").data(""));

            if tx.send(Ok(event)).is_err() {
                // Client went away: stop consuming, keep what we have.
                break;
            }
        }

        if !full_response.is_empty() {
            session.push_turn(TurnRole::Agent, full_response);
        }
        state.sessions.lock().await.put(session);

        let _ = tx.send(Ok(Event::default().event("done").data("")));
    });

    Ok(Sse::new(UnboundedReceiverStream::new(rx)).keep_alive(KeepAlive::default()))
}
