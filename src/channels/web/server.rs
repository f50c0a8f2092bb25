//! Axum HTTP server for the web gateway.
//!
//! Handles session, tool-call, utterance and progress-event routes. Each
//! session sits behind its own mutex, so one session never runs two pipeline
//! calls at once while different sessions proceed in parallel. Sessions
//! left idle longer than the configured TTL are dropped by a background
//! sweep.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
};
use tokio::sync::{Mutex, RwLock, oneshot};
use tokio_stream::StreamExt;
use tower_http::cors::{AllowHeaders, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::app::App;
use crate::channels::web::types::*;
use crate::error::{ChannelError, PipelineError, ToolError};
use crate::pipeline::{PipelineResponse, Session, SessionInfo};
use crate::tools::ToolContext;

type SessionHandle = Arc<Mutex<Session>>;
type ApiError = (StatusCode, String);

/// Idle time after which a gateway session is dropped.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct SessionSlot {
    handle: SessionHandle,
    last_used: Instant,
}

/// Shared state for all gateway handlers.
pub struct GatewayState {
    pub app: Arc<App>,
    sessions: RwLock<HashMap<Uuid, SessionSlot>>,
    session_ttl: Duration,
    shutdown_tx: RwLock<Option<oneshot::Sender<()>>>,
}

impl GatewayState {
    pub fn new(app: Arc<App>) -> Self {
        Self {
            app,
            sessions: RwLock::new(HashMap::new()),
            session_ttl: DEFAULT_SESSION_TTL,
            shutdown_tx: RwLock::new(None),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    async fn create_session(&self) -> Uuid {
        let session = Session::new();
        let id = session.id;
        self.sessions.write().await.insert(
            id,
            SessionSlot {
                handle: Arc::new(Mutex::new(session)),
                last_used: Instant::now(),
            },
        );
        id
    }

    /// Look up a session and mark it as used.
    async fn session(&self, id: Uuid) -> Result<SessionHandle, ApiError> {
        let mut sessions = self.sessions.write().await;
        let slot = sessions
            .get_mut(&id)
            .ok_or((StatusCode::NOT_FOUND, format!("Session {id} not found")))?;
        slot.last_used = Instant::now();
        Ok(slot.handle.clone())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions idle for at least the TTL. A session a handler is
    /// still holding is kept. Returns how many were dropped.
    pub async fn prune_idle_sessions(&self) -> usize {
        let ttl = self.session_ttl;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, slot| {
            let keep = slot.last_used.elapsed() < ttl || Arc::strong_count(&slot.handle) > 1;
            if !keep {
                tracing::info!("Session {} expired after {:?} idle", id, ttl);
            }
            keep
        });
        before - sessions.len()
    }

    /// Stop the server started by [`start_server`].
    pub async fn shutdown(&self) {
        if let Some(tx) = self.shutdown_tx.write().await.take() {
            let _ = tx.send(());
        }
    }
}

fn pipeline_status(err: &PipelineError) -> StatusCode {
    if err.is_state_error() {
        StatusCode::CONFLICT
    } else {
        StatusCode::BAD_REQUEST
    }
}

fn tool_status(err: &ToolError) -> StatusCode {
    match err {
        ToolError::NotFound(_) => StatusCode::NOT_FOUND,
        ToolError::InvalidParameters(_) => StatusCode::BAD_REQUEST,
        ToolError::ExecutionFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ToolError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
    }
}

/// Build the router without binding. Used by [`start_server`] and tests.
pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/tools", get(tools_list_handler))
        .route("/api/events", get(events_handler))
        .route("/api/sessions", post(session_create_handler))
        .route(
            "/api/sessions/{id}",
            get(session_status_handler).delete(session_delete_handler),
        )
        .route("/api/sessions/{id}/tool", post(session_tool_handler))
        .route(
            "/api/sessions/{id}/utterance",
            post(session_utterance_handler),
        )
        .route("/api/sessions/{id}/cancel", post(session_cancel_handler))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .with_state(state)
}

/// Start the gateway HTTP server.
///
/// Returns the actual bound `SocketAddr` (useful when binding to port 0).
pub async fn start_server(
    bind: &str,
    state: Arc<GatewayState>,
) -> Result<SocketAddr, ChannelError> {
    let listener = tokio::net::TcpListener::bind(bind).await.map_err(|e| {
        ChannelError::StartupFailed {
            name: "gateway".to_string(),
            reason: format!("Failed to bind to {}: {}", bind, e),
        }
    })?;
    let addr = listener
        .local_addr()
        .map_err(|e| ChannelError::StartupFailed {
            name: "gateway".to_string(),
            reason: format!("Failed to get local addr: {}", e),
        })?;

    // Local-first service: only same-host dashboard origins.
    let origins = [
        format!("http://{}:{}", addr.ip(), addr.port()),
        format!("http://localhost:{}", addr.port()),
    ]
    .into_iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect::<Vec<_>>();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
        ])
        .allow_headers(AllowHeaders::list([header::CONTENT_TYPE]));

    let app = router(state.clone())
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    *state.shutdown_tx.write().await = Some(shutdown_tx);

    let sweep_state = Arc::downgrade(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let Some(state) = sweep_state.upgrade() else {
                break;
            };
            state.prune_idle_sessions().await;
        }
    });

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Web gateway shutting down");
            })
            .await
        {
            tracing::error!("Web gateway server error: {}", e);
        }
    });

    tracing::info!("Web gateway listening on http://{}", addr);
    Ok(addr)
}

// --- Health ---

async fn health_handler(State(state): State<Arc<GatewayState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        channel: "gateway",
        simulated_dispatch: state.app.orchestrator.dispatcher().is_simulated(),
        chain_id: state.app.chain_id,
    })
}

// --- Tools ---

async fn tools_list_handler(State(state): State<Arc<GatewayState>>) -> Json<ToolListResponse> {
    Json(ToolListResponse {
        tools: state.app.tools.definitions(),
    })
}

// --- Sessions ---

async fn session_create_handler(
    State(state): State<Arc<GatewayState>>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let session_id = state.create_session().await;
    tracing::info!("Session {} created", session_id);
    (StatusCode::CREATED, Json(CreateSessionResponse { session_id }))
}

async fn session_status_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionInfo>, ApiError> {
    let handle = state.session(id).await?;
    let session = handle.lock().await;
    Ok(Json(state.app.orchestrator.status(&session)))
}

async fn session_delete_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    match state.sessions.write().await.remove(&id) {
        Some(_) => {
            tracing::info!("Session {} closed", id);
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err((StatusCode::NOT_FOUND, format!("Session {id} not found"))),
    }
}

async fn session_tool_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ToolCallRequest>,
) -> Result<Json<ToolCallResponse>, ApiError> {
    let handle = state.session(id).await?;
    let mut session = handle.lock().await;
    let mut ctx = ToolContext::new(&mut session);

    let output = state
        .app
        .tools
        .call(&req.name, req.params, &mut ctx)
        .await
        .map_err(|e| (tool_status(&e), e.to_string()))?;

    Ok(Json(ToolCallResponse {
        name: req.name,
        result: output.result,
        duration_ms: u64::try_from(output.duration.as_millis()).unwrap_or(u64::MAX),
    }))
}

async fn session_utterance_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UtteranceRequest>,
) -> Result<Json<PipelineResponse>, ApiError> {
    let handle = state.session(id).await?;
    let mut session = handle.lock().await;
    state
        .app
        .orchestrator
        .handle_utterance(&mut session, &req.text)
        .await
        .map(Json)
        .map_err(|e| (pipeline_status(&e), e.to_string()))
}

async fn session_cancel_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PipelineResponse>, ApiError> {
    let handle = state.session(id).await?;
    let mut session = handle.lock().await;
    state
        .app
        .orchestrator
        .cancel(&mut session)
        .map(Json)
        .map_err(|e| (pipeline_status(&e), e.to_string()))
}

// --- Events ---

async fn events_handler(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    let rx = state.app.events.subscribe();
    let filter = query.session_id;

    let stream = tokio_stream::wrappers::BroadcastStream::new(rx)
        .filter_map(|result| result.ok())
        .filter(move |event| filter.is_none_or(|id| event.session_id == id))
        .map(|event| {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Ok(Event::default().event("progress").data(data))
        });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(30))
            .text(""),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(ttl: Duration) -> GatewayState {
        GatewayState::new(Arc::new(App::simulated(1, Duration::ZERO))).with_session_ttl(ttl)
    }

    #[test]
    fn state_errors_map_to_conflict() {
        assert_eq!(
            pipeline_status(&PipelineError::NotConfirmed),
            StatusCode::CONFLICT
        );
        assert_eq!(
            pipeline_status(&PipelineError::InvalidRequest("empty target".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            tool_status(&ToolError::NotFound("x".to_string())),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn idle_sessions_expire() {
        let state = gateway(Duration::ZERO);
        let id = state.create_session().await;
        assert_eq!(state.session_count().await, 1);

        assert_eq!(state.prune_idle_sessions().await, 1);
        assert_eq!(state.session_count().await, 0);
        let (status, _) = state.session(id).await.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn active_sessions_survive_the_sweep() {
        let state = gateway(DEFAULT_SESSION_TTL);
        let id = state.create_session().await;
        state.session(id).await.unwrap();
        assert_eq!(state.prune_idle_sessions().await, 0);
        assert_eq!(state.session_count().await, 1);

        // idle by the clock but still held by a request
        let state = gateway(Duration::ZERO);
        let id = state.create_session().await;
        let handle = state.session(id).await.unwrap();
        assert_eq!(state.prune_idle_sessions().await, 0);
        drop(handle);
        assert_eq!(state.prune_idle_sessions().await, 1);
    }
}
