//! HTTP chat server.
//!
//! Exposes the session orchestrator as a JSON API. Each client creates a
//! session, uploads a resume into it, and asks questions. Sessions live in
//! memory only and are independent of each other; requests against the same
//! session are serialized by a per-session lock.
//!
//! A session untouched for `[server].session_idle_secs` is dropped by a
//! background sweep, unless a request currently holds its lock. Setting the
//! value to `0` keeps sessions until `DELETE /sessions/{id}`.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version and model) |
//! | `GET`    | `/suggestions` | Canned questions |
//! | `POST`   | `/sessions` | Create a session, optionally with `{"api_token"}` |
//! | `GET`    | `/sessions/{id}` | Transcript, stats and active document |
//! | `DELETE` | `/sessions/{id}` | Drop a session |
//! | `PUT`    | `/sessions/{id}/credential` | Replace the API token |
//! | `POST`   | `/sessions/{id}/document` | Multipart upload, field `file` |
//! | `POST`   | `/sessions/{id}/ask` | `{"question"}` → assistant message |
//! | `POST`   | `/sessions/{id}/suggestion` | `{"text"}` → assistant message |
//! | `DELETE` | `/sessions/{id}/messages` | Clear the transcript |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "no_document", "message": "no document processed; upload a PDF first" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `not_found` (404),
//! `no_document` (409), `ingestion_failed` (422), `internal` (500),
//! `generation_failed` (502).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    extract::{
        multipart::MultipartRejection,
        rejection::JsonRejection,
        DefaultBodyLimit, Multipart, Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AdvisorError, ErrorKind};
use crate::models::{ChatMessage, SessionStats};
use crate::session::{DocumentSummary, Engine, Reply, Session, UploadOutcome, SUGGESTED_QUESTIONS};

struct SessionSlot {
    session: Arc<Mutex<Session>>,
    /// Milliseconds since the store's epoch at the last lookup.
    last_seen: AtomicU64,
}

/// In-memory session table with last-use tracking.
struct SessionStore {
    epoch: Instant,
    slots: RwLock<HashMap<Uuid, SessionSlot>>,
}

impl SessionStore {
    fn new() -> Self {
        Self {
            epoch: Instant::now(),
            slots: RwLock::new(HashMap::new()),
        }
    }

    fn now_millis(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    async fn insert(&self, id: Uuid, session: Session) {
        let slot = SessionSlot {
            session: Arc::new(Mutex::new(session)),
            last_seen: AtomicU64::new(self.now_millis()),
        };
        self.slots.write().await.insert(id, slot);
    }

    /// Look up a session and mark it as used.
    async fn get(&self, id: Uuid) -> Option<Arc<Mutex<Session>>> {
        let slots = self.slots.read().await;
        let slot = slots.get(&id)?;
        slot.last_seen.store(self.now_millis(), Ordering::Relaxed);
        Some(slot.session.clone())
    }

    async fn remove(&self, id: Uuid) -> bool {
        self.slots.write().await.remove(&id).is_some()
    }

    /// Drop sessions idle for at least `max_idle`. A session whose lock is
    /// held by an in-flight request is kept. Returns the number dropped.
    async fn sweep_idle(&self, max_idle: Duration) -> usize {
        let now = self.now_millis();
        let max_idle = max_idle.as_millis() as u64;
        let mut slots = self.slots.write().await;
        let before = slots.len();
        slots.retain(|id, slot| {
            let idle = now.saturating_sub(slot.last_seen.load(Ordering::Relaxed));
            let keep = idle < max_idle || slot.session.try_lock().is_err();
            if !keep {
                debug!(session = %id, idle_ms = idle, "idle session dropped");
            }
            keep
        });
        before - slots.len()
    }
}

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
    sessions: Arc<SessionStore>,
    /// Token given to sessions created without one.
    default_token: Option<String>,
}

impl AppState {
    async fn session(&self, id: Uuid) -> Result<Arc<Mutex<Session>>, AppError> {
        self.sessions
            .get(id)
            .await
            .ok_or_else(|| not_found(format!("no session with id: {}", id)))
    }
}

fn parse_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| bad_request(format!("invalid session id: {}", id)))
}

/// Build the router without binding a socket.
///
/// `default_token` seeds sessions created without an explicit token.
pub fn router(engine: Arc<Engine>, default_token: Option<String>) -> Router {
    router_with_store(engine, default_token, Arc::new(SessionStore::new()))
}

fn router_with_store(
    engine: Arc<Engine>,
    default_token: Option<String>,
    sessions: Arc<SessionStore>,
) -> Router {
    let max_upload = engine.config().server.max_upload_bytes;
    let state = AppState {
        engine,
        sessions,
        default_token,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/suggestions", get(handle_suggestions))
        .route("/sessions", post(handle_create_session))
        .route(
            "/sessions/{id}",
            get(handle_get_session).delete(handle_delete_session),
        )
        .route("/sessions/{id}/credential", put(handle_set_credential))
        .route("/sessions/{id}/document", post(handle_upload))
        .route("/sessions/{id}/ask", post(handle_ask))
        .route("/sessions/{id}/suggestion", post(handle_suggestion))
        .route(
            "/sessions/{id}/messages",
            delete(handle_clear_messages),
        )
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until Ctrl-C.
///
/// The API token environment variable (`[llm].api_key_env`) seeds every new
/// session that does not bring its own token.
pub async fn run_server(engine: Arc<Engine>) -> anyhow::Result<()> {
    let bind_addr = engine.config().server.bind.clone();
    let idle_secs = engine.config().server.session_idle_secs;
    let default_token = engine.config().llm.api_token_from_env();
    if default_token.is_none() {
        info!(
            env = %engine.config().llm.api_key_env,
            "no API token in environment; clients must supply one per session"
        );
    }

    let sessions = Arc::new(SessionStore::new());
    if idle_secs > 0 {
        tokio::spawn(sweep_sessions(
            sessions.clone(),
            Duration::from_secs(idle_secs),
        ));
    }

    let app = router_with_store(engine.clone(), default_token, sessions);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, model = engine.model_name(), "resume advisor listening");
    println!("Resume advisor listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}

async fn sweep_sessions(sessions: Arc<SessionStore>, max_idle: Duration) {
    let period = (max_idle / 4).clamp(Duration::from_secs(1), Duration::from_secs(60));
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        let dropped = sessions.sweep_idle(max_idle).await;
        if dropped > 0 {
            info!(dropped, "expired idle sessions");
        }
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

impl From<AdvisorError> for AppError {
    fn from(err: AdvisorError) -> Self {
        let (status, code) = match err.kind() {
            ErrorKind::Usage if matches!(err, AdvisorError::NoDocument) => {
                (StatusCode::CONFLICT, "no_document")
            }
            ErrorKind::Usage => (StatusCode::BAD_REQUEST, "bad_request"),
            ErrorKind::Authentication => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ErrorKind::Ingestion => (StatusCode::UNPROCESSABLE_ENTITY, "ingestion_failed"),
            ErrorKind::Generation => (StatusCode::BAD_GATEWAY, "generation_failed"),
            ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

// ============ GET /health, GET /suggestions ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    model: String,
    embedder: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        model: state.engine.model_name().to_string(),
        embedder: state.engine.embedder().model_name().to_string(),
    })
}

#[derive(Serialize)]
struct SuggestionsResponse {
    suggestions: [&'static str; 4],
}

async fn handle_suggestions() -> Json<SuggestionsResponse> {
    Json(SuggestionsResponse {
        suggestions: SUGGESTED_QUESTIONS,
    })
}

// ============ Session lifecycle ============

#[derive(Deserialize, Default)]
struct CreateSessionRequest {
    #[serde(default)]
    api_token: Option<String>,
}

#[derive(Serialize)]
struct CreateSessionResponse {
    id: Uuid,
    has_api_token: bool,
}

/// `POST /sessions`. The body is optional; an empty body creates a session
/// with the server's default token.
async fn handle_create_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateSessionResponse>), AppError> {
    let request: CreateSessionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CreateSessionRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| bad_request(format!("invalid JSON body: {}", e)))?
    };

    let session = Session::new(request.api_token.or_else(|| state.default_token.clone()));
    let has_api_token = session.has_api_token();
    let id = Uuid::new_v4();
    state.sessions.insert(id, session).await;
    info!(session = %id, "session created");

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse { id, has_api_token }),
    ))
}

#[derive(Serialize)]
struct SessionView {
    id: Uuid,
    has_api_token: bool,
    document: Option<DocumentSummary>,
    messages: Vec<ChatMessage>,
    stats: SessionStats,
}

async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let id = parse_id(&id)?;
    let handle = state.session(id).await?;
    let session = handle.lock().await;
    Ok(Json(SessionView {
        id,
        has_api_token: session.has_api_token(),
        document: session.active_document().map(DocumentSummary::from),
        messages: session.messages().to_vec(),
        stats: session.stats(),
    }))
}

async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id)?;
    if state.sessions.remove(id).await {
        info!(session = %id, "session dropped");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(format!("no session with id: {}", id)))
    }
}

#[derive(Deserialize)]
struct CredentialRequest {
    api_token: Option<String>,
}

async fn handle_set_credential(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Result<Json<CredentialRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id)?;
    let Json(request) = request?;
    let handle = state.session(id).await?;
    handle.lock().await.set_api_token(request.api_token);
    Ok(StatusCode::NO_CONTENT)
}

// ============ POST /sessions/{id}/document ============

/// Multipart upload. The first field named `file` is the PDF; its filename
/// (or `upload.pdf`) becomes the document name.
async fn handle_upload(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadOutcome>, AppError> {
    let id = parse_id(&id)?;
    let mut multipart = multipart?;
    let handle = state.session(id).await?;

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field
            .file_name()
            .map(str::to_string)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "upload.pdf".to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;
        upload = Some((name, bytes.to_vec()));
        break;
    }

    let (name, bytes) = upload.ok_or_else(|| bad_request("multipart field 'file' is required"))?;
    if bytes.is_empty() {
        return Err(bad_request("uploaded file is empty"));
    }

    let mut session = handle.lock().await;
    let outcome = session.upload(&state.engine, &name, bytes).await?;
    Ok(Json(outcome))
}

// ============ Questions ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<Reply>, AppError> {
    let id = parse_id(&id)?;
    let Json(request) = request?;
    let handle = state.session(id).await?;
    let mut session = handle.lock().await;
    let reply = session.ask(&state.engine, &request.question).await?;
    Ok(Json(reply))
}

#[derive(Deserialize)]
struct SuggestionRequest {
    text: String,
}

async fn handle_suggestion(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Result<Json<SuggestionRequest>, JsonRejection>,
) -> Result<Json<Reply>, AppError> {
    let id = parse_id(&id)?;
    let Json(request) = request?;
    let handle = state.session(id).await?;
    let mut session = handle.lock().await;
    let reply = session
        .select_suggestion(&state.engine, &request.text)
        .await?;
    Ok(Json(reply))
}

async fn handle_clear_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id)?;
    let handle = state.session(id).await?;
    handle.lock().await.clear_history();
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_contract_codes() {
        let cases = [
            (AdvisorError::NoDocument, StatusCode::CONFLICT, "no_document"),
            (AdvisorError::MissingCredential, StatusCode::UNAUTHORIZED, "unauthorized"),
            (
                AdvisorError::Ingestion("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
                "ingestion_failed",
            ),
            (
                AdvisorError::Generation("x".into()),
                StatusCode::BAD_GATEWAY,
                "generation_failed",
            ),
            (
                AdvisorError::InvalidInput("x".into()),
                StatusCode::BAD_REQUEST,
                "bad_request",
            ),
            (
                AdvisorError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
            ),
        ];
        for (err, status, code) in cases {
            let app = AppError::from(err);
            assert_eq!(app.status, status);
            assert_eq!(app.code, code);
        }
    }

    #[tokio::test]
    async fn idle_sessions_are_swept() {
        let store = SessionStore::new();
        let id = Uuid::new_v4();
        store.insert(id, Session::new(None)).await;

        assert_eq!(store.sweep_idle(Duration::from_secs(3600)).await, 0);
        assert!(store.get(id).await.is_some());

        assert_eq!(store.sweep_idle(Duration::ZERO).await, 1);
        assert!(store.get(id).await.is_none());
    }

    #[tokio::test]
    async fn busy_session_survives_sweep() {
        let store = SessionStore::new();
        let busy = Uuid::new_v4();
        let idle = Uuid::new_v4();
        store.insert(busy, Session::new(None)).await;
        store.insert(idle, Session::new(None)).await;

        let handle = store.get(busy).await.unwrap();
        let _guard = handle.lock().await;

        assert_eq!(store.sweep_idle(Duration::ZERO).await, 1);
        assert!(store.get(busy).await.is_some());
        assert!(store.get(idle).await.is_none());
    }
}
