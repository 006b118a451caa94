//! Browser chat view: a small JSON API over [`ConversationLoop`] plus one page.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use runtime::{Backend, Conversation, ConversationId, ConversationLoop, Exchange};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Conversations untouched for this long are dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

struct Entry {
    conversation: Arc<Mutex<Conversation>>,
    last_used: Instant,
}

/// Shared handler state. Each conversation has its own lock so exchanges on
/// different conversations run concurrently.
pub struct AppState<B> {
    chat: ConversationLoop<B>,
    conversations: RwLock<HashMap<ConversationId, Entry>>,
    idle_timeout: Duration,
}

impl<B> AppState<B> {
    pub fn new(chat: ConversationLoop<B>) -> Self {
        Self {
            chat,
            conversations: RwLock::default(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Look up a conversation and mark it used.
    async fn conversation(&self, id: ConversationId) -> Option<Arc<Mutex<Conversation>>> {
        let mut table = self.conversations.write().await;
        let entry = table.get_mut(&id)?;
        entry.last_used = Instant::now();
        Some(Arc::clone(&entry.conversation))
    }

    /// Drop conversations idle for at least the timeout. A conversation in
    /// the middle of an exchange is kept. Returns how many were dropped.
    pub async fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let mut table = self.conversations.write().await;
        let before = table.len();
        table.retain(|id, entry| {
            let idle = now.duration_since(entry.last_used) >= self.idle_timeout;
            let busy = entry.conversation.try_lock().is_err();
            if idle && !busy {
                debug!(conversation = %id, "evicting idle conversation");
                return false;
            }
            true
        });
        let evicted = before - table.len();
        if evicted > 0 {
            info!(evicted, remaining = table.len(), "idle conversations evicted");
        }
        evicted
    }
}

/// Periodically evict idle conversations until `state` is dropped.
pub fn spawn_reaper<B: Send + Sync + 'static>(state: &Arc<AppState<B>>) -> JoinHandle<()> {
    let state: Weak<AppState<B>> = Arc::downgrade(state);
    let period = match state.upgrade() {
        Some(state) => (state.idle_timeout / 2).max(Duration::from_secs(1)),
        None => DEFAULT_IDLE_TIMEOUT,
    };
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(state) = state.upgrade() else { break };
            state.evict_idle().await;
        }
    })
}

pub fn router<B: Backend + 'static>(state: Arc<AppState<B>>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/tools", get(list_tools::<B>))
        .route("/api/conversations", post(create_conversation::<B>))
        .route(
            "/api/conversations/{id}",
            get(get_conversation::<B>).delete(delete_conversation::<B>),
        )
        .route("/api/conversations/{id}/messages", post(send_message::<B>))
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn run<B: Backend + 'static>(
    addr: SocketAddr,
    chat: ConversationLoop<B>,
    idle_timeout: Duration,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;
    info!(%addr, idle_secs = idle_timeout.as_secs(), "chat view listening");
    println!("Chat view at http://{addr}/");

    let state = Arc::new(AppState::new(chat).with_idle_timeout(idle_timeout));
    let reaper = spawn_reaper(&state);
    let served = axum::serve(listener, router(state)).await;
    reaper.abort();
    served?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[derive(Serialize)]
struct ToolInfo<'a> {
    name: &'a str,
    description: &'a str,
}

async fn list_tools<B: Backend + 'static>(
    State(state): State<Arc<AppState<B>>>,
) -> Json<serde_json::Value> {
    let tools: Vec<ToolInfo<'_>> = state
        .chat
        .dispatcher()
        .specs()
        .iter()
        .map(|spec| ToolInfo {
            name: &spec.name,
            description: &spec.description,
        })
        .collect();
    Json(json!({ "tools": tools }))
}

#[derive(Serialize)]
struct Created {
    id: ConversationId,
}

async fn create_conversation<B: Backend + 'static>(
    State(state): State<Arc<AppState<B>>>,
) -> (StatusCode, Json<Created>) {
    let conversation = Conversation::new();
    let id = conversation.id;
    state.conversations.write().await.insert(
        id,
        Entry {
            conversation: Arc::new(Mutex::new(conversation)),
            last_used: Instant::now(),
        },
    );
    info!(conversation = %id, "conversation created");
    (StatusCode::CREATED, Json(Created { id }))
}

async fn get_conversation<B: Backend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(id): Path<Uuid>,
) -> std::result::Result<Json<Conversation>, ApiError> {
    let id = ConversationId(id);
    let conversation = state.conversation(id).await.ok_or(ApiError::NotFound(id))?;
    let conversation = conversation.lock().await.clone();
    Ok(Json(conversation))
}

async fn delete_conversation<B: Backend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(id): Path<Uuid>,
) -> std::result::Result<StatusCode, ApiError> {
    let id = ConversationId(id);
    state
        .conversations
        .write()
        .await
        .remove(&id)
        .ok_or(ApiError::NotFound(id))?;
    info!(conversation = %id, "conversation deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct MessageRequest {
    text: String,
}

async fn send_message<B: Backend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(id): Path<Uuid>,
    Json(request): Json<MessageRequest>,
) -> std::result::Result<Json<Exchange>, ApiError> {
    let id = ConversationId(id);
    let conversation = state.conversation(id).await.ok_or(ApiError::NotFound(id))?;
    let mut conversation = conversation.lock().await;

    match state.chat.exchange(&mut conversation, &request.text).await {
        Ok(exchange) => Ok(Json(exchange)),
        Err(runtime::Error::EmptyInput) => Err(ApiError::BadRequest(
            "Please enter a message.".to_string(),
        )),
        Err(err) => {
            warn!(conversation = %id, error = %err, "exchange failed");
            Err(ApiError::Upstream(format!(
                "An error occurred: {err}. Please try again."
            )))
        }
    }
}

enum ApiError {
    BadRequest(String),
    NotFound(ConversationId),
    /// The model service failed; the conversation is unchanged.
    Upstream(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(id) => (StatusCode::NOT_FOUND, format!("no conversation {id}")),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
