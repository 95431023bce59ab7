use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    serve, Form, Json, Router,
};
use minijinja::{path_loader, Environment};
use minijinja_autoreload::AutoReloader;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::chat::{ChatHandle, ChatSnapshot};
use crate::cover::CoverResolver;
use crate::dialogue::{DialogueHandle, DialogueSnapshot, DialogueState};
use crate::recommendations::{BookCard, CardCache};

#[derive(Error, Debug)]
pub enum WebError {
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        error!("Failed to render page: {}", self);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(format!("Internal Server Error: {}", self)),
        )
            .into_response()
    }
}

// Shared application state
#[derive(Clone)]
pub struct AppState {
    templates: Arc<AutoReloader>,
    dialogue: DialogueHandle,
    chat: ChatHandle,
    covers: CoverResolver,
    cards: CardCache,
}

impl AppState {
    pub fn new(
        templates_dir: impl Into<PathBuf>,
        dialogue: DialogueHandle,
        chat: ChatHandle,
        covers: CoverResolver,
    ) -> Self {
        Self {
            templates: Arc::new(create_minijinja_env(templates_dir.into())),
            dialogue,
            chat,
            covers,
            cards: CardCache::new(),
        }
    }

    fn render<S: Serialize>(&self, name: &str, context: S) -> Result<Html<String>, WebError> {
        let env = self.templates.acquire_env()?;
        let html = env.get_template(name)?.render(context)?;
        Ok(Html(html))
    }
}

// Templates are re-read whenever a file under the directory changes.
fn create_minijinja_env(dir: PathBuf) -> AutoReloader {
    AutoReloader::new(move |notifier| {
        let mut env = Environment::new();
        env.set_loader(path_loader(dir.clone()));
        notifier.watch_path(&dir, true);
        Ok(env)
    })
}

#[derive(Deserialize, Debug)]
pub struct MessageForm {
    #[serde(default)]
    pub text: String,
}

#[derive(Serialize, Debug)]
pub struct SubmitResponse<T> {
    pub accepted: bool,
    #[serde(flatten)]
    pub snapshot: T,
}

async fn index_handler(State(state): State<AppState>) -> Result<Html<String>, WebError> {
    state.render(
        "index.html",
        minijinja::context! { title => "Novel Navigator AI" },
    )
}

async fn recommender_page(State(state): State<AppState>) -> Result<Html<String>, WebError> {
    state.dialogue.ensure_started().await;
    let snapshot = state.dialogue.snapshot().await;
    let complete = snapshot.state == DialogueState::Complete;
    let cards = state.cards.cards(&snapshot, &state.covers).await;

    state.render(
        "recommender.html",
        minijinja::context! {
            title => "Book Recommender",
            mode => "recommender",
            conversation => snapshot.conversation,
            busy => snapshot.busy,
            complete => complete,
            cards => cards,
        },
    )
}

async fn recommender_answer(
    State(state): State<AppState>,
    Form(form): Form<MessageForm>,
) -> Redirect {
    state.dialogue.submit(&form.text).await;
    Redirect::to("/recommender")
}

async fn recommender_restart(State(state): State<AppState>) -> Redirect {
    state.dialogue.reset().await;
    Redirect::to("/recommender")
}

async fn chat_page(State(state): State<AppState>) -> Result<Html<String>, WebError> {
    state.chat.ensure_started().await;
    let snapshot = state.chat.snapshot().await;
    state.render(
        "chat.html",
        minijinja::context! {
            title => "General Chat",
            mode => "chat",
            conversation => snapshot.conversation,
            busy => snapshot.busy,
        },
    )
}

async fn chat_message(State(state): State<AppState>, Form(form): Form<MessageForm>) -> Redirect {
    state.chat.submit(&form.text).await;
    Redirect::to("/chat")
}

async fn chat_restart(State(state): State<AppState>) -> Redirect {
    state.chat.reset().await;
    Redirect::to("/chat")
}

async fn api_recommender(State(state): State<AppState>) -> Json<DialogueSnapshot> {
    state.dialogue.ensure_started().await;
    Json(state.dialogue.snapshot().await)
}

async fn api_recommender_start(State(state): State<AppState>) -> Json<DialogueSnapshot> {
    state.dialogue.reset().await;
    Json(state.dialogue.snapshot().await)
}

async fn api_recommender_answer(
    State(state): State<AppState>,
    Json(body): Json<MessageForm>,
) -> Json<SubmitResponse<DialogueSnapshot>> {
    let accepted = state.dialogue.submit(&body.text).await;
    Json(SubmitResponse {
        accepted,
        snapshot: state.dialogue.snapshot().await,
    })
}

async fn api_recommender_cards(State(state): State<AppState>) -> Json<Vec<BookCard>> {
    let snapshot = state.dialogue.snapshot().await;
    Json(state.cards.cards(&snapshot, &state.covers).await)
}

async fn api_chat(State(state): State<AppState>) -> Json<ChatSnapshot> {
    state.chat.ensure_started().await;
    Json(state.chat.snapshot().await)
}

async fn api_chat_start(State(state): State<AppState>) -> Json<ChatSnapshot> {
    state.chat.reset().await;
    Json(state.chat.snapshot().await)
}

async fn api_chat_message(
    State(state): State<AppState>,
    Json(body): Json<MessageForm>,
) -> Json<SubmitResponse<ChatSnapshot>> {
    let accepted = state.chat.submit(&body.text).await;
    Json(SubmitResponse {
        accepted,
        snapshot: state.chat.snapshot().await,
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/recommender", get(recommender_page))
        .route("/recommender/answer", post(recommender_answer))
        .route("/recommender/restart", post(recommender_restart))
        .route("/chat", get(chat_page))
        .route("/chat/message", post(chat_message))
        .route("/chat/restart", post(chat_restart))
        .route("/api/recommender", get(api_recommender))
        .route("/api/recommender/start", post(api_recommender_start))
        .route("/api/recommender/answer", post(api_recommender_answer))
        .route("/api/recommender/cards", get(api_recommender_cards))
        .route("/api/chat", get(api_chat))
        .route("/api/chat/start", post(api_chat_start))
        .route("/api/chat/message", post(api_chat_message))
        .with_state(state)
        .layer(TraceLayer::new_for_http()) // Add request logging
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {:?}", e);
    }
    info!("Ctrl-C received, shutting down web server...");
}

pub async fn start_web_server(addr: SocketAddr, state: AppState) -> Result<()> {
    let app = router(state);
    info!("Web server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server failed")?;

    Ok(())
}
