//! Router for the chat API

use std::sync::{Arc, RwLock};

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response, sse::Event, sse::KeepAlive, sse::Sse},
    routing::{get, post},
};
use tokio::sync::mpsc;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::public;
use crate::api::state::{AppState, SharedSession};
use crate::chat::{
    ChatEvent, EventSender, MAX_ATTACHMENT_BYTES, Session, SessionError, ThreadRecord,
};

type SharedState = Arc<RwLock<AppState>>;

// Attachments arrive base64 encoded inside the JSON body, so the body
// must fit the largest accepted file after encoding plus the message
const MESSAGE_BODY_LIMIT: usize = MAX_ATTACHMENT_BYTES as usize * 4 / 3 + 64 * 1024;

fn find_session(state: &SharedState, id: &str) -> Result<SharedSession, Response> {
    state
        .read()
        .expect("Unable to read share state")
        .session(id)
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                format!("Chat session {} not found", id),
            )
                .into_response()
        })
}

/// Run a lifecycle step and collect the messages it shows the user
fn lifecycle<F>(session: &mut Session, step: F) -> Response
where
    F: FnOnce(&mut Session, &EventSender) -> Result<(), SessionError>,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<ChatEvent>();
    let result = step(session, &tx);
    drop(tx);

    if let Err(e) = result {
        tracing::warn!("Session {}: {}", session.id(), e);
        return (StatusCode::FORBIDDEN, e.to_string()).into_response();
    }

    let mut messages = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let ChatEvent::Message(text) = event {
            messages.push(text);
        }
    }

    Json(public::LifecycleResponse {
        phase: session.phase(),
        profile: session.profile().map(|p| p.name.clone()),
        messages,
    })
    .into_response()
}

/// Get a single chat session by ID
async fn chat_session(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    let session = match find_session(&state, &id) {
        Ok(session) => session,
        Err(resp) => return resp,
    };
    let session = session.lock().await;

    Json(public::SessionView {
        id: session.id().to_string(),
        identifier: session.identity().identifier.clone(),
        roles: session.identity().roles.clone(),
        phase: session.phase(),
        profile: session.profile().map(|p| p.name.clone()),
        profiles: session.profiles().to_vec(),
        history: session.history().to_vec(),
        created_at: session.created_at(),
        last_active: session.last_active(),
    })
    .into_response()
}

/// Start a new chat with the selected profile
async fn chat_start(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<public::StartRequest>,
) -> Response {
    let session = match find_session(&state, &id) {
        Ok(session) => session,
        Err(resp) => return resp,
    };
    let mut session = session.lock().await;
    let selected = payload.profile;

    lifecycle(&mut session, |s, tx| s.start(selected.as_deref(), tx))
}

/// Resume a previously recorded thread
async fn chat_resume(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(thread): Json<ThreadRecord>,
) -> Response {
    let session = match find_session(&state, &id) {
        Ok(session) => session,
        Err(resp) => return resp,
    };
    let mut session = session.lock().await;

    lifecycle(&mut session, |s, tx| s.resume(&thread, tx))
}

/// Relay a message and stream the reply back as server-sent events
async fn chat_message(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<public::MessageRequest>,
) -> Response {
    let session = match find_session(&state, &id) {
        Ok(session) => session,
        Err(resp) => return resp,
    };

    let mut attachment = match payload.attachment.as_ref().map(|a| a.decode()).transpose() {
        Ok(attachment) => attachment,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("Invalid attachment encoding: {}", e),
            )
                .into_response();
        }
    };

    let completion = state
        .read()
        .expect("Unable to read share state")
        .completion
        .clone();
    let message = payload.message;
    let (tx, rx) = mpsc::unbounded_channel::<ChatEvent>();

    // Holding the lock for the whole relay keeps messages for the same
    // session in order
    tokio::spawn(async move {
        let mut session = session.lock().await;
        session
            .handle_message(&message, &mut attachment, &*completion, &tx)
            .await;
    });

    let stream = UnboundedReceiverStream::new(rx).map(|event| Event::default().json_data(event));

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// End a chat session
async fn chat_close(State(state): State<SharedState>, Path(id): Path<String>) -> StatusCode {
    let closed = state
        .write()
        .expect("Unable to write share state")
        .close_session(&id);

    match closed {
        Some(_) => {
            tracing::info!("Closed session {}", id);
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

/// Create the chat router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/{id}", get(chat_session).delete(chat_close))
        .route("/{id}/start", post(chat_start))
        .route("/{id}/resume", post(chat_resume))
        .route(
            "/{id}/messages",
            post(chat_message).layer(DefaultBodyLimit::max(MESSAGE_BODY_LIMIT)),
        )
}
