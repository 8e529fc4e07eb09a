//! Router for the auth API

use std::sync::{Arc, RwLock};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};

use super::public;
use crate::api::state::AppState;

type SharedState = Arc<RwLock<AppState>>;

/// Check credentials and open a session for the user
async fn login(
    State(state): State<SharedState>,
    Json(payload): Json<public::LoginRequest>,
) -> Response {
    let authenticator = state
        .read()
        .expect("Unable to read share state")
        .authenticator
        .clone();

    // Every failure looks the same to the caller
    let Some(identity) = authenticator.authenticate(&payload.username, &payload.password) else {
        return (StatusCode::UNAUTHORIZED, "Invalid credentials").into_response();
    };

    let session = state
        .write()
        .expect("Unable to write share state")
        .open_session(identity);
    let session = session.lock().await;

    tracing::info!(
        "Opened session {} for {} with {} profile(s)",
        session.id(),
        session.identity().identifier,
        session.profiles().len()
    );

    Json(public::LoginResponse {
        session_id: session.id().to_string(),
        identifier: session.identity().identifier.clone(),
        roles: session.identity().roles.clone(),
        profiles: session.profiles().to_vec(),
    })
    .into_response()
}

/// Create the auth router
pub fn router() -> Router<SharedState> {
    Router::new().route("/login", post(login))
}
