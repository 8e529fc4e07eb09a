//! API routes module

pub mod auth;
pub mod chat;
pub mod profiles;

use std::sync::{Arc, RwLock};

use crate::api::state::AppState;
use axum::Router;

type SharedState = Arc<RwLock<AppState>>;

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new()
        // Login and session creation
        .nest("/auth", auth::router())
        // Chat session lifecycle and message relay
        .nest("/chat", chat::router())
        // Profile registry
        .nest("/profiles", profiles::router())
}
