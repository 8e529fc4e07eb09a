//! Router for the profiles API

use std::sync::{Arc, RwLock};

use axum::{Json, Router, extract::State, routing::get};

use super::public;
use crate::api::state::AppState;

type SharedState = Arc<RwLock<AppState>>;

/// List every registered chat profile
async fn profile_list(State(state): State<SharedState>) -> Json<public::ProfilesResponse> {
    let registry = state
        .read()
        .expect("Unable to read share state")
        .registry
        .clone();

    let profiles = registry
        .list_profiles()
        .iter()
        .map(|p| public::ProfileSummary {
            name: p.name.clone(),
            markdown_description: p.markdown_description.clone(),
            model: registry.resolve_model(&p.name).to_string(),
        })
        .collect();

    Json(public::ProfilesResponse { profiles })
}

pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(profile_list))
}
