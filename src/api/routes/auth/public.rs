//! Public types for the auth API
use serde::{Deserialize, Serialize};

use crate::profiles::ChatProfile;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// A new session in profile selection. `profiles` is what the user may
/// pick from and can be empty.
#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub session_id: String,
    pub identifier: String,
    pub roles: Vec<String>,
    pub profiles: Vec<ChatProfile>,
}
