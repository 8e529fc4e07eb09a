//! Public types for the profiles API
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct ProfileSummary {
    pub name: String,
    pub markdown_description: String,
    /// Model the completion API is called with for this profile
    pub model: String,
}

#[derive(Serialize, Deserialize)]
pub struct ProfilesResponse {
    pub profiles: Vec<ProfileSummary>,
}
