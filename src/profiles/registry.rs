use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ChatProfile {
    pub name: String,
    pub markdown_description: String,
}

impl ChatProfile {
    pub fn new(name: &str, markdown_description: &str) -> Self {
        Self {
            name: name.to_string(),
            markdown_description: markdown_description.to_string(),
        }
    }
}

/// The fixed set of profiles a session can pick from and the model
/// identifier each profile name maps to.
#[derive(Clone, Debug)]
pub struct ProfileRegistry {
    profiles: Vec<ChatProfile>,
    models: HashMap<String, String>,
}

impl ProfileRegistry {
    pub fn new(profiles: Vec<ChatProfile>, models: HashMap<String, String>) -> Self {
        // Names are unique, a later duplicate is dropped
        let profiles = profiles
            .into_iter()
            .unique_by(|p| p.name.clone())
            .collect();
        Self { profiles, models }
    }

    pub fn list_profiles(&self) -> &[ChatProfile] {
        &self.profiles
    }

    pub fn find(&self, name: &str) -> Option<&ChatProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Model identifier for a profile name. Unmapped names are used as
    /// the model identifier as-is.
    pub fn resolve_model<'a>(&'a self, profile_name: &'a str) -> &'a str {
        self.models
            .get(profile_name)
            .map(String::as_str)
            .unwrap_or(profile_name)
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        let profiles = vec![
            ChatProfile::new("gpt-3.5-turbo", "Access to **GPT-3.5-Turbo**"),
            ChatProfile::new("gpt-4o", "Access to **GPT-4o**"),
        ];
        let models = HashMap::from([
            ("GPT-4o".to_string(), "gpt-4o".to_string()),
            ("gpt-3.5-turbo".to_string(), "gpt-3.5-turbo".to_string()),
            ("gpt-4o-mini".to_string(), "gpt-4o-mini".to_string()),
        ]);
        Self::new(profiles, models)
    }
}
