use std::collections::HashMap;

use itertools::Itertools;

use super::registry::{ChatProfile, ProfileRegistry};
use crate::auth::Identity;

/// Maps a role to the profile names it grants access to, kept in the
/// order they were granted.
#[derive(Clone, Debug, Default)]
pub struct GrantTable(HashMap<String, Vec<String>>);

impl GrantTable {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Every profile is granted to the role with the same name as the
    /// profile. This is how credential files are written today: a user
    /// with role "gpt-4o" may use the "gpt-4o" profile.
    pub fn from_registry(registry: &ProfileRegistry) -> Self {
        let mut table = Self::new();
        for profile in registry.list_profiles() {
            table.grant(&profile.name, &profile.name);
        }
        table
    }

    pub fn grant(&mut self, role: &str, profile_name: &str) -> &mut Self {
        let names = self.0.entry(role.to_string()).or_default();
        if !names.iter().any(|name| name == profile_name) {
            names.push(profile_name.to_string());
        }
        self
    }

    pub fn granted(&self, role: &str) -> impl Iterator<Item = &str> {
        self.0
            .get(role)
            .into_iter()
            .flat_map(|names| names.iter().map(String::as_str))
    }
}

/// The profiles an identity may use, deduplicated by name. Roles are
/// taken in the identity's order and each role's profiles in the order
/// they were granted. An empty result means no model access.
pub fn resolve(
    identity: &Identity,
    registry: &ProfileRegistry,
    grants: &GrantTable,
) -> Vec<ChatProfile> {
    identity
        .roles
        .iter()
        .flat_map(|role| grants.granted(role))
        .filter_map(|name| registry.find(name))
        .cloned()
        .unique_by(|profile| profile.name.clone())
        .collect()
}
