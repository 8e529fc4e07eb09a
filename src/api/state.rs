use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;

use crate::auth::{Authenticator, CredentialStore, Identity};
use crate::chat::{Session, SessionBuilder};
use crate::core::AppConfig;
use crate::openai::BoxedCompletionApi;
use crate::profiles::{GrantTable, ProfileRegistry, resolve};

/// A session is locked for the whole relay of a message so messages
/// from the same session are handled one at a time.
pub type SharedSession = Arc<Mutex<Session>>;

pub struct AppState {
    pub config: AppConfig,
    pub registry: Arc<ProfileRegistry>,
    pub grants: GrantTable,
    pub authenticator: Authenticator,
    pub completion: BoxedCompletionApi,
    // Live sessions by ID, gone when the process exits
    sessions: HashMap<String, SharedSession>,
}

impl AppState {
    pub fn new(config: AppConfig, completion: BoxedCompletionApi) -> Self {
        let registry = Arc::new(ProfileRegistry::default());
        let grants = GrantTable::from_registry(&registry);
        let authenticator = Authenticator::new(CredentialStore::new(&config.user_data_path));
        Self {
            config,
            registry,
            grants,
            authenticator,
            completion,
            sessions: HashMap::new(),
        }
    }

    /// Create a session for a freshly authenticated identity, ready for
    /// profile selection. Idle sessions are dropped first so sessions
    /// that are never closed don't pile up.
    pub fn open_session(&mut self, identity: Identity) -> SharedSession {
        self.evict_idle_sessions(Utc::now());

        let profiles = resolve(&identity, &self.registry, &self.grants);
        let session = SessionBuilder::new(identity, Arc::clone(&self.registry))
            .profiles(profiles)
            .system_message(&self.config.system_message)
            .max_tokens(self.config.max_tokens)
            .build();

        let id = session.id().to_string();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.insert(id, Arc::clone(&shared));
        shared
    }

    pub fn session(&self, id: &str) -> Option<SharedSession> {
        self.sessions.get(id).cloned()
    }

    pub fn close_session(&mut self, id: &str) -> Option<SharedSession> {
        self.sessions.remove(id)
    }

    /// Drop sessions idle for longer than the configured timeout and
    /// return how many were dropped. A session that is locked is in use
    /// and always kept.
    pub fn evict_idle_sessions(&mut self, now: DateTime<Utc>) -> usize {
        let timeout = TimeDelta::minutes(self.config.session_idle_minutes);
        let before = self.sessions.len();

        self.sessions.retain(|id, session| match session.try_lock() {
            Ok(session) if session.is_idle(now, timeout) => {
                tracing::info!("Evicting idle session {}", id);
                false
            }
            _ => true,
        });

        before - self.sessions.len()
    }
}
