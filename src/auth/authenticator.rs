use serde::Serialize;

use super::credentials::CredentialStore;

#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct Identity {
    pub identifier: String,
    pub roles: Vec<String>,
}

impl Identity {
    pub fn new(identifier: &str, roles: Vec<String>) -> Self {
        Self {
            identifier: identifier.to_string(),
            roles,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Authenticator {
    store: CredentialStore,
}

impl Authenticator {
    pub fn new(store: CredentialStore) -> Self {
        Self { store }
    }

    /// Check a username and password against the credential store.
    ///
    /// Returns `None` for an unknown user, a wrong password, or a
    /// credential store that can't be loaded. Callers can't tell these
    /// apart, the cause is only logged.
    ///
    /// NOTE: Passwords are stored and compared in plaintext.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<Identity> {
        let records = match self.store.load() {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(
                    "Authentication denied for {}, {} not loaded: {}",
                    username,
                    self.store.path().display(),
                    e
                );
                return None;
            }
        };

        let Some(record) = records.get(username) else {
            tracing::debug!("Authentication denied, unknown user {}", username);
            return None;
        };

        if record.password != password {
            tracing::debug!("Authentication denied, wrong password for {}", username);
            return None;
        }

        tracing::debug!("Authenticated {}", username);
        Some(Identity::new(username, record.role.clone().into_roles()))
    }
}
