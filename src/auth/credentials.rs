use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Credential file not found: {0}")]
    NotFound(String),

    #[error("Credential file could not be read: {0}")]
    Unreadable(#[from] std::io::Error),

    #[error("Credential file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A role is stored either as a single string or a list of strings.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum RoleField {
    One(String),
    Many(Vec<String>),
}

impl RoleField {
    pub fn into_roles(self) -> Vec<String> {
        match self {
            RoleField::One(role) => vec![role],
            RoleField::Many(roles) => roles,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct CredentialRecord {
    pub password: String,
    pub role: RoleField,
}

/// Reads the username -> credential mapping. Nothing is cached, every
/// call to `load` goes back to disk so edits take effect on the next
/// login.
#[derive(Clone, Debug)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<HashMap<String, CredentialRecord>, CredentialError> {
        let contents = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => CredentialError::NotFound(self.path.display().to_string()),
            _ => CredentialError::Unreadable(e),
        })?;
        let records = serde_json::from_str(&contents)?;
        Ok(records)
    }
}
