//! Password authentication against a JSON credential file.

mod authenticator;
mod credentials;

pub use authenticator::{Authenticator, Identity};
pub use credentials::{CredentialError, CredentialRecord, CredentialStore, RoleField};
