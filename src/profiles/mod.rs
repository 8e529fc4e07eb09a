//! Chat profiles, the model each one maps to, and which roles may use them.

mod registry;
mod resolver;

pub use registry::{ChatProfile, ProfileRegistry};
pub use resolver::{GrantTable, resolve};
