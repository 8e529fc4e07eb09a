mod config;
mod logging;
pub use config::{
    AppConfig, DEFAULT_MAX_TOKENS, DEFAULT_SESSION_IDLE_MINUTES, DEFAULT_SYSTEM_MESSAGE,
};
pub use logging::init_tracing;
