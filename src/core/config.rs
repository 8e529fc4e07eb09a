use std::env;

pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful assistant.";
pub const DEFAULT_MAX_TOKENS: u32 = 100;
pub const DEFAULT_SESSION_IDLE_MINUTES: i64 = 60;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub user_data_path: String,
    pub openai_api_hostname: String,
    pub openai_api_key: String,
    pub system_message: String,
    pub max_tokens: u32,
    /// Sessions with no activity for this long are dropped
    pub session_idle_minutes: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        // A missing .env file is fine, the process environment still applies
        let _ = dotenvy::dotenv();

        let user_data_path =
            env::var("CHAT_RELAY_USER_DATA").unwrap_or_else(|_| "user_data.json".to_string());
        let openai_api_hostname = env::var("CHAT_RELAY_LLM_HOST")
            .unwrap_or_else(|_| "https://api.openai.com".to_string());
        let openai_api_key =
            env::var("OPENAI_API_KEY").unwrap_or_else(|_| "thiswontworkforopenai".to_string());
        let system_message = env::var("CHAT_RELAY_SYSTEM_MESSAGE")
            .unwrap_or_else(|_| DEFAULT_SYSTEM_MESSAGE.to_string());
        let max_tokens = env::var("CHAT_RELAY_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);
        let session_idle_minutes = env::var("CHAT_RELAY_SESSION_IDLE_MINUTES")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|minutes| *minutes > 0)
            .unwrap_or(DEFAULT_SESSION_IDLE_MINUTES);

        Self {
            user_data_path,
            openai_api_hostname,
            openai_api_key,
            system_message,
            max_tokens,
            session_idle_minutes,
        }
    }
}
