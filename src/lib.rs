pub mod api;
pub mod auth;
pub mod chat;
pub mod cli;
pub mod core;
pub mod openai;
pub mod profiles;
