pub mod auth;
pub mod chat;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod journal;
pub mod logging;
pub mod render;
pub mod router;
pub mod telegram;
pub mod types;
pub mod voice;
