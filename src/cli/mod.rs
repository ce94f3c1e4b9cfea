pub mod chat;
pub mod config;
pub mod init;
pub mod listen;
pub mod run;
pub mod serve;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::auth::AuthStore;
use crate::chat::ChatHandler;
use crate::commands::Registry;
use crate::config::Config;
use crate::journal::Journal;
use crate::router::Router;
use crate::voice::VoiceEngine;

/// Inputs that end an interactive session
pub const EXIT_WORDS: &[&str] = &["exit", "quit", "shutdown", "/quit", "/exit"];

pub fn is_exit(input: &str) -> bool {
    let input = input.trim().trim_end_matches(['.', '!']);
    EXIT_WORDS.iter().any(|w| input.eq_ignore_ascii_case(w))
}

/// Assemble the router and everything it owns from config and credentials
pub async fn build_router(config: &Config, auth: &AuthStore, voice_enabled: bool) -> Result<Arc<Router>> {
    let registry = Registry::from_config(config)?;
    let chat = ChatHandler::from_config(&config.llm, auth)?;
    let journal_path = config.logging.journal_path();
    let journal = Journal::open(&journal_path).await?;

    tracing::info!(
        commands = registry.len(),
        backend = %chat.backend_name(),
        journal = %journal_path.display(),
        "router ready"
    );

    Ok(Arc::new(
        Router::new(registry, chat, journal, config.session.max_exchanges).with_voice(voice_enabled),
    ))
}

/// Voice engine if voice is enabled; enabled without credentials is an error
pub fn voice_engine(config: &Config, auth: &AuthStore) -> Result<Option<VoiceEngine>> {
    if !config.voice.enabled {
        return Ok(None);
    }
    let key = auth.require_elevenlabs_key()?;
    Ok(Some(VoiceEngine::new(key, &config.voice)?))
}

/// Write the end-of-session summary next to the journal
pub async fn save_session_summary(router: &Router, config: &Config) -> Result<()> {
    let summary = router.journal().summary(router.started()).await;
    if summary.total_interactions == 0 {
        return Ok(());
    }
    let path = summary
        .save(&config.logging.sessions_path())
        .context("saving session summary")?;
    tracing::info!("Session summary written to {}", path.display());
    Ok(())
}
