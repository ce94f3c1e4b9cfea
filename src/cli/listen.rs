use anyhow::{Context, Result};
use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthStore;
use crate::config::Config;
use crate::render::render_reply;
use crate::router::{Request, Router};
use crate::types::Channel;
use crate::voice::VoiceEngine;

/// Voice-only mode: record, transcribe, route, speak
pub async fn run(config: &Config) -> Result<()> {
    let auth = AuthStore::load()?;
    let key = auth.require_elevenlabs_key()?;
    let engine = Arc::new(VoiceEngine::new(key, &config.voice)?);
    let router = super::build_router(config, &auth, true).await?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{}", "🛑 Shutdown signal received".yellow());
            on_signal.cancel();
        }
    });

    eprintln!(
        "{}",
        format!(
            "🎤 GENGAR is listening ({}s clips). Say \"exit\" to stop.",
            config.voice.record_seconds
        )
        .bold()
    );

    voice_loop(router.clone(), engine, cancel).await;

    if let Err(e) = super::save_session_summary(&router, config).await {
        tracing::error!("{e:#}");
    }
    Ok(())
}

/// Runs until cancelled or an exit phrase is heard
pub async fn voice_loop(router: Arc<Router>, engine: Arc<VoiceEngine>, cancel: CancellationToken) {
    let scratch = Config::data_dir().join("tmp");

    loop {
        let heard = tokio::select! {
            _ = cancel.cancelled() => break,
            heard = engine.listen(&scratch) => heard,
        };

        let text = match heard {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Voice capture failed: {e:#}");
                // Avoid spinning when the recorder is missing
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_secs(2)) => {}
                }
                continue;
            }
        };

        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        eprintln!("{} {}", "🎤".bold(), text.dimmed());
        if super::is_exit(text) {
            tracing::info!("Exit phrase heard, stopping voice channel");
            break;
        }

        let reply = router.handle(&Request::new(Channel::Voice, "local", text)).await;
        println!("{}\n", render_reply(&reply));

        if let Err(e) = speak(&engine, &reply.text(), &cancel).await {
            tracing::warn!("Could not speak reply: {e:#}");
        }
    }
}

async fn speak(engine: &VoiceEngine, text: &str, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => Ok(()),
        spoken = engine.speak(text) => spoken.context("text-to-speech"),
    }
}
