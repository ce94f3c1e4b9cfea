use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthStore;
use crate::config::Config;
use crate::router::{Request, Router};
use crate::telegram::api::TelegramBot;
use crate::telegram::types::TgMessage;
use crate::telegram::{MAX_MESSAGE_CHARS, split_message};
use crate::types::Channel;
use crate::voice::VoiceEngine;

/// Run the Telegram channel, plus the voice channel when enabled, against one router
pub async fn run(config: &Config) -> Result<()> {
    let auth = AuthStore::load().context("loading credentials")?;
    let token = auth.require_telegram_token()?;

    let voice = super::voice_engine(config, &auth)?.map(Arc::new);
    // Voice notes can be transcribed even when the microphone channel is off
    let transcriber = match (&voice, auth.elevenlabs_api_key()) {
        (Some(engine), _) => Some(engine.clone()),
        (None, Some(key)) => Some(Arc::new(VoiceEngine::new(key, &config.voice)?)),
        (None, None) => None,
    };

    let router = super::build_router(config, &auth, voice.is_some()).await?;

    let (allowed_users, poll_timeout) = match &config.telegram {
        Some(tg) => (tg.allowed_users.clone(), tg.poll_timeout_secs),
        None => (Vec::new(), 30),
    };
    if allowed_users.is_empty() {
        tracing::warn!("telegram.allowed_users is empty, every user can reach this bot");
    }
    let bot = TelegramBot::new(&token, allowed_users)?;

    let cancel = CancellationToken::new();
    let mut channels = JoinSet::new();
    channels.spawn(telegram_loop(
        bot,
        router.clone(),
        transcriber,
        poll_timeout,
        cancel.clone(),
    ));
    if let Some(engine) = voice {
        channels.spawn(super::listen::voice_loop(router.clone(), engine, cancel.clone()));
    }

    eprintln!(
        "{} {} channel(s) running. Ctrl-C to stop.",
        "🤖 GENGAR serving:".green().bold(),
        channels.len()
    );

    tokio::select! {
        _ = signal::ctrl_c() => {
            eprintln!("\n{}", "🛑 Shutting down...".yellow());
        }
        _ = cancel.cancelled() => {}
    }
    cancel.cancel();

    while let Some(joined) = channels.join_next().await {
        if let Err(e) = joined {
            tracing::error!("Channel task aborted: {e}");
        }
    }

    if let Err(e) = super::save_session_summary(&router, config).await {
        tracing::error!("{e:#}");
    }
    Ok(())
}

async fn telegram_loop(
    bot: TelegramBot,
    router: Arc<Router>,
    transcriber: Option<Arc<VoiceEngine>>,
    poll_timeout: u32,
    cancel: CancellationToken,
) {
    let download_dir = Config::data_dir().join("tmp");
    let mut offset: i64 = 0;
    let mut consecutive_poll_errors: u32 = 0;

    tracing::info!("Telegram channel polling");

    loop {
        // Exponential backoff on consecutive errors (network outage)
        if consecutive_poll_errors > 0 {
            let backoff = std::cmp::min(2u64.pow(consecutive_poll_errors.min(6)), 60);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_secs(backoff)) => {}
            }
        }

        let polled = tokio::select! {
            _ = cancel.cancelled() => break,
            polled = bot.get_updates(offset, poll_timeout) => polled,
        };

        match polled {
            Ok(updates) => {
                if consecutive_poll_errors > 0 {
                    tracing::info!("Network recovered after {} retries", consecutive_poll_errors);
                    consecutive_poll_errors = 0;
                }
                for update in updates {
                    offset = update.update_id + 1;
                    if let Some(msg) = update.message {
                        handle_message(&bot, &router, transcriber.as_deref(), msg, &download_dir).await;
                    }
                }
            }
            Err(e) => {
                consecutive_poll_errors += 1;
                if consecutive_poll_errors == 1 {
                    tracing::warn!("Network issue detected, backing off");
                }
                tracing::error!("Poll error: {e:#}");
            }
        }
    }

    tracing::info!("Telegram channel stopped");
}

async fn handle_message(
    bot: &TelegramBot,
    router: &Router,
    transcriber: Option<&VoiceEngine>,
    msg: TgMessage,
    download_dir: &Path,
) {
    let Some(user) = msg.from.as_ref() else {
        return;
    };
    if !bot.is_allowed(user.id) {
        tracing::debug!(user = user.id, "Ignoring message from unlisted user");
        return;
    }

    let chat_id = msg.chat.id;
    let user_name = user.username.clone().unwrap_or_else(|| user.first_name.clone());

    let text = match message_text(bot, transcriber, &msg, download_dir).await {
        Ok(Some(text)) => text,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!("Voice note from {user_name} not transcribed: {e:#}");
            if let Err(e) = bot
                .send_message(chat_id, &format!("❌ Couldn't read that voice note: {e}"))
                .await
            {
                tracing::error!("Failed to send reply to {chat_id}: {e:#}");
            }
            return;
        }
    };

    tracing::info!("[telegram] {user_name}: {text}");
    if let Err(e) = bot.send_typing(chat_id).await {
        tracing::debug!("typing indicator failed: {e:#}");
    }

    let request = Request::new(Channel::Telegram, chat_id.to_string(), bot_command(&text));
    let reply = router.handle(&request).await;

    for chunk in split_message(&reply.text(), MAX_MESSAGE_CHARS) {
        if let Err(e) = bot.send_message(chat_id, &chunk).await {
            tracing::error!("Failed to send reply to {chat_id}: {e:#}");
            break;
        }
    }
}

/// Text, caption, or the transcript of a voice note
async fn message_text(
    bot: &TelegramBot,
    transcriber: Option<&VoiceEngine>,
    msg: &TgMessage,
    download_dir: &Path,
) -> Result<Option<String>> {
    if let Some(text) = msg.text.as_ref().or(msg.caption.as_ref()) {
        return Ok(Some(text.clone()));
    }
    let Some(voice) = msg.voice.as_ref() else {
        return Ok(None);
    };
    let engine = transcriber.context("voice notes need an ElevenLabs API key")?;

    let path = bot.download(&voice.file_id, download_dir).await?;
    let transcript = engine.stt(&path).await;
    let _ = tokio::fs::remove_file(&path).await;
    Ok(Some(transcript?))
}

/// Map Telegram slash commands onto plain input: "/scan@gengar_bot 10.0.0.1" -> "scan 10.0.0.1"
pub fn bot_command(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return trimmed.to_string();
    };
    let (head, tail) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let name = head.split('@').next().unwrap_or(head);
    let name = if name.eq_ignore_ascii_case("start") { "help" } else { name };
    format!("{name} {}", tail.trim()).trim().to_string()
}
