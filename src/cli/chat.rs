use anyhow::Result;
use colored::Colorize;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::auth::AuthStore;
use crate::config::Config;
use crate::context::SessionKey;
use crate::render::render_reply;
use crate::router::Request;
use crate::types::Channel;

/// Interactive REPL on the terminal
pub async fn run(config: &Config) -> Result<()> {
    let auth = AuthStore::load()?;
    let voice = super::voice_engine(config, &auth)?;
    let router = super::build_router(config, &auth, voice.is_some()).await?;
    let speak = config.voice.speak_replies;

    eprintln!("{}", "🤖 GENGAR is online. Type `help` for commands, `exit` to quit".bold());
    eprintln!();

    let key = SessionKey {
        channel: Channel::Cli,
        conversation: "local".into(),
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        eprint!("{}", "🎤 GENGAR > ".green().bold());
        std::io::stderr().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n{}", "🛑 Shutdown signal received".yellow());
                break;
            }
        };
        let Some(input) = line else {
            break; // EOF
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }
        if super::is_exit(trimmed) {
            break;
        }
        if trimmed == "/clear" {
            router.sessions().clear(&key);
            eprintln!("{}", "Conversation cleared.".dimmed());
            continue;
        }

        let reply = router.handle(&Request::local(trimmed)).await;
        println!("{}", render_reply(&reply));
        eprintln!("{}", format!("[{} · {} ms]", reply.command, reply.duration.as_millis()).dimmed());
        println!();

        if let Some(engine) = voice.as_ref().filter(|_| speak) {
            if let Err(e) = engine.speak(&reply.text()).await {
                tracing::warn!("Could not speak reply: {e:#}");
            }
        }
    }

    if let Err(e) = super::save_session_summary(&router, config).await {
        tracing::error!("{e:#}");
    }
    eprintln!("{}", "👋 GENGAR signing off.".dimmed());
    Ok(())
}
