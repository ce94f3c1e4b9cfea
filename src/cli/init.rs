use anyhow::Result;
use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::auth::{AuthStore, mask};
use crate::config::Config;

/// Guided first-run setup
pub async fn run(config_path: &Path) -> Result<()> {
    eprintln!("{}", "Welcome to GENGAR 🛡️\n".bold());

    // 1. Config file
    eprintln!("{}", "1. Configuration".bold());
    let config = if config_path.exists() {
        eprintln!("   {} Config already exists at {}", "✓".green(), config_path.display());
        Config::load_from(config_path)?
    } else {
        let config = Config::default();
        config.save_to(config_path)?;
        eprintln!("   {} Config written to {}", "✓".green(), config_path.display());
        config
    };

    // 2. Credentials
    eprintln!("\n{}", "2. Credentials".bold());
    let auth = AuthStore::load()?;
    report_secret("Anthropic API key", auth.anthropic_api_key(), "ANTHROPIC_API_KEY", "offline answers only");
    report_secret("Telegram bot token", auth.telegram_bot_token(), "TELEGRAM_BOT_TOKEN", "`gengar serve` unavailable");
    report_secret("ElevenLabs API key", auth.elevenlabs_api_key(), "ELEVENLABS_API_KEY", "voice unavailable");
    eprintln!("   Credentials file: {}", AuthStore::credentials_path().display().to_string().dimmed());

    // 3. External tools
    eprintln!("\n{}", "3. Tools on PATH".bold());
    let mut tools: Vec<(&str, &str)> = vec![
        (config.commands.scan.program.as_str(), "scan / network scan"),
        ("ip", "vpn status"),
        ("uname", "system info"),
    ];
    if config.voice.enabled {
        if let Some(recorder) = config.voice.recorder.first() {
            tools.push((recorder.as_str(), "voice recording"));
        }
        if let Some(player) = config.voice.player.first() {
            tools.push((player.as_str(), "voice playback"));
        }
    }
    for (program, purpose) in tools {
        match which(program) {
            Some(path) => eprintln!("   {} {program} ({})", "✓".green(), path.display().to_string().dimmed()),
            None => eprintln!("   {} {program} not found, {purpose} will fail", "⚠".yellow()),
        }
    }

    eprintln!("\n{}", "Ready! Run `gengar chat` to start.".green().bold());
    Ok(())
}

fn report_secret(label: &str, value: Option<String>, env: &str, without: &str) {
    match value {
        Some(v) => eprintln!("   {} {label}: {}", "✓".green(), mask(&v)),
        None => eprintln!("   {} {label} not set (set {env}), {without}", "○".dimmed()),
    }
}

/// Locate an executable on PATH
pub fn which(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|p| p.is_file())
}
