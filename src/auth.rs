use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{GengarError, GengarResult};

/// Credential store: credentials.toml with environment overrides
#[derive(Debug, Default)]
pub struct AuthStore {
    credentials: Credentials,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Credentials {
    anthropic: Option<ApiKeyCreds>,
    telegram: Option<TelegramCreds>,
    elevenlabs: Option<ApiKeyCreds>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiKeyCreds {
    api_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct TelegramCreds {
    bot_token: String,
}

impl AuthStore {
    /// Load credentials.toml from the config dir, then apply env vars
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::credentials_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let credentials = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?
        } else {
            Credentials::default()
        };
        Ok(Self { credentials })
    }

    pub fn anthropic_api_key(&self) -> Option<String> {
        env_nonempty("ANTHROPIC_API_KEY").or_else(|| {
            self.credentials
                .anthropic
                .as_ref()
                .map(|a| a.api_key.clone())
        })
    }

    pub fn telegram_bot_token(&self) -> Option<String> {
        env_nonempty("TELEGRAM_BOT_TOKEN").or_else(|| {
            self.credentials
                .telegram
                .as_ref()
                .map(|t| t.bot_token.clone())
        })
    }

    pub fn elevenlabs_api_key(&self) -> Option<String> {
        env_nonempty("ELEVENLABS_API_KEY").or_else(|| {
            self.credentials
                .elevenlabs
                .as_ref()
                .map(|e| e.api_key.clone())
        })
    }

    /// Like `telegram_bot_token`, but a missing token is a configuration error
    pub fn require_telegram_token(&self) -> GengarResult<String> {
        self.telegram_bot_token().ok_or_else(|| {
            GengarError::Config(
                "Telegram bot token not configured. Set TELEGRAM_BOT_TOKEN or add [telegram] bot_token to credentials.toml".into(),
            )
        })
    }

    pub fn require_elevenlabs_key(&self) -> GengarResult<String> {
        self.elevenlabs_api_key().ok_or_else(|| {
            GengarError::Config(
                "ElevenLabs API key not configured. Set ELEVENLABS_API_KEY or add [elevenlabs] api_key to credentials.toml".into(),
            )
        })
    }

    pub fn credentials_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gengar")
            .join("credentials.toml")
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Mask a secret for display, keeping a short prefix and suffix
pub fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() > 20 {
        let head: String = chars[..12].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "***".into()
    }
}
