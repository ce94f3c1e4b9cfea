pub mod offline;

use anyhow::Result;
use std::time::Duration;

use crate::auth::AuthStore;
use crate::client::AnthropicClient;
use crate::config::LlmConfig;
use crate::error::{GengarError, GengarResult};
use crate::types::Message;

const DEFAULT_SYSTEM_PROMPT: &str = r#"You are GENGAR, a personal assistant specialised in cybersecurity, penetration testing and CTF work.

You help with:
- explaining security concepts and vulnerabilities
- penetration testing methodology
- CTF challenges and techniques
- security tools and how to use them
- hardening and defensive best practices

Keep answers accurate and concise. Only assist with authorised testing and say so when a request is ambiguous."#;

/// Where conversational replies come from
pub enum ChatBackend {
    Anthropic {
        client: AnthropicClient,
        model: String,
        max_tokens: u32,
    },
    /// Built-in keyword responder used when no API key is configured
    Offline,
}

/// The fallback handler: anything no command matched is a prompt
pub struct ChatHandler {
    backend: ChatBackend,
    system_prompt: String,
}

impl ChatHandler {
    pub fn new(backend: ChatBackend, system_prompt: String) -> Self {
        Self {
            backend,
            system_prompt,
        }
    }

    pub fn offline() -> Self {
        Self::new(ChatBackend::Offline, DEFAULT_SYSTEM_PROMPT.to_string())
    }

    /// Pick the backend from credentials. Without an API key the offline
    /// responder is used, unless `offline_fallback` is off.
    pub fn from_config(llm: &LlmConfig, auth: &AuthStore) -> GengarResult<Self> {
        let system_prompt = load_system_prompt(llm);

        match auth.anthropic_api_key() {
            Some(api_key) => {
                let client = AnthropicClient::new(
                    api_key,
                    llm.api_base.clone(),
                    Duration::from_secs(llm.timeout_secs),
                )?;
                Ok(Self::new(
                    ChatBackend::Anthropic {
                        client,
                        model: llm.model.clone(),
                        max_tokens: llm.max_tokens,
                    },
                    system_prompt,
                ))
            }
            None if llm.offline_fallback => {
                tracing::warn!("No Anthropic API key configured, using the offline responder");
                Ok(Self::new(ChatBackend::Offline, system_prompt))
            }
            None => Err(GengarError::Config(
                "No Anthropic API key found. Set ANTHROPIC_API_KEY, add [anthropic] api_key to credentials.toml, or enable llm.offline_fallback".into(),
            )),
        }
    }

    pub fn backend_name(&self) -> String {
        match &self.backend {
            ChatBackend::Anthropic { model, .. } => format!("anthropic ({model})"),
            ChatBackend::Offline => "offline".into(),
        }
    }

    /// Answer `prompt` given the conversation so far
    pub async fn respond(&self, prompt: &str, history: &[Message]) -> Result<String> {
        match &self.backend {
            ChatBackend::Anthropic {
                client,
                model,
                max_tokens,
            } => {
                let mut messages = history.to_vec();
                messages.push(Message::user(prompt));

                let completion = client
                    .complete(model, &self.system_prompt, &messages, *max_tokens, &mut |_: &str| {})
                    .await?;
                tracing::debug!(
                    input_tokens = completion.usage.input_tokens,
                    output_tokens = completion.usage.output_tokens,
                    "chat completion"
                );

                if completion.text.trim().is_empty() {
                    anyhow::bail!("model returned an empty reply");
                }
                Ok(completion.text)
            }
            ChatBackend::Offline => Ok(offline::respond(prompt)),
        }
    }
}

fn load_system_prompt(llm: &LlmConfig) -> String {
    let candidates = [
        llm.system_prompt_file.clone(),
        Some(std::path::PathBuf::from(".gengar/system.md")),
        dirs::config_dir().map(|d| d.join("gengar/system.md")),
    ];

    for path in candidates.iter().flatten() {
        if let Ok(content) = std::fs::read_to_string(path) {
            tracing::debug!("Loaded system prompt from {}", path.display());
            return content;
        }
    }

    DEFAULT_SYSTEM_PROMPT.to_string()
}
