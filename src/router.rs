//! Maps one normalized input to exactly one handler and journals the result.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::chat::ChatHandler;
use crate::commands::{HandlerContext, Registry, StatusReport};
use crate::context::{SessionKey, SessionStore};
use crate::error::GengarError;
use crate::journal::{InteractionRecord, Journal};
use crate::types::Channel;

/// Name recorded for inputs no command claimed
pub const CHAT_COMMAND: &str = "chat";

/// An input as it arrives from a channel
#[derive(Debug, Clone)]
pub struct Request {
    pub channel: Channel,
    /// Conversation within the channel (chat id, or `local`)
    pub conversation: String,
    pub text: String,
}

impl Request {
    pub fn new(channel: Channel, conversation: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel,
            conversation: conversation.into(),
            text: text.into(),
        }
    }

    /// A request from the local terminal
    pub fn local(text: impl Into<String>) -> Self {
        Self::new(Channel::Cli, "local", text)
    }

    fn session_key(&self) -> SessionKey {
        SessionKey {
            channel: self.channel,
            conversation: self.conversation.clone(),
        }
    }
}

/// Classification of an input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Command { name: String, arg: String },
    Chat { prompt: String },
    Empty,
}

impl Route {
    pub fn command_name(&self) -> &str {
        match self {
            Route::Command { name, .. } => name,
            Route::Chat { .. } => CHAT_COMMAND,
            Route::Empty => "none",
        }
    }
}

/// A handler's result, annotated with the handler that produced it
#[derive(Debug)]
pub struct Reply {
    pub command: String,
    pub outcome: Result<String, GengarError>,
    pub duration: Duration,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Text to hand back on the originating channel
    pub fn text(&self) -> String {
        match &self.outcome {
            Ok(text) => text.clone(),
            Err(GengarError::EmptyInput) => "Say something. Type `help` for commands.".into(),
            Err(e) => format!("❌ {e}"),
        }
    }
}

pub struct Router {
    registry: Registry,
    chat: ChatHandler,
    sessions: SessionStore,
    journal: Journal,
    voice_enabled: bool,
    started: DateTime<Utc>,
    processed: AtomicU64,
    failed: AtomicU64,
}

impl Router {
    pub fn new(registry: Registry, chat: ChatHandler, journal: Journal, session_window: usize) -> Self {
        Self {
            registry,
            chat,
            sessions: SessionStore::new(session_window),
            journal,
            voice_enabled: false,
            started: Utc::now(),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub fn with_voice(mut self, enabled: bool) -> Self {
        self.voice_enabled = enabled;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn started(&self) -> DateTime<Utc> {
        self.started
    }

    /// Classify `input` without running anything
    pub fn route(&self, input: &str) -> Route {
        let input = normalize(input);
        if input.is_empty() {
            return Route::Empty;
        }
        match self.registry.find(&input) {
            Some((command, arg)) => Route::Command {
                name: command.name.clone(),
                arg,
            },
            None => Route::Chat { prompt: input },
        }
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            started: self.started,
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            chat_backend: self.chat.backend_name(),
            voice_enabled: self.voice_enabled,
            commands: self.registry.len(),
        }
    }

    /// Route, run one handler, journal one record. Never returns an error:
    /// handler failures come back inside the `Reply`.
    pub async fn handle(&self, request: &Request) -> Reply {
        let started = Instant::now();
        let route = self.route(&request.text);
        let command = route.command_name().to_string();
        let key = request.session_key();

        tracing::debug!(channel = %request.channel, command = %command, "dispatching");

        let outcome = match &route {
            Route::Empty => Err(GengarError::EmptyInput),
            Route::Command { name, arg } => match self.registry.get(name) {
                Some(cmd) => {
                    let ctx = HandlerContext {
                        registry: &self.registry,
                        status: self.status(),
                    };
                    cmd.handler
                        .execute(arg, &ctx)
                        .await
                        .map_err(|e| GengarError::handler(name, &e))
                }
                None => Err(GengarError::Config(format!("command '{name}' vanished from registry"))),
            },
            Route::Chat { prompt } => {
                let history = self.sessions.history(&key);
                self.chat
                    .respond(prompt, &history)
                    .await
                    .map_err(|e| GengarError::handler(CHAT_COMMAND, &e))
            }
        };

        let duration = started.elapsed();
        let reply = Reply {
            command,
            outcome,
            duration,
        };

        self.processed.fetch_add(1, Ordering::Relaxed);
        match &reply.outcome {
            Ok(text) => {
                self.sessions.record(&key, request.text.trim(), text);
                tracing::info!(
                    channel = %request.channel,
                    command = %reply.command,
                    elapsed_ms = duration.as_millis() as u64,
                    "handled"
                );
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(channel = %request.channel, command = %reply.command, "handler failed: {e}");
            }
        }

        let record = InteractionRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            channel: request.channel,
            conversation: request.conversation.clone(),
            input: request.text.clone(),
            command: reply.command.clone(),
            output: reply.text(),
            success: reply.is_success(),
            duration_ms: duration.as_millis() as u64,
        };
        if let Err(e) = self.journal.append(&record).await {
            tracing::error!("Failed to journal interaction: {e:#}");
        }

        reply
    }
}

/// Collapse whitespace and drop trailing sentence punctuation that speech
/// transcription tends to add
pub fn normalize(input: &str) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_end_matches(['.', '!']);
    trimmed.trim_end().to_string()
}
