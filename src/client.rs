use anyhow::{Context, Result};
use futures_util::StreamExt;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::types::{Message, Usage};

const API_VERSION: &str = "2023-06-01";

/// Anthropic Messages API client with SSE streaming
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    api_base: String,
}

#[derive(Debug, Serialize)]
struct CreateMessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [Message],
    stream: bool,
}

/// Parsed SSE event from the streaming response
#[derive(Debug)]
pub enum StreamEvent {
    MessageStart { usage: Option<Usage> },
    TextDelta(String),
    MessageDelta {
        output_tokens: Option<u64>,
        stop_reason: Option<String>,
    },
    MessageStop,
    Ping,
    Error { message: String },
}

/// Accumulated result of one streamed completion
#[derive(Debug, Default)]
pub struct Completion {
    pub text: String,
    pub usage: Usage,
    pub stop_reason: Option<String>,
}

impl AnthropicClient {
    pub fn new(api_key: String, api_base: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            api_key,
            api_base,
        })
    }

    /// Stream a completion, calling `on_text` for every text delta
    pub async fn complete(
        &self,
        model: &str,
        system: &str,
        messages: &[Message],
        max_tokens: u32,
        on_text: &mut (dyn FnMut(&str) + Send),
    ) -> Result<Completion> {
        let request = CreateMessageRequest {
            model,
            max_tokens,
            system,
            messages,
            stream: true,
        };

        let mut req_builder = self
            .client
            .post(&self.api_base)
            .header("content-type", "application/json")
            .header("anthropic-version", API_VERSION);

        // OAuth tokens go in a bearer header, API keys in x-api-key
        if self.api_key.starts_with("sk-ant-oat") {
            req_builder = req_builder.header("authorization", format!("Bearer {}", self.api_key));
        } else {
            req_builder = req_builder.header("x-api-key", &self.api_key);
        }

        let response = req_builder
            .json(&request)
            .send()
            .await
            .context("sending request to Anthropic API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error {status}: {body}");
        }

        let mut result = Completion::default();
        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut pending = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("reading stream chunk")?;
            Self::decode_chunk(&mut buffer, &mut pending, &chunk);

            while let Some(event) = Self::parse_next_sse_event(&mut buffer) {
                match event {
                    StreamEvent::MessageStart { usage: Some(u) } => result.usage = u,
                    StreamEvent::TextDelta(text) => {
                        on_text(&text);
                        result.text.push_str(&text);
                    }
                    StreamEvent::MessageDelta {
                        output_tokens,
                        stop_reason,
                    } => {
                        if let Some(n) = output_tokens {
                            result.usage.output_tokens = n;
                        }
                        result.stop_reason = stop_reason;
                    }
                    StreamEvent::Error { message } => {
                        anyhow::bail!("API stream error: {message}");
                    }
                    _ => {}
                }
            }
        }

        Ok(result)
    }

    /// Append `chunk` to `buffer` as UTF-8. A character split across chunks
    /// is held in `pending` until the rest of its bytes arrive; invalid bytes
    /// become U+FFFD.
    pub fn decode_chunk(buffer: &mut String, pending: &mut Vec<u8>, chunk: &[u8]) {
        pending.extend_from_slice(chunk);
        let mut rest = pending.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    buffer.push_str(text);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    // valid_up_to marks a char boundary
                    buffer.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            buffer.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        // Truncated sequence: wait for the next chunk
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }
        let keep = rest.len();
        pending.drain(..pending.len() - keep);
    }

    /// Parse the next complete SSE event from `buffer`, consuming it.
    /// Returns `None` until a full event (terminated by a blank line) is buffered.
    pub fn parse_next_sse_event(buffer: &mut String) -> Option<StreamEvent> {
        loop {
            if buffer.contains("\r\n") {
                *buffer = buffer.replace("\r\n", "\n");
            }
            let event_end = buffer.find("\n\n")?;
            let event_text = buffer[..event_end].to_string();
            buffer.drain(..event_end + 2);

            if let Some(event) = Self::parse_event_text(&event_text) {
                return Some(event);
            }
            // Unknown or irrelevant event (content_block_start, …): keep going
        }
    }

    fn parse_event_text(event_text: &str) -> Option<StreamEvent> {
        let mut event_type = "";
        let mut data = String::new();

        for line in event_text.lines() {
            if let Some(rest) = line.strip_prefix("event: ") {
                event_type = rest;
            } else if let Some(rest) = line.strip_prefix("data: ") {
                if !data.is_empty() {
                    data.push('\n');
                }
                data.push_str(rest);
            }
        }

        match event_type {
            "ping" => Some(StreamEvent::Ping),
            "message_start" => {
                let v: serde_json::Value = serde_json::from_str(&data).ok()?;
                let usage = v
                    .get("message")
                    .and_then(|m| m.get("usage"))
                    .and_then(|u| serde_json::from_value(u.clone()).ok());
                Some(StreamEvent::MessageStart { usage })
            }
            "content_block_delta" => {
                let v: serde_json::Value = serde_json::from_str(&data).ok()?;
                let delta = v.get("delta")?;
                if delta.get("type")?.as_str()? != "text_delta" {
                    return None;
                }
                let text = delta.get("text")?.as_str()?;
                Some(StreamEvent::TextDelta(text.to_string()))
            }
            "message_delta" => {
                let v: serde_json::Value = serde_json::from_str(&data).ok()?;
                let stop_reason = v
                    .get("delta")
                    .and_then(|d| d.get("stop_reason"))
                    .and_then(|s| s.as_str())
                    .map(|s| s.to_string());
                let output_tokens = v
                    .get("usage")
                    .and_then(|u| u.get("output_tokens"))
                    .and_then(|n| n.as_u64());
                Some(StreamEvent::MessageDelta {
                    output_tokens,
                    stop_reason,
                })
            }
            "message_stop" => Some(StreamEvent::MessageStop),
            "error" => {
                let v: serde_json::Value = serde_json::from_str(&data).ok()?;
                let message = v
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown error")
                    .to_string();
                Some(StreamEvent::Error { message })
            }
            _ => None,
        }
    }
}
