use anyhow::Result;
use std::time::Duration;

use super::process;

const ARGS_PLACEHOLDER: &str = "{args}";

/// A user-defined command loaded from config
#[derive(Debug, Clone)]
pub struct CustomHandler {
    pub name: String,
    pub command: Vec<String>,
    pub timeout: Duration,
}

impl CustomHandler {
    /// Substitute `{args}` with the argument, or append the argument's
    /// words when the template has no placeholder
    pub fn argv(&self, arg: &str) -> Vec<String> {
        let arg = arg.trim();
        if self.command.iter().any(|c| c.contains(ARGS_PLACEHOLDER)) {
            self.command
                .iter()
                .filter(|c| !(c.as_str() == ARGS_PLACEHOLDER && arg.is_empty()))
                .map(|c| c.replace(ARGS_PLACEHOLDER, arg))
                .collect()
        } else {
            let mut argv = self.command.clone();
            argv.extend(arg.split_whitespace().map(|w| w.to_string()));
            argv
        }
    }

    pub async fn execute(&self, arg: &str) -> Result<String> {
        let output = process::run(&self.argv(arg), self.timeout).await?;

        if !output.success() {
            let detail = if output.stderr.trim().is_empty() {
                output.stdout.trim()
            } else {
                output.stderr.trim()
            };
            anyhow::bail!(
                "'{}' exited with code {}: {}",
                self.name,
                output.code.unwrap_or(-1),
                detail
            );
        }

        // Scripts may answer with {"content": ..., "is_error": ...}
        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&output.stdout) {
            if let Some(content) = parsed.get("content").and_then(|c| c.as_str()) {
                let is_error = parsed
                    .get("is_error")
                    .and_then(|e| e.as_bool())
                    .unwrap_or(false);
                if is_error {
                    anyhow::bail!("{content}");
                }
                return Ok(content.to_string());
            }
        }

        let text = output.stdout.trim_end();
        Ok(if text.is_empty() {
            "(no output)".to_string()
        } else {
            text.to_string()
        })
    }
}
