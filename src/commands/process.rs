use anyhow::{Context, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const MAX_OUTPUT_BYTES: usize = 50_000;

/// Captured result of an external command
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed by a signal
    pub code: Option<i32>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Run `argv` without a shell. The child is killed if `timeout` elapses.
pub async fn run(argv: &[String], timeout: Duration) -> Result<ProcessOutput> {
    let (program, args) = argv.split_first().context("empty command")?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| anyhow::anyhow!("{program} timed out after {}s", timeout.as_secs()))?
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => anyhow::anyhow!("{program} not found on PATH"),
            _ => anyhow::anyhow!("failed to execute {program}: {e}"),
        })?;

    tracing::debug!(program = %program, code = ?output.status.code(), "process finished");

    Ok(ProcessOutput {
        stdout: truncate(String::from_utf8_lossy(&output.stdout).into_owned()),
        stderr: truncate(String::from_utf8_lossy(&output.stderr).into_owned()),
        code: output.status.code(),
    })
}

/// Like `run`, but a non-zero exit is an error carrying stderr (or stdout)
pub async fn run_checked(argv: &[String], timeout: Duration) -> Result<String> {
    let output = run(argv, timeout).await?;
    if !output.success() {
        let detail = if output.stderr.trim().is_empty() {
            output.stdout.trim()
        } else {
            output.stderr.trim()
        };
        anyhow::bail!(
            "{} exited with code {}: {}",
            argv[0],
            output.code.unwrap_or(-1),
            detail
        );
    }
    Ok(output.stdout)
}

fn truncate(mut text: String) -> String {
    if text.len() > MAX_OUTPUT_BYTES {
        let mut cut = MAX_OUTPUT_BYTES;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str("\n... (output truncated at 50KB)");
    }
    text
}
