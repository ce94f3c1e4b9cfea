//! Append-only interaction journal.
//!
//! One JSON object per line. Appends from concurrent channels are serialized
//! by an async mutex and each record goes out in a single `write_all`, so
//! lines never interleave.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::types::Channel;

/// Session summaries list at most this many of the most recent inputs
pub const SUMMARY_INPUTS: usize = 500;

/// One logged exchange between a user and GENGAR
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub channel: Channel,
    pub conversation: String,
    pub input: String,
    /// Matched command name, or "chat" for the fallback
    pub command: String,
    pub output: String,
    pub success: bool,
    pub duration_ms: u64,
}

pub struct Journal {
    inner: Mutex<JournalInner>,
}

struct JournalInner {
    file: Option<File>,
    /// Most recent inputs this run, for the session summary
    inputs: VecDeque<String>,
    written: u64,
}

impl Journal {
    /// Open (or create) a journal file for appending
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("opening journal {}", path.display()))?;

        Ok(Self {
            inner: Mutex::new(JournalInner {
                file: Some(file),
                inputs: VecDeque::new(),
                written: 0,
            }),
        })
    }

    /// A journal that only keeps session counters (nothing hits disk)
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(JournalInner {
                file: None,
                inputs: VecDeque::new(),
                written: 0,
            }),
        }
    }

    pub async fn append(&self, record: &InteractionRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut inner = self.inner.lock().await;
        if let Some(file) = inner.file.as_mut() {
            file.write_all(line.as_bytes())
                .await
                .context("appending interaction record")?;
            file.flush().await?;
        }
        if inner.inputs.len() == SUMMARY_INPUTS {
            inner.inputs.pop_front();
        }
        inner.inputs.push_back(record.input.clone());
        inner.written += 1;
        Ok(())
    }

    pub async fn written(&self) -> u64 {
        self.inner.lock().await.written
    }

    /// Build a summary of everything appended since this journal was opened
    pub async fn summary(&self, started: DateTime<Utc>) -> SessionSummary {
        let inner = self.inner.lock().await;
        let ended = Utc::now();
        SessionSummary {
            session_start: started,
            session_end: ended,
            duration_secs: (ended - started).num_seconds().max(0) as u64,
            total_interactions: inner.written,
            inputs: inner.inputs.iter().cloned().collect(),
        }
    }
}

/// Read every record from a journal file
pub fn read_records(path: &Path) -> Result<Vec<InteractionRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading journal {}", path.display()))?;
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .map(|(i, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("journal line {} is not a record", i + 1))
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_start: DateTime<Utc>,
    pub session_end: DateTime<Utc>,
    pub duration_secs: u64,
    pub total_interactions: u64,
    pub inputs: Vec<String>,
}

impl SessionSummary {
    /// Write as `session_summary_YYYYmmdd_HHMMSS.json` under `dir`
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let name = format!(
            "session_summary_{}.json",
            self.session_end.format("%Y%m%d_%H%M%S")
        );
        let path = dir.join(name);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}
