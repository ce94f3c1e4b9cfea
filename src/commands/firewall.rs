use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Summarises the tail of a firewall log (ufw / iptables LOG format)
#[derive(Debug, Clone)]
pub struct FirewallHandler {
    pub log_path: PathBuf,
    pub lines: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FirewallSummary {
    pub total: usize,
    pub blocked: usize,
    pub allowed: usize,
    /// Most frequent `SRC=` addresses, busiest first
    pub top_sources: Vec<(String, usize)>,
}

impl FirewallHandler {
    /// `filter` (the command argument) keeps only lines containing it
    pub async fn execute(&self, filter: &str) -> Result<String> {
        let content = tokio::fs::read_to_string(&self.log_path)
            .await
            .with_context(|| format!("reading firewall log {}", self.log_path.display()))?;

        let entries = tail(&content, filter.trim(), self.lines);
        if entries.is_empty() {
            return Ok(if filter.trim().is_empty() {
                format!("🧱 {} is empty.", self.log_path.display())
            } else {
                format!("🧱 No firewall entries matching '{}'.", filter.trim())
            });
        }

        let summary = summarize(&entries);
        let mut out = format!(
            "🧱 Last {} firewall entries: {} blocked, {} allowed\n",
            summary.total, summary.blocked, summary.allowed
        );
        if !summary.top_sources.is_empty() {
            out.push_str("Top sources:\n");
            for (src, count) in &summary.top_sources {
                out.push_str(&format!("  • {src} ({count})\n"));
            }
        }
        out.push_str("Recent:\n");
        for line in entries.iter().rev().take(5) {
            out.push_str(&format!("  {line}\n"));
        }
        Ok(out.trim_end().to_string())
    }
}

/// Last `n` non-empty lines containing `filter` (case-insensitive), oldest first
pub fn tail<'a>(content: &'a str, filter: &str, n: usize) -> Vec<&'a str> {
    let needle = filter.to_lowercase();
    let mut matched: Vec<&str> = content
        .lines()
        .rev()
        .filter(|l| !l.trim().is_empty())
        .filter(|l| needle.is_empty() || l.to_lowercase().contains(&needle))
        .take(n)
        .collect();
    matched.reverse();
    matched
}

pub fn summarize(lines: &[&str]) -> FirewallSummary {
    static BLOCK_RE: OnceLock<Regex> = OnceLock::new();
    static ALLOW_RE: OnceLock<Regex> = OnceLock::new();
    static SRC_RE: OnceLock<Regex> = OnceLock::new();

    let block_re = BLOCK_RE.get_or_init(|| Regex::new(r"(?i)\b(BLOCK|DROP|DENY|REJECT)").unwrap());
    let allow_re = ALLOW_RE.get_or_init(|| Regex::new(r"(?i)\b(ALLOW|ACCEPT)").unwrap());
    let src_re = SRC_RE.get_or_init(|| Regex::new(r"\bSRC=(\S+)").unwrap());

    let mut summary = FirewallSummary {
        total: lines.len(),
        ..Default::default()
    };
    let mut sources: HashMap<String, usize> = HashMap::new();

    for line in lines {
        if block_re.is_match(line) {
            summary.blocked += 1;
        } else if allow_re.is_match(line) {
            summary.allowed += 1;
        }
        if let Some(caps) = src_re.captures(line) {
            *sources.entry(caps[1].to_string()).or_default() += 1;
        }
    }

    let mut top: Vec<(String, usize)> = sources.into_iter().collect();
    top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top.truncate(5);
    summary.top_sources = top;
    summary
}
