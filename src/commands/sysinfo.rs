use anyhow::{Context, Result};
use std::time::Duration;

use super::process;

const PROBES: &[(&str, &[&str])] = &[
    ("Kernel", &["uname", "-a"]),
    ("Uptime", &["uptime"]),
    ("Disk", &["df", "-h", "/"]),
];

#[derive(Debug, Clone)]
pub struct SystemInfoHandler {
    pub timeout: Duration,
}

impl SystemInfoHandler {
    pub async fn execute(&self, _arg: &str) -> Result<String> {
        let mut out = String::from("🖥️ System information\n");
        for (label, argv) in PROBES {
            let argv: Vec<String> = argv.iter().map(|a| a.to_string()).collect();
            let stdout = process::run_checked(&argv, self.timeout)
                .await
                .with_context(|| format!("probing {}", label.to_lowercase()))?;
            out.push_str(&format!("\n{label}:\n{}\n", stdout.trim_end()));
        }
        Ok(out.trim_end().to_string())
    }
}
