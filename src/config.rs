use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use toml_edit::{DocumentMut, Item, Table};

/// Top-level configuration (from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub session: SessionConfig,
    pub voice: VoiceConfig,
    pub commands: CommandsConfig,
    pub security: SecurityConfig,
    pub telegram: Option<TelegramConfig>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub max_tokens: u32,
    pub api_base: String,
    pub timeout_secs: u64,
    /// Answer from the built-in responder when no API key is configured
    pub offline_fallback: bool,
    pub system_prompt_file: Option<PathBuf>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".into(),
            max_tokens: 2048,
            api_base: "https://api.anthropic.com/v1/messages".into(),
            timeout_secs: 300,
            offline_fallback: true,
            system_prompt_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Recent exchanges handed to the chat handler as context
    pub max_exchanges: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { max_exchanges: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub enabled: bool,
    pub voice_id: Option<String>,
    /// Speak replies aloud in the interactive REPL
    pub speak_replies: bool,
    pub record_seconds: u32,
    /// Capture command; `{file}` and `{seconds}` are substituted
    pub recorder: Vec<String>,
    /// Playback command; `{file}` is substituted
    pub player: Vec<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            voice_id: None,
            speak_replies: false,
            record_seconds: 5,
            recorder: vec![
                "arecord".into(),
                "-q".into(),
                "-f".into(),
                "S16_LE".into(),
                "-r".into(),
                "16000".into(),
                "-c".into(),
                "1".into(),
                "-d".into(),
                "{seconds}".into(),
                "{file}".into(),
            ],
            player: vec!["mpg123".into(), "-q".into(), "{file}".into()],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    pub scan: ScanConfig,
    pub network_scan: NetworkScanConfig,
    pub vpn: VpnConfig,
    pub firewall: FirewallConfig,
    pub system_info: SystemInfoConfig,
    pub custom: Vec<CustomCommandConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub enabled: bool,
    pub program: String,
    pub ports: String,
    pub timeout_secs: u64,
    pub extra_args: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: "nmap".into(),
            ports: "1-1000".into(),
            timeout_secs: 120,
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkScanConfig {
    pub enabled: bool,
    pub program: String,
    pub timeout_secs: u64,
}

impl Default for NetworkScanConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: "nmap".into(),
            timeout_secs: 180,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VpnConfig {
    pub enabled: bool,
    pub interface_prefixes: Vec<String>,
    /// Optional status script; exit code 0 means connected
    pub status_command: Option<Vec<String>>,
    pub timeout_secs: u64,
}

impl Default for VpnConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interface_prefixes: vec!["tun".into(), "wg".into(), "ppp".into()],
            status_command: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FirewallConfig {
    pub enabled: bool,
    pub log_path: PathBuf,
    pub lines: usize,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_path: PathBuf::from("/var/log/firewall.log"),
            lines: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemInfoConfig {
    pub enabled: bool,
    pub timeout_secs: u64,
}

impl Default for SystemInfoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 10,
        }
    }
}

/// A user-defined command backed by an external program
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomCommandConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Leading keywords that trigger the command
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Regexes; the first capture group (or `arg`) becomes the argument
    #[serde(default)]
    pub regex: Vec<String>,
    /// argv template; `{args}` is replaced by the argument
    pub command: Vec<String>,
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Scan targets allowed (exact host or IPv4 CIDR). Empty = any not blocked.
    pub allowed_targets: Vec<String>,
    pub blocked_targets: Vec<String>,
    /// Treat "no VPN interface up" as a failure
    pub vpn_required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub allowed_users: Vec<i64>,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u32,
}

fn default_poll_timeout() -> u32 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
    /// Interaction journal (JSON lines); defaults under the data dir
    pub journal_file: Option<PathBuf>,
    pub sessions_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: None,
            journal_file: None,
            sessions_dir: None,
        }
    }
}

impl LoggingConfig {
    pub fn journal_path(&self) -> PathBuf {
        self.journal_file
            .clone()
            .unwrap_or_else(|| Config::data_dir().join("interactions.jsonl"))
    }

    pub fn sessions_path(&self) -> PathBuf {
        self.sessions_dir
            .clone()
            .unwrap_or_else(|| Config::data_dir().join("sessions"))
    }
}

impl Config {
    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "parsing config.toml")
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gengar")
            .join("config.toml")
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gengar")
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Read a dotted key (e.g. `commands.scan.ports`) from a config file.
/// A missing file reads as the default config.
pub fn get_value(path: &Path, key: &str) -> Result<Option<String>> {
    let doc = read_document(path)?;
    let mut item: &Item = doc.as_item();
    for part in key.split('.') {
        match item.get(part) {
            Some(next) => item = next,
            None => return Ok(None),
        }
    }
    Ok(Some(item.to_string().trim().to_string()))
}

/// Set a dotted key in a config file, keeping comments and layout.
/// `raw` is parsed as a TOML literal; anything else is stored as a string.
pub fn set_value(path: &Path, key: &str, raw: &str) -> Result<()> {
    let mut doc = read_document(path)?;
    let parts: Vec<&str> = key.split('.').filter(|p| !p.is_empty()).collect();
    let (last, parents) = parts.split_last().context("empty config key")?;

    let mut table: &mut Table = doc.as_table_mut();
    for part in parents {
        table = table
            .entry(part)
            .or_insert(toml_edit::table())
            .as_table_mut()
            .with_context(|| format!("'{part}' is not a table"))?;
    }

    let value = raw
        .parse::<toml_edit::Value>()
        .unwrap_or_else(|_| toml_edit::Value::from(raw));
    table[*last] = toml_edit::value(value);

    let updated = doc.to_string();
    Config::parse(&updated).with_context(|| format!("setting {key} = {raw}"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, updated)
        .with_context(|| format!("writing config to {}", path.display()))?;
    Ok(())
}

fn read_document(path: &Path) -> Result<DocumentMut> {
    let content = if path.exists() {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?
    } else {
        toml::to_string_pretty(&Config::default())?
    };
    content
        .parse::<DocumentMut>()
        .with_context(|| format!("parsing {}", path.display()))
}
