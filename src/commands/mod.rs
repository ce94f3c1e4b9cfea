//! Command registry: patterns that claim an input, and the handler each
//! command dispatches to.

pub mod custom;
pub mod firewall;
pub mod process;
pub mod scan;
pub mod sysinfo;
pub mod vpn;

use anyhow::Result;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::HashSet;
use std::time::Duration;

use crate::config::Config;
use crate::error::{GengarError, GengarResult};

use custom::CustomHandler;
use firewall::FirewallHandler;
use scan::{ScanHandler, ScanMode, TargetPolicy};
use sysinfo::SystemInfoHandler;
use vpn::VpnHandler;

/// How a command recognises its input
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Whole input, case-insensitive
    Exact(String),
    /// Leading word(s), case-insensitive; the rest is the argument
    Keyword(String),
    /// Named group `arg`, else the first group, is the argument
    Regex(Regex),
}

impl Pattern {
    /// Argument for `input` if this pattern claims it
    pub fn matches(&self, input: &str) -> Option<String> {
        match self {
            Pattern::Exact(text) => input.eq_ignore_ascii_case(text).then(String::new),
            Pattern::Keyword(keyword) => {
                let head = input.get(..keyword.len())?;
                if !head.eq_ignore_ascii_case(keyword) {
                    return None;
                }
                let rest = &input[keyword.len()..];
                if rest.is_empty() {
                    Some(String::new())
                } else if rest.starts_with(char::is_whitespace) {
                    Some(rest.trim().to_string())
                } else {
                    None
                }
            }
            Pattern::Regex(re) => {
                let caps = re.captures(input)?;
                let arg = caps
                    .name("arg")
                    .or_else(|| caps.get(1))
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default();
                Some(arg)
            }
        }
    }
}

/// The closed set of things a command can do
#[derive(Debug, Clone)]
pub enum Handler {
    Help,
    Status,
    Scan(ScanHandler),
    Vpn(VpnHandler),
    Firewall(FirewallHandler),
    SystemInfo(SystemInfoHandler),
    Custom(CustomHandler),
}

/// What built-in handlers may read while executing
pub struct HandlerContext<'a> {
    pub registry: &'a Registry,
    pub status: StatusReport,
}

impl Handler {
    pub async fn execute(&self, arg: &str, ctx: &HandlerContext<'_>) -> Result<String> {
        match self {
            Handler::Help => Ok(ctx.registry.help_text()),
            Handler::Status => Ok(ctx.status.render()),
            Handler::Scan(h) => h.execute(arg).await,
            Handler::Vpn(h) => h.execute(arg).await,
            Handler::Firewall(h) => h.execute(arg).await,
            Handler::SystemInfo(h) => h.execute(arg).await,
            Handler::Custom(h) => h.execute(arg).await,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Command {
    pub name: String,
    pub usage: String,
    pub description: String,
    pub patterns: Vec<Pattern>,
    pub handler: Handler,
}

impl Command {
    pub fn new(name: &str, usage: &str, description: &str, handler: Handler) -> Self {
        Self {
            name: name.to_string(),
            usage: usage.to_string(),
            description: description.to_string(),
            patterns: Vec::new(),
            handler,
        }
    }

    pub fn exact(mut self, text: &str) -> Self {
        self.patterns.push(Pattern::Exact(text.to_string()));
        self
    }

    pub fn keyword(mut self, keyword: &str) -> Self {
        self.patterns.push(Pattern::Keyword(keyword.to_string()));
        self
    }

    pub fn regex(mut self, re: Regex) -> Self {
        self.patterns.push(Pattern::Regex(re));
        self
    }

    pub fn matches(&self, input: &str) -> Option<String> {
        self.patterns.iter().find_map(|p| p.matches(input))
    }
}

/// Ordered command table, built once at startup. First match wins.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    commands: Vec<Command>,
}

impl Registry {
    pub fn new(commands: Vec<Command>) -> GengarResult<Self> {
        let mut seen = HashSet::new();
        for c in &commands {
            if c.name == "chat" {
                return Err(GengarError::Config("'chat' is reserved for the fallback".into()));
            }
            if !seen.insert(c.name.as_str()) {
                return Err(GengarError::Config(format!("duplicate command '{}'", c.name)));
            }
            if c.patterns.is_empty() {
                return Err(GengarError::Config(format!("command '{}' has no patterns", c.name)));
            }
        }
        Ok(Self { commands })
    }

    /// Built-ins (unless disabled) followed by custom commands
    pub fn from_config(config: &Config) -> GengarResult<Self> {
        let cmds = &config.commands;
        let policy = TargetPolicy::from_config(&config.security);

        let mut commands = vec![
            Command::new("help", "help", "Show this help message", Handler::Help)
                .exact("help")
                .exact("?"),
            Command::new("status", "status", "Show session status", Handler::Status)
                .exact("status"),
        ];

        if cmds.network_scan.enabled {
            commands.push(
                Command::new(
                    "network-scan",
                    "network scan <cidr>",
                    "Discover hosts that are up in a range",
                    Handler::Scan(ScanHandler {
                        mode: ScanMode::Discovery,
                        program: cmds.network_scan.program.clone(),
                        ports: String::new(),
                        extra_args: Vec::new(),
                        timeout: Duration::from_secs(cmds.network_scan.timeout_secs),
                        policy: policy.clone(),
                    }),
                )
                .keyword("network scan")
                .keyword("sweep"),
            );
        }

        if cmds.scan.enabled {
            commands.push(
                Command::new(
                    "scan",
                    "scan <target>",
                    "Port scan a host, address or range",
                    Handler::Scan(ScanHandler {
                        mode: ScanMode::Ports,
                        program: cmds.scan.program.clone(),
                        ports: cmds.scan.ports.clone(),
                        extra_args: cmds.scan.extra_args.clone(),
                        timeout: Duration::from_secs(cmds.scan.timeout_secs),
                        policy,
                    }),
                )
                .keyword("scan")
                .keyword("port scan"),
            );
        }

        if cmds.vpn.enabled {
            commands.push(
                Command::new(
                    "vpn",
                    "vpn status",
                    "Check VPN connection",
                    Handler::Vpn(VpnHandler {
                        interface_prefixes: cmds.vpn.interface_prefixes.clone(),
                        status_command: cmds.vpn.status_command.clone(),
                        timeout: Duration::from_secs(cmds.vpn.timeout_secs),
                        required: config.security.vpn_required,
                    }),
                )
                .keyword("vpn status")
                .keyword("check vpn")
                .keyword("vpn"),
            );
        }

        if cmds.firewall.enabled {
            commands.push(
                Command::new(
                    "firewall",
                    "firewall logs [filter]",
                    "Summarise recent firewall log entries",
                    Handler::Firewall(FirewallHandler {
                        log_path: cmds.firewall.log_path.clone(),
                        lines: cmds.firewall.lines,
                    }),
                )
                .keyword("firewall logs")
                .keyword("firewall"),
            );
        }

        if cmds.system_info.enabled {
            commands.push(
                Command::new(
                    "system-info",
                    "system info",
                    "Kernel, uptime and disk usage",
                    Handler::SystemInfo(SystemInfoHandler {
                        timeout: Duration::from_secs(cmds.system_info.timeout_secs),
                    }),
                )
                .keyword("system info")
                .keyword("sysinfo"),
            );
        }

        for custom in &cmds.custom {
            if custom.command.is_empty() {
                return Err(GengarError::Config(format!(
                    "custom command '{}' has an empty command",
                    custom.name
                )));
            }
            let usage = custom
                .patterns
                .first()
                .map(|p| format!("{p} …"))
                .unwrap_or_else(|| custom.name.clone());
            let mut command = Command::new(
                &custom.name,
                &usage,
                &custom.description,
                Handler::Custom(CustomHandler {
                    name: custom.name.clone(),
                    command: custom.command.clone(),
                    timeout: Duration::from_secs(custom.timeout.unwrap_or(30)),
                }),
            );
            for keyword in &custom.patterns {
                // Earlier commands win, so a built-in claiming the keyword hides it
                if let Some(owner) = commands.iter().find(|c| c.matches(keyword).is_some()) {
                    tracing::warn!(
                        "Custom command '{}': keyword '{keyword}' is already claimed by '{}' and will not reach it",
                        custom.name,
                        owner.name
                    );
                }
                command = command.keyword(keyword);
            }
            for re in &custom.regex {
                let compiled = Regex::new(&format!("(?i){re}")).map_err(|e| {
                    GengarError::Config(format!("custom command '{}': bad regex: {e}", custom.name))
                })?;
                command = command.regex(compiled);
            }
            commands.push(command);
        }

        Self::new(commands)
    }

    /// First command claiming `input`, with its argument
    pub fn find(&self, input: &str) -> Option<(&Command, String)> {
        self.commands
            .iter()
            .find_map(|c| c.matches(input).map(|arg| (c, arg)))
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.name == name)
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn help_text(&self) -> String {
        let width = self
            .commands
            .iter()
            .map(|c| c.usage.chars().count())
            .max()
            .unwrap_or(0);

        let mut out = String::from("🤖 GENGAR commands\n\n");
        for c in &self.commands {
            out.push_str(&format!(
                "  {:width$}  {}\n",
                c.usage,
                c.description,
                width = width
            ));
        }
        out.push_str(&format!("  {:width$}  {}\n", "exit", "Leave the session", width = width));
        out.push_str(
            "\nAnything else is answered by the assistant, e.g. \
             \"What is SQL injection?\" or \"Explain privilege escalation\".",
        );
        out
    }
}

/// Snapshot of router state for the `status` command
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub started: DateTime<Utc>,
    pub processed: u64,
    pub failed: u64,
    pub chat_backend: String,
    pub voice_enabled: bool,
    pub commands: usize,
}

impl StatusReport {
    pub fn render(&self) -> String {
        let uptime = (Utc::now() - self.started).num_seconds().max(0);
        format!(
            "📊 GENGAR status\n\n\
             Session start: {}\n\
             Uptime: {}h {:02}m {:02}s\n\
             Chat backend: {}\n\
             Voice: {}\n\
             Interactions: {} ({} failed)\n\
             Commands: {}",
            self.started.format("%Y-%m-%d %H:%M:%S UTC"),
            uptime / 3600,
            (uptime % 3600) / 60,
            uptime % 60,
            self.chat_backend,
            if self.voice_enabled { "enabled" } else { "disabled" },
            self.processed,
            self.failed,
            self.commands,
        )
    }
}
