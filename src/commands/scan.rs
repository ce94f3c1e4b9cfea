use anyhow::Result;
use regex::Regex;
use std::net::Ipv4Addr;
use std::sync::OnceLock;
use std::time::Duration;

use super::process;
use crate::config::SecurityConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// TCP port scan of one target
    Ports,
    /// Ping sweep of a range
    Discovery,
}

/// nmap wrapper for `scan` and `network scan`
#[derive(Debug, Clone)]
pub struct ScanHandler {
    pub mode: ScanMode,
    pub program: String,
    pub ports: String,
    pub extra_args: Vec<String>,
    pub timeout: Duration,
    pub policy: TargetPolicy,
}

/// A line of nmap's port table
#[derive(Debug, Clone, PartialEq)]
pub struct PortEntry {
    pub port: u16,
    pub protocol: String,
    pub state: String,
    pub service: String,
}

impl ScanHandler {
    pub fn argv(&self, target: &str) -> Vec<String> {
        let mut argv = vec![self.program.clone()];
        match self.mode {
            ScanMode::Ports => {
                argv.push("-Pn".into());
                argv.push("-p".into());
                argv.push(self.ports.clone());
            }
            ScanMode::Discovery => argv.push("-sn".into()),
        }
        argv.extend(self.extra_args.iter().cloned());
        argv.push(target.to_string());
        argv
    }

    pub async fn execute(&self, target: &str) -> Result<String> {
        let target = target.trim();
        if target.is_empty() {
            match self.mode {
                ScanMode::Ports => anyhow::bail!("usage: scan <host|ip|cidr>"),
                ScanMode::Discovery => anyhow::bail!("usage: network scan <cidr>"),
            }
        }
        validate_target(target)?;
        self.policy.check(target)?;

        tracing::info!(target = %target, mode = ?self.mode, "starting nmap");
        let stdout = process::run_checked(&self.argv(target), self.timeout).await?;

        Ok(match self.mode {
            ScanMode::Ports => format_ports(target, &stdout),
            ScanMode::Discovery => format_hosts(target, &parse_hosts_up(&stdout)),
        })
    }
}

/// Accept a single host name, address or CIDR range. Leading dashes would
/// be read by nmap as options.
pub fn validate_target(target: &str) -> Result<()> {
    static TARGET_RE: OnceLock<Regex> = OnceLock::new();
    let re = TARGET_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9.:/\-]*$").unwrap());
    if !re.is_match(target) {
        anyhow::bail!("invalid scan target '{target}'");
    }
    Ok(())
}

pub fn parse_open_ports(output: &str) -> Vec<PortEntry> {
    static PORT_RE: OnceLock<Regex> = OnceLock::new();
    let re = PORT_RE
        .get_or_init(|| Regex::new(r"^(\d+)/(tcp|udp|sctp)\s+(\S+)(?:\s+(\S+))?").unwrap());

    output
        .lines()
        .filter_map(|line| {
            let caps = re.captures(line.trim())?;
            Some(PortEntry {
                port: caps[1].parse().ok()?,
                protocol: caps[2].to_string(),
                state: caps[3].to_string(),
                service: caps.get(4).map(|m| m.as_str().to_string()).unwrap_or_default(),
            })
        })
        .collect()
}

pub fn parse_hosts_up(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("Nmap scan report for "))
        .map(|h| h.trim().to_string())
        .collect()
}

fn format_ports(target: &str, stdout: &str) -> String {
    let entries = parse_open_ports(stdout);
    if entries.is_empty() {
        if stdout.contains("Host seems down") || stdout.contains("0 hosts up") {
            return format!("📡 {target} appears to be down.");
        }
        return format!("📡 No open ports found on {target}.");
    }

    let (open, other): (Vec<_>, Vec<_>) =
        entries.iter().partition(|e| e.state.starts_with("open"));
    let mut out = format!("📡 Scan of {target}: {} open port(s)\n", open.len());
    for e in &open {
        out.push_str(&format!("  • {}/{} {} ({})\n", e.port, e.protocol, e.service, e.state));
    }
    if !other.is_empty() {
        out.push_str(&format!("  {} filtered/closed port(s) listed\n", other.len()));
    }
    out.trim_end().to_string()
}

fn format_hosts(range: &str, hosts: &[String]) -> String {
    if hosts.is_empty() {
        return format!("📡 No hosts up in {range}.");
    }
    let mut out = format!("📡 {} host(s) up in {range}\n", hosts.len());
    for h in hosts {
        out.push_str(&format!("  • {h}\n"));
    }
    out.trim_end().to_string()
}

/// Allow/block lists for scan targets. Entries are host names, addresses or
/// IPv4 CIDR ranges.
#[derive(Debug, Clone, Default)]
pub struct TargetPolicy {
    pub allowed: Vec<String>,
    pub blocked: Vec<String>,
}

impl TargetPolicy {
    pub fn from_config(security: &SecurityConfig) -> Self {
        Self {
            allowed: security.allowed_targets.clone(),
            blocked: security.blocked_targets.clone(),
        }
    }

    pub fn check(&self, target: &str) -> Result<()> {
        if let Some(entry) = self.blocked.iter().find(|b| overlaps(b, target)) {
            anyhow::bail!("target '{target}' is blocked by security policy ({entry})");
        }
        if !self.allowed.is_empty() && !self.allowed.iter().any(|a| contains(a, target)) {
            anyhow::bail!("target '{target}' is not in security.allowed_targets");
        }
        Ok(())
    }
}

/// Parse `a.b.c.d` or `a.b.c.d/n` into (network, prefix)
fn parse_cidr_v4(s: &str) -> Option<(u32, u8)> {
    let (addr, prefix) = match s.split_once('/') {
        Some((a, p)) => (a, p.parse::<u8>().ok()?),
        None => (s, 32),
    };
    if prefix > 32 {
        return None;
    }
    let addr: Ipv4Addr = addr.parse().ok()?;
    Some((u32::from(addr), prefix))
}

fn mask(prefix: u8) -> u32 {
    if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) }
}

/// `entry` covers all of `target`
fn contains(entry: &str, target: &str) -> bool {
    match (parse_cidr_v4(entry), parse_cidr_v4(target)) {
        (Some((e, ep)), Some((t, tp))) => tp >= ep && (t & mask(ep)) == (e & mask(ep)),
        _ => entry.eq_ignore_ascii_case(target),
    }
}

/// `entry` and `target` share at least one address
fn overlaps(entry: &str, target: &str) -> bool {
    match (parse_cidr_v4(entry), parse_cidr_v4(target)) {
        (Some((e, ep)), Some((t, tp))) => {
            let p = ep.min(tp);
            (t & mask(p)) == (e & mask(p))
        }
        _ => entry.eq_ignore_ascii_case(target),
    }
}
