use anyhow::Result;
use std::time::Duration;

use super::process;

/// Reports whether a VPN tunnel is up
#[derive(Debug, Clone)]
pub struct VpnHandler {
    pub interface_prefixes: Vec<String>,
    pub status_command: Option<Vec<String>>,
    pub timeout: Duration,
    /// A missing tunnel is a failure rather than a report
    pub required: bool,
}

/// One row of `ip -brief address`
#[derive(Debug, Clone, PartialEq)]
pub struct VpnInterface {
    pub name: String,
    pub state: String,
    pub addresses: Vec<String>,
}

impl VpnInterface {
    /// Tunnel devices usually report UNKNOWN rather than UP
    pub fn is_up(&self) -> bool {
        self.state != "DOWN"
    }
}

impl VpnHandler {
    pub async fn execute(&self, _arg: &str) -> Result<String> {
        if let Some(cmd) = &self.status_command {
            let output = process::run(cmd, self.timeout).await?;
            let detail = output.stdout.trim();
            return if output.success() {
                Ok(format!("🔒 VPN connected\n{detail}").trim_end().to_string())
            } else if self.required {
                anyhow::bail!("VPN is down (status script exited {})", output.code.unwrap_or(-1))
            } else {
                Ok(format!("🔓 VPN not connected\n{detail}").trim_end().to_string())
            };
        }

        let argv = vec!["ip".to_string(), "-brief".into(), "address".into()];
        let stdout = process::run_checked(&argv, self.timeout).await?;
        let interfaces = parse_ip_brief(&stdout, &self.interface_prefixes);
        let up: Vec<&VpnInterface> = interfaces.iter().filter(|i| i.is_up()).collect();

        if up.is_empty() {
            let looked_for = self
                .interface_prefixes
                .iter()
                .map(|p| format!("{p}*"))
                .collect::<Vec<_>>()
                .join(", ");
            if self.required {
                anyhow::bail!("no VPN interface up (looked for {looked_for})");
            }
            return Ok(format!("🔓 No VPN interface up (looked for {looked_for})"));
        }

        let mut out = String::from("🔒 VPN connected\n");
        for iface in up {
            let addrs = if iface.addresses.is_empty() {
                "no address".to_string()
            } else {
                iface.addresses.join(", ")
            };
            out.push_str(&format!("  • {} [{}] {}\n", iface.name, iface.state, addrs));
        }
        Ok(out.trim_end().to_string())
    }
}

/// Pick interfaces whose names start with one of `prefixes`
pub fn parse_ip_brief(output: &str, prefixes: &[String]) -> Vec<VpnInterface> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let raw_name = fields.next()?;
            let name = raw_name.split('@').next().unwrap_or(raw_name);
            if !prefixes.iter().any(|p| name.starts_with(p.as_str())) {
                return None;
            }
            let state = fields.next().unwrap_or("UNKNOWN").to_string();
            Some(VpnInterface {
                name: name.to_string(),
                state,
                addresses: fields.map(|f| f.to_string()).collect(),
            })
        })
        .collect()
}
