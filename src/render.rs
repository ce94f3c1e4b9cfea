use colored::Colorize;
use regex::Regex;
use std::sync::OnceLock;

use crate::router::{CHAT_COMMAND, Reply};

/// Format a router reply for the terminal: handler tag, then the body
pub fn render_reply(reply: &Reply) -> String {
    let tag = if reply.command == CHAT_COMMAND {
        "GENGAR".cyan().bold()
    } else {
        format!("GENGAR [{}]", reply.command).as_str().cyan().bold()
    };

    if reply.is_success() {
        format!("{tag}: {}", render_markdown(&reply.text()))
    } else {
        format!("{tag}: {}", reply.text().as_str().red())
    }
}

/// Render markdown text for terminal display
pub fn render_markdown(text: &str) -> String {
    static NUMBERED_RE: OnceLock<Regex> = OnceLock::new();
    let numbered_re = NUMBERED_RE.get_or_init(|| Regex::new(r"^(\s*)(\d+)\. (.*)$").unwrap());

    let mut output = Vec::new();
    let mut in_code_block = false;

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        }

        if in_code_block {
            output.push(format!("  {}", line.dimmed()));
            continue;
        }

        if let Some(rest) = line
            .strip_prefix("### ")
            .or_else(|| line.strip_prefix("## "))
            .or_else(|| line.strip_prefix("# "))
        {
            output.push(format!("{}", rest.bold().underline()));
        } else if let Some(rest) = line.strip_prefix("> ") {
            output.push(format!("{} {}", "│".dimmed(), rest.dimmed()));
        } else if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
            output.push(format!("  • {}", render_inline(rest)));
        } else if let Some(caps) = numbered_re.captures(line) {
            output.push(format!("{}  {}. {}", &caps[1], &caps[2], render_inline(&caps[3])));
        } else {
            output.push(render_inline(line));
        }
    }

    output.join("\n")
}

/// Render inline markdown formatting
fn render_inline(text: &str) -> String {
    static BOLD_RE: OnceLock<Regex> = OnceLock::new();
    static CODE_RE: OnceLock<Regex> = OnceLock::new();

    let bold_re = BOLD_RE.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());
    let code_re = CODE_RE.get_or_init(|| Regex::new(r"`([^`]+)`").unwrap());

    let result = bold_re.replace_all(text, |caps: &regex::Captures| format!("{}", caps[1].bold()));
    code_re
        .replace_all(&result, |caps: &regex::Captures| format!("{}", caps[1].yellow()))
        .to_string()
}
