//! Canned answers for common security topics, used without an LLM backend.

struct Topic {
    keywords: &'static [&'static str],
    answer: &'static str,
}

const TOPICS: &[Topic] = &[
    Topic {
        keywords: &["sql injection", "sqli"],
        answer: "🔍 **SQL injection** happens when user input is spliced into a SQL statement \
without parameterisation, letting an attacker change the query.

Common variants:
- Union-based
- Boolean-based blind
- Time-based blind
- Error-based

Prevention: parameterised queries, input validation, least-privilege database accounts.",
    },
    Topic {
        keywords: &["privilege escalation", "privesc"],
        answer: "🔐 **Privilege escalation** is gaining more rights on a system than you were given.

Typical paths:
- Linux: SUID binaries, writable cron jobs, kernel exploits, sudo misconfigurations
- Windows: token impersonation, weak service permissions, registry autoruns
- Web: file upload bypass leading to command execution

Enumeration helpers: LinPEAS, WinPEAS, PowerSploit.",
    },
    Topic {
        keywords: &["nmap", "port scan", "scanning"],
        answer: "📡 **Nmap** discovers hosts and services on a network.

Useful invocations:
- `nmap -sC -sV <ip>` default scripts and version detection
- `nmap -p- <ip>` all TCP ports
- `nmap --script vuln <ip>` vulnerability scripts
- `nmap -sn <cidr>` host discovery only

Try `scan <target>` or `network scan <range>` here. Only scan systems you are authorised to test.",
    },
    Topic {
        keywords: &["ctf", "capture the flag"],
        answer: "🏁 **Capture the Flag** competitions are security puzzles, usually grouped as:
- Web exploitation
- Reverse engineering
- Cryptography
- Forensics
- Steganography

Practice platforms: TryHackMe, Hack The Box, picoCTF, OverTheWire.",
    },
    Topic {
        keywords: &["metasploit", "msf"],
        answer: "💥 **Metasploit** bundles exploits, payloads and post-exploitation modules.

Basic workflow:
- `msfconsole` start the console
- `search <term>` find a module
- `use <module>` load it
- `set <option> <value>` configure it
- `exploit` run it

Use it only against systems you are authorised to test.",
    },
    Topic {
        keywords: &["what can you do", "capabilities"],
        answer: "🤖 I'm GENGAR, a security assistant. I can:
- explain vulnerabilities and attack techniques
- walk through pentest methodology and CTF categories
- run `scan`, `network scan`, `vpn status`, `firewall logs` and `system info`

Type `help` for the full command list.",
    },
];

/// Pick a canned answer by keyword, or a generic one quoting the question
pub fn respond(prompt: &str) -> String {
    let lower = prompt.to_lowercase();
    TOPICS
        .iter()
        .find(|t| t.keywords.iter().any(|k| lower.contains(k)))
        .map(|t| t.answer.to_string())
        .unwrap_or_else(|| {
            let focus = if is_security_related(prompt) {
                "No language model is configured, so offline I can only cover a few topics: \
                 SQL injection, privilege escalation, nmap, CTFs and Metasploit."
            } else {
                "That looks outside my security focus, and no language model is configured to answer it."
            };
            format!(
                "🤖 You asked: \"{}\"\n\n{focus} Set ANTHROPIC_API_KEY for full answers.",
                prompt.trim()
            )
        })
}

/// Whether a prompt looks security-related
pub fn is_security_related(prompt: &str) -> bool {
    const KEYWORDS: &[&str] = &[
        "hack", "security", "vulnerab", "exploit", "pentest", "penetration", "ctf", "shell",
        "payload", "injection", "xss", "sqli", "csrf", "privesc", "nmap", "metasploit", "burp",
        "wireshark", "firewall", "vpn", "port", "scan", "encrypt", "crypto", "hash", "password",
        "brute",
    ];
    let lower = prompt.to_lowercase();
    KEYWORDS.iter().any(|k| lower.contains(k))
}
