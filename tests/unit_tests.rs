use gengar::chat::offline;
use gengar::client::{AnthropicClient, StreamEvent};
use gengar::commands::custom::CustomHandler;
use gengar::commands::firewall::{self, FirewallHandler};
use gengar::commands::process;
use gengar::commands::scan::{self, ScanHandler, ScanMode, TargetPolicy};
use gengar::commands::vpn::{self, VpnHandler};
use gengar::commands::{Command, Handler, Pattern, Registry};
use gengar::config::{self, Config};
use gengar::context::{Session, SessionKey, SessionStore};
use gengar::journal::{self, InteractionRecord, Journal};
use gengar::telegram::split_message;
use gengar::types::{Channel, Role};
use std::time::Duration;
use tempfile::TempDir;

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

// ───────────────────── Config ─────────────────────

#[test]
fn test_config_defaults() {
    let config = Config::default();
    assert_eq!(config.session.max_exchanges, 10);
    assert_eq!(config.commands.scan.program, "nmap");
    assert_eq!(config.commands.scan.ports, "1-1000");
    assert!(config.llm.offline_fallback);
    assert!(!config.voice.enabled);
    assert!(config.security.blocked_targets.is_empty());
}

#[test]
fn test_config_partial_toml() {
    let config = Config::parse(
        r#"
[session]
max_exchanges = 3

[commands.scan]
ports = "22,80,443"

[security]
allowed_targets = ["192.168.1.0/24"]
vpn_required = true

[[commands.custom]]
name = "backup"
patterns = ["backup"]
command = ["rsync", "-a", "{args}", "/mnt/backup"]
"#,
    )
    .unwrap();

    assert_eq!(config.session.max_exchanges, 3);
    assert_eq!(config.commands.scan.ports, "22,80,443");
    // Untouched fields keep defaults
    assert_eq!(config.commands.scan.program, "nmap");
    assert!(config.security.vpn_required);
    assert_eq!(config.commands.custom.len(), 1);
    assert_eq!(config.commands.custom[0].command[2], "{args}");
}

#[test]
fn test_config_rejects_bad_toml() {
    assert!(Config::parse("[session]\nmax_exchanges = \"many\"").is_err());
}

#[test]
fn test_config_get_and_set() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    // Missing file reads as defaults
    assert_eq!(
        config::get_value(&path, "commands.scan.ports").unwrap().as_deref(),
        Some("\"1-1000\"")
    );
    assert!(config::get_value(&path, "commands.nope").unwrap().is_none());

    config::set_value(&path, "session.max_exchanges", "4").unwrap();
    config::set_value(&path, "commands.scan.ports", "22-443").unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded.session.max_exchanges, 4);
    assert_eq!(loaded.commands.scan.ports, "22-443");
}

#[test]
fn test_config_set_rejects_wrong_type() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    assert!(config::set_value(&path, "session.max_exchanges", "lots").is_err());
    // Nothing written on failure
    assert!(!path.exists());
}

// ───────────────────── Session Window ─────────────────────

#[test]
fn test_session_evicts_oldest() {
    let mut session = Session::new(3);
    for i in 0..5 {
        session.push(&format!("q{i}"), &format!("a{i}"));
    }
    assert_eq!(session.len(), 3);
    let users: Vec<&str> = session.exchanges().map(|e| e.user.as_str()).collect();
    assert_eq!(users, ["q2", "q3", "q4"]);
}

#[test]
fn test_session_messages_alternate() {
    let mut session = Session::new(10);
    session.push("what is xss", "cross-site scripting");
    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "cross-site scripting");
}

#[test]
fn test_session_clips_long_replies() {
    let mut session = Session::new(2);
    session.push("dump", &"x".repeat(5000));
    let reply = &session.exchanges().next().unwrap().reply;
    assert!(reply.chars().count() <= 2001);
}

#[test]
fn test_session_store_keys_are_independent() {
    let store = SessionStore::new(10);
    let cli = SessionKey {
        channel: Channel::Cli,
        conversation: "local".into(),
    };
    let tg = SessionKey {
        channel: Channel::Telegram,
        conversation: "42".into(),
    };
    store.record(&cli, "hi", "hello");
    store.record(&cli, "again", "hello again");
    store.record(&tg, "yo", "hey");

    assert_eq!(store.len(&cli), 2);
    assert_eq!(store.len(&tg), 1);
    assert_eq!(store.history(&cli).len(), 4);

    store.clear(&cli);
    assert_eq!(store.len(&cli), 0);
    assert_eq!(store.len(&tg), 1);
}

// ───────────────────── Journal ─────────────────────

fn record(input: &str, success: bool) -> InteractionRecord {
    InteractionRecord {
        id: uuid::Uuid::new_v4(),
        timestamp: chrono::Utc::now(),
        channel: Channel::Cli,
        conversation: "local".into(),
        input: input.into(),
        command: "chat".into(),
        output: "ok".into(),
        success,
        duration_ms: 3,
    }
}

#[tokio::test]
async fn test_journal_appends_json_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested/interactions.jsonl");
    let journal = Journal::open(&path).await.unwrap();

    journal.append(&record("first", true)).await.unwrap();
    journal.append(&record("second", false)).await.unwrap();
    assert_eq!(journal.written().await, 2);

    let records = journal::read_records(&path).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].input, "first");
    assert!(!records[1].success);
    assert_eq!(records[1].channel, Channel::Cli);
}

#[tokio::test]
async fn test_journal_reopen_appends() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("interactions.jsonl");
    {
        let journal = Journal::open(&path).await.unwrap();
        journal.append(&record("one", true)).await.unwrap();
    }
    let journal = Journal::open(&path).await.unwrap();
    journal.append(&record("two", true)).await.unwrap();
    assert_eq!(journal::read_records(&path).unwrap().len(), 2);
}

#[tokio::test]
async fn test_session_summary_saved() {
    let dir = TempDir::new().unwrap();
    let started = chrono::Utc::now();
    let journal = Journal::in_memory();
    journal.append(&record("scan 10.0.0.1", true)).await.unwrap();

    let summary = journal.summary(started).await;
    assert_eq!(summary.total_interactions, 1);
    assert_eq!(summary.inputs, ["scan 10.0.0.1"]);

    let path = summary.save(dir.path()).unwrap();
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("session_summary_") && name.ends_with(".json"));
    let parsed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(parsed["total_interactions"], 1);
}

#[tokio::test]
async fn test_summary_keeps_recent_inputs_only() {
    let journal = Journal::in_memory();
    let total = journal::SUMMARY_INPUTS + 100;
    for i in 0..total {
        journal.append(&record(&format!("question {i}"), true)).await.unwrap();
    }

    let summary = journal.summary(chrono::Utc::now()).await;
    assert_eq!(summary.total_interactions, total as u64);
    assert_eq!(summary.inputs.len(), journal::SUMMARY_INPUTS);
    assert_eq!(summary.inputs[0], "question 100");
    assert_eq!(summary.inputs.last().unwrap(), &format!("question {}", total - 1));
}

// ───────────────────── Patterns & Registry ─────────────────────

#[test]
fn test_keyword_pattern_needs_word_boundary() {
    let p = Pattern::Keyword("scan".into());
    assert_eq!(p.matches("scan 10.0.0.1").as_deref(), Some("10.0.0.1"));
    assert_eq!(p.matches("SCAN").as_deref(), Some(""));
    assert_eq!(p.matches("scanner please"), None);
}

#[test]
fn test_exact_and_regex_patterns() {
    assert_eq!(Pattern::Exact("help".into()).matches("HELP").as_deref(), Some(""));
    assert_eq!(Pattern::Exact("help".into()).matches("help me"), None);

    let re = regex::Regex::new(r"(?i)^ping (?P<arg>\S+)$").unwrap();
    assert_eq!(Pattern::Regex(re).matches("Ping 8.8.8.8").as_deref(), Some("8.8.8.8"));
}

#[test]
fn test_registry_rejects_reserved_and_duplicates() {
    let chat = Command::new("chat", "chat", "", Handler::Help).exact("chat");
    assert!(Registry::new(vec![chat]).is_err());

    let a = Command::new("help", "help", "", Handler::Help).exact("help");
    let b = Command::new("help", "help", "", Handler::Help).exact("?");
    assert!(Registry::new(vec![a, b]).is_err());

    let bare = Command::new("status", "status", "", Handler::Status);
    assert!(Registry::new(vec![bare]).is_err());
}

#[test]
fn test_registry_order_and_disabled_builtins() {
    let mut config = Config::default();
    config.commands.firewall.enabled = false;
    let registry = Registry::from_config(&config).unwrap();

    let names: Vec<&str> = registry.commands().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["help", "status", "network-scan", "scan", "vpn", "system-info"]);

    let (cmd, arg) = registry.find("network scan 10.0.0.0/24").unwrap();
    assert_eq!(cmd.name, "network-scan");
    assert_eq!(arg, "10.0.0.0/24");
    assert!(registry.find("firewall logs").is_none());
}

#[test]
fn test_registry_bad_custom_regex() {
    let mut config = Config::default();
    config.commands.custom.push(config::CustomCommandConfig {
        name: "broken".into(),
        description: String::new(),
        patterns: Vec::new(),
        regex: vec!["(unclosed".into()],
        command: argv(&["true"]),
        timeout: None,
    });
    let err = Registry::from_config(&config).unwrap_err();
    assert!(err.to_string().contains("bad regex"));
}

#[test]
fn test_help_lists_commands() {
    let registry = Registry::from_config(&Config::default()).unwrap();
    let help = registry.help_text();
    assert!(help.starts_with("🤖 GENGAR commands"));
    assert!(help.contains("scan <target>"));
    assert!(help.contains("exit"));
}

// ───────────────────── Scan ─────────────────────

const NMAP_PORTS: &str = "\
Starting Nmap 7.94 ( https://nmap.org )
Nmap scan report for 192.168.1.10
Host is up (0.0011s latency).
Not shown: 997 closed tcp ports (conn-refused)
PORT    STATE    SERVICE
22/tcp  open     ssh
80/tcp  open     http
139/tcp filtered netbios-ssn

Nmap done: 1 IP address (1 host up) scanned in 0.12 seconds
";

const NMAP_SWEEP: &str = "\
Starting Nmap 7.94 ( https://nmap.org )
Nmap scan report for router.lan (192.168.1.1)
Host is up (0.0020s latency).
Nmap scan report for 192.168.1.10
Host is up (0.0011s latency).
Nmap done: 256 IP addresses (2 hosts up) scanned in 2.31 seconds
";

fn scan_handler(mode: ScanMode, policy: TargetPolicy) -> ScanHandler {
    ScanHandler {
        mode,
        program: "nmap".into(),
        ports: "1-1000".into(),
        extra_args: vec!["-T4".into()],
        timeout: Duration::from_secs(5),
        policy,
    }
}

#[test]
fn test_parse_open_ports() {
    let entries = scan::parse_open_ports(NMAP_PORTS);
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].port, 22);
    assert_eq!(entries[0].service, "ssh");
    assert_eq!(entries[2].state, "filtered");
}

#[test]
fn test_parse_hosts_up() {
    let hosts = scan::parse_hosts_up(NMAP_SWEEP);
    assert_eq!(hosts, ["router.lan (192.168.1.1)", "192.168.1.10"]);
}

#[test]
fn test_scan_argv() {
    let ports = scan_handler(ScanMode::Ports, TargetPolicy::default());
    assert_eq!(
        ports.argv("10.0.0.1"),
        argv(&["nmap", "-Pn", "-p", "1-1000", "-T4", "10.0.0.1"])
    );
    let sweep = scan_handler(ScanMode::Discovery, TargetPolicy::default());
    assert_eq!(sweep.argv("10.0.0.0/24")[..2], argv(&["nmap", "-sn"])[..]);
}

#[test]
fn test_validate_target() {
    assert!(scan::validate_target("192.168.1.0/24").is_ok());
    assert!(scan::validate_target("scanme.nmap.org").is_ok());
    assert!(scan::validate_target("-oN").is_err());
    assert!(scan::validate_target("10.0.0.1;rm").is_err());
}

#[test]
fn test_target_policy() {
    let policy = TargetPolicy {
        allowed: vec!["192.168.0.0/16".into(), "lab.local".into()],
        blocked: vec!["192.168.100.0/24".into()],
    };
    assert!(policy.check("192.168.1.5").is_ok());
    assert!(policy.check("192.168.1.0/24").is_ok());
    assert!(policy.check("LAB.local").is_ok());
    assert!(policy.check("10.0.0.1").is_err());
    assert!(policy.check("192.168.100.7").is_err());
    // A wide range overlapping a blocked one is refused
    let open = TargetPolicy {
        allowed: Vec::new(),
        blocked: vec!["10.0.0.5".into()],
    };
    assert!(open.check("10.0.0.0/24").is_err());
    assert!(open.check("10.0.1.0/24").is_ok());
}

#[tokio::test]
async fn test_scan_refuses_before_running() {
    let policy = TargetPolicy {
        allowed: Vec::new(),
        blocked: vec!["10.0.0.0/8".into()],
    };
    let mut handler = scan_handler(ScanMode::Ports, policy);
    handler.program = "definitely-not-nmap".into();

    let err = handler.execute("10.1.2.3").await.unwrap_err();
    assert!(err.to_string().contains("blocked"), "got {err}");

    let err = handler.execute("  ").await.unwrap_err();
    assert!(err.to_string().contains("usage"));
}

// ───────────────────── VPN ─────────────────────

#[test]
fn test_parse_ip_brief() {
    let output = "\
lo               UNKNOWN        127.0.0.1/8 ::1/128
eth0             UP             192.168.1.5/24
wg0              UNKNOWN        10.8.0.2/24
tun0@NONE        DOWN
";
    let prefixes = argv(&["tun", "wg"]);
    let ifaces = vpn::parse_ip_brief(output, &prefixes);
    assert_eq!(ifaces.len(), 2);
    assert_eq!(ifaces[0].name, "wg0");
    assert!(ifaces[0].is_up());
    assert_eq!(ifaces[0].addresses, ["10.8.0.2/24"]);
    assert_eq!(ifaces[1].name, "tun0");
    assert!(!ifaces[1].is_up());
}

#[tokio::test]
async fn test_vpn_status_script() {
    let mut handler = VpnHandler {
        interface_prefixes: Vec::new(),
        status_command: Some(argv(&["true"])),
        timeout: Duration::from_secs(5),
        required: false,
    };
    assert!(handler.execute("").await.unwrap().contains("VPN connected"));

    handler.status_command = Some(argv(&["false"]));
    assert!(handler.execute("").await.unwrap().contains("not connected"));

    handler.required = true;
    assert!(handler.execute("").await.is_err());
}

// ───────────────────── Firewall ─────────────────────

const FIREWALL_LOG: &str = "\
Jan 10 10:00:01 host kernel: [UFW BLOCK] IN=eth0 SRC=203.0.113.9 DST=192.168.1.5 PROTO=TCP DPT=22
Jan 10 10:00:02 host kernel: [UFW ALLOW] IN=eth0 SRC=192.168.1.20 DST=192.168.1.5 PROTO=TCP DPT=443

Jan 10 10:00:03 host kernel: [UFW BLOCK] IN=eth0 SRC=203.0.113.9 DST=192.168.1.5 PROTO=TCP DPT=23
Jan 10 10:00:04 host kernel: [UFW BLOCK] IN=eth0 SRC=198.51.100.4 DST=192.168.1.5 PROTO=UDP DPT=53
";

#[test]
fn test_firewall_tail_and_filter() {
    let last = firewall::tail(FIREWALL_LOG, "", 2);
    assert_eq!(last.len(), 2);
    assert!(last[1].contains("198.51.100.4"));

    let ssh = firewall::tail(FIREWALL_LOG, "dpt=22", 10);
    assert_eq!(ssh.len(), 1);
}

#[test]
fn test_firewall_summary() {
    let lines = firewall::tail(FIREWALL_LOG, "", 100);
    let summary = firewall::summarize(&lines);
    assert_eq!(summary.total, 4);
    assert_eq!(summary.blocked, 3);
    assert_eq!(summary.allowed, 1);
    assert_eq!(summary.top_sources[0], ("203.0.113.9".to_string(), 2));
}

#[tokio::test]
async fn test_firewall_handler_reads_file() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("firewall.log");
    std::fs::write(&log_path, FIREWALL_LOG).unwrap();

    let handler = FirewallHandler {
        log_path: log_path.clone(),
        lines: 20,
    };
    let out = handler.execute("").await.unwrap();
    assert!(out.contains("3 blocked"), "got {out}");

    let missing = FirewallHandler {
        log_path: dir.path().join("nope.log"),
        lines: 20,
    };
    assert!(missing.execute("").await.is_err());
}

// ───────────────────── Process & Custom Commands ─────────────────────

#[tokio::test]
async fn test_process_captures_output() {
    let out = process::run(&argv(&["echo", "hello"]), Duration::from_secs(5))
        .await
        .unwrap();
    assert!(out.success());
    assert_eq!(out.stdout.trim(), "hello");
}

#[tokio::test]
async fn test_process_nonzero_and_missing() {
    let err = process::run_checked(&argv(&["false"]), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("exited with code 1"));

    let err = process::run(&argv(&["gengar-no-such-binary"]), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn test_process_timeout() {
    let started = std::time::Instant::now();
    let err = process::run(&argv(&["sleep", "5"]), Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("timed out"));
    assert!(started.elapsed() < Duration::from_secs(4));
}

fn custom(command: &[&str]) -> CustomHandler {
    CustomHandler {
        name: "custom".into(),
        command: argv(command),
        timeout: Duration::from_secs(5),
    }
}

#[test]
fn test_custom_argv_substitution() {
    assert_eq!(
        custom(&["dig", "{args}", "+short"]).argv("example.com"),
        argv(&["dig", "example.com", "+short"])
    );
    // Empty argument drops a bare placeholder
    assert_eq!(custom(&["dig", "{args}", "+short"]).argv(""), argv(&["dig", "+short"]));
    // No placeholder: words are appended
    assert_eq!(
        custom(&["whois"]).argv(" example.com  -H "),
        argv(&["whois", "example.com", "-H"])
    );
}

#[tokio::test]
async fn test_custom_command_json_protocol() {
    let ok = custom(&["echo", r#"{"content": "all good", "is_error": false}"#]);
    assert_eq!(ok.execute("").await.unwrap(), "all good");

    let failed = custom(&["echo", r#"{"content": "disk full", "is_error": true}"#]);
    assert_eq!(failed.execute("").await.unwrap_err().to_string(), "disk full");

    assert_eq!(custom(&["true"]).execute("").await.unwrap(), "(no output)");
}

// ───────────────────── Offline Responder ─────────────────────

#[test]
fn test_offline_topics() {
    assert!(offline::respond("What is SQL injection?").to_lowercase().contains("sql"));
    assert!(offline::respond("explain privilege escalation").to_lowercase().contains("privilege"));
}

#[test]
fn test_offline_fallback_quotes_prompt() {
    let reply = offline::respond("what's the weather like");
    assert!(reply.starts_with("🤖 You asked: \"what's the weather like\""));
    assert!(offline::is_security_related("is my firewall ok"));
    assert!(!offline::is_security_related("what's the weather like"));
}

// ───────────────────── SSE Parsing ─────────────────────

#[test]
fn test_sse_events() {
    let mut buffer = String::from(
        "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":12,\"output_tokens\":1}}}\n\n\
         event: content_block_start\ndata: {\"type\":\"content_block_start\",\"index\":0}\n\n\
         event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n\
         event: message_delta\ndata: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":5}}\n\n\
         event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n\
         event: content_block_delta\ndata: {\"partial",
    );

    assert!(matches!(
        AnthropicClient::parse_next_sse_event(&mut buffer),
        Some(StreamEvent::MessageStart { usage: Some(_) })
    ));
    // content_block_start is skipped
    match AnthropicClient::parse_next_sse_event(&mut buffer) {
        Some(StreamEvent::TextDelta(text)) => assert_eq!(text, "Hi"),
        other => panic!("expected text delta, got {other:?}"),
    }
    match AnthropicClient::parse_next_sse_event(&mut buffer) {
        Some(StreamEvent::MessageDelta { stop_reason, .. }) => {
            assert_eq!(stop_reason.as_deref(), Some("end_turn"))
        }
        other => panic!("expected message delta, got {other:?}"),
    }
    assert!(matches!(
        AnthropicClient::parse_next_sse_event(&mut buffer),
        Some(StreamEvent::MessageStop)
    ));
    // Incomplete event stays buffered
    assert!(AnthropicClient::parse_next_sse_event(&mut buffer).is_none());
    assert!(buffer.starts_with("event: content_block_delta"));
}

#[test]
fn test_decode_chunk_holds_split_characters() {
    let bytes = "🔍 ok".as_bytes();
    let mut buffer = String::new();
    let mut pending = Vec::new();

    AnthropicClient::decode_chunk(&mut buffer, &mut pending, &bytes[..2]);
    assert_eq!(buffer, "");
    assert_eq!(pending.len(), 2);

    AnthropicClient::decode_chunk(&mut buffer, &mut pending, &bytes[2..]);
    assert_eq!(buffer, "🔍 ok");
    assert!(pending.is_empty());

    // Invalid bytes are replaced, not held
    AnthropicClient::decode_chunk(&mut buffer, &mut pending, b"\xff!");
    assert_eq!(buffer, "🔍 ok\u{FFFD}!");
    assert!(pending.is_empty());
}

/// One-shot HTTP server answering with a chunked event stream, flushing each
/// piece separately
async fn serve_event_stream(pieces: Vec<Vec<u8>>) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    break;
                }
            }
            if n == 0 {
                break;
            }
        }

        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\n\
                  transfer-encoding: chunked\r\nconnection: close\r\n\r\n",
            )
            .await
            .unwrap();
        for piece in pieces {
            socket
                .write_all(format!("{:x}\r\n", piece.len()).as_bytes())
                .await
                .unwrap();
            socket.write_all(&piece).await.unwrap();
            socket.write_all(b"\r\n").await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        socket.write_all(b"0\r\n\r\n").await.unwrap();
        socket.flush().await.unwrap();
    });
    format!("http://{addr}/v1/messages")
}

#[tokio::test]
async fn test_stream_keeps_characters_split_across_chunks() {
    let body = "event: content_block_delta\n\
                data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"🔍 ok\"}}\n\n\
                event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n";
    let bytes = body.as_bytes();
    let split = body.find('🔍').unwrap() + 2;
    let url = serve_event_stream(vec![bytes[..split].to_vec(), bytes[split..].to_vec()]).await;

    let client = AnthropicClient::new("test-key".into(), url, Duration::from_secs(10)).unwrap();
    let mut streamed = String::new();
    let completion = client
        .complete("test-model", "system", &[], 64, &mut |t: &str| streamed.push_str(t))
        .await
        .unwrap();
    assert_eq!(completion.text, "🔍 ok");
    assert_eq!(streamed, "🔍 ok");
}

// ───────────────────── Telegram ─────────────────────

#[test]
fn test_split_message() {
    assert_eq!(split_message("short", 4000), ["short"]);

    let text = "line one\nline two\nline three\n";
    let chunks = split_message(text, 12);
    assert!(chunks.iter().all(|c| c.chars().count() <= 12));
    assert_eq!(chunks.concat(), text);

    let long = "y".repeat(25);
    let chunks = split_message(&long, 10);
    assert_eq!(chunks.len(), 3);
}

#[test]
fn test_bot_command_mapping() {
    use gengar::cli::serve::bot_command;
    assert_eq!(bot_command("/start"), "help");
    assert_eq!(bot_command("/scan@gengar_bot 10.0.0.1"), "scan 10.0.0.1");
    assert_eq!(bot_command("what is xss"), "what is xss");
}

// ───────────────────── System Info & Voice ─────────────────────

#[tokio::test]
async fn test_system_info_report() {
    let handler = gengar::commands::sysinfo::SystemInfoHandler {
        timeout: Duration::from_secs(10),
    };
    let out = handler.execute("").await.unwrap();
    assert!(out.contains("Kernel:"));
    assert!(out.contains("Disk:"));
}

#[test]
fn test_voice_template_fill() {
    let template = argv(&["arecord", "-d", "{seconds}", "{file}"]);
    let filled = gengar::voice::fill_template(&template, std::path::Path::new("/tmp/a.wav"), 7);
    assert_eq!(filled, argv(&["arecord", "-d", "7", "/tmp/a.wav"]));
}

#[tokio::test]
async fn test_voice_record_creates_scratch_dir() {
    let dir = TempDir::new().unwrap();
    let scratch = dir.path().join("gengar/tmp");
    let voice = gengar::config::VoiceConfig {
        record_seconds: 1,
        recorder: argv(&["sh", "-c", "printf x > {file}"]),
        ..Default::default()
    };
    let engine = gengar::voice::VoiceEngine::new("test-key".into(), &voice).unwrap();

    let path = engine.record(&scratch).await.unwrap();
    assert!(path.starts_with(&scratch));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "x");
}

#[test]
fn test_speakable_strips_markdown() {
    let text = "## Result\n- **22/tcp** open\n```\nraw output\n```\nDone";
    let spoken = gengar::voice::speakable(text);
    assert!(!spoken.contains('*'));
    assert!(!spoken.contains("raw output"));
    assert!(spoken.starts_with("Result"));
    assert!(spoken.ends_with("Done"));
}

#[test]
fn test_render_reply_tags_command() {
    colored::control::set_override(false);
    let reply = gengar::router::Reply {
        command: "scan".into(),
        outcome: Ok("📡 No open ports found on 10.0.0.1.".into()),
        duration: Duration::from_millis(5),
    };
    assert!(gengar::render::render_reply(&reply).starts_with("GENGAR [scan]: 📡"));
}
