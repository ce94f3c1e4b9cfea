use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use gengar::auth::{self, AuthStore};
use gengar::cli;
use gengar::config::Config;
use gengar::logging;

#[derive(Parser)]
#[command(name = "gengar", version, about = "Security-focused personal assistant 🛡️")]
struct Cli {
    /// Config file (default: ~/.config/gengar/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat REPL
    Chat,
    /// Route a single input and print the reply
    Run {
        /// Input text, e.g. "scan 192.168.1.0/24"
        #[arg(short, long)]
        message: String,
    },
    /// Voice-only mode (microphone in, speech out)
    Listen,
    /// Run the Telegram bot, plus voice when enabled
    Serve,
    /// Guided first-run setup
    Init,
    /// Show credential status
    Auth,
    /// Read or change config values
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print a dotted key, e.g. `commands.scan.ports`
    Get { key: String },
    /// Set a dotted key; the value is parsed as TOML, else stored as a string
    Set { key: String, value: String },
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);

    let config = if config_path.exists() {
        match Config::load_from(&config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {e:#}; using defaults");
                Config::default()
            }
        }
    } else {
        Config::default()
    };

    if let Err(e) = logging::init(&config.logging.level, config.logging.file.as_deref()) {
        eprintln!("Warning: logging disabled: {e:#}");
    }

    match cli.command {
        Some(Commands::Chat) | None => cli::chat::run(&config).await,
        Some(Commands::Run { message }) => cli::run::run(&config, &message).await,
        Some(Commands::Listen) => cli::listen::run(&config).await,
        Some(Commands::Serve) => cli::serve::run(&config).await,
        Some(Commands::Init) => cli::init::run(&config_path).await,
        Some(Commands::Config { action }) => match action {
            ConfigAction::Get { key } => cli::config::get(&config_path, &key),
            ConfigAction::Set { key, value } => cli::config::set(&config_path, &key, &value),
            ConfigAction::Path => {
                println!("{}", config_path.display());
                Ok(())
            }
        },
        Some(Commands::Auth) => {
            let auth = AuthStore::load()?;
            match auth.anthropic_api_key() {
                Some(key) => {
                    let source = if key.starts_with("sk-ant-oat") {
                        "OAuth token"
                    } else {
                        "API key"
                    };
                    println!("Anthropic: {} ({source})", auth::mask(&key));
                }
                None => println!("Anthropic: not configured (offline answers)"),
            }
            for (name, configured) in [
                ("Telegram", auth.telegram_bot_token().is_some()),
                ("ElevenLabs", auth.elevenlabs_api_key().is_some()),
            ] {
                let state = if configured { "configured" } else { "not configured" };
                println!("{name}: {state}");
            }
            Ok(())
        }
    }
}
