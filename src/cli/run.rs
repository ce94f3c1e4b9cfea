use anyhow::Result;
use colored::Colorize;

use crate::auth::AuthStore;
use crate::config::Config;
use crate::router::Request;

/// Route a single input and exit; a failed handler exits non-zero
pub async fn run(config: &Config, message: &str) -> Result<()> {
    let auth = AuthStore::load()?;
    let router = super::build_router(config, &auth, false).await?;

    let reply = router.handle(&Request::local(message)).await;
    eprintln!(
        "{}",
        format!("[{} · {} ms]", reply.command, reply.duration.as_millis()).dimmed()
    );

    // stdout carries only the result, for piping
    let text = reply.outcome?;
    println!("{text}");
    Ok(())
}
