use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::config::{get_value, set_value};

/// Print one dotted config key, e.g. `commands.scan.ports`
pub fn get(path: &Path, key: &str) -> Result<()> {
    match get_value(path, key)? {
        Some(value) => {
            println!("{value}");
            Ok(())
        }
        None => anyhow::bail!("no config key '{key}'"),
    }
}

pub fn set(path: &Path, key: &str, value: &str) -> Result<()> {
    set_value(path, key, value)?;
    eprintln!("{} {key} = {value} ({})", "✓".green(), path.display().to_string().dimmed());
    Ok(())
}
