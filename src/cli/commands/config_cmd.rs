//! Configuration management commands.

use console::style;

use crate::config::Config;

/// Print the effective configuration.
pub fn cmd_config_show(config: &Config) -> anyhow::Result<()> {
    match config.source_path {
        Some(ref path) => eprintln!("{} Loaded from {}", style("→").dim(), path.display()),
        None => eprintln!("{} No config file found, using defaults", style("→").dim()),
    }

    print!("{}", config.to_toml()?);
    Ok(())
}
