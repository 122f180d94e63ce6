//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod check;
mod config_cmd;
mod recognize;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::load_config;

#[derive(Parser)]
#[command(name = "textlift")]
#[command(about = "Extract text from images with a local OCR engine")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true, env = "TEXTLIFT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize text in an image file
    Recognize {
        /// PNG or JPEG image to read
        file: PathBuf,
        /// OCR backend: tesseract or ocrs (overrides config)
        #[arg(short, long)]
        backend: Option<String>,
        /// Recognition language, e.g. "eng" or "eng+deu" (overrides config)
        #[arg(short, long)]
        language: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Abandon recognition after this many seconds (0 = no limit)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Show which OCR backends are available
    Check,

    /// Start the web front-end
    Serve {
        /// Address to bind: port, host, or host:port (default from config)
        bind: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Recognize {
            file,
            backend,
            language,
            json,
            timeout,
        } => {
            let options = recognize::RecognizeOptions {
                backend,
                language,
                json,
                timeout,
            };
            recognize::cmd_recognize(config, &file, options).await
        }
        Commands::Check => check::cmd_check(&config).await,
        Commands::Serve { bind } => serve::cmd_serve(&config, bind.as_deref()).await,
        Commands::Config { command } => match command {
            ConfigCommands::Show => config_cmd::cmd_config_show(&config),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_recognize() {
        let cli = Cli::try_parse_from([
            "textlift", "-v", "recognize", "scan.png", "-b", "ocrs", "--json",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Recognize {
                file,
                backend,
                json,
                timeout,
                ..
            } => {
                assert_eq!(file, PathBuf::from("scan.png"));
                assert_eq!(backend.as_deref(), Some("ocrs"));
                assert!(json);
                assert_eq!(timeout, None);
            }
            _ => panic!("expected recognize"),
        }
    }
}
