//! Backend availability check.

use console::style;

use crate::config::Config;
use crate::ocr::{create_backend, BACKEND_NAMES};

/// Report which OCR backends can be used on this machine.
pub async fn cmd_check(config: &Config) -> anyhow::Result<()> {
    let options = config.engine_options();
    println!("{}", style("OCR backends").bold());

    let mut any_available = false;
    for name in BACKEND_NAMES {
        let selected = *name == config.ocr.backend;
        let marker = if selected { " (configured)" } else { "" };

        match create_backend(name, &options) {
            Ok(backend) if backend.is_available() => {
                any_available = true;
                println!("  {} {}{}", style("✓").green(), name, style(marker).dim());
            }
            Ok(backend) => {
                println!("  {} {}{}", style("✗").red(), name, style(marker).dim());
                println!("    {}", style(backend.availability_hint()).dim());
            }
            Err(e) => {
                println!("  {} {}{}", style("-").dim(), name, style(marker).dim());
                println!("    {}", style(e).dim());
            }
        }
    }

    println!();
    println!("  Language: {}", options.language);
    if let Some(ref path) = options.model_path {
        println!("  Models:   {}", path.display());
    }

    if !any_available {
        anyhow::bail!("No OCR backend is available");
    }
    Ok(())
}
