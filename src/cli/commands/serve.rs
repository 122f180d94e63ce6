//! Web server command.

use std::net::IpAddr;

use console::style;

use crate::config::Config;

/// Start the web server.
pub async fn cmd_serve(config: &Config, bind: Option<&str>) -> anyhow::Result<()> {
    let (host, port) = match bind {
        Some(bind) => parse_bind_address(bind, &config.server.host, config.server.port)?,
        None => (config.server.host.clone(), config.server.port),
    };

    println!(
        "{} Starting Textlift at http://{}:{} ({} backend)",
        style("→").cyan(),
        host,
        port,
        config.ocr.backend
    );
    if !config.ocr.eager_init {
        println!(
            "  {} OCR engine starts on the first recognition",
            style("→").dim()
        );
    }
    println!("  Press Ctrl+C to stop");

    crate::server::serve(config, &host, port).await
}

/// Parse a bind address that can be:
/// - Just a port: "3040" -> default host
/// - Just a host: "0.0.0.0" -> default port
/// - Host and port: "0.0.0.0:3040"
/// - IPv6: "::1" or "[::1]:3040"
fn parse_bind_address(
    bind: &str,
    default_host: &str,
    default_port: u16,
) -> anyhow::Result<(String, u16)> {
    if bind.is_empty() {
        anyhow::bail!("Empty bind address");
    }

    // Try parsing as just a port number
    if let Ok(port) = bind.parse::<u16>() {
        return Ok((default_host.to_string(), port));
    }

    // Bare IP address (covers IPv6, which contains colons)
    if bind.parse::<IpAddr>().is_ok() {
        return Ok((bind.to_string(), default_port));
    }

    // Bracketed IPv6, with or without a port
    if let Some(rest) = bind.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| anyhow::anyhow!("Unterminated '[' in bind address: {}", bind))?;
        return match tail.strip_prefix(':') {
            Some(port) => Ok((host.to_string(), port.parse()?)),
            None if tail.is_empty() => Ok((host.to_string(), default_port)),
            None => anyhow::bail!("Invalid bind address: {}", bind),
        };
    }

    // Try parsing as host:port
    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            return Ok((host.to_string(), port));
        }
    }

    // Must be just a host, use default port
    Ok((bind.to_string(), default_port))
}
