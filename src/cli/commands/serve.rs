//! Web server command.

use console::style;

use crate::config::Config;

/// Start the web server.
pub async fn cmd_serve(config: Config, bind: Option<&str>) -> anyhow::Result<()> {
    let (host, port) = match bind {
        Some(bind) => parse_bind_address(bind, config.port)?,
        None => (config.host.clone(), config.port),
    };

    println!(
        "{} Starting docsift at http://{}:{}",
        style("→").cyan(),
        host,
        port
    );
    println!(
        "  Backends: text={}, tables={}",
        style(config.text_backend).bold(),
        style(config.table_backend).bold()
    );
    println!("  Press Ctrl+C to stop");

    crate::server::serve(config, &host, port).await
}

/// Parse a bind address that can be:
/// - Just a port: "5001" -> 0.0.0.0:5001
/// - Just a host: "127.0.0.1" -> 127.0.0.1:<default_port>
/// - Host and port: "127.0.0.1:5001" -> 127.0.0.1:5001
fn parse_bind_address(bind: &str, default_port: u16) -> anyhow::Result<(String, u16)> {
    if bind.is_empty() {
        anyhow::bail!("Empty bind address");
    }

    if let Ok(port) = bind.parse::<u16>() {
        return Ok(("0.0.0.0".to_string(), port));
    }

    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            return Ok((host.to_string(), port));
        }
    }

    Ok((bind.to_string(), default_port))
}
