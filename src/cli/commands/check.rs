//! Backend availability report.

use std::sync::Arc;

use console::style;

use crate::config::Config;
use crate::extraction::{BackendRouter, ExtractionBackend};

/// Print whether the configured backends can run here.
pub async fn cmd_check(config: Config) -> anyhow::Result<()> {
    let router = Arc::new(BackendRouter::from_config(&config)?);

    let report = {
        let router = router.clone();
        tokio::task::spawn_blocking(move || {
            let text = describe("text", router.text_backend());
            let tables = describe("tables", router.table_backend());
            (text, tables, router.status().available)
        })
        .await?
    };

    println!("{}", style("Extraction backends").bold());
    println!("{}", report.0);
    println!("{}", report.1);
    println!();
    println!(
        "  chunks of {} pages, {} concurrent, {} attempts",
        config.max_pages_per_chunk, config.dispatch_concurrency, config.retry_max_attempts
    );

    if report.2 {
        Ok(())
    } else {
        anyhow::bail!("One or more backends are unavailable")
    }
}

fn describe(role: &str, backend: &dyn ExtractionBackend) -> String {
    if backend.is_available() {
        format!(
            "  {} {:<7} {}",
            style("✓").green(),
            role,
            backend.backend_type()
        )
    } else {
        format!(
            "  {} {:<7} {} ({})",
            style("✗").red(),
            role,
            backend.backend_type(),
            backend.availability_hint()
        )
    }
}
