//! One-shot extraction of a local PDF.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use console::style;

use crate::config::Config;
use crate::extraction::{BackendRouter, Orchestrator};
use crate::models::{Document, ExtractionRequestMode};
use crate::server::{ApiError, ExtractResponse};

/// Run the pipeline on `file` and print the same envelope the HTTP API returns.
pub async fn cmd_extract(config: Config, file: &Path, mode: &str) -> anyhow::Result<()> {
    let mode = ExtractionRequestMode::from_str(mode)
        .ok_or_else(|| anyhow::anyhow!("Unknown mode '{}' (use hybrid, text or tables)", mode))?;

    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    let name = filename.clone();
    let document = tokio::task::spawn_blocking(move || Document::from_bytes(name, bytes))
        .await?
        .with_context(|| format!("Cannot open {}", file.display()))?;

    eprintln!(
        "{} Extracting {} ({} pages, mode {})",
        style("→").cyan(),
        filename,
        document.page_count(),
        mode
    );

    let router = Arc::new(BackendRouter::from_config(&config)?);
    let orchestrator = Orchestrator::new(config.orchestrator(), router);

    match orchestrator.run(Arc::new(document), mode).await {
        Ok(outcome) => {
            eprintln!("  {} {}", style("✓").green(), outcome.state);
            let response = ExtractResponse::new(outcome.result, filename);
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(e) => {
            let error = ApiError::from(e);
            eprintln!("  {} {}", style("✗").red(), error.message);
            println!("{}", serde_json::to_string_pretty(&error.body())?);
            Err(anyhow::anyhow!("Extraction failed: {}", error.kind))
        }
    }
}
