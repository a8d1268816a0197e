//! Command-based table extraction backend.
//!
//! Runs a configured table-structure tool on the chunk PDF. Arguments can use
//! `{file}` (chunk path) and `{pages}` (`1-N` for an N-page chunk). The tool
//! must print a JSON array of tables on stdout:
//!
//! ```json
//! [{"page": 1, "flavor": "lattice", "headers": ["a"], "rows": [["1"]],
//!   "accuracy": 97.5, "bbox": [72.0, 100.0, 540.0, 320.0]}]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use super::backend::{check_binary, scratch_dir, BackendType, Capabilities, ExtractionBackend};
use super::error::BackendError;
use crate::config::TableCommandConfig;
use crate::models::{BoundingBox, ExtractionRequestMode, PageResult, TableResult};

/// One table as printed by the external tool.
#[derive(Debug, Deserialize)]
struct CommandTable {
    page: u32,
    #[serde(default)]
    flavor: Option<String>,
    #[serde(default)]
    headers: Vec<serde_json::Value>,
    #[serde(default)]
    rows: Vec<Vec<serde_json::Value>>,
    /// Percentage, as reported by lattice/stream parsers.
    #[serde(default)]
    accuracy: Option<f64>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    bbox: Option<[f64; 4]>,
}

/// Table backend driven by an external command.
pub struct CommandTableBackend {
    config: TableCommandConfig,
}

impl CommandTableBackend {
    pub fn new(config: TableCommandConfig) -> Self {
        Self { config }
    }

    /// Replace placeholders in argument string.
    fn expand_arg(&self, arg: &str, file_path: &Path, pages: &str) -> String {
        arg.replace("{file}", &file_path.to_string_lossy())
            .replace("{pages}", pages)
    }

    /// Build command arguments with placeholders expanded.
    fn build_args(&self, file_path: &Path, pages: &str) -> Vec<String> {
        self.config
            .args
            .iter()
            .map(|arg| self.expand_arg(arg, file_path, pages))
            .collect()
    }
}

#[async_trait]
impl ExtractionBackend for CommandTableBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Command
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::TABLES
    }

    fn is_available(&self) -> bool {
        !self.config.command.is_empty() && check_binary(&self.config.command)
    }

    fn availability_hint(&self) -> String {
        if self.config.command.is_empty() {
            "No table command configured (table_command.command)".to_string()
        } else {
            format!("Install or add to PATH: {}", self.config.command)
        }
    }

    async fn extract(
        &self,
        pdf: &[u8],
        _mode: ExtractionRequestMode,
    ) -> Result<Vec<PageResult>, BackendError> {
        let page_count = lopdf::Document::load_mem(pdf)
            .map_err(|e| BackendError::unsupported(format!("Unreadable chunk PDF: {}", e)))?
            .get_pages()
            .len();

        let temp_dir = scratch_dir(self.config.scratch_dir.as_deref())?;
        let pdf_path = temp_dir.path().join("chunk.pdf");
        tokio::fs::write(&pdf_path, pdf).await?;

        let args = self.build_args(&pdf_path, &format!("1-{}", page_count));
        debug!("Running table command: {} {:?}", self.config.command, args);

        let output = Command::new(&self.config.command)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                BackendError::unknown(format!("Failed to run {}: {}", self.config.command, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::unsupported(format!(
                "{} failed (exit code {:?}): {}",
                self.config.command,
                output.status.code(),
                stderr.lines().take(5).collect::<Vec<_>>().join("\n")
            )));
        }

        parse_tables(&output.stdout)
    }
}

/// Group the tool's tables into per-page results, ordered by page.
fn parse_tables(stdout: &[u8]) -> Result<Vec<PageResult>, BackendError> {
    let tables: Vec<CommandTable> = serde_json::from_slice(stdout)
        .map_err(|e| BackendError::unknown(format!("Table command printed invalid JSON: {}", e)))?;

    let mut by_page: BTreeMap<u32, Vec<TableResult>> = BTreeMap::new();
    for table in tables {
        let confidence = table
            .confidence
            .or(table.accuracy.map(|a| a / 100.0))
            .unwrap_or(0.0);
        let bbox = table
            .bbox
            .map(|[x1, y1, x2, y2]| BoundingBox::new(x1, y1, x2, y2))
            .unwrap_or_default();

        by_page.entry(table.page).or_default().push(TableResult::new(
            table.page,
            table.flavor.unwrap_or_else(|| "stream".to_string()),
            table.headers.iter().map(cell_text).collect(),
            table
                .rows
                .iter()
                .map(|row| row.iter().map(cell_text).collect())
                .collect(),
            confidence,
            bbox,
        ));
    }

    Ok(by_page
        .into_iter()
        .map(|(page, tables)| PageResult::with_tables(page, tables))
        .collect())
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
