//! Configuration management for docsift using the prefer crate.
//!
//! Settings come from an optional config file (discovered by prefer or given
//! explicitly), then environment variables override individual fields.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::extraction::BackendType;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Google Document AI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentAiConfig {
    pub project_id: Option<String>,
    pub location: String,
    pub processor_id: Option<String>,
    /// Bearer token. When unset, `gcloud auth print-access-token` is used.
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    /// Skip page images in the processor response.
    pub imageless_mode: bool,
    /// Override for the regional `https://{location}-documentai.googleapis.com` host.
    pub api_endpoint: Option<String>,
}

impl Default for DocumentAiConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            location: "us".to_string(),
            processor_id: None,
            access_token: None,
            imageless_mode: true,
            api_endpoint: None,
        }
    }
}

impl DocumentAiConfig {
    /// Whether project and processor are both set.
    pub fn is_configured(&self) -> bool {
        self.project_id.as_deref().is_some_and(|s| !s.is_empty())
            && self.processor_id.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// Local Tesseract OCR settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    pub language: String,
    pub dpi: u32,
    /// Parent of per-chunk scratch directories; system temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            dpi: 300,
            scratch_dir: None,
        }
    }
}

/// External table-structure command.
///
/// Arguments may contain `{file}` (path of the chunk PDF) and `{pages}`
/// (page selector, e.g. `1-15`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableCommandConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Parent of per-chunk scratch directories; system temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for TableCommandConfig {
    fn default() -> Self {
        Self {
            command: "camelot-json".to_string(),
            args: vec![
                "--pages".to_string(),
                "{pages}".to_string(),
                "{file}".to_string(),
            ],
            scratch_dir: None,
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Upload size limit in bytes.
    pub max_file_size: usize,

    /// Backend pages-per-request limit.
    pub max_pages_per_chunk: u32,
    /// Documents longer than this are rejected outright.
    pub document_page_cap: u32,
    pub dispatch_concurrency: usize,
    /// Total attempts per chunk, including the first.
    pub retry_max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub request_deadline_secs: u64,
    pub backend_timeout_secs: u64,

    pub text_backend: BackendType,
    pub table_backend: BackendType,

    pub document_ai: DocumentAiConfig,
    pub tesseract: TesseractConfig,
    pub table_command: TableCommandConfig,

    /// Path of the file this config was loaded from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            max_file_size: 50 * 1024 * 1024,
            max_pages_per_chunk: 15,
            document_page_cap: 2000,
            dispatch_concurrency: 4,
            retry_max_attempts: 3,
            retry_backoff_ms: 500,
            request_deadline_secs: 300,
            backend_timeout_secs: 120,
            text_backend: BackendType::DocumentAi,
            table_backend: BackendType::DocumentAi,
            document_ai: DocumentAiConfig::default(),
            tesseract: TesseractConfig::default(),
            table_command: TableCommandConfig::default(),
            source_path: None,
        }
    }
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Falls back to defaults when no config file is found.
    pub async fn load() -> Result<Self, ConfigError> {
        let config = match prefer::load("docsift").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => Self::load_from_path(path).await?,
                None => Self::default(),
            },
            Err(_) => Self::default(),
        };
        config.with_env_overrides().validated()
    }

    /// Load from an explicit path, then apply env overrides and validate.
    pub async fn load_explicit(path: &Path) -> Result<Self, ConfigError> {
        Self::load_from_path(path)
            .await?
            .with_env_overrides()
            .validated()
    }

    /// Load configuration from a specific file path.
    /// Format is chosen by extension: TOML, YAML, otherwise JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let mut config = Self::parse(ext, &contents)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse(ext: &str, contents: &str) -> Result<Self, ConfigError> {
        match ext {
            "toml" => toml::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "TOML",
                message: e.to_string(),
            }),
            "yaml" | "yml" => serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "YAML",
                message: e.to_string(),
            }),
            _ => serde_json::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "JSON",
                message: e.to_string(),
            }),
        }
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("HOST") {
            self.host = host;
        }
        if let Some(port) = get("PORT").and_then(parse_trimmed) {
            self.port = port;
        }
        if let Some(v) = get("MAX_FILE_SIZE").and_then(parse_trimmed) {
            self.max_file_size = v;
        }
        if let Some(v) = get("MAX_PAGES_PER_REQUEST").and_then(parse_trimmed) {
            self.max_pages_per_chunk = v;
        }
        if let Some(v) = get("DOCSIFT_DOCUMENT_PAGE_CAP").and_then(parse_trimmed) {
            self.document_page_cap = v;
        }
        if let Some(v) = get("DOCSIFT_DISPATCH_CONCURRENCY").and_then(parse_trimmed) {
            self.dispatch_concurrency = v;
        }
        if let Some(v) = get("DOCSIFT_RETRY_MAX_ATTEMPTS").and_then(parse_trimmed) {
            self.retry_max_attempts = v;
        }
        if let Some(v) = get("DOCSIFT_RETRY_BACKOFF_MS").and_then(parse_trimmed) {
            self.retry_backoff_ms = v;
        }
        if let Some(v) = get("DOCSIFT_REQUEST_DEADLINE_SECS").and_then(parse_trimmed) {
            self.request_deadline_secs = v;
        }
        if let Some(v) = get("DOCSIFT_BACKEND_TIMEOUT_SECS").and_then(parse_trimmed) {
            self.backend_timeout_secs = v;
        }
        if let Some(backend) = get("DOCSIFT_TEXT_BACKEND").and_then(|v| BackendType::from_str(&v))
        {
            self.text_backend = backend;
        }
        if let Some(backend) = get("DOCSIFT_TABLE_BACKEND").and_then(|v| BackendType::from_str(&v))
        {
            self.table_backend = backend;
        }

        if let Some(v) = get("GOOGLE_PROJECT_ID") {
            self.document_ai.project_id = Some(v);
        }
        if let Some(v) = get("GOOGLE_LOCATION") {
            self.document_ai.location = v;
        }
        if let Some(v) = get("GOOGLE_PROCESSOR_ID") {
            self.document_ai.processor_id = Some(v);
        }
        if let Some(v) = get("GOOGLE_ACCESS_TOKEN") {
            self.document_ai.access_token = Some(v);
        }
        if let Some(v) = get("ENABLE_IMAGELESS_MODE") {
            self.document_ai.imageless_mode = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = get("TESSERACT_LANG") {
            self.tesseract.language = v;
        }

        self
    }

    /// Reject limits that would make the pipeline unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let zero = [
            ("max_pages_per_chunk", self.max_pages_per_chunk as u64),
            ("document_page_cap", self.document_page_cap as u64),
            ("dispatch_concurrency", self.dispatch_concurrency as u64),
            ("retry_max_attempts", self.retry_max_attempts as u64),
            ("request_deadline_secs", self.request_deadline_secs),
            ("backend_timeout_secs", self.backend_timeout_secs),
            ("max_file_size", self.max_file_size as u64),
        ]
        .into_iter()
        .find(|(_, v)| *v == 0);

        if let Some((name, _)) = zero {
            return Err(ConfigError::Invalid(format!("{} must be greater than 0", name)));
        }
        Ok(())
    }

    fn validated(self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }

    /// Limits handed to the orchestrator.
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_pages_per_chunk: self.max_pages_per_chunk,
            document_page_cap: self.document_page_cap,
            dispatch_concurrency: self.dispatch_concurrency,
            retry_max_attempts: self.retry_max_attempts,
            retry_backoff_base: Duration::from_millis(self.retry_backoff_ms),
            request_deadline: Duration::from_secs(self.request_deadline_secs),
            backend_timeout: Duration::from_secs(self.backend_timeout_secs),
        }
    }
}

/// Parse an env value into its target type. Out-of-range or malformed
/// values are ignored.
fn parse_trimmed<T: std::str::FromStr>(value: String) -> Option<T> {
    value.trim().parse().ok()
}

/// Limits that shape one document's extraction.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_pages_per_chunk: u32,
    pub document_page_cap: u32,
    pub dispatch_concurrency: usize,
    pub retry_max_attempts: u32,
    pub retry_backoff_base: Duration,
    pub request_deadline: Duration,
    /// Upper bound on a single backend attempt.
    pub backend_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Config::default().orchestrator()
    }
}
