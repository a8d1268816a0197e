//! Backend selection per extraction mode.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::backend::{BackendType, ExtractionBackend};
use super::command_tables::CommandTableBackend;
use super::document_ai::DocumentAiBackend;
use super::error::BackendError;
use super::merger::combine_page_sets;
use super::tesseract::TesseractBackend;
use crate::config::{Config, ConfigError};
use crate::models::{Chunk, ExtractionRequestMode, PageResult};

/// Availability snapshot for health checks.
#[derive(Debug, Clone, Serialize)]
pub struct BackendStatus {
    pub text: BackendType,
    pub tables: BackendType,
    pub available: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

/// Routes each chunk to the text-capable and table-capable backends.
pub struct BackendRouter {
    text: Arc<dyn ExtractionBackend>,
    tables: Arc<dyn ExtractionBackend>,
    shared: bool,
}

impl BackendRouter {
    /// Use `text` for text extraction and `tables` for table extraction.
    ///
    /// Passing the same `Arc` for both makes hybrid requests a single call.
    pub fn new(text: Arc<dyn ExtractionBackend>, tables: Arc<dyn ExtractionBackend>) -> Self {
        let shared = std::ptr::eq(
            Arc::as_ptr(&text) as *const (),
            Arc::as_ptr(&tables) as *const (),
        );
        Self {
            text,
            tables,
            shared,
        }
    }

    /// One backend serving both capabilities.
    pub fn single(backend: Arc<dyn ExtractionBackend>) -> Self {
        Self::new(backend.clone(), backend)
    }

    /// Build the backends named in the configuration.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let text = build_backend(config.text_backend, config)?;
        let tables = if config.table_backend == config.text_backend {
            text.clone()
        } else {
            build_backend(config.table_backend, config)?
        };

        if !text.capabilities().text {
            return Err(ConfigError::Invalid(format!(
                "{} cannot extract text",
                config.text_backend
            )));
        }
        if !tables.capabilities().tables {
            return Err(ConfigError::Invalid(format!(
                "{} cannot extract tables",
                config.table_backend
            )));
        }

        Ok(Self::new(text, tables))
    }

    pub fn text_backend(&self) -> &dyn ExtractionBackend {
        self.text.as_ref()
    }

    pub fn table_backend(&self) -> &dyn ExtractionBackend {
        self.tables.as_ref()
    }

    /// Check which backends can run. May spawn `which`, so call off the
    /// async executor.
    pub fn status(&self) -> BackendStatus {
        let mut hints = Vec::new();
        let mut available = true;
        let mut check = |backend: &dyn ExtractionBackend| {
            if !backend.is_available() {
                available = false;
                hints.push(format!(
                    "{}: {}",
                    backend.backend_type(),
                    backend.availability_hint()
                ));
            }
        };

        check(self.text.as_ref());
        if !self.shared {
            check(self.tables.as_ref());
        }

        BackendStatus {
            text: self.text.backend_type(),
            tables: self.tables.backend_type(),
            available,
            hints,
        }
    }

    /// Extract one chunk in the requested mode.
    pub async fn invoke(
        &self,
        chunk: &Chunk,
        pdf: &[u8],
        mode: ExtractionRequestMode,
    ) -> Result<Vec<PageResult>, BackendError> {
        match mode {
            ExtractionRequestMode::TextOnly => self.text.invoke(chunk, pdf, mode).await,
            ExtractionRequestMode::TablesOnly => self.tables.invoke(chunk, pdf, mode).await,
            ExtractionRequestMode::Hybrid if self.shared => {
                self.text.invoke(chunk, pdf, mode).await
            }
            ExtractionRequestMode::Hybrid => {
                debug!(
                    "{}: running {} and {} concurrently",
                    chunk,
                    self.text.backend_type(),
                    self.tables.backend_type()
                );
                let (text, tables) = tokio::join!(
                    self.text
                        .invoke(chunk, pdf, ExtractionRequestMode::TextOnly),
                    self.tables
                        .invoke(chunk, pdf, ExtractionRequestMode::TablesOnly),
                );
                match (text, tables) {
                    (Ok(text), Ok(tables)) => Ok(combine_page_sets(text, tables)),
                    (Err(a), Err(b)) => Err(a.more_severe(b)),
                    (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
                }
            }
        }
    }
}

fn build_backend(
    backend_type: BackendType,
    config: &Config,
) -> Result<Arc<dyn ExtractionBackend>, ConfigError> {
    let backend: Arc<dyn ExtractionBackend> = match backend_type {
        BackendType::DocumentAi => Arc::new(
            DocumentAiBackend::new(
                config.document_ai.clone(),
                config.orchestrator().backend_timeout,
            )
            .map_err(|e| ConfigError::Invalid(e.message))?,
        ),
        BackendType::Tesseract => Arc::new(TesseractBackend::new(config.tesseract.clone())),
        BackendType::Command => Arc::new(CommandTableBackend::new(config.table_command.clone())),
    };
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::backend::Capabilities;
    use crate::extraction::BackendErrorKind;
    use crate::models::{BoundingBox, TableResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        kind: BackendType,
        caps: Capabilities,
        fail: Option<BackendErrorKind>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(kind: BackendType, caps: Capabilities, fail: Option<BackendErrorKind>) -> Arc<Self> {
            Arc::new(Self {
                kind,
                caps,
                fail,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ExtractionBackend for Fixed {
        fn backend_type(&self) -> BackendType {
            self.kind
        }

        fn capabilities(&self) -> Capabilities {
            self.caps
        }

        fn is_available(&self) -> bool {
            self.fail.is_none()
        }

        fn availability_hint(&self) -> String {
            "broken".to_string()
        }

        async fn extract(
            &self,
            _pdf: &[u8],
            _mode: ExtractionRequestMode,
        ) -> Result<Vec<PageResult>, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(kind) = self.fail {
                return Err(BackendError::new(kind, "scripted"));
            }
            let table = TableResult::new(1, "lattice", vec![], vec![], 0.9, BoundingBox::default());
            Ok(vec![PageResult {
                tables: vec![table],
                ..PageResult::with_text(1, "page one", Some(0.9))
            }])
        }
    }

    #[tokio::test]
    async fn test_shared_backend_invoked_once_for_hybrid() {
        let backend = Fixed::new(BackendType::DocumentAi, Capabilities::ALL, None);
        let router = BackendRouter::single(backend.clone());

        let pages = router
            .invoke(&Chunk::new(0, 4, 4), b"pdf", ExtractionRequestMode::Hybrid)
            .await
            .unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(pages[0].page_number, 4);
        assert!(pages[0].text.is_some());
        assert_eq!(pages[0].tables.len(), 1);
    }

    #[tokio::test]
    async fn test_split_backends_are_combined() {
        let text = Fixed::new(BackendType::Tesseract, Capabilities::TEXT, None);
        let tables = Fixed::new(BackendType::Command, Capabilities::TABLES, None);
        let router = BackendRouter::new(text.clone(), tables.clone());

        let pages = router
            .invoke(&Chunk::new(0, 1, 1), b"pdf", ExtractionRequestMode::Hybrid)
            .await
            .unwrap();
        assert_eq!(text.calls.load(Ordering::SeqCst), 1);
        assert_eq!(tables.calls.load(Ordering::SeqCst), 1);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].text.as_deref(), Some("page one"));
        assert_eq!(pages[0].tables.len(), 1);
    }

    #[tokio::test]
    async fn test_mode_selects_backend() {
        let text = Fixed::new(BackendType::Tesseract, Capabilities::TEXT, None);
        let tables = Fixed::new(BackendType::Command, Capabilities::TABLES, None);
        let router = BackendRouter::new(text.clone(), tables.clone());

        let pages = router
            .invoke(&Chunk::new(0, 1, 1), b"pdf", ExtractionRequestMode::TablesOnly)
            .await
            .unwrap();
        assert_eq!(text.calls.load(Ordering::SeqCst), 0);
        assert!(pages[0].text.is_none());
    }

    #[tokio::test]
    async fn test_more_severe_error_wins() {
        let text = Fixed::new(
            BackendType::Tesseract,
            Capabilities::TEXT,
            Some(BackendErrorKind::Transient),
        );
        let tables = Fixed::new(
            BackendType::DocumentAi,
            Capabilities::ALL,
            Some(BackendErrorKind::QuotaExceeded),
        );
        let router = BackendRouter::new(text, tables);

        let err = router
            .invoke(&Chunk::new(0, 1, 1), b"pdf", ExtractionRequestMode::Hybrid)
            .await
            .unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::QuotaExceeded);
    }

    #[test]
    fn test_status_reports_hints() {
        let text = Fixed::new(BackendType::Tesseract, Capabilities::TEXT, None);
        let tables = Fixed::new(
            BackendType::Command,
            Capabilities::TABLES,
            Some(BackendErrorKind::Unknown),
        );
        let status = BackendRouter::new(text, tables).status();
        assert!(!status.available);
        assert_eq!(status.hints, vec!["command: broken".to_string()]);
    }

    #[test]
    fn test_from_config_rejects_incapable_backends() {
        let config = Config {
            table_backend: BackendType::Tesseract,
            ..Config::default()
        };
        let err = BackendRouter::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("cannot extract tables"));
    }

    #[test]
    fn test_from_config_shares_identical_backends() {
        let router = BackendRouter::from_config(&Config::default()).unwrap();
        assert!(router.shared);
        assert_eq!(router.text_backend().backend_type(), BackendType::DocumentAi);
    }
}
