//! Shared helpers for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lopdf::{dictionary, Object, Stream};

use crate::config::OrchestratorConfig;
use crate::extraction::{
    BackendError, BackendErrorKind, BackendRouter, BackendType, Capabilities, ExtractionBackend,
    Orchestrator,
};
use crate::models::{BoundingBox, ExtractionRequestMode, PageResult, TableResult};

/// Build an in-memory PDF with `count` pages, each carrying one line of text.
pub fn pdf_with_pages(count: u32) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let media_box = vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(612),
        Object::Integer(792),
    ];

    let mut page_ids = Vec::new();
    for n in 1..=count {
        let content = format!("BT /F1 12 Tf 72 720 Td (Page {n}) Tj ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        page_ids.push(doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => media_box.clone(),
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(font_id) },
            },
        }));
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| Object::Reference(*id)).collect();
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(count as i64),
    });

    for &pid in &page_ids {
        if let Ok(dict) = doc.get_object_mut(pid).and_then(Object::as_dict_mut) {
            dict.set("Parent", Object::Reference(pages_id));
        }
    }

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// Backend that "reads" each page of the chunk PDF it is given.
///
/// Every page yields `text for page N` (chunk-local N) and, when tables are
/// requested, one 2x2 table. With `fail` set, every call returns that error.
pub struct EchoBackend {
    pub fail: Option<BackendErrorKind>,
    pub calls: AtomicUsize,
}

impl EchoBackend {
    pub fn new() -> Arc<Self> {
        Self::failing(None)
    }

    pub fn failing(fail: Option<BackendErrorKind>) -> Arc<Self> {
        Arc::new(Self {
            fail,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ExtractionBackend for EchoBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::DocumentAi
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn is_available(&self) -> bool {
        true
    }

    fn availability_hint(&self) -> String {
        String::new()
    }

    async fn extract(
        &self,
        pdf: &[u8],
        mode: ExtractionRequestMode,
    ) -> Result<Vec<PageResult>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(kind) = self.fail {
            return Err(BackendError::new(kind, "scripted failure"));
        }
        let doc = lopdf::Document::load_mem(pdf)
            .map_err(|e| BackendError::unsupported(e.to_string()))?;
        let count = doc.get_pages().len() as u32;

        Ok((1..=count)
            .map(|n| {
                let mut page = PageResult::with_text(n, format!("text for page {n}"), Some(0.95));
                if mode.wants_tables() {
                    page.tables.push(TableResult::new(
                        n,
                        "echo",
                        vec!["a".into(), "b".into()],
                        vec![vec!["1".into(), "2".into()]],
                        0.9,
                        BoundingBox::default(),
                    ));
                }
                page
            })
            .collect())
    }
}

/// Orchestrator over a single shared backend with small chunks.
pub fn orchestrator_with(backend: Arc<dyn ExtractionBackend>, config: OrchestratorConfig) -> Orchestrator {
    Orchestrator::new(config, Arc::new(BackendRouter::single(backend)))
}
