//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lopdf::{dictionary, Object, Stream};

use docsift::extraction::{
    BackendError, BackendErrorKind, BackendType, Capabilities, ExtractionBackend,
};
use docsift::models::{BoundingBox, ExtractionRequestMode, PageResult, TableResult};

/// Key stamped on every page dictionary with the page's original number.
const MARKER_KEY: &[u8] = b"DocsiftTestPage";

/// Build a PDF whose pages remember their original page number, so a backend
/// can tell which global pages a chunk PDF holds.
pub fn marked_pdf(count: u32) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut page_ids = Vec::new();
    for n in 1..=count {
        let content = format!("BT /F1 12 Tf 72 720 Td (Page {n}) Tj ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        page_ids.push(doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(font_id) },
            },
            "DocsiftTestPage" => Object::Integer(n as i64),
        }));
    }

    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
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

/// Original page numbers of the pages in a (chunk) PDF, in page order.
pub fn marked_pages(pdf: &[u8]) -> Result<Vec<u32>, BackendError> {
    let doc = lopdf::Document::load_mem(pdf).map_err(|e| BackendError::unsupported(e.to_string()))?;
    doc.get_pages()
        .values()
        .map(|id| {
            doc.get_dictionary(*id)
                .and_then(|d| d.get(MARKER_KEY))
                .and_then(Object::as_i64)
                .map(|n| n as u32)
                .map_err(|e| BackendError::unknown(format!("page without marker: {}", e)))
        })
        .collect()
}

/// Backend that reports each page's original number as its text.
///
/// Chunks can be scripted by their first original page: each call consumes
/// the next answer (`None` succeeds) and the final answer repeats forever.
pub struct MarkerBackend {
    script: Mutex<HashMap<u32, Vec<Option<BackendErrorKind>>>>,
    /// First global page of every call, in call order.
    pub calls: Mutex<Vec<u32>>,
}

impl MarkerBackend {
    pub fn new() -> Arc<Self> {
        Self::scripted(vec![])
    }

    /// Every call for the chunk starting at `first_page` fails with `kind`.
    pub fn failing(first_page: u32, kind: BackendErrorKind) -> Arc<Self> {
        Self::scripted(vec![(first_page, vec![Some(kind)])])
    }

    pub fn scripted(script: Vec<(u32, Vec<Option<BackendErrorKind>>)>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExtractionBackend for MarkerBackend {
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
        let originals = marked_pages(pdf)?;
        let first = originals.first().copied().unwrap_or(0);
        self.calls.lock().unwrap().push(first);

        let scripted = {
            let mut script = self.script.lock().unwrap();
            script
                .get_mut(&first)
                .filter(|answers| !answers.is_empty())
                .and_then(|answers| {
                    if answers.len() > 1 {
                        answers.remove(0)
                    } else {
                        answers[0]
                    }
                })
        };
        if let Some(kind) = scripted {
            return Err(BackendError::new(kind, format!("chunk at page {first} failed")));
        }

        Ok(originals
            .iter()
            .enumerate()
            .map(|(i, original)| {
                let local = i as u32 + 1;
                let mut page =
                    PageResult::with_text(local, format!("original page {original}"), Some(0.9));
                if mode.wants_tables() && original % 2 == 0 {
                    page.tables.push(TableResult::new(
                        local,
                        "marker",
                        vec!["page".into()],
                        vec![vec![original.to_string()]],
                        0.8,
                        BoundingBox::new(0.0, 0.0, 100.0, 50.0),
                    ));
                }
                page
            })
            .collect())
    }
}
