//! Google Document AI backend implementation.
//!
//! Sends each chunk to a Document AI processor over REST and normalizes the
//! returned `Document` into page text and tables.
//!
//! Requires GOOGLE_PROJECT_ID and GOOGLE_PROCESSOR_ID. The bearer token comes
//! from GOOGLE_ACCESS_TOKEN, or from `gcloud auth print-access-token`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::backend::{check_binary, BackendType, Capabilities, ExtractionBackend};
use super::error::{BackendError, BackendErrorKind};
use crate::config::DocumentAiConfig;
use crate::models::{
    BoundingBox, Entity, ExtractionRequestMode, FormField, PageResult, TableResult, TextElement,
};

/// Tokens from gcloud are valid for an hour; refresh well before that.
const TOKEN_TTL: Duration = Duration::from_secs(45 * 60);

/// Confidence reported for tables whose layout carries none.
const DEFAULT_TABLE_CONFIDENCE: f64 = 0.9;

const METHOD_TAG: &str = "document_ai";

/// Document AI backend using a configured processor.
pub struct DocumentAiBackend {
    config: DocumentAiConfig,
    client: reqwest::Client,
    token_cache: Mutex<Option<(String, Instant)>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest {
    raw_document: RawDocument,
    #[serde(skip_serializing_if = "Option::is_none")]
    process_options: Option<ProcessOptions>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    imageless_mode: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    content: String,
    mime_type: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessOptions {
    ocr_config: OcrConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OcrConfig {
    enable_native_pdf_parsing: bool,
    compute_style_info: bool,
}

#[derive(Debug, Deserialize)]
struct ProcessResponse {
    document: Option<DocAiDocument>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DocAiDocument {
    text: String,
    pages: Vec<DocAiPage>,
    entities: Vec<DocAiEntity>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DocAiPage {
    page_number: Option<u32>,
    dimension: Option<Dimension>,
    paragraphs: Vec<LayoutHolder>,
    tables: Vec<DocAiTable>,
    form_fields: Vec<DocAiFormField>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DocAiFormField {
    field_name: Layout,
    field_value: Layout,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DocAiEntity {
    #[serde(rename = "type")]
    entity_type: String,
    mention_text: String,
    confidence: f64,
    text_anchor: Option<TextAnchor>,
    page_anchor: Option<PageAnchor>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PageAnchor {
    page_refs: Vec<PageRef>,
}

/// Zero-based index into `Document.pages`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageRef {
    #[serde(deserialize_with = "de_int64")]
    page: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Dimension {
    width: f64,
    height: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LayoutHolder {
    layout: Layout,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Layout {
    text_anchor: Option<TextAnchor>,
    confidence: Option<f64>,
    bounding_poly: Option<BoundingPoly>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct TextAnchor {
    text_segments: Vec<TextSegment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct TextSegment {
    #[serde(deserialize_with = "de_int64")]
    start_index: usize,
    #[serde(deserialize_with = "de_int64")]
    end_index: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct BoundingPoly {
    vertices: Vec<Vertex>,
    normalized_vertices: Vec<Vertex>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Vertex {
    x: f64,
    y: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DocAiTable {
    layout: Layout,
    header_rows: Vec<TableRow>,
    body_rows: Vec<TableRow>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TableRow {
    cells: Vec<LayoutHolder>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: GoogleStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GoogleStatus {
    message: String,
    status: String,
}

/// Int64 fields arrive as JSON strings in the REST encoding.
fn de_int64<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64 {
        Num(u64),
        Str(String),
    }

    match Int64::deserialize(deserializer)? {
        Int64::Num(n) => Ok(n as usize),
        Int64::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

impl DocumentAiBackend {
    /// Create a backend whose requests give up after `timeout`.
    pub fn new(config: DocumentAiConfig, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| BackendError::unknown(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            token_cache: Mutex::new(None),
        })
    }

    fn process_url(&self) -> String {
        let base = self.config.api_endpoint.clone().unwrap_or_else(|| {
            format!("https://{}-documentai.googleapis.com", self.config.location)
        });
        format!(
            "{}/v1/projects/{}/locations/{}/processors/{}:process",
            base.trim_end_matches('/'),
            self.config.project_id.as_deref().unwrap_or_default(),
            self.config.location,
            self.config.processor_id.as_deref().unwrap_or_default(),
        )
    }

    async fn access_token(&self) -> Result<String, BackendError> {
        if let Some(ref token) = self.config.access_token {
            return Ok(token.clone());
        }

        let mut cached = self.token_cache.lock().await;
        if let Some((ref token, fetched)) = *cached {
            if fetched.elapsed() < TOKEN_TTL {
                return Ok(token.clone());
            }
        }

        let output = tokio::process::Command::new("gcloud")
            .args(["auth", "print-access-token"])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    BackendError::auth("GOOGLE_ACCESS_TOKEN not set and gcloud not installed")
                } else {
                    BackendError::auth(format!("Failed to run gcloud: {}", e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::auth(format!(
                "gcloud auth print-access-token failed: {}",
                stderr.trim()
            )));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(BackendError::auth("gcloud returned an empty access token"));
        }

        debug!("Refreshed Document AI access token via gcloud");
        *cached = Some((token.clone(), Instant::now()));
        Ok(token)
    }

    fn build_request(&self, pdf: &[u8]) -> ProcessRequest {
        ProcessRequest {
            raw_document: RawDocument {
                content: base64::engine::general_purpose::STANDARD.encode(pdf),
                mime_type: "application/pdf",
            },
            process_options: self.config.imageless_mode.then_some(ProcessOptions {
                ocr_config: OcrConfig {
                    enable_native_pdf_parsing: true,
                    compute_style_info: true,
                },
            }),
            imageless_mode: self.config.imageless_mode,
        }
    }
}

#[async_trait]
impl ExtractionBackend for DocumentAiBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::DocumentAi
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn is_available(&self) -> bool {
        self.config.is_configured()
            && (self.config.access_token.is_some() || check_binary("gcloud"))
    }

    fn availability_hint(&self) -> String {
        if !self.config.is_configured() {
            "Set GOOGLE_PROJECT_ID and GOOGLE_PROCESSOR_ID (GOOGLE_LOCATION defaults to 'us')"
                .to_string()
        } else if self.config.access_token.is_none() && !check_binary("gcloud") {
            "Set GOOGLE_ACCESS_TOKEN or install the gcloud CLI".to_string()
        } else {
            "Document AI is available".to_string()
        }
    }

    async fn extract(
        &self,
        pdf: &[u8],
        mode: ExtractionRequestMode,
    ) -> Result<Vec<PageResult>, BackendError> {
        if !self.config.is_configured() {
            return Err(BackendError::auth(
                "Document AI project or processor not configured",
            ));
        }

        let token = self.access_token().await?;
        let url = self.process_url();
        debug!("Document AI request: {} bytes to {}", pdf.len(), url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&self.build_request(pdf))
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_transport)?;
        if !(200..300).contains(&status) {
            return Err(classify_response(status, &body));
        }

        let parsed: ProcessResponse = serde_json::from_str(&body).map_err(|e| {
            BackendError::unknown(format!("Failed to parse Document AI response: {}", e))
        })?;
        let document = parsed.document.unwrap_or_default();

        Ok(parse_document(&document, mode))
    }
}

/// Map a non-2xx Document AI response to an error kind.
fn classify_response(status: u16, body: &str) -> BackendError {
    let api = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error)
        .unwrap_or_default();
    let detail = if api.message.is_empty() {
        body.chars().take(300).collect()
    } else {
        api.message
    };
    let message = format!("Document AI returned {}: {}", status, detail);

    let kind = match (status, api.status.as_str()) {
        (401 | 403, _) | (_, "UNAUTHENTICATED" | "PERMISSION_DENIED") => {
            BackendErrorKind::AuthFailure
        }
        (429, _) | (_, "RESOURCE_EXHAUSTED") => BackendErrorKind::QuotaExceeded,
        _ if body.contains("PAGE_LIMIT_EXCEEDED") => BackendErrorKind::UnsupportedFormat,
        (400, _) | (_, "INVALID_ARGUMENT") => BackendErrorKind::UnsupportedFormat,
        (408 | 504, _) | (_, "DEADLINE_EXCEEDED") => BackendErrorKind::Timeout,
        (500..=599, _) | (_, "UNAVAILABLE") => BackendErrorKind::Transient,
        _ => BackendErrorKind::Unknown,
    };

    BackendError::new(kind, message)
}

/// Map a client-side failure to an error kind.
fn classify_transport(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::timeout(format!("Document AI request timed out: {}", e))
    } else if e.is_connect() || e.is_request() {
        BackendError::transient(format!("Document AI request failed: {}", e))
    } else {
        BackendError::unknown(format!("Document AI request failed: {}", e))
    }
}

/// Character-offset view of the document text.
///
/// Text anchors index Unicode code points, not bytes.
struct DocText<'a> {
    text: &'a str,
    offsets: Vec<usize>,
}

impl<'a> DocText<'a> {
    fn new(text: &'a str) -> Self {
        let offsets = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        Self { text, offsets }
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        let last = self.offsets.len() - 1;
        let (start, end) = (start.min(last), end.min(last));
        if start >= end {
            return "";
        }
        &self.text[self.offsets[start]..self.offsets[end]]
    }

    fn layout_text(&self, layout: &Layout) -> String {
        self.anchor_text(layout.text_anchor.as_ref())
    }

    fn anchor_text(&self, anchor: Option<&TextAnchor>) -> String {
        anchor
            .map(|anchor| {
                anchor
                    .text_segments
                    .iter()
                    .map(|seg| self.slice(seg.start_index, seg.end_index))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn parse_document(document: &DocAiDocument, mode: ExtractionRequestMode) -> Vec<PageResult> {
    let text = DocText::new(&document.text);

    let mut pages: Vec<PageResult> = document
        .pages
        .iter()
        .enumerate()
        .map(|(i, page)| {
            let page_number = page.page_number.unwrap_or(i as u32 + 1);
            let mut result = if mode.wants_text() {
                page_text(&text, page, page_number)
            } else {
                PageResult::empty(page_number)
            };
            if mode.wants_tables() {
                result.tables = page
                    .tables
                    .iter()
                    .map(|table| parse_table(&text, table, page, page_number))
                    .collect();
            }
            result
        })
        .collect();

    if mode.wants_text() {
        for entity in &document.entities {
            let index = entity
                .page_anchor
                .as_ref()
                .and_then(|a| a.page_refs.first())
                .map_or(0, |r| r.page);
            let Some(page) = pages.get_mut(index) else {
                debug!("Dropping entity anchored to missing page index {}", index);
                continue;
            };
            let anchored = text.anchor_text(entity.text_anchor.as_ref());
            page.entities.push(Entity {
                entity_type: entity.entity_type.clone(),
                text: if anchored.is_empty() {
                    entity.mention_text.clone()
                } else {
                    anchored
                },
                mention_text: entity.mention_text.clone(),
                confidence: entity.confidence.clamp(0.0, 1.0),
                page_number: page.page_number,
            });
        }
    }

    pages
}

fn page_text(text: &DocText<'_>, page: &DocAiPage, page_number: u32) -> PageResult {
    let elements: Vec<TextElement> = page
        .paragraphs
        .iter()
        .filter_map(|p| {
            let t = text.layout_text(&p.layout);
            let t = t.trim();
            (!t.is_empty()).then(|| TextElement {
                text: t.to_string(),
                confidence: p.layout.confidence.unwrap_or(1.0),
                bounding_box: bounding_box(&p.layout, page),
            })
        })
        .collect();

    let confidence = (!elements.is_empty())
        .then(|| elements.iter().map(|e| e.confidence).sum::<f64>() / elements.len() as f64);
    let joined = elements
        .iter()
        .map(|e| e.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let form_fields = page
        .form_fields
        .iter()
        .map(|field| FormField {
            name: text.layout_text(&field.field_name).trim().to_string(),
            value: text.layout_text(&field.field_value).trim().to_string(),
            confidence: field.field_value.confidence.unwrap_or(1.0).clamp(0.0, 1.0),
            page_number,
        })
        .collect();

    PageResult {
        text_elements: elements,
        form_fields,
        ..PageResult::with_text(page_number, joined, confidence)
    }
}

fn parse_table(
    text: &DocText<'_>,
    table: &DocAiTable,
    page: &DocAiPage,
    page_number: u32,
) -> TableResult {
    let cells = |row: &TableRow| -> Vec<String> {
        row.cells
            .iter()
            .map(|c| text.layout_text(&c.layout).trim().to_string())
            .collect()
    };

    let headers: Vec<String> = table.header_rows.iter().flat_map(cells).collect();
    let rows: Vec<Vec<String>> = table.body_rows.iter().map(cells).collect();
    let confidence = table
        .layout
        .confidence
        .filter(|c| *c > 0.0)
        .unwrap_or(DEFAULT_TABLE_CONFIDENCE);

    TableResult::new(
        page_number,
        METHOD_TAG,
        headers,
        rows,
        confidence,
        bounding_box(&table.layout, page),
    )
}

fn bounding_box(layout: &Layout, page: &DocAiPage) -> BoundingBox {
    let Some(ref poly) = layout.bounding_poly else {
        return BoundingBox::default();
    };

    if !poly.vertices.is_empty() {
        return BoundingBox::enclosing(poly.vertices.iter().map(|v| (v.x, v.y)));
    }

    let (width, height) = page
        .dimension
        .as_ref()
        .map(|d| (d.width, d.height))
        .unwrap_or((1.0, 1.0));
    BoundingBox::enclosing(
        poly.normalized_vertices
            .iter()
            .map(|v| (v.x * width, v.y * height)),
    )
}
