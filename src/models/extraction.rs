//! Extraction output models.
//!
//! These are the shapes returned to callers as JSON. Field order and
//! collection types are deterministic so the same input always serializes
//! to the same bytes.

use serde::{Deserialize, Serialize};

use crate::extraction::BackendErrorKind;

/// Which backend capabilities a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionRequestMode {
    TextOnly,
    TablesOnly,
    Hybrid,
}

impl ExtractionRequestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextOnly => "text_only",
            Self::TablesOnly => "tables_only",
            Self::Hybrid => "hybrid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "text_only" | "text-only" => Some(Self::TextOnly),
            "tables" | "tables_only" | "tables-only" => Some(Self::TablesOnly),
            "hybrid" | "all" => Some(Self::Hybrid),
            _ => None,
        }
    }

    pub fn wants_text(&self) -> bool {
        matches!(self, Self::TextOnly | Self::Hybrid)
    }

    pub fn wants_tables(&self) -> bool {
        matches!(self, Self::TablesOnly | Self::Hybrid)
    }
}

impl std::fmt::Display for ExtractionRequestMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Table region in source-page coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Smallest box containing all points. Empty input yields a zero box.
    pub fn enclosing(points: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let mut iter = points.into_iter();
        let Some((x, y)) = iter.next() else {
            return Self::default();
        };
        iter.fold(Self::new(x, y, x, y), |b, (x, y)| Self {
            x1: b.x1.min(x),
            y1: b.y1.min(y),
            x2: b.x2.max(x),
            y2: b.y2.max(y),
        })
    }
}

/// One table found on a page.
///
/// Rows are not guaranteed to be rectangular.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableResult {
    /// Sequential within the owning page, starting at 1.
    pub table_id: u32,
    pub page_number: u32,
    /// `lattice`, `stream`, or a backend tag such as `document_ai`.
    pub method: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub row_count: usize,
    pub column_count: usize,
    pub confidence: f64,
    pub bounding_box: BoundingBox,
}

impl TableResult {
    pub fn new(
        page_number: u32,
        method: impl Into<String>,
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
        confidence: f64,
        bounding_box: BoundingBox,
    ) -> Self {
        let row_count = rows.len();
        let column_count = rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(headers.len()))
            .max()
            .unwrap_or(0);

        Self {
            table_id: 0,
            page_number,
            method: method.into(),
            headers,
            rows,
            row_count,
            column_count,
            confidence: confidence.clamp(0.0, 1.0),
            bounding_box,
        }
    }
}

/// A positioned block of page text, such as a paragraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextElement {
    pub text: String,
    pub confidence: f64,
    pub bounding_box: BoundingBox,
}

/// A named entity detected by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub text: String,
    #[serde(default)]
    pub mention_text: String,
    pub confidence: f64,
    pub page_number: u32,
}

/// A key/value pair read from a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub value: String,
    pub confidence: f64,
    pub page_number: u32,
}

/// Document-level structured output, in page order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredData {
    pub entities: Vec<Entity>,
    pub form_fields: Vec<FormField>,
}

/// One page's extracted output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed global page number.
    pub page_number: u32,
    /// `None` when text was not requested or could not be extracted.
    pub text: Option<String>,
    /// Text confidence in `[0, 1]`.
    pub confidence: Option<f64>,
    pub word_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_elements: Vec<TextElement>,
    pub tables: Vec<TableResult>,
    /// Moved into [`ExtractionResult::structured_data`] on merge.
    #[serde(skip)]
    pub entities: Vec<Entity>,
    #[serde(skip)]
    pub form_fields: Vec<FormField>,
}

impl PageResult {
    /// A page with no text and no tables.
    pub fn empty(page_number: u32) -> Self {
        Self {
            page_number,
            text: None,
            confidence: None,
            word_count: 0,
            text_elements: Vec::new(),
            tables: Vec::new(),
            entities: Vec::new(),
            form_fields: Vec::new(),
        }
    }

    pub fn with_text(page_number: u32, text: impl Into<String>, confidence: Option<f64>) -> Self {
        let text = text.into();
        Self {
            word_count: text.split_whitespace().count(),
            text: Some(text),
            confidence: confidence.map(|c| c.clamp(0.0, 1.0)),
            ..Self::empty(page_number)
        }
    }

    pub fn with_tables(page_number: u32, tables: Vec<TableResult>) -> Self {
        Self {
            tables,
            ..Self::empty(page_number)
        }
    }

    /// Fold another result for the same page into this one.
    ///
    /// Text from `other` fills in only when this page has none. Tables,
    /// entities and form fields are appended in order.
    pub fn absorb(&mut self, other: PageResult) {
        debug_assert_eq!(self.page_number, other.page_number);
        if self.text.is_none() && other.text.is_some() {
            self.text = other.text;
            self.confidence = other.confidence;
            self.word_count = other.word_count;
            self.text_elements = other.text_elements;
        }
        self.tables.extend(other.tables);
        self.entities.extend(other.entities);
        self.form_fields.extend(other.form_fields);
    }

    /// Drop everything derived from page text.
    pub fn clear_text(&mut self) {
        self.text = None;
        self.confidence = None;
        self.word_count = 0;
        self.text_elements.clear();
        self.entities.clear();
        self.form_fields.clear();
    }
}

/// Extraction method reported in the result metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Hybrid,
    TextOnly,
    TablesOnly,
    Partial,
}

impl From<ExtractionRequestMode> for ExtractionMethod {
    fn from(mode: ExtractionRequestMode) -> Self {
        match mode {
            ExtractionRequestMode::Hybrid => Self::Hybrid,
            ExtractionRequestMode::TextOnly => Self::TextOnly,
            ExtractionRequestMode::TablesOnly => Self::TablesOnly,
        }
    }
}

/// A page range whose chunk failed and was replaced by placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRange {
    pub start: u32,
    pub end: u32,
    pub kind: BackendErrorKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub total_pages: u32,
    pub extraction_method: ExtractionMethod,
    pub has_tables: bool,
    pub total_tables: usize,
    pub chunks_processed: usize,
    pub chunks_failed: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_ranges: Vec<FailedRange>,
}

/// Top-level extraction output: exactly one page entry per document page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub pages: Vec<PageResult>,
    pub full_text: String,
    pub structured_data: StructuredData,
    pub metadata: ExtractionMetadata,
}
