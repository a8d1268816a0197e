//! Tesseract OCR backend implementation.
//!
//! Rasterizes the chunk with pdftoppm and runs Tesseract on each page image,
//! reading TSV output so word confidences can be averaged per page.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::backend::{check_binary, scratch_dir, BackendType, Capabilities, ExtractionBackend};
use super::error::BackendError;
use crate::config::TesseractConfig;
use crate::models::{ExtractionRequestMode, PageResult};

const PDFTOPPM_NOT_FOUND: &str = "pdftoppm not found (install poppler-utils)";
const TESSERACT_NOT_FOUND: &str = "tesseract not found (install tesseract-ocr)";

/// Tesseract OCR backend.
pub struct TesseractBackend {
    config: TesseractConfig,
}

impl TesseractBackend {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    /// Render every page of `pdf_path` into `output_dir` as PNG.
    async fn rasterize(&self, pdf_path: &Path, output_dir: &Path) -> Result<(), BackendError> {
        let output = Command::new("pdftoppm")
            .args(["-png", "-r", &self.config.dpi.to_string()])
            .arg(pdf_path)
            .arg(output_dir.join("page"))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => BackendError::unknown(PDFTOPPM_NOT_FOUND),
                _ => BackendError::from(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::unsupported(format!(
                "pdftoppm failed to convert PDF: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }

    /// Run Tesseract on one image, returning TSV output.
    async fn run_tesseract(&self, image_path: &Path) -> Result<String, BackendError> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.config.language])
            .arg("tsv")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => BackendError::unknown(TESSERACT_NOT_FOUND),
                _ => BackendError::from(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::unknown(format!(
                "tesseract failed: {}",
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl ExtractionBackend for TesseractBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Tesseract
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::TEXT
    }

    fn is_available(&self) -> bool {
        check_binary("tesseract") && check_binary("pdftoppm")
    }

    fn availability_hint(&self) -> String {
        if !check_binary("tesseract") {
            "Tesseract not installed. Install with: apt install tesseract-ocr".to_string()
        } else if !check_binary("pdftoppm") {
            "pdftoppm not installed. Install with: apt install poppler-utils".to_string()
        } else {
            "Tesseract is available".to_string()
        }
    }

    async fn extract(
        &self,
        pdf: &[u8],
        _mode: ExtractionRequestMode,
    ) -> Result<Vec<PageResult>, BackendError> {
        let temp_dir = scratch_dir(self.config.scratch_dir.as_deref())?;
        let pdf_path = temp_dir.path().join("chunk.pdf");
        tokio::fs::write(&pdf_path, pdf).await?;

        self.rasterize(&pdf_path, temp_dir.path()).await?;
        let images = list_page_images(temp_dir.path())?;
        if images.is_empty() {
            return Err(BackendError::unsupported("pdftoppm produced no page images"));
        }

        let mut pages = Vec::with_capacity(images.len());
        for (page_number, image) in images {
            let tsv = self.run_tesseract(&image).await?;
            let (text, confidence) = parse_tsv(&tsv);
            debug!(
                "tesseract page {}: {} chars, confidence {:?}",
                page_number,
                text.len(),
                confidence
            );
            pages.push(PageResult::with_text(page_number, text, confidence));
        }
        Ok(pages)
    }
}

/// Find the rendered page images, ordered by page number.
///
/// pdftoppm names files like page-01.png, page-02.png, etc.
/// The padding width varies based on total page count.
fn list_page_images(dir: &Path) -> Result<Vec<(u32, PathBuf)>, BackendError> {
    let mut images: Vec<(u32, PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?;
            let number = name.strip_prefix("page-")?.strip_suffix(".png")?;
            Some((number.parse().ok()?, path))
        })
        .collect();
    images.sort_by_key(|(page, _)| *page);
    Ok(images)
}

/// Rebuild page text and mean word confidence (0-1) from Tesseract TSV.
///
/// Columns: level page_num block_num par_num line_num word_num left top
/// width height conf text. Word rows have level 5.
fn parse_tsv(tsv: &str) -> (String, Option<f64>) {
    let mut lines: Vec<String> = Vec::new();
    let mut current_line: Option<(u32, u32, u32)> = None;
    let mut confidences: Vec<f64> = Vec::new();

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.splitn(12, '\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let word = cols[11].trim();
        if word.is_empty() {
            continue;
        }

        let key = (
            cols[2].parse().unwrap_or(0),
            cols[3].parse().unwrap_or(0),
            cols[4].parse().unwrap_or(0),
        );
        match lines.last_mut() {
            Some(line) if current_line == Some(key) => {
                line.push(' ');
                line.push_str(word);
            }
            _ => {
                lines.push(word.to_string());
                current_line = Some(key);
            }
        }

        if let Ok(conf) = cols[10].trim().parse::<f64>() {
            if conf >= 0.0 {
                confidences.push(conf / 100.0);
            }
        }
    }

    let confidence = (!confidences.is_empty())
        .then(|| confidences.iter().sum::<f64>() / confidences.len() as f64);
    (lines.join("\n"), confidence)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t2550\t3300\t-1\t
4\t1\t1\t1\t1\t0\t100\t100\t800\t40\t-1\t
5\t1\t1\t1\t1\t1\t100\t100\t200\t40\t96.5\tInvoice
5\t1\t1\t1\t1\t2\t320\t100\t200\t40\t91.5\tnumber
5\t1\t1\t1\t2\t1\t100\t160\t200\t40\t88\t42
5\t1\t2\t1\t1\t1\t100\t400\t200\t40\t-1\t
";

    #[test]
    fn test_parse_tsv_rebuilds_lines() {
        let (text, confidence) = parse_tsv(TSV);
        assert_eq!(text, "Invoice number\n42");
        let confidence = confidence.unwrap();
        assert!((confidence - 0.92).abs() < 1e-9);
    }

    #[test]
    fn test_parse_tsv_empty_page() {
        let (text, confidence) = parse_tsv("level\tpage_num\n");
        assert_eq!(text, "");
        assert_eq!(confidence, None);
    }

    #[test]
    fn test_list_page_images_orders_by_number() {
        let temp = tempfile::tempdir().unwrap();
        for name in ["page-10.png", "page-02.png", "page-01.png", "chunk.pdf"] {
            std::fs::write(temp.path().join(name), b"x").unwrap();
        }

        let images = list_page_images(temp.path()).unwrap();
        let numbers: Vec<u32> = images.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, vec![1, 2, 10]);
        assert!(images[0].1.ends_with("page-01.png"));
    }

    #[test]
    fn test_capabilities_are_text_only() {
        let backend = TesseractBackend::new(TesseractConfig::default());
        assert_eq!(backend.capabilities(), Capabilities::TEXT);
        assert_eq!(backend.backend_type(), BackendType::Tesseract);
    }
}
