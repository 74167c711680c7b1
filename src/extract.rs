//! Format-specific text extraction.
//!
//! Turns a raw upload into an ordered list of [`TextUnit`]s: one per PDF
//! page, DOCX body paragraph, non-blank text line, or spreadsheet/CSV row.
//! Blank units are dropped here, so an empty result means the document had
//! no usable text (the caller reports that; it is not an error).
//!
//! | Format | Unit | Metadata |
//! |--------|------|----------|
//! | `pdf`  | page with text | `page_number` (1-based) |
//! | `docx` | non-empty body paragraph | `paragraph_number` (1-based) |
//! | `txt`  | non-blank line | none |
//! | `xlsx` | non-empty row, every sheet | `sheet_name` |
//! | `csv`  | non-empty row | `row_index` in the cleaned table |
//!
//! Spreadsheet rows are rendered as `"col: value, col: value"` in column
//! order, after dropping fully empty rows and columns and filling remaining
//! gaps with `"N/A"`.

use std::io::{Cursor, Read};
use std::path::Path;

use calamine::{Data, Reader, Xlsx};
use quick_xml::events::Event;
use thiserror::Error;

use crate::models::{TextUnit, UnitMetadata};

/// Placeholder written for empty cells in otherwise populated rows.
pub const MISSING_CELL: &str = "N/A";

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extraction failure. Never a panic; the upload reports it and moves on.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
    #[error("XLSX extraction failed: {0}")]
    Xlsx(String),
    #[error("CSV extraction failed: {0}")]
    Csv(String),
    #[error("Text is not valid UTF-8: {0}")]
    Encoding(String),
}

/// The closed set of formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Txt,
    Xlsx,
    Csv,
}

impl DocumentFormat {
    pub const ALL: [DocumentFormat; 5] = [
        DocumentFormat::Pdf,
        DocumentFormat::Docx,
        DocumentFormat::Txt,
        DocumentFormat::Xlsx,
        DocumentFormat::Csv,
    ];

    /// Resolve the format from a filename's extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Result<Self, ExtractError> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" => Ok(DocumentFormat::Docx),
            "txt" => Ok(DocumentFormat::Txt),
            "xlsx" => Ok(DocumentFormat::Xlsx),
            "csv" => Ok(DocumentFormat::Csv),
            _ => Err(ExtractError::UnsupportedFormat(filename.to_string())),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Txt => "txt",
            DocumentFormat::Xlsx => "xlsx",
            DocumentFormat::Csv => "csv",
        }
    }
}

/// Extract text units from a document in the given format.
pub fn extract_units(bytes: &[u8], format: DocumentFormat) -> Result<Vec<TextUnit>, ExtractError> {
    match format {
        DocumentFormat::Pdf => extract_pdf(bytes),
        DocumentFormat::Docx => extract_docx(bytes),
        DocumentFormat::Txt => extract_txt(bytes),
        DocumentFormat::Xlsx => extract_xlsx(bytes),
        DocumentFormat::Csv => extract_csv(bytes),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<Vec<TextUnit>, ExtractError> {
    // pdf-extract panics on some malformed inputs.
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| ExtractError::Pdf("decoder panicked on malformed input".to_string()))?
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;

    Ok(pages
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(idx, text)| {
            TextUnit::new(
                text,
                UnitMetadata::Page {
                    page_number: idx + 1,
                },
            )
        })
        .collect())
}

fn extract_txt(bytes: &[u8]) -> Result<Vec<TextUnit>, ExtractError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ExtractError::Encoding(e.to_string()))?;
    Ok(text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| TextUnit::new(line, UnitMetadata::empty()))
        .collect())
}

// ============ DOCX ============

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Docx(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Docx(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<Vec<TextUnit>, ExtractError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Docx(e.to_string()))?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    let paragraphs = docx_body_paragraphs(&xml)?;

    Ok(paragraphs
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(idx, text)| {
            TextUnit::new(
                text,
                UnitMetadata::Paragraph {
                    paragraph_number: idx + 1,
                },
            )
        })
        .collect())
}

/// Collect the text of every body-level `w:p`, empty ones included, so
/// paragraph numbers match the document's own ordering. Paragraphs inside
/// tables are skipped; paragraphs nested in another paragraph (text boxes)
/// contribute to their outer paragraph.
fn docx_body_paragraphs(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut table_depth = 0usize;
    let mut para_depth = 0usize;
    let mut run_depth = 0usize;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"tbl" => table_depth += 1,
                b"p" if table_depth == 0 => {
                    if para_depth == 0 {
                        current.clear();
                    }
                    para_depth += 1;
                }
                b"r" => run_depth += 1,
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"p" if table_depth == 0 && para_depth == 0 => paragraphs.push(String::new()),
                b"tab" if para_depth > 0 && run_depth > 0 => current.push('\t'),
                b"br" | b"cr" if para_depth > 0 && run_depth > 0 => current.push('\n'),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text && para_depth > 0 => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Docx(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"tbl" => table_depth = table_depth.saturating_sub(1),
                b"p" if table_depth == 0 && para_depth > 0 => {
                    para_depth -= 1;
                    if para_depth == 0 {
                        paragraphs.push(std::mem::take(&mut current));
                    }
                }
                b"r" => run_depth = run_depth.saturating_sub(1),
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

// ============ Tables (XLSX / CSV) ============

/// A header row plus data rows, where `None` marks an empty cell.
#[derive(Debug, Default)]
struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl Table {
    /// Build a table whose first row is the header.
    fn from_grid(mut grid: Vec<Vec<Option<String>>>) -> Self {
        if grid.is_empty() {
            return Table::default();
        }
        let header_row = grid.remove(0);
        let width = grid
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(header_row.len()))
            .max()
            .unwrap_or(0);
        let headers = (0..width)
            .map(|i| match header_row.get(i) {
                Some(Some(name)) => name.clone(),
                _ => format!("Unnamed: {}", i),
            })
            .collect();
        Table {
            headers,
            rows: grid,
        }
    }

    /// Drop fully empty rows, then fully empty columns, and render each
    /// surviving row as `"col: value, ..."` with gaps filled by [`MISSING_CELL`].
    fn render_rows(&self) -> Vec<String> {
        let rows: Vec<&Vec<Option<String>>> = self
            .rows
            .iter()
            .filter(|row| row.iter().any(Option::is_some))
            .collect();

        let columns: Vec<usize> = (0..self.headers.len())
            .filter(|&col| rows.iter().any(|row| matches!(row.get(col), Some(Some(_)))))
            .collect();

        rows.iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|&col| {
                        let value = row
                            .get(col)
                            .and_then(|cell| cell.as_deref())
                            .unwrap_or(MISSING_CELL);
                        format!("{}: {}", self.headers[col], value)
                    })
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .collect()
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Render a float the way a spreadsheet user reads it: `3` rather than `3.0`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn cell_value(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => non_empty(s),
        Data::Float(f) => Some(format_number(*f)),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(if *b { "True" } else { "False" }.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => Some(value.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Some(format_number(dt.as_f64())),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => non_empty(s),
        other => non_empty(&other.to_string()),
    }
}

fn extract_xlsx(bytes: &[u8]) -> Result<Vec<TextUnit>, ExtractError> {
    let mut workbook: Xlsx<_> =
        Xlsx::new(Cursor::new(bytes)).map_err(|e| ExtractError::Xlsx(e.to_string()))?;

    let mut units = Vec::new();
    for sheet_name in workbook.sheet_names().to_vec() {
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| ExtractError::Xlsx(format!("sheet '{}': {}", sheet_name, e)))?;
        let grid: Vec<Vec<Option<String>>> = range
            .rows()
            .map(|row| row.iter().map(cell_value).collect())
            .collect();

        for text in Table::from_grid(grid).render_rows() {
            units.push(TextUnit::new(
                text,
                UnitMetadata::Sheet {
                    sheet_name: sheet_name.clone(),
                },
            ));
        }
    }
    Ok(units)
}

fn extract_csv(bytes: &[u8]) -> Result<Vec<TextUnit>, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut grid: Vec<Vec<Option<String>>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ExtractError::Csv(e.to_string()))?;
        grid.push(record.iter().map(non_empty).collect());
    }

    Ok(Table::from_grid(grid)
        .render_rows()
        .into_iter()
        .enumerate()
        .map(|(row_index, text)| TextUnit::new(text, UnitMetadata::Row { row_index }))
        .collect())
}
