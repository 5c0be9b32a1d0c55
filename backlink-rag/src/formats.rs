//! Structural metadata produced by format-specific text extraction.
//!
//! Extraction (PDF/DOCX/XLSX/CSV parsing) happens outside this crate. It hands
//! over the extracted text plus one of these descriptors, which the chunking
//! engine reads to pick a strategy.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Structural metadata for one extracted document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum DocumentMetadata {
    Csv(CsvMetadata),
    Xlsx(XlsxMetadata),
    Docx(DocxMetadata),
    Pdf(PdfMetadata),
}

/// Detected type of a tabular column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    String,
    Number,
    Integer,
    Date,
    Boolean,
    Empty,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Number => "number",
            ColumnType::Integer => "integer",
            ColumnType::Date => "date",
            ColumnType::Boolean => "boolean",
            ColumnType::Empty => "empty",
        }
    }

    /// Whether statistics can be computed over the column.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Number | ColumnType::Integer)
    }

    /// Infer a column type from its raw cell values.
    ///
    /// Blank cells are ignored. A column qualifies for a type only if every
    /// non-blank value does.
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let values: Vec<&str> =
            values.into_iter().map(str::trim).filter(|v| !v.is_empty()).collect();
        if values.is_empty() {
            return ColumnType::Empty;
        }
        if values.iter().all(|v| v.parse::<i64>().is_ok()) {
            return ColumnType::Integer;
        }
        if values.iter().all(|v| parse_number(v).is_some()) {
            return ColumnType::Number;
        }
        if values.iter().all(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "false")) {
            return ColumnType::Boolean;
        }
        if values.iter().all(|v| looks_like_date(v)) {
            return ColumnType::Date;
        }
        ColumnType::String
    }
}

/// Parse a numeric cell, tolerating currency signs and thousands separators.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String =
        raw.trim().chars().filter(|c| !matches!(c, '$' | ',' | ' ')).collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn looks_like_date(value: &str) -> bool {
    use chrono::{DateTime, NaiveDate};

    const FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y", "%Y/%m/%d"];
    DateTime::parse_from_rfc3339(value).is_ok()
        || FORMATS.iter().any(|f| NaiveDate::parse_from_str(value, f).is_ok())
}

/// Descriptor of an extracted CSV file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CsvMetadata {
    pub headers: Vec<String>,
    /// Detected type per header; headers missing here are inferred from data.
    #[serde(default)]
    pub column_types: HashMap<String, ColumnType>,
    /// Data rows as counted by extraction (excluding the header line).
    #[serde(default)]
    pub row_count: usize,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_delimiter() -> char {
    ','
}

impl CsvMetadata {
    pub fn new(headers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            column_types: HashMap::new(),
            row_count: 0,
            delimiter: default_delimiter(),
        }
    }

    pub fn with_column_type(mut self, header: impl Into<String>, column_type: ColumnType) -> Self {
        self.column_types.insert(header.into(), column_type);
        self
    }
}

/// Descriptor of one worksheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SheetMetadata {
    pub name: String,
    pub row_count: usize,
    pub column_count: usize,
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub column_types: HashMap<String, ColumnType>,
}

/// Descriptor of an extracted XLSX workbook.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct XlsxMetadata {
    pub sheets: Vec<SheetMetadata>,
    #[serde(default)]
    pub has_formulas: bool,
    #[serde(default)]
    pub has_charts: bool,
    #[serde(default)]
    pub has_macros: bool,
}

/// A heading in a word-processor document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Heading {
    /// 1 for top-level headings.
    pub level: u8,
    pub text: String,
}

/// Descriptor of an extracted DOCX document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocxMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub page_count: Option<usize>,
    /// Word count reported by extraction; computed from the text when absent.
    #[serde(default)]
    pub word_count: Option<usize>,
    #[serde(default)]
    pub headings: Vec<Heading>,
    #[serde(default)]
    pub table_count: usize,
    #[serde(default)]
    pub list_count: usize,
}

/// Descriptor of an extracted PDF document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PdfMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    /// Extracted text of each page, in page order.
    pub pages: Vec<String>,
    #[serde(default)]
    pub word_count: Option<usize>,
}
