//! XLSX strategy: workbook summary, sheet overviews, and column analyses.

use serde_json::json;

use super::{ChunkEmitter, extra};
use crate::document::{ChunkType, Priority};
use crate::formats::{ColumnType, SheetMetadata, XlsxMetadata};

pub(super) fn chunk(metadata: &XlsxMetadata, emitter: &mut ChunkEmitter<'_>) {
    emit_workbook_summary(metadata, emitter);

    for (sheet_index, sheet) in metadata.sheets.iter().enumerate() {
        emit_sheet_overview(sheet, sheet_index, emitter);
        for header in &sheet.headers {
            emit_column_analysis(sheet, sheet_index, header, emitter);
        }
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

fn column_type(sheet: &SheetMetadata, header: &str) -> ColumnType {
    sheet.column_types.get(header).copied().unwrap_or_default()
}

fn emit_workbook_summary(metadata: &XlsxMetadata, emitter: &mut ChunkEmitter<'_>) {
    let names: Vec<&str> = metadata.sheets.iter().map(|s| s.name.as_str()).collect();
    let mut text = format!(
        "Excel Workbook: {}\nSheets: {} ({})\n\
         Contains formulas: {}\nContains charts: {}\nContains macros: {}\n\n\
         Sheet dimensions:\n",
        emitter.document_name(),
        metadata.sheets.len(),
        names.join(", "),
        yes_no(metadata.has_formulas),
        yes_no(metadata.has_charts),
        yes_no(metadata.has_macros),
    );
    for sheet in &metadata.sheets {
        text.push_str(&format!(
            "- {}: {} rows x {} columns\n",
            sheet.name, sheet.row_count, sheet.column_count
        ));
    }

    emitter.emit(
        ChunkType::XlsxSummary,
        Some(Priority::High),
        &text,
        extra([
            ("sheetCount", json!(metadata.sheets.len())),
            ("sheetNames", json!(names)),
            ("hasFormulas", json!(metadata.has_formulas)),
            ("hasCharts", json!(metadata.has_charts)),
            ("hasMacros", json!(metadata.has_macros)),
        ]),
    );
}

fn emit_sheet_overview(sheet: &SheetMetadata, sheet_index: usize, emitter: &mut ChunkEmitter<'_>) {
    let mut text = format!(
        "Sheet \"{}\" in {}\nDimensions: {} rows x {} columns\nHeaders: {}\n",
        sheet.name,
        emitter.document_name(),
        sheet.row_count,
        sheet.column_count,
        if sheet.headers.is_empty() { "(none)".to_string() } else { sheet.headers.join(", ") },
    );
    if !sheet.headers.is_empty() {
        text.push_str("\nColumn types:\n");
        for header in &sheet.headers {
            text.push_str(&format!("- {header}: {}\n", column_type(sheet, header).as_str()));
        }
    }

    emitter.emit(
        ChunkType::XlsxSheetOverview,
        Some(Priority::Medium),
        &text,
        extra([
            ("sheetName", json!(sheet.name)),
            ("sheetIndex", json!(sheet_index)),
            ("rowCount", json!(sheet.row_count)),
            ("columnCount", json!(sheet.column_count)),
        ]),
    );
}

fn emit_column_analysis(
    sheet: &SheetMetadata,
    sheet_index: usize,
    header: &str,
    emitter: &mut ChunkEmitter<'_>,
) {
    let column_type = column_type(sheet, header);
    let description = match column_type {
        ColumnType::Number | ColumnType::Integer => {
            "Numeric column suitable for calculations such as sums, averages and comparisons."
        }
        ColumnType::Date => "Date column suited to temporal analysis such as trends over time.",
        _ => "Text column suited to categorical analysis such as grouping and filtering.",
    };

    let text = format!(
        "Column \"{header}\" in sheet \"{}\" of {}\nType: {}\n{description}",
        sheet.name,
        emitter.document_name(),
        column_type.as_str(),
    );

    emitter.emit(
        ChunkType::XlsxColumnAnalysis,
        Some(Priority::Low),
        &text,
        extra([
            ("sheetName", json!(sheet.name)),
            ("sheetIndex", json!(sheet_index)),
            ("columnName", json!(header)),
            ("columnType", json!(column_type)),
        ]),
    );
}
