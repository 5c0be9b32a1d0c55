//! CSV strategy: summary, per-column, row-block, and statistics chunks.

use serde_json::json;
use tracing::{debug, warn};

use super::stats::ColumnStatistics;
use super::{ChunkEmitter, extra, format_number};
use crate::config::ChunkingConfig;
use crate::document::{ChunkType, Priority};
use crate::error::{RagError, Result};
use crate::formats::{ColumnType, CsvMetadata, parse_number};

const SAMPLE_ROWS: usize = 3;

/// One CSV record: its source text and its split fields.
struct Record<'a> {
    raw: &'a str,
    fields: Vec<String>,
}

/// A parsed CSV table: headers, column types, and the data records.
struct Table<'a> {
    headers: &'a [String],
    types: Vec<ColumnType>,
    rows: Vec<Record<'a>>,
    reported_rows: usize,
}

impl Table<'_> {
    fn column(&self, idx: usize) -> impl Iterator<Item = &str> {
        self.rows.iter().map(move |row| row.fields.get(idx).map(String::as_str).unwrap_or(""))
    }
}

pub(super) fn chunk(
    content: &str,
    metadata: &CsvMetadata,
    config: &ChunkingConfig,
    emitter: &mut ChunkEmitter<'_>,
) -> Result<()> {
    let mut records = parse_records(content, metadata.delimiter)?;
    if records.len() < 2 {
        debug!(record_count = records.len(), "csv has no data rows, nothing to chunk");
        return Ok(());
    }
    let rows = records.split_off(1);

    let mut table = Table {
        headers: &metadata.headers,
        types: Vec::new(),
        rows,
        reported_rows: metadata.row_count,
    };
    table.types = (0..table.headers.len())
        .map(|idx| match metadata.column_types.get(&table.headers[idx]) {
            Some(column_type) => *column_type,
            None => ColumnType::infer(table.column(idx)),
        })
        .collect();

    if table.reported_rows != 0 && table.reported_rows != table.rows.len() {
        warn!(
            reported = table.reported_rows,
            parsed = table.rows.len(),
            "csv row count differs from extraction metadata"
        );
    }

    emit_summary(&table, emitter);
    emit_columns(&table, emitter);
    emit_row_blocks(&table, config.csv_rows_per_block, emitter);
    emit_statistics(&table, emitter);
    Ok(())
}

fn emit_summary(table: &Table<'_>, emitter: &mut ChunkEmitter<'_>) {
    let rows = if table.reported_rows != 0 && table.reported_rows != table.rows.len() {
        format!("{} (extraction reported {})", table.rows.len(), table.reported_rows)
    } else {
        table.rows.len().to_string()
    };
    let mut text = format!(
        "CSV Data Summary: {}\nRows: {rows} | Columns: {}\n\nColumns:\n",
        emitter.document_name(),
        table.headers.len()
    );
    for (header, column_type) in table.headers.iter().zip(&table.types) {
        text.push_str(&format!("- {header} ({})\n", column_type.as_str()));
    }

    text.push_str("\nSample rows:\n");
    for (i, row) in table.rows.iter().take(SAMPLE_ROWS).enumerate() {
        let cells: Vec<String> = table
            .headers
            .iter()
            .enumerate()
            .map(|(idx, h)| {
                let value = row.fields.get(idx).map(String::as_str).unwrap_or("");
                format!("{h}: {value}")
            })
            .collect();
        text.push_str(&format!("Row {}: {}\n", i + 1, cells.join(", ")));
    }

    emitter.emit(
        ChunkType::CsvSummary,
        Some(Priority::High),
        &text,
        extra([
            ("rowCount", json!(table.rows.len())),
            ("columnCount", json!(table.headers.len())),
            ("headers", json!(table.headers)),
        ]),
    );
}

fn emit_columns(table: &Table<'_>, emitter: &mut ChunkEmitter<'_>) {
    for (idx, header) in table.headers.iter().enumerate() {
        let values: Vec<&str> =
            table.column(idx).map(str::trim).filter(|v| !v.is_empty()).collect();
        let column_type = table.types[idx];

        let heading = format!(
            "Column: {header} ({}) from {}\n{} values:",
            column_type.as_str(),
            emitter.document_name(),
            values.len()
        );
        let mut body = String::new();
        for value in &values {
            body.push_str(&format!("{header}: {value}\n"));
        }

        emitter.emit_continued(
            ChunkType::CsvColumn,
            Some(Priority::Medium),
            &heading,
            &format!("Column: {header} (cont.)"),
            &body,
            extra([
                ("columnName", json!(header)),
                ("columnType", json!(column_type)),
                ("valueCount", json!(values.len())),
            ]),
        );
    }
}

fn emit_row_blocks(table: &Table<'_>, rows_per_block: usize, emitter: &mut ChunkEmitter<'_>) {
    for (block_idx, block) in table.rows.chunks(rows_per_block).enumerate() {
        let row_start = block_idx * rows_per_block + 1;
        let row_end = row_start + block.len() - 1;

        let mut heading = String::new();
        if block_idx == 0 {
            heading.push_str(&format!("Headers: {}\n", table.headers.join(", ")));
        }
        heading.push_str(&format!("Rows {row_start}-{row_end}:"));
        let mut body = String::new();
        for record in block {
            body.push_str(record.raw);
            body.push('\n');
        }

        emitter.emit_continued(
            ChunkType::CsvRows,
            Some(Priority::Low),
            &heading,
            &format!("Rows {row_start}-{row_end} (cont.)"),
            &body,
            extra([("rowStart", json!(row_start)), ("rowEnd", json!(row_end))]),
        );
    }
}

fn emit_statistics(table: &Table<'_>, emitter: &mut ChunkEmitter<'_>) {
    for (idx, header) in table.headers.iter().enumerate() {
        if !table.types[idx].is_numeric() {
            continue;
        }
        let values: Vec<f64> = table.column(idx).filter_map(parse_number).collect();
        let Some(stats) = ColumnStatistics::compute(&values) else {
            debug!(column = %header, "numeric column has no parseable values");
            continue;
        };

        let text = format!(
            "Statistics for column {header} in {}\n\
             Count: {}\nMin: {}\nMax: {}\nMean: {}\nMedian: {}\nQ1: {}\nQ3: {}\nRange: {}",
            emitter.document_name(),
            stats.count,
            format_number(stats.min),
            format_number(stats.max),
            format_number(stats.mean),
            format_number(stats.median),
            format_number(stats.q1),
            format_number(stats.q3),
            format_number(stats.range),
        );

        emitter.emit(
            ChunkType::CsvStatistics,
            Some(Priority::Medium),
            &text,
            extra([("columnName", json!(header)), ("statistics", json!(stats))]),
        );
    }
}

/// Split `content` into records, honouring double-quoted fields.
///
/// A quoted field may contain the delimiter, doubled quotes and line breaks.
/// Blank lines between records are skipped.
fn parse_records(content: &str, delimiter: char) -> Result<Vec<Record<'_>>> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut record_start = 0;
    let mut record_line = 1;
    let mut line = 1;
    let mut chars = content.char_indices().peekable();

    while let Some((byte_idx, c)) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek().is_some_and(|(_, next)| *next == '"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
            }
            '\n' if !in_quotes => {
                fields.push(field.trim().to_string());
                field.clear();
                let raw = &content[record_start..byte_idx];
                push_record(&mut records, raw, std::mem::take(&mut fields));
                line += 1;
                record_start = byte_idx + 1;
                record_line = line;
            }
            c if c == delimiter && !in_quotes => {
                fields.push(field.trim().to_string());
                field.clear();
            }
            c => {
                if c == '\n' {
                    line += 1;
                }
                field.push(c);
            }
        }
    }

    if in_quotes {
        let message = format!("csv line {record_line}: unterminated quoted field");
        return Err(RagError::ChunkingError(message));
    }
    fields.push(field.trim().to_string());
    push_record(&mut records, &content[record_start..], fields);
    Ok(records)
}

fn push_record<'a>(records: &mut Vec<Record<'a>>, raw: &'a str, fields: Vec<String>) {
    let raw = raw.trim_end_matches('\r');
    if !raw.trim().is_empty() {
        records.push(Record { raw, fields });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(content: &str, delimiter: char) -> Vec<Vec<String>> {
        parse_records(content, delimiter)
            .unwrap()
            .into_iter()
            .map(|record| record.fields)
            .collect()
    }

    #[test]
    fn splits_quoted_fields() {
        let rows = fields(r#"a, "b, c" ,"say ""hi""",d"#, ',');
        assert_eq!(rows, vec![vec!["a", "b, c", r#"say "hi""#, "d"]]);
    }

    #[test]
    fn honours_other_delimiters() {
        assert_eq!(fields("x;y;", ';'), vec![vec!["x", "y", ""]]);
    }

    #[test]
    fn quoted_fields_may_span_lines() {
        let content = "domain,notes\r\nalpha.com,\"guest posts\nno casino\"\r\n\nbeta.io,ok\n";
        let records = parse_records(content, ',').unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[1].fields, vec!["alpha.com", "guest posts\nno casino"]);
        assert_eq!(records[1].raw, "alpha.com,\"guest posts\nno casino\"");
        assert_eq!(records[2].raw, "beta.io,ok");
    }

    #[test]
    fn rejects_unterminated_quotes() {
        let err = parse_records("h\nok\na,\"open\nstill open", ',').err();
        assert!(matches!(err, Some(RagError::ChunkingError(m)) if m.contains("line 3")));
    }
}
