//! Transformer: raw delimited payload -> normalized table -> staging bytes.
//!
//! Parsing uses arrow-csv for the input dialect (delimiter, header,
//! quoting); everything after that is config-driven: rename, per-column
//! typing, string limits, drop/add/replace, date normalization. The
//! normalized table renders to the warehouse bulk-load wire format with a
//! configurable delimiter and NULL sentinel and backslash-escaped
//! delimiter characters inside values.

use std::borrow::Cow;
use std::io::Cursor;
use std::sync::Arc;

use arrow_array::{Array, StringArray};
use arrow_csv::ReaderBuilder;
use arrow_csv::reader::Format;
use arrow_schema::{DataType, Field, Schema};
use chrono::{NaiveDate, NaiveDateTime};

use crate::config::FeedConfig;
use crate::error::ContentError;

/// Rows sampled when probing the payload's field count.
const INFER_SAMPLE_ROWS: usize = 100;

/// Canonical rendering for normalized timestamps.
const TIMESTAMP_RENDER: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
enum ColumnType {
    Text,
    Int,
    Bool,
    Timestamp { format: String },
}

/// A normalized table ready for staging. `None` cells are NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Render the staging wire format: header row, one line per row,
    /// `null_as` for NULL cells, delimiter occurrences inside values
    /// escaped with a backslash (COPY runs with ESCAPE).
    pub fn to_delimited(&self, delim: char, null_as: &str) -> Vec<u8> {
        let sep = delim.to_string();
        let escaped_sep = format!("\\{}", delim);

        let mut out = String::new();
        out.push_str(&self.columns.join(&sep));
        out.push('\n');
        for row in &self.rows {
            let line: Vec<Cow<'_, str>> = row
                .iter()
                .map(|cell| match cell {
                    None => Cow::Borrowed(null_as),
                    Some(value) if value.contains(delim) => {
                        Cow::Owned(value.replace(delim, &escaped_sep))
                    }
                    Some(value) => Cow::Borrowed(value.as_str()),
                })
                .collect();
            out.push_str(&line.join(&sep));
            out.push('\n');
        }
        out.into_bytes()
    }
}

/// Parse, validate, and normalize one raw payload per the feed config.
pub fn transform(raw: &[u8], config: &FeedConfig) -> Result<Table, ContentError> {
    if raw.is_empty() {
        return Err(ContentError::Empty);
    }
    let text = std::str::from_utf8(raw).map_err(|e| ContentError::Encoding(e.to_string()))?;
    let text: Cow<'_, str> = if config.strip_quotes {
        Cow::Owned(text.replace('"', ""))
    } else {
        Cow::Borrowed(text)
    };

    check_column_count(text.as_bytes(), config)?;

    let cells = parse_cells(text.as_bytes(), config)?;
    if cells.is_empty() {
        return Err(ContentError::NoDataRows);
    }

    let mut table = Table {
        columns: config.columns.clone(),
        rows: cells,
    };

    apply_string_limits(&mut table, config);
    apply_drops(&mut table, config);
    apply_adds(&mut table, config);
    apply_replacements(&mut table, config);
    apply_types(&mut table, config)?;

    Ok(table)
}

fn input_format(config: &FeedConfig) -> Format {
    Format::default()
        .with_header(!config.no_header)
        .with_delimiter(config.delim as u8)
}

/// Probe the payload's field count via schema inference and reject a
/// mismatch in either direction; silently taking a column prefix would
/// load misaligned data.
fn check_column_count(bytes: &[u8], config: &FeedConfig) -> Result<(), ContentError> {
    let (inferred, _) = input_format(config)
        .infer_schema(Cursor::new(bytes), Some(INFER_SAMPLE_ROWS))
        .map_err(|e| ContentError::Malformed(e.to_string()))?;

    let found = inferred.fields().len();
    if found != config.column_count {
        return Err(ContentError::ColumnCount {
            expected: config.column_count,
            found,
        });
    }
    Ok(())
}

/// Read every record as text cells, renaming columns to the configured
/// names as they come in. Never infers schema from data.
fn parse_cells(bytes: &[u8], config: &FeedConfig) -> Result<Vec<Vec<Option<String>>>, ContentError> {
    let fields: Vec<Field> = config
        .columns
        .iter()
        .map(|name| Field::new(name.as_str(), DataType::Utf8, true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let reader = ReaderBuilder::new(schema)
        .with_header(!config.no_header)
        .with_delimiter(config.delim as u8)
        .build(Cursor::new(bytes))
        .map_err(|e| ContentError::Malformed(e.to_string()))?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| ContentError::Malformed(e.to_string()))?;
        let columns: Vec<&StringArray> = (0..batch.num_columns())
            .map(|i| {
                batch
                    .column(i)
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .expect("all columns read as Utf8")
            })
            .collect();
        for row in 0..batch.num_rows() {
            let cells = columns
                .iter()
                .map(|col| {
                    if col.is_null(row) {
                        None
                    } else {
                        Some(col.value(row).to_string())
                    }
                })
                .collect();
            rows.push(cells);
        }
    }
    Ok(rows)
}

fn column_index(table: &Table, name: &str) -> Option<usize> {
    table.columns.iter().position(|c| c == name)
}

fn apply_string_limits(table: &mut Table, config: &FeedConfig) {
    for (name, limit) in &config.column_string_limit {
        let Some(idx) = column_index(table, name) else {
            continue;
        };
        for row in &mut table.rows {
            if let Some(value) = &row[idx] {
                if value.chars().count() > *limit {
                    row[idx] = Some(value.chars().take(*limit).collect());
                }
            }
        }
    }
}

fn apply_drops(table: &mut Table, config: &FeedConfig) {
    for name in &config.drop_columns {
        let Some(idx) = column_index(table, name) else {
            continue;
        };
        table.columns.remove(idx);
        for row in &mut table.rows {
            row.remove(idx);
        }
    }
}

fn apply_adds(table: &mut Table, config: &FeedConfig) {
    for (name, value) in &config.add_columns {
        table.columns.push(name.clone());
        for row in &mut table.rows {
            row.push(Some(value.clone()));
        }
    }
}

fn apply_replacements(table: &mut Table, config: &FeedConfig) {
    for rule in &config.replace {
        let Some(idx) = column_index(table, &rule.field) else {
            continue;
        };
        for row in &mut table.rows {
            if row[idx].as_deref() == Some(rule.old.as_str()) {
                row[idx] = Some(rule.new.clone());
            }
        }
    }
}

fn column_type(config: &FeedConfig, name: &str) -> ColumnType {
    if let Some(rule) = config.dateformat.iter().find(|d| d.field == name) {
        return ColumnType::Timestamp {
            format: rule.format.clone(),
        };
    }
    if config.dtype_dic_ints.iter().any(|c| c == name) {
        return ColumnType::Int;
    }
    if config.dtype_dic_bools.iter().any(|c| c == name) {
        return ColumnType::Bool;
    }
    ColumnType::Text
}

/// Cast every surviving column to its configured type, rendering the
/// canonical text for the wire. Empty cells of typed columns are NULL;
/// empty text cells stay empty strings.
fn apply_types(table: &mut Table, config: &FeedConfig) -> Result<(), ContentError> {
    let types: Vec<ColumnType> = table
        .columns
        .iter()
        .map(|name| column_type(config, name))
        .collect();

    for (idx, ty) in types.iter().enumerate() {
        if *ty == ColumnType::Text {
            continue;
        }
        let name = table.columns[idx].clone();
        for row in &mut table.rows {
            let value = match row[idx].take() {
                None => continue,
                Some(v) => v,
            };
            let trimmed = value.trim();
            if trimmed.is_empty() {
                continue; // typed NULL
            }
            row[idx] = Some(cast_cell(trimmed, ty, &name, &value)?);
        }
    }
    Ok(())
}

fn cast_cell(
    trimmed: &str,
    ty: &ColumnType,
    column: &str,
    original: &str,
) -> Result<String, ContentError> {
    match ty {
        ColumnType::Text => Ok(original.to_string()),
        ColumnType::Int => trimmed
            .parse::<i64>()
            .map(|n| n.to_string())
            .map_err(|_| ContentError::BadCast {
                column: column.to_string(),
                ty: "int",
                value: original.to_string(),
            }),
        ColumnType::Bool => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Ok("True".to_string()),
            "false" | "f" | "0" => Ok("False".to_string()),
            _ => Err(ContentError::BadCast {
                column: column.to_string(),
                ty: "bool",
                value: original.to_string(),
            }),
        },
        ColumnType::Timestamp { format } => {
            if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(dt.format(TIMESTAMP_RENDER).to_string());
            }
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
                let midnight = date.and_hms_opt(0, 0, 0).expect("midnight is valid");
                return Ok(midnight.format(TIMESTAMP_RENDER).to_string());
            }
            Err(ContentError::BadCast {
                column: column.to_string(),
                ty: "timestamp",
                value: original.to_string(),
            })
        }
    }
}
