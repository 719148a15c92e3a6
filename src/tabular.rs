//! Missing-value inspection and repair for uploaded CSV files.
//!
//! A cell counts as missing when it is empty, holds one of the usual NA
//! markers (`NA`, `NaN`, `null`, ...), or is absent because its row is shorter
//! than the header.

use csv::{ByteRecord, ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use thiserror::Error;

use crate::error::AppError;

/// Value written into every missing cell by [`clean`].
pub const FILL_VALUE: &str = "0";

/// Cell values treated as missing, matching the common dataframe defaults.
const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, Error)]
pub enum TabularError {
    #[error("no columns to parse from file")]
    Empty,

    #[error("expected {expected} fields in line {line}, saw {found}")]
    RaggedRow {
        expected: usize,
        found: usize,
        line: u64,
    },

    #[error("{0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write CSV: {0}")]
    Write(String),
}

impl From<TabularError> for AppError {
    fn from(err: TabularError) -> Self {
        AppError::Parse(err.to_string())
    }
}

/// Shape and missing-cell count of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabularStats {
    pub rows: usize,
    pub columns: usize,
    pub missing: usize,
}

struct Table {
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

pub fn is_missing(cell: &str) -> bool {
    NA_TOKENS.contains(&cell)
}

fn parse(bytes: &[u8]) -> Result<Table, TabularError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(TabularError::Empty);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.len() > headers.len() {
            return Err(TabularError::RaggedRow {
                expected: headers.len(),
                found: record.len(),
                line: record.position().map(|p| p.line()).unwrap_or_default(),
            });
        }
        rows.push(record);
    }

    Ok(Table { headers, rows })
}

/// Count missing cells across every row and column.
pub fn inspect(bytes: &[u8]) -> Result<TabularStats, TabularError> {
    let table = parse(bytes)?;
    let columns = table.headers.len();

    let missing = table
        .rows
        .iter()
        .map(|row| {
            let absent = columns - row.len();
            row.iter().filter(|cell| is_missing(cell)).count() + absent
        })
        .sum();

    Ok(TabularStats {
        rows: table.rows.len(),
        columns,
        missing,
    })
}

/// Re-serialize the table with every missing cell replaced by [`FILL_VALUE`].
/// Header, column order and present cells are kept verbatim.
pub fn clean(bytes: &[u8]) -> Result<Vec<u8>, TabularError> {
    let table = parse(bytes)?;
    let columns = table.headers.len();

    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::with_capacity(bytes.len()));

    writer.write_record(&table.headers)?;
    for row in &table.rows {
        let mut filled = ByteRecord::with_capacity(row.as_byte_record().as_slice().len(), columns);
        for cell in row.iter() {
            let value = if is_missing(cell) { FILL_VALUE } else { cell };
            filled.push_field(value.as_bytes());
        }
        for _ in row.len()..columns {
            filled.push_field(FILL_VALUE.as_bytes());
        }
        writer.write_byte_record(&filled)?;
    }

    writer
        .into_inner()
        .map_err(|e| TabularError::Write(e.error().to_string()))
}
