//! Hive delimited text rows: fields separated by tabs, `\N` for NULL, and `\\`, `\t`, `\n`,
//! `\r` escapes inside values.
//!
//! Values are decoded as [`Cell::String`] or [`Cell::Null`]; typing is left to the reader.

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::types::{Cell, TableRow};

const FIELD_SEPARATOR: char = '\t';

const NULL_MARKER: &str = "\\N";

/// Encodes `row` as one line, without the line terminator.
pub fn encode_row(row: &TableRow) -> String {
    let mut line = String::new();
    for (index, cell) in row.values().iter().enumerate() {
        if index > 0 {
            line.push(FIELD_SEPARATOR);
        }
        encode_cell(cell, &mut line);
    }

    line
}

/// Decodes one line, without its terminator, into a row.
pub fn decode_line(line: &str) -> EtlResult<TableRow> {
    line.split(FIELD_SEPARATOR)
        .map(decode_field)
        .collect::<EtlResult<Vec<_>>>()
        .map(TableRow::new)
}

fn encode_cell(cell: &Cell, out: &mut String) {
    if cell.is_null() {
        out.push_str(NULL_MARKER);
        return;
    }

    for ch in cell.to_string().chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
}

fn decode_field(field: &str) -> EtlResult<Cell> {
    if field == NULL_MARKER {
        return Ok(Cell::Null);
    }

    let mut value = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            value.push(ch);
            continue;
        }

        match chars.next() {
            Some('\\') => value.push('\\'),
            Some('t') => value.push('\t'),
            Some('n') => value.push('\n'),
            Some('r') => value.push('\r'),
            Some(other) => {
                value.push('\\');
                value.push(other);
            }
            None => bail!(
                ErrorKind::InvalidData,
                "Delimited field ends with a dangling escape",
                format!("field `{field}`")
            ),
        }
    }

    Ok(Cell::String(value))
}
