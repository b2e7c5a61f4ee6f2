use std::fmt;
use std::str::FromStr;

use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::etl_error;
use crate::types::{Cell, TableRow};

/// Number of change metadata values leading every staged row.
pub const CHANGE_METADATA_WIDTH: usize = 4;

/// Kind of change recorded by a staged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationCode {
    Insert,
    Update,
    Delete,
}

impl OperationCode {
    pub fn is_delete(&self) -> bool {
        matches!(self, OperationCode::Delete)
    }

    /// Returns the single letter code written to staged rows.
    pub fn as_code(&self) -> &'static str {
        match self {
            OperationCode::Insert => "I",
            OperationCode::Update => "U",
            OperationCode::Delete => "D",
        }
    }
}

impl fmt::Display for OperationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

impl FromStr for OperationCode {
    type Err = EtlError;

    /// Parses an operation code, ignoring case.
    ///
    /// `UD` and `UI` are the delete and insert halves of an update captured as two rows.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "I" | "INSERT" | "UI" => Ok(OperationCode::Insert),
            "U" | "UPDATE" => Ok(OperationCode::Update),
            "D" | "DELETE" | "UD" => Ok(OperationCode::Delete),
            _ => Err(etl_error!(
                ErrorKind::InvalidData,
                "Unknown change operation code",
                format!("operation code `{s}` is not one of I, U, D, UI, UD")
            )),
        }
    }
}

/// One staged change of a source row.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub operation: OperationCode,
    /// Primary ordering of the changes of a key.
    pub sequence_number: u64,
    /// Orders the changes sharing a sequence number.
    pub row_id: u64,
    /// Carried through as text, never used for ordering.
    pub commit_timestamp: String,
    /// Column values after the change, in table column order.
    pub payload: TableRow,
}

impl ChangeEvent {
    /// Returns the `(sequence_number, row_id)` position of the event.
    pub fn position(&self) -> (u64, u64) {
        (self.sequence_number, self.row_id)
    }

    /// Decodes a staged row laid out as operation, sequence number, row id, commit timestamp
    /// followed by `payload_width` column values.
    pub fn from_staged_row(row: TableRow, payload_width: usize) -> EtlResult<ChangeEvent> {
        let expected = CHANGE_METADATA_WIDTH + payload_width;
        if row.len() != expected {
            return Err(etl_error!(
                ErrorKind::InvalidData,
                "Staged row has the wrong number of values",
                format!("expected {expected} values, found {}", row.len())
            ));
        }

        let mut values = row.into_values().into_iter();
        let mut next = || values.next().unwrap_or(Cell::Null);

        let operation = match next() {
            Cell::String(code) => code.parse()?,
            other => {
                return Err(etl_error!(
                    ErrorKind::InvalidData,
                    "Change operation code is not text",
                    format!("found `{other}`")
                ));
            }
        };
        let sequence_number = parse_position(next(), "sequence number")?;
        let row_id = parse_position(next(), "row id")?;
        let commit_timestamp = match next() {
            Cell::Null => String::new(),
            other => other.to_string(),
        };

        Ok(ChangeEvent {
            operation,
            sequence_number,
            row_id,
            commit_timestamp,
            payload: TableRow::new(values.collect()),
        })
    }
}

fn parse_position(cell: Cell, what: &str) -> EtlResult<u64> {
    cell.to_u64().ok_or_else(|| {
        etl_error!(
            ErrorKind::InvalidData,
            "Change ordering value is not a non-negative integer",
            format!("{what} is `{cell}`")
        )
    })
}
