//! Line oriented reducer run by an external SQL engine as a `TRANSFORM` step.
//!
//! The engine feeds staged rows, already distributed and sorted by key, sequence number and
//! row id, as delimited text lines. The reducer writes the terminal row of every surviving key
//! in the same format.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::bail;
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::merge::reducer::{ReduceStats, Reducer};
use crate::types::{CHANGE_METADATA_WIDTH, ChangeEvent};
use crate::warehouse::codec::{decode_line, encode_row};

/// Layout of the rows fed to [`reduce_stream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReducerSpec {
    key_indices: Vec<usize>,
    payload_width: usize,
}

impl ReducerSpec {
    /// Builds the layout from comma separated key names and input column names.
    ///
    /// The first four input columns are the change metadata; keys are looked up among the
    /// remaining payload columns.
    pub fn from_lists(keys: &str, columns: &str) -> EtlResult<ReducerSpec> {
        let columns = split_list(columns);
        let keys = split_list(keys);

        if columns.len() <= CHANGE_METADATA_WIDTH {
            bail!(
                ErrorKind::MergePlanError,
                "Reducer input has no payload columns",
                format!("{} input columns", columns.len())
            );
        }
        if keys.is_empty() {
            bail!(ErrorKind::MergePlanError, "Reducer has no key columns");
        }

        let payload = &columns[CHANGE_METADATA_WIDTH..];
        let key_indices = keys
            .iter()
            .map(|key| {
                payload.iter().position(|column| column == key).ok_or_else(|| {
                    crate::etl_error!(
                        ErrorKind::MergePlanError,
                        "Reducer key is not a payload column",
                        format!("key `{key}`")
                    )
                })
            })
            .collect::<EtlResult<Vec<_>>>()?;

        Ok(ReducerSpec {
            key_indices,
            payload_width: payload.len(),
        })
    }

    pub fn key_indices(&self) -> &[usize] {
        &self.key_indices
    }

    pub fn payload_width(&self) -> usize {
        self.payload_width
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Reduces the delimited rows of `reader` into `writer`.
///
/// Fails with [`ErrorKind::MergeExecutionError`] naming the one-based input line when a line
/// cannot be decoded or breaks the expected ordering.
pub async fn reduce_stream<R, W>(reader: R, mut writer: W, spec: &ReducerSpec) -> EtlResult<ReduceStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reducer = Reducer::new(spec.key_indices.clone());
    let mut lines = reader.lines();
    let mut line_number = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;

        let emitted = decode_line(&line)
            .and_then(|row| ChangeEvent::from_staged_row(row, spec.payload_width))
            .and_then(|event| reducer.push(event))
            .map_err(|err| at_line(line_number, err))?;

        if let Some(row) = emitted {
            writer.write_all(encode_row(&row).as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
    }

    if let Some(row) = reducer.finish() {
        writer.write_all(encode_row(&row).as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    writer.flush().await?;

    let stats = reducer.stats();
    debug!(
        events = stats.events,
        rows = stats.rows_emitted,
        deleted_keys = stats.keys_deleted,
        "reduced input stream"
    );

    Ok(stats)
}

fn at_line(line_number: usize, err: EtlError) -> EtlError {
    let detail = format!(
        "line {line_number}: {}",
        err.detail().unwrap_or(err.description())
    );

    EtlError::from((
        ErrorKind::MergeExecutionError,
        "Reducer input line could not be processed",
        detail,
    ))
    .with_source(err)
}
