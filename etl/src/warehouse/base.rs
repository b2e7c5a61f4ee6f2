use std::future::Future;

use crate::catalog::ColumnDescriptor;
use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::types::{TableName, TableRow};

/// Storage holding staged change tables and materialized tables.
///
/// Replacing a table must be atomic from the point of view of readers: a concurrent
/// [`Warehouse::read_table`] observes either the previous rows or the new rows, never a mix.
/// Implementations that cannot swap in place write the new rows to a side location and rename
/// it over the table.
pub trait Warehouse {
    /// Returns the name of the warehouse, used in logs.
    fn name() -> &'static str;

    /// Reads every row of `table`.
    ///
    /// Fails with [`crate::error::ErrorKind::TableMissing`] when the table does not exist.
    fn read_table(&self, table: &TableName) -> impl Future<Output = EtlResult<Vec<TableRow>>> + Send;

    /// Replaces the contents of `table` with `rows`, creating it when missing.
    ///
    /// Every row must have one value per column of `columns`.
    fn replace_table(
        &self,
        table: &TableName,
        columns: &[ColumnDescriptor],
        rows: Vec<TableRow>,
    ) -> impl Future<Output = EtlResult<()>> + Send;
}

/// Fails with [`ErrorKind::InvalidData`] when a row does not have one value per column.
pub(crate) fn check_arity(
    table: &TableName,
    columns: &[ColumnDescriptor],
    rows: &[TableRow],
) -> EtlResult<()> {
    if let Some((position, row)) = rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() != columns.len())
    {
        bail!(
            ErrorKind::InvalidData,
            "Row does not match the table columns",
            format!(
                "{table} row {position}: {} values for {} columns",
                row.len(),
                columns.len()
            )
        );
    }

    Ok(())
}
