use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::catalog::ColumnDescriptor;
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::types::{TableName, TableRow};
use crate::warehouse::Warehouse;
use crate::warehouse::base::check_arity;

#[derive(Debug, Clone)]
struct StoredTable {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<TableRow>,
}

/// Warehouse keeping every table in memory.
///
/// Clones share the same tables. Replacing a table swaps its contents under one lock.
#[derive(Debug, Clone, Default)]
pub struct MemoryWarehouse {
    tables: Arc<Mutex<HashMap<TableName, StoredTable>>>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends rows to `table`, creating it without columns when missing.
    pub async fn append_rows(&self, table: &TableName, rows: Vec<TableRow>) {
        let mut tables = self.tables.lock().await;
        tables
            .entry(table.clone())
            .or_insert_with(|| StoredTable {
                columns: Vec::new(),
                rows: Vec::new(),
            })
            .rows
            .extend(rows);
    }

    /// Returns the rows of `table`, if it exists.
    pub async fn table_rows(&self, table: &TableName) -> Option<Vec<TableRow>> {
        let tables = self.tables.lock().await;
        tables.get(table).map(|stored| stored.rows.clone())
    }

    /// Returns the columns `table` was last replaced with.
    pub async fn table_columns(&self, table: &TableName) -> Option<Vec<ColumnDescriptor>> {
        let tables = self.tables.lock().await;
        tables.get(table).map(|stored| stored.columns.clone())
    }
}

impl Warehouse for MemoryWarehouse {
    fn name() -> &'static str {
        "memory"
    }

    async fn read_table(&self, table: &TableName) -> EtlResult<Vec<TableRow>> {
        self.table_rows(table).await.ok_or_else(|| {
            etl_error!(
                ErrorKind::TableMissing,
                "Table does not exist in the warehouse",
                table
            )
        })
    }

    async fn replace_table(
        &self,
        table: &TableName,
        columns: &[ColumnDescriptor],
        rows: Vec<TableRow>,
    ) -> EtlResult<()> {
        check_arity(table, columns, &rows)?;

        info!(%table, rows = rows.len(), "replacing table in memory");

        let mut tables = self.tables.lock().await;
        tables.insert(
            table.clone(),
            StoredTable {
                columns: columns.to_vec(),
                rows,
            },
        );

        Ok(())
    }
}
