use etl_config::shared::StagingLayoutConfig;

use crate::catalog::{ColumnDescriptor, TableDescriptor};
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::types::{ChangeEvent, TableName, TableRow};

/// Naming of staging tables and of the change metadata columns leading every staged row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLayout {
    pub operation_column: String,
    pub sequence_column: String,
    pub row_id_column: String,
    pub commit_timestamp_column: String,
    pub table_prefix: String,
    pub schema_prefix: String,
}

impl StagingLayout {
    /// Metadata column names in staged row order.
    pub fn metadata_columns(&self) -> [&str; 4] {
        [
            &self.operation_column,
            &self.sequence_column,
            &self.row_id_column,
            &self.commit_timestamp_column,
        ]
    }
}

impl Default for StagingLayout {
    fn default() -> Self {
        StagingLayout::from(&StagingLayoutConfig::default())
    }
}

impl From<&StagingLayoutConfig> for StagingLayout {
    fn from(config: &StagingLayoutConfig) -> Self {
        Self {
            operation_column: config.operation_column.clone(),
            sequence_column: config.sequence_column.clone(),
            row_id_column: config.row_id_column.clone(),
            commit_timestamp_column: config.commit_timestamp_column.clone(),
            table_prefix: config.table_prefix.clone(),
            schema_prefix: config.schema_prefix.clone(),
        }
    }
}

/// Derives merge plans from table descriptors.
#[derive(Debug, Clone, Default)]
pub struct MergePlanner {
    layout: StagingLayout,
}

impl MergePlanner {
    pub fn new(layout: StagingLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StagingLayout {
        &self.layout
    }

    /// Plans the merge of `table`.
    ///
    /// Fails with [`ErrorKind::MergePlanError`] when the descriptor violates its invariants, a
    /// payload column collides with a change metadata column, or the staging table would be the
    /// base table itself.
    pub fn plan(&self, table: &TableDescriptor) -> EtlResult<MergePlan> {
        table.validate()?;

        let metadata = self.layout.metadata_columns();
        if let Some(column) = table
            .columns()
            .iter()
            .find(|column| metadata.contains(&column.name.as_str()))
        {
            return Err(etl_error!(
                ErrorKind::MergePlanError,
                "Column name collides with a change metadata column",
                format!("{}: column `{}`", table.table_name(), column.name)
            ));
        }

        let staging_table = TableName::new(
            format!("{}{}", self.layout.schema_prefix, table.schema()),
            format!("{}{}", self.layout.table_prefix, table.name()),
        );
        let base_table = table.table_name();
        if staging_table == base_table {
            return Err(etl_error!(
                ErrorKind::MergePlanError,
                "Staging table and base table are the same table",
                base_table
            ));
        }

        let group_key = table.keys().to_vec();

        let mut sort_key = group_key.clone();
        sort_key.push(self.layout.sequence_column.clone());
        sort_key.push(self.layout.row_id_column.clone());

        let reduce_projection = metadata
            .iter()
            .map(|column| column.to_string())
            .chain(table.columns().iter().map(|column| column.name.clone()))
            .collect();

        Ok(MergePlan {
            staging_table,
            base_table,
            key_indices: table.key_indices()?,
            group_key,
            sort_key,
            reduce_projection,
            output_projection: table.columns().to_vec(),
        })
    }
}

/// Everything needed to collapse the staged changes of one table into its current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    staging_table: TableName,
    base_table: TableName,
    key_indices: Vec<usize>,
    group_key: Vec<String>,
    sort_key: Vec<String>,
    reduce_projection: Vec<String>,
    output_projection: Vec<ColumnDescriptor>,
}

impl MergePlan {
    /// Table holding the staged change rows.
    pub fn staging_table(&self) -> &TableName {
        &self.staging_table
    }

    /// Materialized table replaced by the merge.
    pub fn base_table(&self) -> &TableName {
        &self.base_table
    }

    /// Columns whose values identify a logical entity.
    pub fn group_key(&self) -> &[String] {
        &self.group_key
    }

    /// Group key followed by the sequence number and row id columns.
    pub fn sort_key(&self) -> &[String] {
        &self.sort_key
    }

    /// Change metadata columns followed by the payload columns, the layout of a staged row.
    pub fn reduce_projection(&self) -> &[String] {
        &self.reduce_projection
    }

    /// Typed columns of the materialized table.
    pub fn output_projection(&self) -> &[ColumnDescriptor] {
        &self.output_projection
    }

    /// Positions of the group key columns within a payload.
    pub fn key_indices(&self) -> &[usize] {
        &self.key_indices
    }

    /// Decodes the staged row at `position` of the staging table.
    ///
    /// Failures are [`ErrorKind::MergeExecutionError`]s naming the table and row.
    pub fn decode_event(&self, position: usize, row: TableRow) -> EtlResult<ChangeEvent> {
        ChangeEvent::from_staged_row(row, self.output_projection.len()).map_err(|err| {
            let detail = format!(
                "{} row {position}: {}",
                self.staging_table,
                err.detail().unwrap_or(err.description())
            );
            crate::error::EtlError::from((
                ErrorKind::MergeExecutionError,
                "Staged row could not be decoded",
                detail,
            ))
            .with_source(err)
        })
    }
}
