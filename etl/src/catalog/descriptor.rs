use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{bail, ensure};
use crate::error::{ErrorKind, EtlResult};
use crate::types::TableName;

/// Name and warehouse type of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Immutable description of one table of a run.
///
/// The column order is the physical order of both the staged payload and the materialized
/// table. Every string accessor below is derived from it, so reordering columns invalidates
/// previously generated merge plans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    schema: String,
    name: String,
    keys: Vec<String>,
    columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    /// Builds a descriptor, failing with [`ErrorKind::MergePlanError`] when the keys or columns
    /// are inconsistent.
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        keys: Vec<String>,
        columns: Vec<ColumnDescriptor>,
    ) -> EtlResult<TableDescriptor> {
        let descriptor = TableDescriptor {
            schema: schema.into(),
            name: name.into(),
            keys,
            columns,
        };
        descriptor.validate()?;

        Ok(descriptor)
    }

    /// Checks the descriptor invariants.
    pub fn validate(&self) -> EtlResult<()> {
        ensure!(
            !self.schema.is_empty() && !self.name.is_empty(),
            ErrorKind::MergePlanError,
            "Table schema and name must not be empty",
            format!("schema=`{}` name=`{}`", self.schema, self.name)
        );
        ensure!(
            !self.keys.is_empty(),
            ErrorKind::MergePlanError,
            "Table has no key columns",
            self.table_name()
        );

        let mut column_names = HashSet::with_capacity(self.columns.len());
        for column in &self.columns {
            if !column_names.insert(column.name.as_str()) {
                bail!(
                    ErrorKind::MergePlanError,
                    "Column is declared more than once",
                    format!("{}: column `{}`", self.table_name(), column.name)
                );
            }
        }

        let mut seen_keys = HashSet::with_capacity(self.keys.len());
        for key in &self.keys {
            if !seen_keys.insert(key.as_str()) {
                bail!(
                    ErrorKind::MergePlanError,
                    "Key column is listed more than once",
                    format!("{}: key `{key}`", self.table_name())
                );
            }

            if !column_names.contains(key.as_str()) {
                bail!(
                    ErrorKind::MergePlanError,
                    "Key column is not one of the table columns",
                    format!("{}: key `{key}`", self.table_name())
                );
            }
        }

        Ok(())
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn table_name(&self) -> TableName {
        TableName::new(&self.schema, &self.name)
    }

    /// Returns `<schema_prefix><schema>.<name_prefix><name>`.
    pub fn fqn(&self, schema_prefix: &str, name_prefix: &str) -> String {
        format!(
            "{schema_prefix}{}.{name_prefix}{}",
            self.schema, self.name
        )
    }

    /// Returns the key column names joined by commas.
    pub fn keys_list(&self) -> String {
        self.keys.join(",")
    }

    /// Returns the column names joined by commas.
    pub fn column_names_list(&self) -> String {
        self.columns
            .iter()
            .map(|column| column.name.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Returns `name type` pairs joined by commas.
    pub fn columns_with_types_list(&self) -> String {
        self.columns
            .iter()
            .map(|column| format!("{} {}", column.name, column.type_name))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Returns the position of every key column in [`TableDescriptor::columns`], in key order.
    pub fn key_indices(&self) -> EtlResult<Vec<usize>> {
        self.keys
            .iter()
            .map(|key| {
                self.columns
                    .iter()
                    .position(|column| &column.name == key)
                    .ok_or_else(|| {
                        crate::etl_error!(
                            ErrorKind::MergePlanError,
                            "Key column is not one of the table columns",
                            format!("{}: key `{key}`", self.table_name())
                        )
                    })
            })
            .collect()
    }
}

impl fmt::Display for TableDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Table: schema={} name={} keys={}",
            self.schema,
            self.name,
            self.keys_list()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("id", "int"),
            ColumnDescriptor::new("region", "string"),
            ColumnDescriptor::new("total", "double"),
        ]
    }

    fn orders() -> TableDescriptor {
        TableDescriptor::new(
            "shop",
            "orders",
            vec!["region".to_owned(), "id".to_owned()],
            columns(),
        )
        .unwrap()
    }

    #[test]
    fn accessors_are_derived_from_column_order() {
        let table = orders();

        assert_eq!(table.fqn("", ""), "shop.orders");
        assert_eq!(table.fqn("", "stage_xxx_"), "shop.stage_xxx_orders");
        assert_eq!(table.keys_list(), "region,id");
        assert_eq!(table.column_names_list(), "id,region,total");
        assert_eq!(
            table.columns_with_types_list(),
            "id int,region string,total double"
        );
        assert_eq!(table.key_indices().unwrap(), vec![1, 0]);
        assert_eq!(
            table.to_string(),
            "Table: schema=shop name=orders keys=region,id"
        );
    }

    #[test]
    fn key_absent_from_columns_is_a_plan_error() {
        let err = TableDescriptor::new("shop", "orders", vec!["sku".to_owned()], columns())
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MergePlanError);
        assert_eq!(err.detail(), Some("shop.orders: key `sku`"));
    }

    #[test]
    fn empty_and_duplicate_keys_are_plan_errors() {
        let empty = TableDescriptor::new("shop", "orders", vec![], columns()).unwrap_err();
        assert_eq!(empty.kind(), ErrorKind::MergePlanError);

        let duplicate = TableDescriptor::new(
            "shop",
            "orders",
            vec!["id".to_owned(), "id".to_owned()],
            columns(),
        )
        .unwrap_err();
        assert_eq!(duplicate.kind(), ErrorKind::MergePlanError);
    }

    #[test]
    fn duplicate_column_is_a_plan_error() {
        let mut columns = columns();
        columns.push(ColumnDescriptor::new("id", "bigint"));

        let err = TableDescriptor::new("shop", "orders", vec!["id".to_owned()], columns)
            .unwrap_err();
        assert_eq!(err.description(), "Column is declared more than once");
    }
}
