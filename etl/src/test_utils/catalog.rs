use serde_json::{Value, json};

use crate::catalog::{ColumnDescriptor, TableDescriptor};

/// Builds a descriptor from borrowed names, panicking when it is invalid.
pub fn table(schema: &str, name: &str, keys: &[&str], columns: &[(&str, &str)]) -> TableDescriptor {
    TableDescriptor::new(
        schema,
        name,
        keys.iter().map(|key| key.to_string()).collect(),
        columns
            .iter()
            .map(|(name, type_name)| ColumnDescriptor::new(*name, *type_name))
            .collect(),
    )
    .expect("test table descriptor must be valid")
}

/// A `schema.name` table keyed on `k` with a single `v` payload column.
pub fn key_value_table(schema: &str, name: &str) -> TableDescriptor {
    table(schema, name, &["k"], &[("k", "int"), ("v", "string")])
}

/// Renders the metadata document describing `tables`.
pub fn catalog_document(tables: &[TableDescriptor]) -> String {
    let entries: Vec<Value> = tables.iter().map(catalog_entry).collect();

    json!({ "tables": entries }).to_string()
}

/// Renders one entry of a metadata document.
pub fn catalog_entry(table: &TableDescriptor) -> Value {
    json!({
        "schema": table.schema(),
        "name": table.name(),
        "keys": table.keys(),
        "columns": table.columns(),
    })
}
