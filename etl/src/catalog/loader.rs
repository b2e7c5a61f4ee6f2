use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::catalog::{ColumnDescriptor, TableDescriptor};
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::{bail, etl_error};

/// Result of loading a metadata document.
///
/// Valid entries are kept in document order, including repeated tables. Each invalid entry
/// contributes one error naming its position.
#[derive(Debug, Clone, Default)]
pub struct LoadedCatalog {
    pub tables: Vec<TableDescriptor>,
    pub errors: Vec<EtlError>,
}

impl LoadedCatalog {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the tables when every entry was valid, otherwise all entry errors aggregated.
    pub fn into_result(self) -> EtlResult<Vec<TableDescriptor>> {
        if self.errors.is_empty() {
            Ok(self.tables)
        } else {
            Err(self.errors.into())
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    schema: Option<String>,
    name: Option<String>,
    keys: Option<Vec<String>>,
    columns: Option<Vec<ColumnDescriptor>>,
}

/// Parses a metadata document of the form `{"tables": [{"schema", "name", "keys", "columns"}]}`.
///
/// A document that is not JSON or has no `tables` array fails as a whole with
/// [`ErrorKind::CatalogParseError`]. Entries are validated independently, see [`LoadedCatalog`].
pub fn load_catalog(document: &str) -> EtlResult<LoadedCatalog> {
    let root: Value = serde_json::from_str(document).map_err(|err| {
        etl_error!(
            ErrorKind::CatalogParseError,
            "Metadata document is not valid JSON",
            err.to_string(),
            source: err
        )
    })?;

    let Some(entries) = root.get("tables").and_then(Value::as_array) else {
        bail!(
            ErrorKind::CatalogParseError,
            "Metadata document has no `tables` array"
        );
    };

    let mut catalog = LoadedCatalog::default();
    for (position, entry) in entries.iter().enumerate() {
        match parse_entry(position, entry) {
            Ok(table) => {
                debug!(%position, table = %table.table_name(), "loaded table descriptor");
                catalog.tables.push(table);
            }
            Err(err) => {
                warn!(%position, error = %err.description(), "skipping invalid catalog entry");
                catalog.errors.push(err);
            }
        }
    }

    Ok(catalog)
}

/// Reads and parses the metadata document at `path`.
pub async fn load_catalog_file(path: &Path) -> EtlResult<LoadedCatalog> {
    let document = tokio::fs::read_to_string(path).await.map_err(|err| {
        etl_error!(
            ErrorKind::CatalogParseError,
            "Metadata document could not be read",
            format!("{}: {err}", path.display()),
            source: err
        )
    })?;

    load_catalog(&document)
}

fn parse_entry(position: usize, entry: &Value) -> EtlResult<TableDescriptor> {
    let at = |problem: String| format!("tables[{position}]: {problem}");

    let raw: RawEntry = serde_json::from_value(entry.clone()).map_err(|err| {
        etl_error!(
            ErrorKind::CatalogParseError,
            "Catalog entry is malformed",
            at(err.to_string())
        )
    })?;

    let schema = required_text(raw.schema, "schema", &at)?;
    let name = required_text(raw.name, "name", &at)?;

    let keys = raw.keys.unwrap_or_default();
    if keys.is_empty() {
        bail!(
            ErrorKind::CatalogParseError,
            "Catalog entry has no key columns",
            at("`keys` is missing or empty".to_owned())
        );
    }

    let Some(columns) = raw.columns.filter(|columns| !columns.is_empty()) else {
        bail!(
            ErrorKind::CatalogParseError,
            "Catalog entry has no columns",
            at("`columns` is missing or empty".to_owned())
        );
    };

    // Invariant violations keep their kind, the detail gains the entry position.
    TableDescriptor::new(schema, name, keys, columns).map_err(|err| {
        let detail = at(err.detail().unwrap_or(err.description()).to_owned());
        EtlError::from((err.kind(), "Catalog entry violates a table invariant", detail))
            .with_source(err)
    })
}

fn required_text(
    value: Option<String>,
    field: &str,
    at: &dyn Fn(String) -> String,
) -> EtlResult<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(etl_error!(
            ErrorKind::CatalogParseError,
            "Catalog entry is missing a required field",
            at(format!("`{field}` is missing or empty"))
        )),
    }
}
