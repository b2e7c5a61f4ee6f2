use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::ColumnDescriptor;
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
#[cfg(feature = "failpoints")]
use crate::failpoints::{WAREHOUSE_AFTER_PUBLISH, etl_fail_point};
use crate::types::{TableName, TableRow};
use crate::warehouse::Warehouse;
use crate::warehouse::base::check_arity;
use crate::warehouse::codec::{decode_line, encode_row};

const DATA_FILE_EXTENSION: &str = "tsv";

const MATERIALIZED_FILE_NAME: &str = "data.tsv";

/// Hidden file naming the version directory that holds the current rows of a table.
pub const VERSION_POINTER: &str = ".current";

const VERSION_DIR_PREFIX: &str = ".v-";

/// Reads retried when a version is superseded and removed while being read.
const READ_ATTEMPTS: usize = 3;

/// Warehouse storing every table as delimited text files under a root directory.
///
/// A table lives in `<root>/<schema>/<name>/`. Tables written by other tools, such as staged
/// change tables, are the concatenation of their `*.tsv` files in file name order, and files
/// starting with `.` are ignored.
///
/// Tables replaced through [`Warehouse::replace_table`] are versioned: the rows go to a hidden
/// `.v-<uuid>/data.tsv` directory and the [`VERSION_POINTER`] file is renamed over to name it.
/// Once the pointer exists readers only follow it, so the rename is the single step that
/// publishes a new table.
#[derive(Debug, Clone)]
pub struct LocalWarehouse {
    root: PathBuf,
}

impl LocalWarehouse {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the files of `table`.
    pub fn table_dir(&self, table: &TableName) -> PathBuf {
        self.root.join(&table.schema).join(&table.name)
    }

    /// Directory holding the rows readers currently see, the table directory itself when the
    /// table was never replaced.
    async fn current_data_dir(&self, dir: &Path) -> io::Result<PathBuf> {
        let version = match tokio::fs::read_to_string(dir.join(VERSION_POINTER)).await {
            Ok(version) => version,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(dir.to_path_buf()),
            Err(err) => return Err(err),
        };

        let version = version.trim();
        if !version.starts_with(VERSION_DIR_PREFIX) || version.contains(['/', '\\']) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} names no table version: `{version}`", dir.display()),
            ));
        }

        Ok(dir.join(version))
    }

    async fn data_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            let data = path.extension().is_some_and(|ext| ext == DATA_FILE_EXTENSION);

            if data && !hidden && entry.file_type().await?.is_file() {
                files.push(path);
            }
        }
        files.sort();

        Ok(files)
    }

    async fn read_data_files(&self, dir: &Path) -> io::Result<Vec<(PathBuf, String)>> {
        let mut contents = Vec::new();
        for file in self.data_files(dir).await? {
            let content = tokio::fs::read_to_string(&file).await?;
            contents.push((file, content));
        }

        Ok(contents)
    }

    async fn write_version(
        &self,
        version_dir: &Path,
        staged_pointer: &Path,
        version: &str,
        content: String,
    ) -> io::Result<()> {
        tokio::fs::create_dir(version_dir).await?;
        tokio::fs::write(version_dir.join(MATERIALIZED_FILE_NAME), content).await?;
        tokio::fs::write(staged_pointer, version).await
    }

    /// Removes every version and plain data file of `dir` other than `current`.
    async fn remove_superseded(&self, dir: &Path, current: &str) -> io::Result<()> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == current {
                continue;
            }

            let file_type = entry.file_type().await?;
            if file_type.is_dir() && name.starts_with(VERSION_DIR_PREFIX) {
                tokio::fs::remove_dir_all(entry.path()).await?;
            } else if file_type.is_file()
                && !name.starts_with('.')
                && entry.path().extension().is_some_and(|ext| ext == DATA_FILE_EXTENSION)
            {
                tokio::fs::remove_file(entry.path()).await?;
            }
        }

        Ok(())
    }
}

impl Warehouse for LocalWarehouse {
    fn name() -> &'static str {
        "local"
    }

    async fn read_table(&self, table: &TableName) -> EtlResult<Vec<TableRow>> {
        let dir = self.table_dir(table);
        if !tokio::fs::try_exists(&dir).await? {
            return Err(etl_error!(
                ErrorKind::TableMissing,
                "Table does not exist in the warehouse",
                format!("{table} at {}", dir.display())
            ));
        }

        let mut attempt = 1;
        let contents = loop {
            let data_dir = self.current_data_dir(&dir).await?;
            match self.read_data_files(&data_dir).await {
                Ok(contents) => break contents,
                // The version was superseded and removed while it was read.
                Err(err) if err.kind() == io::ErrorKind::NotFound && attempt < READ_ATTEMPTS => {
                    debug!(%table, attempt, "table version vanished, reading again");
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        };

        let mut rows = Vec::new();
        for (file, content) in contents {
            for (line_number, line) in content.lines().enumerate() {
                let row = decode_line(line).map_err(|err| {
                    etl_error!(
                        ErrorKind::InvalidData,
                        "Data file holds an undecodable line",
                        format!("{}:{}", file.display(), line_number + 1),
                        source: err
                    )
                })?;
                rows.push(row);
            }
            debug!(%table, file = %file.display(), "read data file");
        }

        Ok(rows)
    }

    async fn replace_table(
        &self,
        table: &TableName,
        columns: &[ColumnDescriptor],
        rows: Vec<TableRow>,
    ) -> EtlResult<()> {
        check_arity(table, columns, &rows)?;

        let dir = self.table_dir(table);
        tokio::fs::create_dir_all(&dir).await?;

        let mut content = String::new();
        for row in &rows {
            content.push_str(&encode_row(row));
            content.push('\n');
        }

        let version = format!("{VERSION_DIR_PREFIX}{}", Uuid::new_v4());
        let version_dir = dir.join(&version);
        let staged_pointer = dir.join(format!(".{}.tmp", Uuid::new_v4()));

        let written = match self
            .write_version(&version_dir, &staged_pointer, &version, content)
            .await
        {
            Ok(()) => tokio::fs::rename(&staged_pointer, dir.join(VERSION_POINTER)).await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            let _ = tokio::fs::remove_file(&staged_pointer).await;
            let _ = tokio::fs::remove_dir_all(&version_dir).await;
            return Err(err.into());
        }

        #[cfg(feature = "failpoints")]
        etl_fail_point(WAREHOUSE_AFTER_PUBLISH)?;

        self.remove_superseded(&dir, &version).await?;

        info!(%table, rows = rows.len(), version = %version, "replaced table");

        Ok(())
    }
}
