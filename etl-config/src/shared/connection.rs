use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;
use crate::shared::base::require_non_empty;

fn default_sql_cli() -> String {
    WarehouseConfig::DEFAULT_SQL_CLI.to_owned()
}

/// Connection to the upstream database whose tables are materialized.
///
/// This intentionally does not implement [`Serialize`] to avoid leaking the password.
#[derive(Clone, Debug, Deserialize)]
pub struct SourceConfig {
    /// JDBC url of the source database.
    pub url: String,
    pub username: String,
    pub password: SecretString,
    /// Source schema the tables are read from.
    pub schema: String,
}

impl SourceConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("source.url", &self.url)?;
        require_non_empty("source.schema", &self.schema)
    }
}

/// Connection to the warehouse holding the materialized tables.
#[derive(Clone, Debug, Deserialize)]
pub struct WarehouseConfig {
    /// JDBC url of the warehouse, used by the comparator.
    pub url: String,
    pub username: String,
    pub password: SecretString,
    /// Command line client used to load scripts and submit merge jobs.
    #[serde(default = "default_sql_cli")]
    pub sql_cli: String,
}

impl WarehouseConfig {
    pub const DEFAULT_SQL_CLI: &'static str = "hive";

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("warehouse.url", &self.url)?;
        require_non_empty("warehouse.sql_cli", &self.sql_cli)
    }
}

/// Same as [`WarehouseConfig`] but without the password, safe to serialize into logs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WarehouseConfigWithoutSecrets {
    pub url: String,
    pub username: String,
    pub sql_cli: String,
}

impl From<WarehouseConfig> for WarehouseConfigWithoutSecrets {
    fn from(value: WarehouseConfig) -> Self {
        WarehouseConfigWithoutSecrets {
            url: value.url,
            username: value.username,
            sql_cli: value.sql_cli,
        }
    }
}

#[cfg(test)]
mod tests {
    use secrecy::{ExposeSecret, Secret};

    use super::*;

    fn warehouse(sql_cli: &str) -> WarehouseConfig {
        WarehouseConfig {
            url: "jdbc:hive2://localhost:10000".to_owned(),
            username: "etl".to_owned(),
            password: Secret::new("hunter2".to_owned()),
            sql_cli: sql_cli.to_owned(),
        }
    }

    #[test]
    fn blank_sql_cli_is_rejected() {
        assert!(warehouse("hive").validate().is_ok());
        assert_eq!(
            warehouse("").validate(),
            Err(ValidationError::invalid("warehouse.sql_cli", "must not be empty"))
        );
    }

    #[test]
    fn without_secrets_drops_password() {
        let config = warehouse("beeline");
        assert_eq!(config.password.expose_secret(), "hunter2");

        let stripped = WarehouseConfigWithoutSecrets::from(config);
        assert_eq!(stripped.sql_cli, "beeline");
    }

    #[test]
    fn blank_source_schema_is_rejected() {
        let source = SourceConfig {
            url: "jdbc:mysql://localhost:3306".to_owned(),
            username: "etl".to_owned(),
            password: Secret::new(String::new()),
            schema: " ".to_owned(),
        };

        assert_eq!(
            source.validate(),
            Err(ValidationError::invalid("source.schema", "must not be empty"))
        );
    }
}
