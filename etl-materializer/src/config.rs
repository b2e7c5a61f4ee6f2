use std::path::Path;

use etl_config::shared::MaterializerConfig;
use etl_config::{Environment, load_config, load_config_from};

use crate::error::{MaterializerError, MaterializerResult};

/// Loads and validates the materializer configuration.
///
/// Files are read from `directory` when given, otherwise from the `configuration` directory of
/// the working directory.
pub fn load_materializer_config(directory: Option<&Path>) -> MaterializerResult<MaterializerConfig> {
    let config = match directory {
        Some(directory) => {
            let environment = Environment::load()?;
            load_config_from::<MaterializerConfig>(directory, environment)
        }
        None => load_config::<MaterializerConfig>(),
    }
    .map_err(MaterializerError::config)?;

    config.validate().map_err(MaterializerError::config)?;

    Ok(config)
}
