//! Configuration types and loading for the change-log materializer.
//!
//! Configuration is read from `configuration/base.*`, then `configuration/<environment>.*`,
//! then `APP_` prefixed environment variables.

mod environment;
mod load;
pub mod shared;

pub use environment::{APP_ENVIRONMENT_ENV_NAME, Environment};
pub use load::{CONFIGURATION_DIR, Config, LoadConfigError, load_config, load_config_from};
