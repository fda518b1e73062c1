mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{BrokerSettings, LoggingSettings, Settings};

/// Prefix for environment overrides, e.g. `SUBHUB_BROKER__NAME=news`.
pub const ENV_PREFIX: &str = "SUBHUB";

/// Loads the configuration from `config/default.*`, a `.env` file and
/// environment variables, merged over the defaults.
pub fn load_config() -> Result<Settings, ConfigError> {
    // a missing .env is fine
    let _ = dotenvy::dotenv();
    load_config_from("config/default")
}

/// Like [`load_config`] but reads the file at `path` (extension optional)
/// and skips `.env`.
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge(Settings::default()))
}
