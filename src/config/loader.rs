//! Configuration Loader
//!
//! Environment-aware configuration loading. Sources are layered with
//! increasing precedence:
//!
//! 1. Built-in defaults ([`EditorialConfig::default`])
//! 2. `<dir>/editorial.toml`
//! 3. `<dir>/editorial.<environment>.toml`
//! 4. `EDITORIAL__SECTION__FIELD` environment variables
//!
//! Missing files are skipped; a present but malformed file is an error.

use super::error::ConfigResult;
use super::EditorialConfig;
use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const CONFIG_BASENAME: &str = "editorial";
const ENV_PREFIX: &str = "EDITORIAL";

pub struct ConfigManager {
    config: EditorialConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading editorial configuration"
        );

        let config = Self::build_config(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = %environment,
            backend = ?config.backend,
            role = ?config.service.role,
            exchange = %config.messaging.exchange,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    fn build_config(directory: &Path, environment: &str) -> ConfigResult<EditorialConfig> {
        let base_file = directory.join(format!("{CONFIG_BASENAME}.toml"));
        let env_file = directory.join(format!("{CONFIG_BASENAME}.{environment}.toml"));

        let config = Config::builder()
            .add_source(Config::try_from(&EditorialConfig::default())?)
            .add_source(File::from(base_file).required(false))
            .add_source(File::from(env_file).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override("environment", environment)?
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &EditorialConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Current environment from `EDITORIAL_ENV`, then `APP_ENV`
    pub fn detect_environment() -> String {
        env::var("EDITORIAL_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }
}
