//! Configuration for the error pipeline
//!
//! Layering, lowest to highest precedence: built-in defaults, an optional YAML file, then
//! `PROBLEMKIT__*` environment variables with `__` separating nested keys
//! (`PROBLEMKIT__ENVIRONMENT__NAME=development`).

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use problemkit_errors::ExtensionValidationOptions;
use serde::{Deserialize, Serialize};

use crate::enrich::EnricherConfig;
use crate::environment::EnvironmentConfig;
use crate::sanitize::SanitizerConfig;
use crate::telemetry::LoggingConfig;

pub const ENV_PREFIX: &str = "PROBLEMKIT__";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("invalid error-handling configuration: {0}")]
    Extract(#[from] Box<figment::Error>),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ErrorHandlingConfig {
    pub environment: EnvironmentConfig,
    pub sanitizer: SanitizerConfig,
    pub extensions: ExtensionValidationOptions,
    pub telemetry: EnricherConfig,
    pub logging: LoggingConfig,
}

impl ErrorHandlingConfig {
    /// The layered figment, for hosts that merge further providers.
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingFile`] when `path` is given but does not exist.
    pub fn figment(path: Option<&Path>) -> Result<Figment, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            if !path.is_file() {
                return Err(ConfigError::MissingFile {
                    path: path.to_path_buf(),
                });
            }
            figment = figment.merge(Yaml::file(path));
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Loads defaults, the optional YAML file and environment overrides.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the file is missing or a layer fails to deserialize.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = Self::from_figment(&Self::figment(path)?)?;
        tracing::debug!(
            environment = %config.environment.name,
            file = ?path,
            "error-handling configuration loaded"
        );
        Ok(config)
    }

    /// # Errors
    /// Returns [`ConfigError::Extract`] when the figment does not deserialize.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        figment.extract().map_err(|e| ConfigError::Extract(Box::new(e)))
    }
}
