//! Configuration parser for loading agent configuration.
//!
//! This module loads configuration from YAML files and environment
//! variables. Environment variables take precedence over file values.

use crate::error::{AgentError, ConfigError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::AgentConfig;

/// Environment variable naming the address space.
pub const ENV_ADDRESS_SPACE: &str = "ADDRESS_SPACE";

/// Environment variable naming the resource name prefix.
pub const ENV_ADDRESS_SPACE_NAMESPACE: &str = "ADDRESS_SPACE_NAMESPACE";

/// Environment variable naming the address space plan.
pub const ENV_ADDRESS_SPACE_PLAN: &str = "ADDRESS_SPACE_PLAN";

/// Environment variable carrying the infrastructure id.
pub const ENV_INFRA_UUID: &str = "INFRA_UUID";

/// Environment variable overriding the store URL.
pub const ENV_STORE_URL: &str = "AGENT_STORE_URL";

/// Environment variable overriding the store namespace.
pub const ENV_STORE_NAMESPACE: &str = "AGENT_STORE_NAMESPACE";

/// Environment variable carrying the store token.
pub const ENV_STORE_TOKEN: &str = "AGENT_STORE_TOKEN";

/// Configuration parser for loading agent configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving the `.env` file.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<AgentConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(AgentError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AgentError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<AgentConfig> {
        debug!("Parsing YAML configuration");

        let config: AgentConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            AgentError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!("Parsed configuration for address space: {}", config.address_space);
        Ok(config)
    }

    /// Loads configuration from a file with environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<AgentConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_env_overrides(&mut config);
        Ok(config)
    }

    /// Builds configuration from environment variables alone.
    ///
    /// # Errors
    ///
    /// Returns an error if `ADDRESS_SPACE` is not set.
    pub fn from_env() -> Result<AgentConfig> {
        let address_space = std::env::var(ENV_ADDRESS_SPACE).map_err(|_| {
            AgentError::Config(ConfigError::MissingEnvVar {
                name: String::from(ENV_ADDRESS_SPACE),
            })
        })?;

        let mut config = AgentConfig::new(address_space);
        Self::apply_env_overrides(&mut config);
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(config: &mut AgentConfig) {
        if let Ok(space) = std::env::var(ENV_ADDRESS_SPACE) {
            debug!("Overriding address_space from environment");
            config.address_space = space;
        }

        if let Ok(namespace) = std::env::var(ENV_ADDRESS_SPACE_NAMESPACE) {
            debug!("Overriding address_space_namespace from environment");
            config.address_space_namespace = Some(namespace);
        }

        if let Ok(plan) = std::env::var(ENV_ADDRESS_SPACE_PLAN) {
            debug!("Overriding address_space_plan from environment");
            config.address_space_plan = plan;
        }

        if let Ok(uuid) = std::env::var(ENV_INFRA_UUID) {
            debug!("Overriding infra_uuid from environment");
            config.infra_uuid = Some(uuid);
        }

        if let Ok(url) = std::env::var(ENV_STORE_URL) {
            debug!("Overriding store.url from environment");
            config.store.url = url;
        }

        if let Ok(namespace) = std::env::var(ENV_STORE_NAMESPACE) {
            debug!("Overriding store.namespace from environment");
            config.store.namespace = namespace;
        }

        if let Ok(token) = std::env::var(ENV_STORE_TOKEN) {
            debug!("Overriding store.token from environment");
            config.store.token = Some(token);
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                AgentError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["address-agent.yaml", "address-agent.yml"];

/// Finds the configuration file in the given directory or its parents,
/// falling back to the user configuration directory.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    if let Some(user_config) = user_config_file().filter(|p| p.exists()) {
        info!("Using user configuration file: {}", user_config.display());
        return Ok(user_config);
    }

    Err(AgentError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

/// Returns the per-user configuration file location.
#[must_use]
pub fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("address-agent").join("config.yaml"))
}
