//! Configuration module for the address agent.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `address-agent.yaml`
//! - Environment variable overrides
//! - Validation of configuration values

mod parser;
mod spec;
mod validator;

pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, find_config_file, user_config_file};
pub use spec::{ADDRESS_CONFIG_LABEL, AgentConfig, StoreConfig};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
