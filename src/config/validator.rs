//! Configuration validation.
//!
//! This module checks an [`AgentConfig`] before the agent starts, so that
//! bad names or unusable store settings fail early instead of on the first
//! watch cycle.

use crate::error::{AgentError, ConfigError, Result};
use tracing::debug;

use super::spec::AgentConfig;

/// Validator for agent configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates an agent configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any check fails.
    pub fn validate(&self, config: &AgentConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_names(config, &mut result);
        Self::validate_store(config, &mut result);

        if config.notification_capacity == 0 {
            result.errors.push(ValidationError {
                field: String::from("notification_capacity"),
                message: String::from("Notification capacity must be at least 1"),
            });
        }

        match result.errors.first() {
            None => {
                debug!("Configuration validation passed");
                Ok(result)
            }
            Some(first_error) => Err(AgentError::Config(ConfigError::validation(
                first_error.message.clone(),
                first_error.field.clone(),
            ))),
        }
    }

    fn validate_names(config: &AgentConfig, result: &mut ValidationResult) {
        if config.address_space.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("address_space"),
                message: String::from("Address space cannot be empty"),
            });
        } else if !is_valid_name(&config.address_space) {
            result.errors.push(ValidationError {
                field: String::from("address_space"),
                message: format!(
                    "Address space '{}' is invalid. Must be lowercase alphanumeric with hyphens or dots.",
                    config.address_space
                ),
            });
        }

        if let Some(namespace) = &config.address_space_namespace
            && !is_valid_name(namespace)
        {
            result.errors.push(ValidationError {
                field: String::from("address_space_namespace"),
                message: format!("Namespace '{namespace}' is invalid"),
            });
        }

        if config.address_space_plan.is_empty() {
            result
                .warnings
                .push(String::from("No address space plan configured; address types cannot be listed"));
        }
    }

    fn validate_store(config: &AgentConfig, result: &mut ValidationResult) {
        let store = &config.store;

        if reqwest::Url::parse(&store.url).is_err() {
            result.errors.push(ValidationError {
                field: String::from("store.url"),
                message: format!("Store URL '{}' is not a valid URL", store.url),
            });
        }

        if store.namespace.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("store.namespace"),
                message: String::from("Store namespace cannot be empty"),
            });
        }

        if store.timeout_secs == 0 {
            result.errors.push(ValidationError {
                field: String::from("store.timeout_secs"),
                message: String::from("Store timeout must be at least 1 second"),
            });
        }

        if store.resync_interval_secs == 0 {
            result.errors.push(ValidationError {
                field: String::from("store.resync_interval_secs"),
                message: String::from("Resync interval must be at least 1 second"),
            });
        }

        if store.token.is_none() && store.token_file.is_none() {
            result
                .warnings
                .push(String::from("No store token configured; requests are unauthenticated"));
        }
    }
}

/// Checks that a name is a lowercase DNS-style name.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
        && name.starts_with(|c: char| c.is_ascii_alphanumeric())
        && name.ends_with(|c: char| c.is_ascii_alphanumeric())
}
