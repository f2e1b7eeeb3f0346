//! Configuration management for the Snowline MCP server.
//!
//! This module handles loading ServiceNow credentials from environment
//! variables, with validation to ensure all required values are present.

use std::env;

use url::Url;

use crate::error::SnowlineError;

/// Environment variable holding the instance name or base URL.
pub const ENV_INSTANCE: &str = "SERVICENOW_INSTANCE";
/// Environment variable holding the basic-auth user name.
pub const ENV_USERNAME: &str = "SERVICENOW_USERNAME";
/// Environment variable holding the basic-auth password.
pub const ENV_PASSWORD: &str = "SERVICENOW_PASSWORD";

/// Configuration for connecting to a ServiceNow instance.
///
/// All fields are required. The password is stored but never logged or
/// exposed in error messages.
#[derive(Clone)]
pub struct Config {
    /// Instance name (e.g., `acme`) or full base URL (e.g., `https://acme.service-now.com`).
    pub instance: String,

    /// User name for basic authentication.
    pub username: String,

    /// Password for basic authentication.
    /// This value must never be logged or included in error messages.
    password: String,
}

impl Config {
    /// Builds a configuration from explicit values, applying the same
    /// validation as [`Config::from_env`].
    ///
    /// # Errors
    ///
    /// Returns `SnowlineError::Config` if any value is blank or invalid.
    pub fn new(
        instance: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, SnowlineError> {
        let instance = Self::require(ENV_INSTANCE, instance.into())?;
        let username = Self::require(ENV_USERNAME, username.into())?;
        let password = password.into();
        if password.trim().is_empty() {
            return Err(SnowlineError::missing_env(ENV_PASSWORD));
        }

        let instance = Self::validate_instance(instance)?;
        Self::validate_password(&password)?;

        Ok(Config {
            instance,
            username,
            password,
        })
    }

    /// Loads configuration from environment variables.
    ///
    /// # Required Environment Variables
    ///
    /// - `SERVICENOW_INSTANCE`: instance name or base URL
    /// - `SERVICENOW_USERNAME`: user name for basic auth
    /// - `SERVICENOW_PASSWORD`: password for basic auth
    ///
    /// # Errors
    ///
    /// Returns `SnowlineError::Config` if any required variable is missing
    /// or if values fail validation.
    pub fn from_env() -> Result<Self, SnowlineError> {
        let instance = Self::get_required_env(ENV_INSTANCE)?;
        let username = Self::get_required_env(ENV_USERNAME)?;
        let password = Self::get_required_env(ENV_PASSWORD)?;

        Self::new(instance, username, password)
    }

    /// Returns the password for authenticating requests.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Returns the instance base URL without a trailing slash.
    ///
    /// A bare instance name expands to `https://{instance}.service-now.com`;
    /// a value that already carries a scheme is used as-is.
    pub fn base_url(&self) -> String {
        if self.instance.starts_with("http://") || self.instance.starts_with("https://") {
            self.instance.clone()
        } else {
            format!("https://{}.service-now.com", self.instance)
        }
    }

    /// Gets a required environment variable, returning an error if missing or empty.
    fn get_required_env(name: &str) -> Result<String, SnowlineError> {
        env::var(name).map_err(|_| SnowlineError::missing_env(name))
    }

    fn require(name: &str, value: String) -> Result<String, SnowlineError> {
        let value = value.trim().to_string();
        if value.is_empty() {
            return Err(SnowlineError::missing_env(name));
        }
        Ok(value)
    }

    /// Validates and normalizes the instance value.
    fn validate_instance(instance: String) -> Result<String, SnowlineError> {
        let instance = instance.trim_end_matches('/').to_string();

        if instance.starts_with("http://") || instance.starts_with("https://") {
            let parsed = Url::parse(&instance).map_err(|e| {
                SnowlineError::invalid_config(format!("SERVICENOW_INSTANCE is not a valid URL: {}", e))
            })?;
            if parsed.host_str().is_none() {
                return Err(SnowlineError::invalid_config(
                    "SERVICENOW_INSTANCE URL has no host",
                ));
            }
            return Ok(instance);
        }

        if !instance
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
        {
            return Err(SnowlineError::invalid_config(
                "SERVICENOW_INSTANCE must be an instance name (letters, digits, '-') or an http(s) URL",
            ));
        }

        Ok(instance)
    }

    /// Rejects passwords left at a template placeholder.
    ///
    /// Only whole-value matches count; a real password may contain these words.
    fn validate_password(password: &str) -> Result<(), SnowlineError> {
        const PLACEHOLDERS: [&str; 4] = ["your_password", "placeholder", "changeme", "xxx"];

        if PLACEHOLDERS
            .iter()
            .any(|p| password.trim().eq_ignore_ascii_case(p))
        {
            return Err(SnowlineError::invalid_config(
                "SERVICENOW_PASSWORD appears to be a placeholder value",
            ));
        }

        Ok(())
    }
}
