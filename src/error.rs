//! Error types for the Snowline MCP server.
//!
//! This module defines `SnowlineError`, the unified error type used throughout
//! the application for consistent error handling and propagation.
//!
//! # Security
//!
//! All error messages are sanitized to ensure the ServiceNow password is never
//! leaked in logs or error responses. Use `sanitize_message()` when constructing
//! error messages from external sources.

use std::time::Duration;
use thiserror::Error;

/// Unified error type for all Snowline operations.
///
/// The first six variants form the taxonomy reported to tool callers
/// (see [`SnowlineError::kind`]); the remaining variants describe transport
/// failures underneath an API call.
#[derive(Error, Debug)]
pub enum SnowlineError {
    /// Configuration error - missing or invalid environment variables.
    #[error("configuration error: {0}")]
    Config(String),

    /// Input validation failed.
    #[error("validation error: {0}")]
    Validation(String),

    /// No record matched a required lookup.
    #[error("not found: {what}")]
    NotFound {
        /// Description of what was searched for.
        what: String,
    },

    /// More than one record matched where exactly one was expected.
    #[error("ambiguous match: {count} records match {what}")]
    Ambiguous {
        /// Description of what was searched for.
        what: String,
        /// How many records matched.
        count: usize,
    },

    /// ServiceNow answered with a non-2xx HTTP status.
    #[error("ServiceNow API error (HTTP {status_code}): {message}")]
    Api {
        /// The HTTP status code returned.
        status_code: u16,
        /// Error message extracted from the response body.
        message: String,
    },

    /// The response body was not the JSON shape we expected.
    #[error("failed to parse ServiceNow response: {0}")]
    Parse(String),

    /// HTTP request failed during transmission.
    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),

    /// HTTP client initialization failed.
    #[error("HTTP client error: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// Request timed out.
    #[error("request timed out after {duration:?} - the instance may be slow or unreachable")]
    Timeout {
        /// How long we waited before timing out.
        duration: Duration,
        /// The operation that timed out.
        operation: String,
    },

    /// JSON serialization of a tool result or request body failed.
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SnowlineError {
    /// Creates a configuration error for a missing environment variable.
    pub fn missing_env(var_name: &str) -> Self {
        SnowlineError::Config(format!(
            "missing required environment variable: {}",
            var_name
        ))
    }

    /// Creates a configuration error for an invalid value.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        SnowlineError::Config(message.into())
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        SnowlineError::Validation(message.into())
    }

    /// Creates a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        SnowlineError::NotFound { what: what.into() }
    }

    /// Creates an ambiguous match error.
    pub fn ambiguous(what: impl Into<String>, count: usize) -> Self {
        SnowlineError::Ambiguous {
            what: what.into(),
            count,
        }
    }

    /// Creates an API error for a non-success response.
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        SnowlineError::Api {
            status_code,
            message: message.into(),
        }
    }

    /// Creates a parse error with context about what was being decoded.
    pub fn parse(context: &str, detail: impl std::fmt::Display) -> Self {
        SnowlineError::Parse(format!("{}: {}", context, detail))
    }

    /// Creates a timeout error.
    pub fn timeout(duration: Duration, operation: impl Into<String>) -> Self {
        SnowlineError::Timeout {
            duration,
            operation: operation.into(),
        }
    }

    /// Returns the taxonomy name reported in tool error payloads.
    ///
    /// Transport-level failures (connection errors, timeouts) report as
    /// `ApiError` since they happen in place of an API response.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SnowlineError::Config(_) => "ConfigError",
            SnowlineError::Validation(_) => "ValidationError",
            SnowlineError::NotFound { .. } => "NotFoundError",
            SnowlineError::Ambiguous { .. } => "AmbiguousError",
            SnowlineError::Api { .. }
            | SnowlineError::Http(_)
            | SnowlineError::HttpClient(_)
            | SnowlineError::Timeout { .. } => "ApiError",
            SnowlineError::Parse(_) | SnowlineError::Serialization(_) => "ParseError",
        }
    }

    /// Returns true for errors raised before any network call is made.
    #[must_use]
    pub fn is_pre_flight(&self) -> bool {
        matches!(
            self,
            SnowlineError::Config(_) | SnowlineError::Validation(_)
        )
    }

    /// Sanitizes an error message to remove any occurrence of the password.
    ///
    /// Credentials must never appear in logs, error messages, or responses.
    ///
    /// # Arguments
    ///
    /// * `message` - The message to sanitize
    /// * `secret` - The secret to strip from the message
    ///
    /// # Returns
    ///
    /// The message with any occurrence of the secret replaced with `[REDACTED]`
    #[must_use]
    pub fn sanitize_message(message: &str, secret: &str) -> String {
        if secret.is_empty() {
            return message.to_string();
        }
        message.replace(secret, "[REDACTED]")
    }

    /// Creates a sanitized version of this error's display message.
    #[must_use]
    pub fn sanitized_display(&self, secret: &str) -> String {
        Self::sanitize_message(&self.to_string(), secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_env_error() {
        let err = SnowlineError::missing_env("SERVICENOW_PASSWORD");
        assert!(err.to_string().contains("SERVICENOW_PASSWORD"));
        assert!(err.to_string().contains("missing"));
        assert_eq!(err.kind(), "ConfigError");
    }

    #[test]
    fn test_validation_error() {
        let err = SnowlineError::validation("user is required");
        assert_eq!(err.to_string(), "validation error: user is required");
        assert_eq!(err.kind(), "ValidationError");
        assert!(err.is_pre_flight());
    }

    #[test]
    fn test_not_found_error() {
        let err = SnowlineError::not_found("user 'jdoe'");
        assert_eq!(err.to_string(), "not found: user 'jdoe'");
        assert_eq!(err.kind(), "NotFoundError");
        assert!(!err.is_pre_flight());
    }

    #[test]
    fn test_ambiguous_error() {
        let err = SnowlineError::ambiguous("application name 'web'", 3);
        let msg = err.to_string();
        assert!(msg.contains("3 records"));
        assert!(msg.contains("'web'"));
        assert_eq!(err.kind(), "AmbiguousError");
    }

    #[test]
    fn test_api_error_carries_status() {
        let err = SnowlineError::api(403, "User Not Authenticated");
        let msg = err.to_string();
        assert!(msg.contains("403"));
        assert!(msg.contains("User Not Authenticated"));
        assert_eq!(err.kind(), "ApiError");
    }

    #[test]
    fn test_parse_error() {
        let err = SnowlineError::parse("sys_user response", "expected value at line 1");
        assert!(err.to_string().contains("sys_user response"));
        assert_eq!(err.kind(), "ParseError");
    }

    #[test]
    fn test_timeout_error() {
        let err = SnowlineError::timeout(Duration::from_secs(30), "GET incident");
        let msg = err.to_string();
        assert!(msg.contains("timed out"));
        assert!(msg.contains("30s"));
        assert_eq!(err.kind(), "ApiError");
    }

    #[test]
    fn test_sanitize_message_removes_password() {
        let password = "hunter2-very-secret";
        let message = format!("Error authenticating with {} to instance", password);
        let sanitized = SnowlineError::sanitize_message(&message, password);
        assert!(!sanitized.contains(password));
        assert!(sanitized.contains("[REDACTED]"));
    }

    #[test]
    fn test_sanitize_message_empty_secret() {
        let message = "Some error message";
        let sanitized = SnowlineError::sanitize_message(message, "");
        assert_eq!(sanitized, message);
    }

    #[test]
    fn test_sanitized_display() {
        let err = SnowlineError::api(500, "internal failure for pw s3cr3t");
        let sanitized = err.sanitized_display("s3cr3t");
        assert!(!sanitized.contains("s3cr3t"));
        assert!(sanitized.contains("HTTP 500"));
    }
}
