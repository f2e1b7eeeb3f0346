//! Tool input parameter structs for MCP tools.
//!
//! This module defines the input types for each MCP tool, with
//! JSON Schema derivation for MCP tool discovery.
//!
//! # Input Sanitization
//!
//! All input structs implement `sanitize()` which trims whitespace
//! from string fields. This should be called before processing input.

use rmcp::schemars::{self, JsonSchema};
use serde::Deserialize;

use crate::error::SnowlineError;
use crate::models::{AuditRequest, OperationStatus};

/// Helper function to trim an optional string.
fn trim_option(s: &Option<String>) -> Option<String> {
    s.as_ref().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Fails with a validation error naming `field` if `value` is blank.
pub(crate) fn require(field: &str, value: &str) -> Result<(), SnowlineError> {
    if value.trim().is_empty() {
        return Err(SnowlineError::validation(format!(
            "{} is required and cannot be empty",
            field
        )));
    }
    Ok(())
}

/// Input parameters for the servicenow_apm_catalog_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ApmCatalogInput {
    /// Partial application, service or component name, or an exact sys_id.
    #[serde(default)]
    pub search_term: String,
}

impl ApmCatalogInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            search_term: self.search_term.trim().to_string(),
        }
    }
}

/// Input parameters for the servicenow_identity_check tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct IdentityCheckInput {
    /// User sys_id, email address, or user name (e.g. "john.doe@company.com").
    #[serde(default)]
    pub user_identifier: String,
}

impl IdentityCheckInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            user_identifier: self.user_identifier.trim().to_string(),
        }
    }
}

/// Input parameters for the servicenow_cmdb_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CmdbQueryInput {
    /// Application sys_id or name (e.g. "web-application-001").
    #[serde(default)]
    pub application_id: String,
}

impl CmdbQueryInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            application_id: self.application_id.trim().to_string(),
        }
    }
}

/// Input parameters for the servicenow_audit_ticket tool.
///
/// User, action, application, servers and status are required.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AuditTicketInput {
    /// Who performed the operation (e.g. "john.doe@company.com").
    #[serde(default)]
    pub user: String,

    /// What was done (e.g. "server_startup").
    #[serde(default)]
    pub action: String,

    /// The affected application.
    #[serde(default)]
    pub application: String,

    /// Comma-separated list of affected servers.
    #[serde(default)]
    pub servers: String,

    /// Outcome of the operation: 'success', 'failure', or 'partial'.
    #[serde(default)]
    pub status: String,

    /// Free-text details about the operation.
    #[serde(default)]
    pub details: Option<String>,

    /// Teams channel where the operation was requested.
    #[serde(default)]
    pub teams_channel: Option<String>,

    /// AWS account of the affected servers.
    #[serde(default)]
    pub aws_account: Option<String>,

    /// AWS region of the affected servers.
    #[serde(default)]
    pub aws_region: Option<String>,
}

impl AuditTicketInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            user: self.user.trim().to_string(),
            action: self.action.trim().to_string(),
            application: self.application.trim().to_string(),
            servers: self.servers.trim().to_string(),
            status: self.status.trim().to_string(),
            details: trim_option(&self.details),
            teams_channel: trim_option(&self.teams_channel),
            aws_account: trim_option(&self.aws_account),
            aws_region: trim_option(&self.aws_region),
        }
    }

    /// Validates the input and converts it into an [`AuditRequest`].
    ///
    /// Runs entirely offline. Fails on the first blank required field, on a
    /// server list with no names, or on a status outside
    /// success/failure/partial.
    pub fn validate(&self) -> Result<AuditRequest, SnowlineError> {
        require("user", &self.user)?;
        require("action", &self.action)?;
        require("application", &self.application)?;
        require("servers", &self.servers)?;
        require("status", &self.status)?;

        let servers: Vec<String> = self
            .servers
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if servers.is_empty() {
            return Err(SnowlineError::validation(
                "servers must name at least one server",
            ));
        }

        let status: OperationStatus = self.status.parse()?;

        Ok(AuditRequest {
            user: self.user.trim().to_string(),
            action: self.action.trim().to_string(),
            application: self.application.trim().to_string(),
            servers,
            status,
            details: trim_option(&self.details),
            teams_channel: trim_option(&self.teams_channel),
            aws_account: trim_option(&self.aws_account),
            aws_region: trim_option(&self.aws_region),
        })
    }
}
