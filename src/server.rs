//! MCP server implementation for Snowline.
//!
//! This module defines the `SnowlineServer` struct that implements the MCP
//! `ServerHandler` trait, exposing the ServiceNow tools.

use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ServerHandler,
};
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::client::SnClient;
use crate::config::Config;
use crate::error::SnowlineError;
use crate::tools::{
    self, ApmCatalogInput, AuditTicketInput, CmdbQueryInput, IdentityCheckInput,
};

/// The Snowline MCP server.
///
/// The ServiceNow client is built on first use, so missing credentials are
/// reported as a `ConfigError` by the first tool call instead of preventing
/// startup.
#[derive(Clone)]
pub struct SnowlineServer {
    /// Lazily initialized ServiceNow client.
    client: Arc<OnceCell<SnClient>>,
    /// Tool router for MCP tool dispatch.
    tool_router: ToolRouter<Self>,
}

impl Default for SnowlineServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_router]
impl SnowlineServer {
    /// Creates a server that reads its configuration from the environment
    /// on the first tool call.
    pub fn new() -> Self {
        Self {
            client: Arc::new(OnceCell::new()),
            tool_router: Self::tool_router(),
        }
    }

    /// Creates a server around an already configured client.
    pub fn with_client(client: SnClient) -> Self {
        Self {
            client: Arc::new(OnceCell::new_with(Some(client))),
            tool_router: Self::tool_router(),
        }
    }

    /// A simple ping tool to verify the server is running.
    ///
    /// Does not contact ServiceNow.
    #[tool(description = "Test connectivity to the Snowline MCP server. Returns 'pong' if the server is running correctly.")]
    fn ping(&self) -> String {
        tracing::debug!("ping tool called");
        "pong".to_string()
    }

    /// Search the APM catalog.
    #[tool(
        name = "servicenow_apm_catalog_query",
        description = "Search the ServiceNow APM catalog (applications, services and components) by partial name or exact sys_id. Returns matching records tagged with their source table."
    )]
    async fn apm_catalog_query(
        &self,
        Parameters(input): Parameters<ApmCatalogInput>,
    ) -> Result<String, String> {
        let input = input.sanitize();
        tracing::debug!(search_term = %input.search_term, "servicenow_apm_catalog_query tool called");

        let client = self.client().await.map_err(|e| self.error_payload(&e))?;
        let result = tools::search_catalog(client, &input.search_term)
            .await
            .map_err(|e| self.error_payload(&e))?;

        self.render(&result)
    }

    /// Check a user's identity and entitlements.
    #[tool(
        name = "servicenow_identity_check",
        description = "Look up a ServiceNow user by sys_id, email or user name and report their roles, group memberships, entitlements and access control rules. Sections that cannot be loaded are flagged as partial."
    )]
    async fn identity_check(
        &self,
        Parameters(input): Parameters<IdentityCheckInput>,
    ) -> Result<String, String> {
        let input = input.sanitize();
        tracing::debug!("servicenow_identity_check tool called");

        let client = self.client().await.map_err(|e| self.error_payload(&e))?;
        let report = tools::check_identity(client, &input.user_identifier)
            .await
            .map_err(|e| self.error_payload(&e))?;

        self.render(&report)
    }

    /// Find the servers behind an application.
    #[tool(
        name = "servicenow_cmdb_query",
        description = "Find the servers linked to an application in the CMDB, directly or through its services. Servers are deduplicated and AWS instances carry their account, region and instance details."
    )]
    async fn cmdb_query(
        &self,
        Parameters(input): Parameters<CmdbQueryInput>,
    ) -> Result<String, String> {
        let input = input.sanitize();
        tracing::debug!(application_id = %input.application_id, "servicenow_cmdb_query tool called");

        let client = self.client().await.map_err(|e| self.error_payload(&e))?;
        let report = tools::query_cmdb(client, &input.application_id)
            .await
            .map_err(|e| self.error_payload(&e))?;

        self.render(&report)
    }

    /// Record a server operation as an incident plus a change request.
    #[tool(
        name = "servicenow_audit_ticket",
        description = "Create ServiceNow audit tickets (one incident and one change request) recording who did what, when, to which application and servers. Requires user, action, application, servers (comma-separated) and status ('success', 'failure' or 'partial')."
    )]
    async fn audit_ticket(
        &self,
        Parameters(input): Parameters<AuditTicketInput>,
    ) -> Result<String, String> {
        let input = input.sanitize();
        tracing::debug!(action = %input.action, application = %input.application, "servicenow_audit_ticket tool called");

        // Validation happens before the client is touched.
        let request = input.validate().map_err(|e| self.error_payload(&e))?;

        let client = self.client().await.map_err(|e| self.error_payload(&e))?;
        let report = tools::create_audit_tickets(client, &request)
            .await
            .map_err(|e| self.error_payload(&e))?;

        self.render(&report)
    }

    /// Returns the client, building it from the environment on first use.
    async fn client(&self) -> Result<&SnClient, SnowlineError> {
        self.client
            .get_or_try_init(|| async {
                let config = Config::from_env()?;
                tracing::debug!(base_url = %config.base_url(), "Configuration loaded");
                SnClient::new(&config)
            })
            .await
    }

    /// Renders a tool result as pretty JSON.
    fn render<T: Serialize>(&self, value: &T) -> Result<String, String> {
        serde_json::to_string_pretty(value)
            .map_err(|e| self.error_payload(&SnowlineError::from(e)))
    }

    /// Builds the `{"error", "message"}` payload, with the password redacted.
    fn error_payload(&self, error: &SnowlineError) -> String {
        let message = match self.client.get() {
            Some(client) => client.describe_error(error),
            None => error.to_string(),
        };

        if error.is_pre_flight() {
            tracing::warn!(kind = error.kind(), error = %message, "Tool input rejected");
        } else {
            tracing::error!(kind = error.kind(), error = %message, "Tool call failed");
        }

        serde_json::json!({
            "error": error.kind(),
            "message": message,
        })
        .to_string()
    }
}

#[tool_handler]
impl ServerHandler for SnowlineServer {
    /// Returns server information for the MCP initialize handshake.
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Snowline provides read access to the ServiceNow APM catalog, users and CMDB, \
                 and creates audit tickets. Use servicenow_apm_catalog_query to find applications, \
                 servicenow_identity_check to review a user's access, servicenow_cmdb_query to list \
                 the servers behind an application, and servicenow_audit_ticket to record a server \
                 operation. Start with 'ping' to verify connectivity."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
