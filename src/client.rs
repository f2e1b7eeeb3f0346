//! HTTP client for the ServiceNow table API.
//!
//! This module provides the `SnClient` struct for making authenticated
//! requests against `{base}/api/now/table/{table}`.
//!
//! Calls are never retried: a non-2xx status becomes `SnowlineError::Api`
//! and a body that is not JSON becomes `SnowlineError::Parse`.
//!
//! # Security
//!
//! The password is never logged. All error messages are sanitized before logging.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::Config;
use crate::error::SnowlineError;
use crate::models::{EncodedQuery, ServiceNowErrorBody, TableResponse};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Path prefix of the table API.
const TABLE_API_PATH: &str = "/api/now/table";

/// Maximum length for HTTP error response bodies to avoid leaking verbose instance internals.
const MAX_ERROR_BODY_LEN: usize = 500;

/// What accompanies a table API request.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Query parameters (GET).
    Query(TableQuery),
    /// JSON body (POST).
    Body(Value),
}

/// HTTP client for the ServiceNow table API.
///
/// Handles authentication, URL construction, and response parsing for all
/// table operations.
///
/// # Example
///
/// ```ignore
/// let config = Config::from_env()?;
/// let client = SnClient::new(&config)?;
///
/// let query = TableQuery::new(EncodedQuery::new().and(QueryCondition::equals("active", "true")))
///     .with_fields(&["sys_id", "user_name"])
///     .with_limit(10);
/// let users: Vec<User> = client.query_table("sys_user", &query).await?;
/// ```
#[derive(Clone)]
pub struct SnClient {
    /// The underlying HTTP client (cloning is cheap).
    http: Client,

    /// Instance base URL (e.g., `https://acme.service-now.com`).
    base_url: String,

    /// Basic-auth user name.
    username: String,

    /// Basic-auth password.
    /// SECURITY: Never log this value!
    password: String,
}

impl SnClient {
    /// Creates a new client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `SnowlineError::HttpClient` if the HTTP client fails to initialize.
    pub fn new(config: &Config) -> Result<Self, SnowlineError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(SnowlineError::HttpClient)?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            username: config.username.clone(),
            password: config.password().to_string(),
        })
    }

    /// Returns the instance base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Renders an error for logs or tool output with the password redacted.
    pub fn describe_error(&self, error: &SnowlineError) -> String {
        error.sanitized_display(&self.password)
    }

    /// Validates that a table name is safe to interpolate into the URL path.
    ///
    /// # Errors
    ///
    /// Returns `SnowlineError::Validation` if the name is empty or contains
    /// anything other than lowercase letters, digits and underscores.
    fn validate_table(table: &str) -> Result<(), SnowlineError> {
        if table.is_empty()
            || !table
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        {
            return Err(SnowlineError::validation(format!(
                "table name must match [a-z0-9_]+, got: {:?}",
                table.chars().take(50).collect::<String>()
            )));
        }
        Ok(())
    }

    /// Returns the table API URL for a table.
    pub fn table_url(&self, table: &str) -> String {
        format!("{}{}/{}", self.base_url, TABLE_API_PATH, table)
    }

    /// Returns the web URL for viewing a record in the ServiceNow UI.
    pub fn record_url(&self, table: &str, sys_id: &str) -> String {
        format!(
            "{}/{}.do?sys_id={}",
            self.base_url,
            table,
            urlencoding::encode(sys_id)
        )
    }

    /// Tests connectivity and credentials with a one-row `sys_user` query.
    ///
    /// # Errors
    ///
    /// Returns the underlying error with the password redacted from its message.
    pub async fn test_connection(&self) -> Result<(), SnowlineError> {
        tracing::debug!("Testing connection to ServiceNow instance");

        let query = TableQuery::new(EncodedQuery::new())
            .with_fields(&["sys_id"])
            .with_limit(1);

        match self.request(Method::GET, "sys_user", Payload::Query(query)).await {
            Ok(_) => {
                tracing::info!("Connection test successful");
                Ok(())
            }
            Err(SnowlineError::Api { status_code, .. })
                if status_code == StatusCode::UNAUTHORIZED.as_u16() =>
            {
                Err(SnowlineError::invalid_config(
                    "authentication failed - verify SERVICENOW_USERNAME and SERVICENOW_PASSWORD",
                ))
            }
            Err(e) => Err(SnowlineError::invalid_config(format!(
                "connection test failed: {}",
                self.describe_error(&e)
            ))),
        }
    }

    /// Makes a request to the table API.
    ///
    /// Handles authentication, query/body serialization, and JSON parsing.
    ///
    /// # Arguments
    ///
    /// * `method` - HTTP method
    /// * `table` - Table name, e.g. `incident`
    /// * `payload` - Query parameters for GET, JSON body for POST
    ///
    /// # Errors
    ///
    /// - `SnowlineError::Api` when the status is not 2xx
    /// - `SnowlineError::Parse` when the body is not valid JSON
    /// - `SnowlineError::Http` / `SnowlineError::Timeout` on transport failures
    pub async fn request(
        &self,
        method: Method,
        table: &str,
        payload: Payload,
    ) -> Result<Value, SnowlineError> {
        Self::validate_table(table)?;
        let url = self.table_url(table);

        tracing::debug!(method = %method, table = %table, "Making ServiceNow API request");

        let mut req = self
            .http
            .request(method.clone(), &url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", "application/json");

        match payload {
            Payload::Query(query) => {
                req = req.query(&query.to_params());
            }
            Payload::Body(body) => {
                req = req.json(&body);
            }
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                return SnowlineError::timeout(
                    Duration::from_secs(DEFAULT_TIMEOUT_SECS),
                    format!("{} {}", method, table),
                );
            }
            SnowlineError::Http(e)
        })?;
        let status = response.status();

        if !status.is_success() {
            return Err(self.handle_http_error(status, response).await);
        }

        let body = response.text().await.map_err(SnowlineError::Http)?;

        tracing::trace!(table = %table, bytes = body.len(), "ServiceNow API response");

        serde_json::from_str(&body)
            .map_err(|e| SnowlineError::parse(&format!("{} {} response", method, table), e))
    }

    /// Queries a table and returns the `result` array as typed records.
    ///
    /// # Errors
    ///
    /// Returns `SnowlineError::Parse` if the response has no `result` array
    /// or the records do not match `T`, plus any error from [`SnClient::request`].
    pub async fn query_table<T>(
        &self,
        table: &str,
        query: &TableQuery,
    ) -> Result<Vec<T>, SnowlineError>
    where
        T: DeserializeOwned,
    {
        let value = self
            .request(Method::GET, table, Payload::Query(query.clone()))
            .await?;
        let response: TableResponse<Vec<T>> = serde_json::from_value(value)
            .map_err(|e| SnowlineError::parse(&format!("{} records", table), e))?;
        Ok(response.result)
    }

    /// Creates a record and returns the `result` object as `T`.
    ///
    /// # Errors
    ///
    /// Returns `SnowlineError::Parse` if the response has no `result` object
    /// or it does not match `T`, plus any error from [`SnClient::request`].
    pub async fn create_record<T>(&self, table: &str, body: Value) -> Result<T, SnowlineError>
    where
        T: DeserializeOwned,
    {
        let value = self.request(Method::POST, table, Payload::Body(body)).await?;
        let response: TableResponse<T> = serde_json::from_value(value)
            .map_err(|e| SnowlineError::parse(&format!("created {} record", table), e))?;
        Ok(response.result)
    }

    /// Converts a non-success response into `SnowlineError::Api`.
    ///
    /// The message comes from ServiceNow's error envelope when present,
    /// otherwise from the sanitized, truncated raw body.
    async fn handle_http_error(
        &self,
        status: StatusCode,
        response: reqwest::Response,
    ) -> SnowlineError {
        let body = response.text().await.unwrap_or_default();

        let message = serde_json::from_str::<ServiceNowErrorBody>(&body)
            .ok()
            .and_then(|envelope| envelope.message())
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("no response body")
                        .to_string()
                } else {
                    body.clone()
                }
            });

        let message = SnowlineError::sanitize_message(&message, &self.password);
        let message = if message.chars().count() > MAX_ERROR_BODY_LEN {
            format!(
                "{}...[truncated]",
                message.chars().take(MAX_ERROR_BODY_LEN).collect::<String>()
            )
        } else {
            message
        };

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::warn!(status = %status, "ServiceNow rejected the credentials");
        }

        SnowlineError::api(status.as_u16(), message)
    }
}

/// Parameters for a table query.
///
/// Use the builder methods to set the field list and row limit.
#[derive(Debug, Clone, Default)]
pub struct TableQuery {
    /// Encoded query (`sysparm_query`).
    query: EncodedQuery,

    /// Field list (`sysparm_fields`).
    fields: Vec<String>,

    /// Row limit (`sysparm_limit`).
    limit: Option<u32>,
}

impl TableQuery {
    /// Creates a query with the given filter, all fields and no explicit limit.
    pub fn new(query: EncodedQuery) -> Self {
        Self {
            query,
            fields: Vec::new(),
            limit: None,
        }
    }

    /// Restricts the returned fields.
    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Sets the maximum number of records to return.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Converts the query to `sysparm_*` parameters.
    ///
    /// Reference links are always excluded so reference fields come back as
    /// plain sys_id strings.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if !self.query.is_empty() {
            params.push(("sysparm_query", self.query.to_string()));
        }
        if !self.fields.is_empty() {
            params.push(("sysparm_fields", self.fields.join(",")));
        }
        if let Some(limit) = self.limit {
            params.push(("sysparm_limit", limit.to_string()));
        }
        params.push(("sysparm_exclude_reference_link", "true".to_string()));
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QueryCondition;

    /// Creates an SnClient for unit tests without requiring Config/env vars.
    fn test_client() -> SnClient {
        SnClient {
            http: Client::new(),
            base_url: "https://acme.service-now.com".to_string(),
            username: "svc_user".to_string(),
            password: "test_password".to_string(),
        }
    }

    #[test]
    fn test_table_url() {
        let client = test_client();
        assert_eq!(
            client.table_url("cmdb_rel_ci"),
            "https://acme.service-now.com/api/now/table/cmdb_rel_ci"
        );
    }

    #[test]
    fn test_new_from_config_uses_instance_host() {
        let config = Config::new("acme", "svc_user", "s3cret").unwrap();
        let client = SnClient::new(&config).unwrap();
        assert_eq!(
            client.table_url("incident"),
            "https://acme.service-now.com/api/now/table/incident"
        );
    }

    #[test]
    fn test_record_url_encodes_id() {
        let client = test_client();
        let url = client.record_url("incident", "abc123");
        assert_eq!(url, "https://acme.service-now.com/incident.do?sys_id=abc123");

        let url = client.record_url("incident", "abc&evil=true");
        assert!(!url.contains("&evil=true"));
        assert!(url.contains("sys_id=abc%26evil%3Dtrue"));
    }

    #[test]
    fn test_validate_table_valid() {
        assert!(SnClient::validate_table("sys_user_has_role").is_ok());
        assert!(SnClient::validate_table("cmdb_ci").is_ok());
    }

    #[test]
    fn test_validate_table_rejects_path_tricks() {
        assert!(SnClient::validate_table("").is_err());
        assert!(SnClient::validate_table("../sys_user").is_err());
        assert!(SnClient::validate_table("incident?x=1").is_err());
        assert!(SnClient::validate_table("Incident").is_err());
    }

    #[test]
    fn test_describe_error_redacts_password() {
        let client = test_client();
        let err = SnowlineError::api(500, "failed for test_password");
        let text = client.describe_error(&err);
        assert!(!text.contains("test_password"));
        assert!(text.contains("[REDACTED]"));
    }

    #[test]
    fn test_table_query_params() {
        let query = TableQuery::new(
            EncodedQuery::new().and(QueryCondition::equals("user", "u1")),
        )
        .with_fields(&["sys_id", "role.name"])
        .with_limit(100);

        let params = query.to_params();
        assert_eq!(
            params,
            vec![
                ("sysparm_query", "user=u1".to_string()),
                ("sysparm_fields", "sys_id,role.name".to_string()),
                ("sysparm_limit", "100".to_string()),
                ("sysparm_exclude_reference_link", "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_table_query_params_without_filter() {
        let params = TableQuery::default().to_params();
        assert_eq!(
            params,
            vec![("sysparm_exclude_reference_link", "true".to_string())]
        );
    }
}
