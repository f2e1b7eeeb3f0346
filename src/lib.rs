//! # Snowline
//!
//! Snowline is an MCP (Model Context Protocol) server of thin client tools
//! for the ServiceNow REST table API.
//!
//! ## Features
//!
//! - **APM catalog**: search applications, services and components by name or sys_id
//! - **Identity check**: resolve a user and list roles, groups, entitlements and ACLs
//! - **CMDB query**: find the servers behind an application, directly or through its
//!   services, with AWS instance details
//! - **Audit tickets**: record a server operation as an incident plus a change request
//! - **Security**: the password is never logged or exposed in error messages
//!
//! ## Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`config`] - Configuration loading from environment variables
//! - [`error`] - Error types with security-conscious message sanitization
//! - [`client`] - HTTP client for the ServiceNow table API
//! - [`server`] - MCP server implementation with tool routing
//! - [`models`] - Table records, encoded queries and tool results
//! - [`tools`] - Tool implementations and input parameter structs
//!
//! ## Configuration
//!
//! Snowline requires three environment variables, checked on the first tool call:
//!
//! - `SERVICENOW_INSTANCE`: instance name (`acme`) or base URL
//! - `SERVICENOW_USERNAME`: user name for basic authentication
//! - `SERVICENOW_PASSWORD`: password for basic authentication
//!
//! Optional:
//! - `RUST_LOG`: Log level (e.g., `snowline=debug`)
//!
//! ## Example
//!
//! Calling a tool directly with an [`SnClient`](client::SnClient):
//!
//! ```ignore
//! use snowline::client::SnClient;
//! use snowline::config::Config;
//! use snowline::tools;
//!
//! async fn example() -> Result<(), snowline::error::SnowlineError> {
//!     let config = Config::from_env()?;
//!     let client = SnClient::new(&config)?;
//!
//!     let report = tools::query_cmdb(&client, "web-application-001").await?;
//!     for server in &report.servers {
//!         println!("{} {:?}", server.sys_id, server.host_name);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod server;
pub mod tools;
