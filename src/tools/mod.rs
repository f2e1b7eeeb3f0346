//! MCP tool implementations for Snowline.
//!
//! Each tool is a plain async function over an [`SnClient`](crate::client::SnClient),
//! so it can be called directly or through the MCP server. This module also
//! holds the tool input types.

mod apm_catalog;
mod audit_ticket;
mod cmdb_query;
mod identity_check;
mod inputs;

pub use apm_catalog::*;
pub use audit_ticket::*;
pub use cmdb_query::*;
pub use identity_check::*;
pub use inputs::*;
