//! Data models for the ServiceNow table API.
//!
//! This module contains type definitions for the tables the tools read and
//! write: APM catalog records, users and entitlements, CMDB relationships and
//! servers, audit tickets, and common query/response types.

mod catalog;
mod cmdb;
mod common;
mod ticket;
mod user;

pub use catalog::*;
pub use cmdb::*;
pub use common::*;
pub use ticket::*;
pub use user::*;
