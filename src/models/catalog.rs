//! APM catalog models: applications, services and components.

use serde::{Deserialize, Serialize};

use super::common::deserialize_field;

/// The three APM tables searched by the catalog query, in merge order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogTable {
    /// `apm_application`
    Application,
    /// `apm_service`
    Service,
    /// `apm_component`
    Component,
}

impl CatalogTable {
    /// All catalog tables in the order their results are concatenated.
    pub const ALL: [CatalogTable; 3] = [
        CatalogTable::Application,
        CatalogTable::Service,
        CatalogTable::Component,
    ];

    /// The ServiceNow table name.
    pub fn table_name(self) -> &'static str {
        match self {
            CatalogTable::Application => "apm_application",
            CatalogTable::Service => "apm_service",
            CatalogTable::Component => "apm_component",
        }
    }

    /// Fields requested from this table.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            CatalogTable::Application => &[
                "sys_id",
                "name",
                "short_description",
                "state",
                "operational_status",
                "owner",
                "assigned_to",
            ],
            CatalogTable::Service => &[
                "sys_id",
                "name",
                "short_description",
                "state",
                "operational_status",
                "owner",
                "assigned_to",
                "application",
            ],
            CatalogTable::Component => &[
                "sys_id",
                "name",
                "short_description",
                "state",
                "operational_status",
                "owner",
                "assigned_to",
                "application",
                "service",
            ],
        }
    }
}

/// A record from one of the APM tables.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CatalogRecord {
    /// Unique record ID.
    #[serde(default)]
    pub sys_id: String,

    /// Display name.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub name: Option<String>,

    /// Short description (serialized as `description`).
    #[serde(
        default,
        rename(serialize = "description"),
        alias = "short_description",
        deserialize_with = "deserialize_field"
    )]
    pub description: Option<String>,

    /// Lifecycle state.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub state: Option<String>,

    /// Operational status.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub operational_status: Option<String>,

    /// Owning user.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub owner: Option<String>,

    /// Assignee.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub assigned_to: Option<String>,

    /// Parent application (services and components).
    #[serde(
        default,
        deserialize_with = "deserialize_field",
        skip_serializing_if = "Option::is_none"
    )]
    pub application: Option<String>,

    /// Parent service (components).
    #[serde(
        default,
        deserialize_with = "deserialize_field",
        skip_serializing_if = "Option::is_none"
    )]
    pub service: Option<String>,
}

impl CatalogRecord {
    /// Returns the display name, falling back to the sys_id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.sys_id)
    }

    /// True if the name contains `term` (case-insensitive) or the sys_id equals it.
    pub fn matches_term(&self, term: &str) -> bool {
        if self.sys_id == term {
            return true;
        }
        let term = term.to_lowercase();
        self.name
            .as_deref()
            .is_some_and(|name| name.to_lowercase().contains(&term))
    }
}

/// A catalog record tagged with the table it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogHit {
    /// Source table.
    pub source: CatalogTable,

    /// The record itself.
    #[serde(flatten)]
    pub record: CatalogRecord,
}

/// A catalog table whose query failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableFailure {
    /// Which table failed.
    pub table: CatalogTable,
    /// Sanitized failure reason.
    pub error: String,
}

/// Result of the APM catalog query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogSearch {
    /// The term that was searched for.
    pub search_term: String,
    /// Number of merged results.
    pub count: usize,
    /// Applications, then services, then components.
    pub results: Vec<CatalogHit>,
    /// Tables that could not be queried.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_tables: Vec<TableFailure>,
    /// True if any table failed.
    pub partial: bool,
}
