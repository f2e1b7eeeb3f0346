//! Common types shared across ServiceNow table API models.
//!
//! This module defines the encoded query builder, response envelopes,
//! tolerant field deserialization, and the soft-fail `Section` wrapper
//! used by multiple tools.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::SnowlineError;

/// Length of a ServiceNow `sys_id` (32 hex characters).
pub const SYS_ID_LEN: usize = 32;

/// Returns true if the value has the shape of a ServiceNow `sys_id`.
pub fn is_sys_id(value: &str) -> bool {
    value.len() == SYS_ID_LEN && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Rejects values that would alter the structure of an encoded query.
///
/// ServiceNow has no escape sequence for the `^` separator, so a value
/// containing it could inject extra conditions.
pub fn validate_query_value(field_name: &str, value: &str) -> Result<(), SnowlineError> {
    if value.contains('^') || value.contains('\n') || value.contains('\r') {
        return Err(SnowlineError::validation(format!(
            "{} contains a reserved character ('^' or line break)",
            field_name
        )));
    }
    Ok(())
}

/// Comparison operator in an encoded query condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOperator {
    /// Exact match: `field=value`.
    Equals,
    /// Case-insensitive substring match: `fieldLIKEvalue`.
    Like,
    /// Class hierarchy match: `fieldINSTANCEOFclass`.
    InstanceOf,
}

impl QueryOperator {
    fn as_str(self) -> &'static str {
        match self {
            QueryOperator::Equals => "=",
            QueryOperator::Like => "LIKE",
            QueryOperator::InstanceOf => "INSTANCEOF",
        }
    }
}

/// A single condition in an encoded query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCondition {
    /// The field to filter on (dot-walking allowed, e.g. `child.sys_class_name`).
    pub field: String,

    /// The comparison operator.
    pub operator: QueryOperator,

    /// The value to compare against.
    pub value: String,
}

impl QueryCondition {
    /// Creates an exact match condition.
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: QueryOperator::Equals,
            value: value.into(),
        }
    }

    /// Creates a "contains" condition for partial matching.
    pub fn like(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: QueryOperator::Like,
            value: value.into(),
        }
    }

    /// Creates a class hierarchy condition.
    pub fn instance_of(field: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: QueryOperator::InstanceOf,
            value: class_name.into(),
        }
    }
}

impl fmt::Display for QueryCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.field, self.operator.as_str(), self.value)
    }
}

/// How a condition joins the conditions before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Join {
    /// `^` - logical AND.
    And,
    /// `^OR` - logical OR, binding tighter than AND.
    Or,
}

/// A ServiceNow encoded query (`sysparm_query`).
///
/// ```ignore
/// let query = EncodedQuery::new()
///     .and(QueryCondition::like("name", "web"))
///     .or(QueryCondition::equals("sys_id", "web"));
/// assert_eq!(query.to_string(), "nameLIKEweb^ORsys_id=web");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedQuery {
    clauses: Vec<(Join, QueryCondition)>,
}

impl EncodedQuery {
    /// Creates an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a condition joined with AND.
    #[must_use]
    pub fn and(mut self, condition: QueryCondition) -> Self {
        self.clauses.push((Join::And, condition));
        self
    }

    /// Appends a condition joined with OR.
    #[must_use]
    pub fn or(mut self, condition: QueryCondition) -> Self {
        self.clauses.push((Join::Or, condition));
        self
    }

    /// Returns true if there are no conditions.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

impl fmt::Display for EncodedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (join, condition)) in self.clauses.iter().enumerate() {
            if i > 0 {
                match join {
                    Join::And => f.write_str("^")?,
                    Join::Or => f.write_str("^OR")?,
                }
            }
            write!(f, "{}", condition)?;
        }
        Ok(())
    }
}

/// Envelope of every table API response: `{"result": ...}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TableResponse<T> {
    /// The record (create) or record list (query).
    pub result: T,
}

/// Error envelope returned by ServiceNow on failure.
///
/// ```json
/// {"error": {"message": "No Record found", "detail": "..."}, "status": "failure"}
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceNowErrorBody {
    /// Error details.
    #[serde(default)]
    pub error: Option<ServiceNowErrorDetail>,
}

/// Message and detail inside a ServiceNow error envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceNowErrorDetail {
    /// Short error message.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub message: Option<String>,

    /// Longer explanation, often null.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub detail: Option<String>,
}

impl ServiceNowErrorBody {
    /// Returns a combined "message: detail" string, if the envelope carried one.
    pub fn message(&self) -> Option<String> {
        let error = self.error.as_ref()?;
        match (&error.message, &error.detail) {
            (Some(message), Some(detail)) => Some(format!("{}: {}", message, detail)),
            (Some(message), None) => Some(message.clone()),
            (None, Some(detail)) => Some(detail.clone()),
            (None, None) => None,
        }
    }
}

/// Deserializes a ServiceNow field value into `Option<String>`.
///
/// Field values arrive as strings, numbers, booleans, or reference objects
/// (`{"value": "...", "display_value": "...", "link": "..."}`). Empty strings
/// are treated as absent, which is how ServiceNow reports unset fields.
pub fn deserialize_field<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(field_text))
}

fn field_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(mut map) => map
            .remove("display_value")
            .and_then(field_text)
            .or_else(|| map.remove("value").and_then(field_text)),
        Value::Array(_) => None,
    }
}

/// Deserializes a ServiceNow boolean field (`"true"`, `"false"`, or a JSON bool).
pub fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = deserialize_field(deserializer)?;
    Ok(field_flag(&text))
}

/// Parses a ServiceNow boolean field (`"true"`/`"false"`).
pub fn field_flag(value: &Option<String>) -> Option<bool> {
    match value.as_deref()?.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// One sub-section of a tool result that may fail independently.
///
/// A failed section keeps the tool response alive: `partial` is set and
/// `error` carries the (sanitized) reason, while `records` stays empty.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Section<T> {
    /// Number of records in this section.
    pub count: usize,

    /// The records retrieved.
    pub records: Vec<T>,

    /// True when the section could not be retrieved.
    pub partial: bool,

    /// Why the section could not be retrieved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Section<T> {
    /// Creates a fully retrieved section.
    pub fn complete(records: Vec<T>) -> Self {
        Self {
            count: records.len(),
            records,
            partial: false,
            error: None,
        }
    }

    /// Creates a section that failed to load.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            count: 0,
            records: Vec::new(),
            partial: true,
            error: Some(error.into()),
        }
    }
}
