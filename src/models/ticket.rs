//! Audit ticket models: the validated audit request, created records and
//! the per-ticket outcome report.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::common::deserialize_field;
use crate::error::SnowlineError;

/// Outcome of the operation being audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    /// The operation completed.
    Success,
    /// The operation failed.
    Failure,
    /// The operation completed on some servers only.
    Partial,
}

impl OperationStatus {
    /// Lowercase wire value.
    pub fn as_str(self) -> &'static str {
        match self {
            OperationStatus::Success => "success",
            OperationStatus::Failure => "failure",
            OperationStatus::Partial => "partial",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationStatus {
    type Err = SnowlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(OperationStatus::Success),
            "failure" => Ok(OperationStatus::Failure),
            "partial" => Ok(OperationStatus::Partial),
            other => Err(SnowlineError::validation(format!(
                "status must be one of 'success', 'failure' or 'partial', got {:?}",
                other.chars().take(50).collect::<String>()
            ))),
        }
    }
}

/// A fully validated audit request. Only constructed by input validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRequest {
    /// Who initiated the operation.
    pub user: String,
    /// What was done, e.g. `server_startup`.
    pub action: String,
    /// Affected application.
    pub application: String,
    /// Affected servers, in the order given.
    pub servers: Vec<String>,
    /// Outcome of the operation.
    pub status: OperationStatus,
    /// Free-text details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Teams channel where the request originated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teams_channel: Option<String>,
    /// AWS account of the servers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws_account: Option<String>,
    /// AWS region of the servers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws_region: Option<String>,
}

impl AuditRequest {
    /// Comma-separated server list as stored on the tickets.
    pub fn server_list(&self) -> String {
        self.servers.join(", ")
    }
}

/// Which ticket table a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketKind {
    /// `incident`
    Incident,
    /// `change_request`
    ChangeRequest,
}

impl TicketKind {
    /// The ServiceNow table name.
    pub fn table_name(self) -> &'static str {
        match self {
            TicketKind::Incident => "incident",
            TicketKind::ChangeRequest => "change_request",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            TicketKind::Incident => "incident",
            TicketKind::ChangeRequest => "change request",
        }
    }
}

/// The fields we read back from a created ticket.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatedRecord {
    /// Record ID.
    #[serde(default)]
    pub sys_id: String,

    /// Ticket number, e.g. `INC0010001`.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub number: Option<String>,
}

/// Result of one ticket creation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TicketOutcome {
    /// The record was created.
    Created {
        /// Ticket number.
        number: Option<String>,
        /// Record ID.
        sys_id: String,
        /// Link to the record in the ServiceNow UI.
        url: String,
    },
    /// The creation call failed.
    Failed {
        /// Sanitized failure reason.
        error: String,
    },
}

impl TicketOutcome {
    /// Returns true if the ticket was created.
    pub fn is_created(&self) -> bool {
        matches!(self, TicketOutcome::Created { .. })
    }
}

/// Overall status of an audit ticket submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Both tickets were created.
    Created,
    /// Exactly one of the two tickets was created.
    Partial,
}

/// Audit details echoed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditDetails {
    /// The validated request.
    #[serde(flatten)]
    pub request: AuditRequest,
    /// When the audit record was composed (UTC).
    pub timestamp: String,
}

/// Result of the audit ticket tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditTicketReport {
    /// Whether both tickets or only one were created.
    pub status: SubmissionStatus,
    /// Human-readable summary of the outcome.
    pub message: String,
    /// The summary text written to both tickets.
    pub summary: String,
    /// Incident creation outcome.
    pub incident: TicketOutcome,
    /// Change request creation outcome.
    pub change_request: TicketOutcome,
    /// What was audited.
    pub audit_details: AuditDetails,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_status_parse_case_insensitive() {
        assert_eq!(
            " Success ".parse::<OperationStatus>().unwrap(),
            OperationStatus::Success
        );
        assert_eq!(
            "PARTIAL".parse::<OperationStatus>().unwrap(),
            OperationStatus::Partial
        );
        assert_eq!(
            "failure".parse::<OperationStatus>().unwrap(),
            OperationStatus::Failure
        );
    }

    #[test]
    fn test_operation_status_rejects_unknown() {
        let err = "done".parse::<OperationStatus>().unwrap_err();
        assert!(matches!(err, SnowlineError::Validation(_)));
        assert!(err.to_string().contains("done"));
    }

    #[test]
    fn test_ticket_outcome_serialization() {
        let created = TicketOutcome::Created {
            number: Some("INC0010001".to_string()),
            sys_id: "abc".to_string(),
            url: "https://acme.service-now.com/incident.do?sys_id=abc".to_string(),
        };
        let out = serde_json::to_value(&created).unwrap();
        assert_eq!(out["status"], "created");
        assert_eq!(out["number"], "INC0010001");

        let failed = TicketOutcome::Failed {
            error: "HTTP 403".to_string(),
        };
        let out = serde_json::to_value(&failed).unwrap();
        assert_eq!(out["status"], "failed");
        assert!(!failed.is_created());
    }

    #[test]
    fn test_created_record_deserialize() {
        let rec: CreatedRecord =
            serde_json::from_str(r#"{"sys_id": "abc", "number": "CHG0030001", "state": "-5"}"#)
                .unwrap();
        assert_eq!(rec.number.as_deref(), Some("CHG0030001"));
    }

    #[test]
    fn test_ticket_kind_tables() {
        assert_eq!(TicketKind::Incident.table_name(), "incident");
        assert_eq!(TicketKind::ChangeRequest.table_name(), "change_request");
        assert_eq!(TicketKind::ChangeRequest.label(), "change request");
    }
}
