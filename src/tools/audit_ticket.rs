//! Audit ticket creation: one incident and one change request per operation.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::client::SnClient;
use crate::error::SnowlineError;
use crate::models::{
    AuditDetails, AuditRequest, AuditTicketReport, CreatedRecord, SubmissionStatus, TicketKind,
    TicketOutcome,
};

use super::inputs::AuditTicketInput;

/// Timestamp format used in the summary and work notes.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Formats a timestamp the way it appears on tickets.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Composes the audit summary written to both tickets.
pub fn compose_summary(request: &AuditRequest, timestamp: &str) -> String {
    let mut lines = vec![
        "**AUDIT TRAIL - Server Operation**".to_string(),
        String::new(),
        format!("**WHO:** {}", request.user),
        format!("**WHAT:** {}", request.action),
        format!("**WHEN:** {}", timestamp),
        format!("**APPLICATION:** {}", request.application),
        format!("**SERVERS:** {}", request.server_list()),
        format!("**STATUS:** {}", request.status.as_str().to_uppercase()),
        String::new(),
    ];

    if let Some(channel) = &request.teams_channel {
        lines.push(format!("**TEAMS CHANNEL:** {}", channel));
    }
    if let Some(account) = &request.aws_account {
        lines.push(format!("**AWS ACCOUNT:** {}", account));
    }
    if let Some(region) = &request.aws_region {
        lines.push(format!("**AWS REGION:** {}", region));
    }
    if let Some(details) = &request.details {
        lines.push(String::new());
        lines.push("**DETAILS:**".to_string());
        lines.push(details.clone());
    }

    lines.extend([
        String::new(),
        "**AUDIT INFORMATION:**".to_string(),
        "- Created automatically by the snowline audit ticket tool".to_string(),
        "- All actions logged for compliance and audit purposes".to_string(),
    ]);

    lines.join("\n")
}

/// Custom `u_*` audit fields carried by both tickets.
fn audit_fields(request: &AuditRequest) -> serde_json::Map<String, Value> {
    let mut fields = serde_json::Map::new();
    fields.insert("u_audit_type".into(), json!("Server Operation"));
    fields.insert("u_operation_type".into(), json!(request.action));
    fields.insert("u_application_name".into(), json!(request.application));
    fields.insert("u_servers_affected".into(), json!(request.server_list()));
    fields.insert("u_operation_status".into(), json!(request.status.as_str()));
    fields.insert(
        "u_teams_channel".into(),
        json!(request.teams_channel.as_deref().unwrap_or_default()),
    );
    fields.insert(
        "u_aws_account".into(),
        json!(request.aws_account.as_deref().unwrap_or_default()),
    );
    fields.insert(
        "u_aws_region".into(),
        json!(request.aws_region.as_deref().unwrap_or_default()),
    );
    fields
}

/// Request body for the incident record.
pub fn incident_body(request: &AuditRequest, summary: &str, timestamp: &str) -> Value {
    let status = request.status.as_str().to_uppercase();
    let mut body = json!({
        "short_description": format!(
            "Audit: {} for {} - {}",
            request.action, request.application, status
        ),
        "description": summary,
        "category": "Infrastructure",
        "subcategory": "Server Management",
        "priority": "3",
        "urgency": "3",
        "caller_id": request.user,
        "work_notes": format!(
            "Automated audit ticket created at {} for {} operation on {}",
            timestamp, request.action, request.application
        ),
        "comments": format!(
            "Operation Status: {}\nServers Affected: {}\nInitiated by: {}",
            status,
            request.server_list(),
            request.user
        ),
    });
    if let Some(object) = body.as_object_mut() {
        object.extend(audit_fields(request));
    }
    body
}

/// Request body for the change request record.
pub fn change_request_body(request: &AuditRequest, summary: &str, timestamp: &str) -> Value {
    let mut body = json!({
        "short_description": format!("Change: {} for {}", request.action, request.application),
        "description": summary,
        "category": "Infrastructure",
        "subcategory": "Server Management",
        "priority": "3",
        "type": "standard",
        "risk": "low",
        "requested_by": request.user,
        "work_notes": format!(
            "Audit trail for {} operation on {} at {}",
            request.action, request.application, timestamp
        ),
    });
    if let Some(object) = body.as_object_mut() {
        object.extend(audit_fields(request));
    }
    body
}

async fn create_ticket(
    client: &SnClient,
    kind: TicketKind,
    body: Value,
) -> Result<TicketOutcome, SnowlineError> {
    let record: CreatedRecord = client.create_record(kind.table_name(), body).await?;
    tracing::info!(
        ticket = kind.label(),
        number = record.number.as_deref().unwrap_or("-"),
        "Ticket created"
    );
    Ok(TicketOutcome::Created {
        url: client.record_url(kind.table_name(), &record.sys_id),
        number: record.number,
        sys_id: record.sys_id,
    })
}

fn reference(outcome: &TicketOutcome) -> String {
    match outcome {
        TicketOutcome::Created { number, sys_id, .. } => {
            number.clone().unwrap_or_else(|| sys_id.clone())
        }
        TicketOutcome::Failed { error } => error.clone(),
    }
}

/// Validates raw tool input and creates both tickets.
///
/// Nothing is sent to ServiceNow unless validation passes.
///
/// # Errors
///
/// - `SnowlineError::Validation` for blank required fields or an unknown status
/// - the incident's error when neither ticket could be created
pub async fn submit_audit_ticket(
    client: &SnClient,
    input: &AuditTicketInput,
) -> Result<AuditTicketReport, SnowlineError> {
    let request = input.validate()?;
    create_audit_tickets(client, &request).await
}

/// Creates the incident and change request for a validated audit request.
///
/// Uses the current UTC time for the summary.
///
/// # Errors
///
/// Returns the incident's error when neither ticket could be created.
pub async fn create_audit_tickets(
    client: &SnClient,
    request: &AuditRequest,
) -> Result<AuditTicketReport, SnowlineError> {
    create_audit_tickets_at(client, request, Utc::now()).await
}

/// Creates both tickets with a fixed timestamp.
///
/// The two creation calls are independent: a failure of one does not stop
/// the other, and a single success is reported as `partial`.
///
/// # Errors
///
/// Returns the incident's error when neither ticket could be created.
pub async fn create_audit_tickets_at(
    client: &SnClient,
    request: &AuditRequest,
    at: DateTime<Utc>,
) -> Result<AuditTicketReport, SnowlineError> {
    let timestamp = format_timestamp(at);
    let summary = compose_summary(request, &timestamp);

    let incident = create_ticket(
        client,
        TicketKind::Incident,
        incident_body(request, &summary, &timestamp),
    )
    .await;
    let change_request = create_ticket(
        client,
        TicketKind::ChangeRequest,
        change_request_body(request, &summary, &timestamp),
    )
    .await;

    let to_outcome = |kind: TicketKind, result: Result<TicketOutcome, SnowlineError>| {
        result.unwrap_or_else(|e| {
            let error = client.describe_error(&e);
            tracing::warn!(ticket = kind.label(), error = %error, "Ticket creation failed");
            TicketOutcome::Failed { error }
        })
    };

    let (incident, change_request) = match (incident, change_request) {
        (Err(e), Err(_)) => {
            tracing::error!(error = %client.describe_error(&e), "No audit ticket could be created");
            return Err(e);
        }
        (incident, change_request) => (
            to_outcome(TicketKind::Incident, incident),
            to_outcome(TicketKind::ChangeRequest, change_request),
        ),
    };

    let (status, message) = match (incident.is_created(), change_request.is_created()) {
        (true, true) => (
            SubmissionStatus::Created,
            format!(
                "Created incident {} and change request {}",
                reference(&incident),
                reference(&change_request)
            ),
        ),
        (true, false) => (
            SubmissionStatus::Partial,
            format!(
                "Created incident {}; change request failed: {}",
                reference(&incident),
                reference(&change_request)
            ),
        ),
        _ => (
            SubmissionStatus::Partial,
            format!(
                "Created change request {}; incident failed: {}",
                reference(&change_request),
                reference(&incident)
            ),
        ),
    };

    Ok(AuditTicketReport {
        status,
        message,
        summary,
        incident,
        change_request,
        audit_details: AuditDetails {
            request: request.clone(),
            timestamp,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OperationStatus;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn request() -> AuditRequest {
        AuditRequest {
            user: "john.doe@company.com".to_string(),
            action: "server_startup".to_string(),
            application: "web-application-001".to_string(),
            servers: vec!["web-server-01".to_string(), "web-server-02".to_string()],
            status: OperationStatus::Success,
            details: None,
            teams_channel: None,
            aws_account: None,
            aws_region: None,
        }
    }

    #[test]
    fn test_format_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(format_timestamp(at), "2024-03-05 07:08:09 UTC");
    }

    #[test]
    fn test_compose_summary_required_fields_only() {
        let summary = compose_summary(&request(), "2024-03-05 07:08:09 UTC");
        assert_eq!(
            summary,
            "**AUDIT TRAIL - Server Operation**\n\
             \n\
             **WHO:** john.doe@company.com\n\
             **WHAT:** server_startup\n\
             **WHEN:** 2024-03-05 07:08:09 UTC\n\
             **APPLICATION:** web-application-001\n\
             **SERVERS:** web-server-01, web-server-02\n\
             **STATUS:** SUCCESS\n\
             \n\
             **AUDIT INFORMATION:**\n\
             - Created automatically by the snowline audit ticket tool\n\
             - All actions logged for compliance and audit purposes"
        );
    }

    #[test]
    fn test_compose_summary_optional_fields() {
        let request = AuditRequest {
            details: Some("Patched kernel".to_string()),
            teams_channel: Some("ops-alerts".to_string()),
            aws_account: Some("123456789012".to_string()),
            aws_region: Some("us-east-1".to_string()),
            ..request()
        };
        let summary = compose_summary(&request, "t");
        assert!(summary.contains("**TEAMS CHANNEL:** ops-alerts"));
        assert!(summary.contains("**AWS ACCOUNT:** 123456789012"));
        assert!(summary.contains("**AWS REGION:** us-east-1"));
        assert!(summary.contains("**DETAILS:**\nPatched kernel\n\n**AUDIT INFORMATION:**"));
    }

    #[test]
    fn test_compose_summary_ends_with_audit_information() {
        let summary = compose_summary(&request(), "t");
        let (_, footer) = summary.split_once("**AUDIT INFORMATION:**").unwrap();
        assert_eq!(footer.lines().filter(|l| l.starts_with("- ")).count(), 2);
        assert!(summary.ends_with("- All actions logged for compliance and audit purposes"));
    }

    #[test]
    fn test_incident_body_fields() {
        let body = incident_body(&request(), "SUMMARY", "t");
        assert_eq!(
            body["short_description"],
            "Audit: server_startup for web-application-001 - SUCCESS"
        );
        assert_eq!(body["description"], "SUMMARY");
        assert_eq!(body["caller_id"], "john.doe@company.com");
        assert_eq!(body["u_servers_affected"], "web-server-01, web-server-02");
        assert_eq!(body["u_operation_status"], "success");
        assert_eq!(body["u_aws_region"], "");
    }

    #[test]
    fn test_change_request_body_fields() {
        let body = change_request_body(&request(), "SUMMARY", "t");
        assert_eq!(
            body["short_description"],
            "Change: server_startup for web-application-001"
        );
        assert_eq!(body["description"], "SUMMARY");
        assert_eq!(body["type"], "standard");
        assert_eq!(body["risk"], "low");
        assert_eq!(body["requested_by"], "john.doe@company.com");
        assert_eq!(body["u_application_name"], "web-application-001");
    }
}
