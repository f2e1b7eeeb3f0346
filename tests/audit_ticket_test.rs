//! Audit ticket creation against a mock ServiceNow instance.

mod common;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use snowline::models::{SubmissionStatus, TicketOutcome};
use snowline::tools::{create_audit_tickets_at, submit_audit_ticket, AuditTicketInput};
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::body_partial_json;
use wiremock::{MockServer, ResponseTemplate};

use common::{mock_client, post_table, request_count, sn_error, table_path};

fn input() -> AuditTicketInput {
    AuditTicketInput {
        user: "john.doe@company.com".to_string(),
        action: "server_startup".to_string(),
        application: "web-application-001".to_string(),
        servers: "web-server-01,web-server-02".to_string(),
        status: "success".to_string(),
        details: Some("Started after maintenance window".to_string()),
        teams_channel: Some("ops-alerts".to_string()),
        aws_account: None,
        aws_region: None,
    }
}

fn created(sys_id: &str, number: &str) -> ResponseTemplate {
    ResponseTemplate::new(201).set_body_json(json!({
        "result": {"sys_id": sys_id, "number": number}
    }))
}

#[tokio::test]
async fn blank_required_field_makes_no_requests() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    let blanks: [fn(&mut AuditTicketInput); 5] = [
        |i| i.user = String::new(),
        |i| i.action = "  ".to_string(),
        |i| i.application = String::new(),
        |i| i.servers = " , ".to_string(),
        |i| i.status = String::new(),
    ];
    for blank in blanks {
        let mut bad = input();
        blank(&mut bad);
        let err = assert_err!(submit_audit_ticket(&client, &bad).await);
        assert_eq!(err.kind(), "ValidationError");
    }

    assert_eq!(request_count(&server).await, 0);
}

#[tokio::test]
async fn unknown_status_makes_no_requests() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    let bad = AuditTicketInput {
        status: "done".to_string(),
        ..input()
    };
    let err = assert_err!(submit_audit_ticket(&client, &bad).await);

    assert_eq!(err.kind(), "ValidationError");
    assert_eq!(request_count(&server).await, 0);
}

#[tokio::test]
async fn success_creates_one_incident_and_one_change_request() {
    let server = MockServer::start().await;
    post_table("incident")
        .and(body_partial_json(json!({
            "short_description": "Audit: server_startup for web-application-001 - SUCCESS",
            "caller_id": "john.doe@company.com",
            "u_servers_affected": "web-server-01, web-server-02"
        })))
        .respond_with(created("inc1", "INC0010001"))
        .expect(1)
        .mount(&server)
        .await;
    post_table("change_request")
        .and(body_partial_json(json!({
            "short_description": "Change: server_startup for web-application-001",
            "requested_by": "john.doe@company.com",
            "u_servers_affected": "web-server-01, web-server-02"
        })))
        .respond_with(created("chg1", "CHG0030001"))
        .expect(1)
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let request = input().validate().unwrap();
    let at = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
    let report = assert_ok!(create_audit_tickets_at(&client, &request, at).await);

    assert_eq!(report.status, SubmissionStatus::Created);
    assert!(report.summary.contains("**WHEN:** 2024-03-05 07:08:09 UTC"));
    assert!(report.summary.contains("**SERVERS:** web-server-01, web-server-02"));
    assert!(report.summary.contains("**TEAMS CHANNEL:** ops-alerts"));
    assert_eq!(report.audit_details.timestamp, "2024-03-05 07:08:09 UTC");

    assert_eq!(
        report.incident,
        TicketOutcome::Created {
            number: Some("INC0010001".to_string()),
            sys_id: "inc1".to_string(),
            url: format!("{}/incident.do?sys_id=inc1", server.uri()),
        }
    );
    assert!(report.change_request.is_created());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let bodies: Vec<Value> = requests
        .iter()
        .map(|r| r.body_json::<Value>().unwrap())
        .collect();
    for body in &bodies {
        assert_eq!(body["description"], report.summary.as_str());
        assert_eq!(body["u_servers_affected"], "web-server-01, web-server-02");
    }
    assert_eq!(requests[0].url.path(), table_path("incident"));
    assert_eq!(requests[1].url.path(), table_path("change_request"));
}

#[tokio::test]
async fn one_failed_ticket_is_a_partial_success() {
    let server = MockServer::start().await;
    post_table("incident")
        .respond_with(created("inc1", "INC0010001"))
        .expect(1)
        .mount(&server)
        .await;
    post_table("change_request")
        .respond_with(sn_error(403, "Insufficient rights to insert"))
        .expect(1)
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let report = assert_ok!(submit_audit_ticket(&client, &input()).await);

    assert_eq!(report.status, SubmissionStatus::Partial);
    assert!(report.incident.is_created());
    match &report.change_request {
        TicketOutcome::Failed { error } => assert!(error.contains("Insufficient rights")),
        other => panic!("expected failed change request, got {:?}", other),
    }
    assert!(report.message.contains("INC0010001"));
}

#[tokio::test]
async fn change_request_is_attempted_when_incident_fails() {
    let server = MockServer::start().await;
    post_table("incident")
        .respond_with(sn_error(400, "Mandatory field missing"))
        .expect(1)
        .mount(&server)
        .await;
    post_table("change_request")
        .respond_with(created("chg1", "CHG0030001"))
        .expect(1)
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let report = assert_ok!(submit_audit_ticket(&client, &input()).await);

    assert_eq!(report.status, SubmissionStatus::Partial);
    assert!(!report.incident.is_created());
    assert!(report.message.contains("CHG0030001"));
}

#[tokio::test]
async fn both_tickets_failing_returns_the_incident_error() {
    let server = MockServer::start().await;
    post_table("incident")
        .respond_with(sn_error(500, "incident insert failed"))
        .mount(&server)
        .await;
    post_table("change_request")
        .respond_with(sn_error(500, "change insert failed"))
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let err = assert_err!(submit_audit_ticket(&client, &input()).await);

    assert_eq!(err.kind(), "ApiError");
    assert!(err.to_string().contains("incident insert failed"));
    assert_eq!(request_count(&server).await, 2);
}
