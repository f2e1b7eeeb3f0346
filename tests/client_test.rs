//! Table API client behaviour against a mock ServiceNow instance.

mod common;

use pretty_assertions::assert_eq;
use reqwest::Method;
use serde_json::json;
use snowline::client::{Payload, TableQuery};
use snowline::error::SnowlineError;
use snowline::models::{CreatedRecord, EncodedQuery, QueryCondition, User, USER_FIELDS};
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{get_table, mock_client, post_table, result, sn_error};

fn active_user_query() -> TableQuery {
    TableQuery::new(
        EncodedQuery::new()
            .and(QueryCondition::equals("user_name", "john.doe"))
            .and(QueryCondition::equals("active", "true")),
    )
    .with_fields(&["sys_id", "user_name"])
    .with_limit(10)
}

#[tokio::test]
async fn query_table_sends_auth_and_sysparm_params() {
    let server = MockServer::start().await;
    get_table("sys_user", "user_name=john.doe^active=true")
        .and(query_param("sysparm_fields", "sys_id,user_name"))
        .and(query_param("sysparm_limit", "10"))
        .and(query_param("sysparm_exclude_reference_link", "true"))
        .and(header("Accept", "application/json"))
        .respond_with(result(json!([
            {"sys_id": "u1", "user_name": "john.doe", "active": "true"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let users: Vec<User> = assert_ok!(client.query_table("sys_user", &active_user_query()).await);

    assert_eq!(users.len(), 1);
    assert_eq!(users[0].user_name.as_deref(), Some("john.doe"));
    assert_eq!(users[0].active, Some(true));
}

#[tokio::test]
async fn non_success_status_uses_error_envelope() {
    let server = MockServer::start().await;
    get_table("sys_user", "user_name=john.doe^active=true")
        .respond_with(sn_error(403, "Insufficient rights to query records"))
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let err = assert_err!(
        client
            .query_table::<User>("sys_user", &active_user_query())
            .await
    );

    assert_eq!(err.kind(), "ApiError");
    match err {
        SnowlineError::Api {
            status_code,
            message,
        } => {
            assert_eq!(status_code, 403);
            assert_eq!(message, "Insufficient rights to query records");
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn raw_error_body_is_redacted_and_truncated() {
    let server = MockServer::start().await;
    let body = format!("login failed for {} {}", common::PASSWORD, "x".repeat(900));
    get_table("sys_user", "user_name=john.doe^active=true")
        .respond_with(ResponseTemplate::new(500).set_body_string(body))
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let err = assert_err!(
        client
            .query_table::<User>("sys_user", &active_user_query())
            .await
    );

    let text = client.describe_error(&err);
    assert!(!text.contains(common::PASSWORD));
    assert!(text.contains("[REDACTED]"));
    assert!(text.contains("HTTP 500"));
    assert!(text.ends_with("...[truncated]"));
}

#[tokio::test]
async fn invalid_json_is_a_parse_error() {
    let server = MockServer::start().await;
    get_table("sys_user", "user_name=john.doe^active=true")
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let err = assert_err!(
        client
            .query_table::<User>("sys_user", &active_user_query())
            .await
    );
    assert_eq!(err.kind(), "ParseError");
}

#[tokio::test]
async fn missing_result_key_is_a_parse_error() {
    let server = MockServer::start().await;
    get_table("sys_user", "user_name=john.doe^active=true")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": []})))
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let err = assert_err!(
        client
            .query_table::<User>("sys_user", &active_user_query())
            .await
    );
    assert!(matches!(err, SnowlineError::Parse(_)));
}

#[tokio::test]
async fn create_record_posts_json_body() {
    let server = MockServer::start().await;
    post_table("incident")
        .and(body_partial_json(json!({"short_description": "disk full"})))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"result": {"sys_id": "inc1", "number": "INC0010001"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let created: CreatedRecord = assert_ok!(
        client
            .create_record("incident", json!({"short_description": "disk full"}))
            .await
    );

    assert_eq!(created.sys_id, "inc1");
    assert_eq!(created.number.as_deref(), Some("INC0010001"));
    assert_eq!(
        client.record_url("incident", &created.sys_id),
        format!("{}/incident.do?sys_id=inc1", server.uri())
    );
}

#[tokio::test]
async fn raw_request_returns_json_value() {
    let server = MockServer::start().await;
    get_table("sys_user", "active=true")
        .respond_with(result(json!([{"sys_id": "u1"}])))
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let query = TableQuery::new(EncodedQuery::new().and(QueryCondition::equals("active", "true")))
        .with_fields(USER_FIELDS);
    let value = assert_ok!(
        client
            .request(Method::GET, "sys_user", Payload::Query(query))
            .await
    );
    assert_eq!(value["result"][0]["sys_id"], "u1");
}

#[tokio::test]
async fn invalid_table_name_never_reaches_the_network() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    let err = assert_err!(
        client
            .request(Method::GET, "sys_user/../x", Payload::Query(TableQuery::default()))
            .await
    );
    assert_eq!(err.kind(), "ValidationError");
    assert_eq!(common::request_count(&server).await, 0);
}

#[tokio::test]
async fn connection_test_reports_bad_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(common::table_path("sys_user")))
        .and(query_param("sysparm_limit", "1"))
        .respond_with(sn_error(401, "User Not Authenticated"))
        .expect(1)
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let err = assert_err!(client.test_connection().await);
    assert_eq!(err.kind(), "ConfigError");
    assert!(err.to_string().contains("authentication failed"));
}
