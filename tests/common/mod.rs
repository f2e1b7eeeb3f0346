//! Shared helpers for tests against a mock ServiceNow instance.

#![allow(dead_code)]

use serde_json::{json, Value};
use snowline::client::SnClient;
use snowline::config::Config;
use wiremock::matchers::{basic_auth, method, path, query_param};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

pub const USERNAME: &str = "svc_snowline";
pub const PASSWORD: &str = "hunter2-Secret";

/// Builds a client pointed at the mock server.
pub fn mock_client(server: &MockServer) -> SnClient {
    let config = Config::new(server.uri(), USERNAME, PASSWORD).expect("valid test config");
    SnClient::new(&config).expect("client builds")
}

/// Table API path for `table`.
pub fn table_path(table: &str) -> String {
    format!("/api/now/table/{}", table)
}

/// An authenticated GET on `table` with the given `sysparm_query`.
pub fn get_table(table: &str, sysparm_query: &str) -> MockBuilder {
    Mock::given(method("GET"))
        .and(path(table_path(table)))
        .and(query_param("sysparm_query", sysparm_query))
        .and(basic_auth(USERNAME, PASSWORD))
}

/// An authenticated POST on `table`.
pub fn post_table(table: &str) -> MockBuilder {
    Mock::given(method("POST"))
        .and(path(table_path(table)))
        .and(basic_auth(USERNAME, PASSWORD))
}

/// A 200 response wrapping `records` in the table API envelope.
pub fn result(records: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "result": records }))
}

/// A ServiceNow-style error response.
pub fn sn_error(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "error": { "message": message, "detail": null },
        "status": "failure"
    }))
}

/// Number of requests the mock server has received.
pub async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or_default()
}
