//! CMDB traversal: application → servers, and application → service → servers.
//!
//! The walk is fixed at two hops. Servers are deduplicated by sys_id in the
//! order they are first discovered, and every path that reached a server is
//! kept on it.

use std::collections::HashMap;

use crate::client::{SnClient, TableQuery};
use crate::error::SnowlineError;
use crate::models::{
    is_sys_id, validate_query_value, AwsInstance, CatalogRecord, CatalogTable, CmdbReport,
    ConfigurationItem, DiscoveryPath, EncodedQuery, LinkedService, QueryCondition, Relationship,
    Server, AWS_FIELDS, AWS_INSTANCE_CLASS, CI_FIELDS, RELATIONSHIP_FIELDS, SERVER_CLASS,
    SERVICE_CLASS,
};

use super::inputs::require;

/// Rows requested when resolving an application by name.
const APP_LOOKUP_LIMIT: u32 = 50;

/// Rows requested per relationship query.
pub const RELATIONSHIP_LIMIT: u32 = 100;

/// Edges from `parent` to server CIs (any server subclass, or an AWS instance).
pub fn server_edge_query(parent: &str) -> TableQuery {
    TableQuery::new(
        EncodedQuery::new()
            .and(QueryCondition::equals("parent", parent))
            .and(QueryCondition::instance_of("child.sys_class_name", SERVER_CLASS))
            .or(QueryCondition::equals("child.sys_class_name", AWS_INSTANCE_CLASS)),
    )
    .with_fields(RELATIONSHIP_FIELDS)
    .with_limit(RELATIONSHIP_LIMIT)
}

/// Edges from `parent` to service CIs.
pub fn service_edge_query(parent: &str) -> TableQuery {
    TableQuery::new(
        EncodedQuery::new()
            .and(QueryCondition::equals("parent", parent))
            .and(QueryCondition::instance_of("child.sys_class_name", SERVICE_CLASS)),
    )
    .with_fields(RELATIONSHIP_FIELDS)
    .with_limit(RELATIONSHIP_LIMIT)
}

/// Looks a single record up by sys_id.
fn by_sys_id(sys_id: &str, fields: &[&str]) -> TableQuery {
    TableQuery::new(EncodedQuery::new().and(QueryCondition::equals("sys_id", sys_id)))
        .with_fields(fields)
        .with_limit(1)
}

/// Name lookup against `apm_application` with the given condition.
async fn applications_where(
    client: &SnClient,
    condition: QueryCondition,
) -> Result<Vec<CatalogRecord>, SnowlineError> {
    let table = CatalogTable::Application;
    let query = TableQuery::new(EncodedQuery::new().and(condition))
        .with_fields(table.fields())
        .with_limit(APP_LOOKUP_LIMIT);
    client.query_table(table.table_name(), &query).await
}

/// Resolves an application by sys_id or name.
///
/// A name is first looked up exactly (`name=`). Only when no application
/// carries that name does a `nameLIKE` search run; there a unique
/// case-insensitive exact name wins, otherwise a single result wins.
///
/// # Errors
///
/// - `SnowlineError::NotFound` if nothing matches
/// - `SnowlineError::Ambiguous` if several applications match
pub async fn resolve_application(
    client: &SnClient,
    application_id: &str,
) -> Result<CatalogRecord, SnowlineError> {
    let table = CatalogTable::Application;

    if is_sys_id(application_id) {
        let mut apps: Vec<CatalogRecord> = client
            .query_table(table.table_name(), &by_sys_id(application_id, table.fields()))
            .await?;
        return apps.pop().ok_or_else(|| {
            SnowlineError::not_found(format!("application with sys_id {}", application_id))
        });
    }

    let mut named =
        applications_where(client, QueryCondition::equals("name", application_id)).await?;
    if named.len() > 1 {
        return Err(SnowlineError::ambiguous(
            format!("applications named {:?}", application_id),
            named.len(),
        ));
    }
    if let Some(app) = named.pop() {
        return Ok(app);
    }

    let mut apps = applications_where(client, QueryCondition::like("name", application_id)).await?;

    let exact: Vec<usize> = apps
        .iter()
        .enumerate()
        .filter(|(_, app)| {
            app.name
                .as_deref()
                .is_some_and(|name| name.eq_ignore_ascii_case(application_id))
        })
        .map(|(i, _)| i)
        .collect();

    match exact.as_slice() {
        [index] => return Ok(apps.swap_remove(*index)),
        [] => {}
        many => {
            return Err(SnowlineError::ambiguous(
                format!("applications named {:?}", application_id),
                many.len(),
            ))
        }
    }

    match apps.len() {
        0 => Err(SnowlineError::not_found(format!(
            "application matching {:?}",
            application_id
        ))),
        1 => apps.pop().ok_or_else(|| {
            SnowlineError::not_found(format!("application matching {:?}", application_id))
        }),
        n => Err(SnowlineError::ambiguous(
            format!("applications matching {:?}", application_id),
            n,
        )),
    }
}

/// Server ids in first-discovery order with every path that reached them.
#[derive(Debug, Default)]
struct Discovered {
    order: Vec<(String, Vec<DiscoveryPath>)>,
    index: HashMap<String, usize>,
}

impl Discovered {
    fn add(&mut self, server_id: &str, path: &DiscoveryPath) {
        match self.index.get(server_id) {
            Some(&i) => {
                let paths = &mut self.order[i].1;
                if !paths.contains(path) {
                    paths.push(path.clone());
                }
            }
            None => {
                self.index.insert(server_id.to_string(), self.order.len());
                self.order.push((server_id.to_string(), vec![path.clone()]));
            }
        }
    }

    fn add_edges(&mut self, edges: &[Relationship], path: &DiscoveryPath) {
        for edge in edges {
            match edge.child.as_deref() {
                Some(child) => self.add(child, path),
                None => tracing::debug!(edge = %edge.sys_id, "Relationship without child skipped"),
            }
        }
    }
}

/// Fetches CI attributes, plus AWS attributes for AWS-classed CIs.
///
/// Returns `None` if the CI no longer exists.
async fn load_server(
    client: &SnClient,
    server_id: &str,
    paths: Vec<DiscoveryPath>,
) -> Result<Option<Server>, SnowlineError> {
    let mut cis: Vec<ConfigurationItem> = client
        .query_table("cmdb_ci", &by_sys_id(server_id, CI_FIELDS))
        .await?;
    let Some(ci) = cis.pop() else {
        return Ok(None);
    };

    let is_aws = ci.is_aws_instance();
    let mut server = Server::from_ci(ci, paths);
    if !is_aws {
        return Ok(Some(server));
    }

    let aws = client
        .query_table::<AwsInstance>(AWS_INSTANCE_CLASS, &by_sys_id(server_id, AWS_FIELDS))
        .await;
    match aws {
        Ok(mut rows) => match rows.pop() {
            Some(aws) => server.merge_aws(aws),
            None => {
                server.aws_error = Some(format!("no {} record for this CI", AWS_INSTANCE_CLASS));
            }
        },
        Err(e) => {
            let error = client.describe_error(&e);
            tracing::warn!(server = %server_id, error = %error, "AWS enrichment failed");
            server.aws_error = Some(error);
        }
    }
    Ok(Some(server))
}

/// Finds the servers behind an application.
///
/// # Errors
///
/// - `SnowlineError::Validation` if the identifier is blank or contains `^`
/// - `SnowlineError::NotFound` / `SnowlineError::Ambiguous` from application resolution
/// - any API error from a relationship or CI lookup
///
/// AWS enrichment failures do not fail the query; they set `aws_error`
/// on the server and `partial` on the report.
pub async fn query_cmdb(
    client: &SnClient,
    application_id: &str,
) -> Result<CmdbReport, SnowlineError> {
    require("application_id", application_id)?;
    validate_query_value("application_id", application_id)?;

    let application = resolve_application(client, application_id).await?;
    let app_id = application.sys_id.clone();
    tracing::debug!(
        application = %app_id,
        name = %application.display_name(),
        "Application resolved"
    );

    let mut discovered = Discovered::default();

    let direct: Vec<Relationship> = client
        .query_table("cmdb_rel_ci", &server_edge_query(&app_id))
        .await?;
    discovered.add_edges(&direct, &DiscoveryPath::Direct);

    let service_edges: Vec<Relationship> = client
        .query_table("cmdb_rel_ci", &service_edge_query(&app_id))
        .await?;

    let mut services: Vec<LinkedService> = Vec::new();
    for edge in service_edges {
        let Some(service_id) = edge.child else {
            continue;
        };
        if services.iter().any(|s| s.sys_id == service_id) {
            continue;
        }

        let edges: Vec<Relationship> = client
            .query_table("cmdb_rel_ci", &server_edge_query(&service_id))
            .await?;
        let path = DiscoveryPath::Service {
            sys_id: service_id.clone(),
            name: edge.child_name.clone(),
        };
        discovered.add_edges(&edges, &path);

        services.push(LinkedService {
            sys_id: service_id,
            name: edge.child_name,
            class_name: edge.child_class,
            server_links: edges.len(),
        });
    }

    let mut servers = Vec::new();
    let mut unresolved_server_ids = Vec::new();
    for (server_id, paths) in discovered.order {
        match load_server(client, &server_id, paths).await? {
            Some(server) => servers.push(server),
            None => {
                tracing::warn!(server = %server_id, "Relationship points at a missing CI");
                unresolved_server_ids.push(server_id);
            }
        }
    }

    let partial = servers.iter().any(|s| s.aws_error.is_some());

    Ok(CmdbReport {
        application,
        services,
        server_count: servers.len(),
        servers,
        unresolved_server_ids,
        partial,
    })
}
