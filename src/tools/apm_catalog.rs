//! APM catalog search across applications, services and components.

use crate::client::{SnClient, TableQuery};
use crate::error::SnowlineError;
use crate::models::{
    validate_query_value, CatalogHit, CatalogRecord, CatalogSearch, CatalogTable, EncodedQuery,
    QueryCondition, TableFailure,
};

use super::inputs::require;

/// Maximum records requested per catalog table.
pub const CATALOG_LIMIT: u32 = 50;

/// Builds the per-table query: name contains the term, or sys_id equals it.
pub fn catalog_query(table: CatalogTable, term: &str) -> TableQuery {
    TableQuery::new(
        EncodedQuery::new()
            .and(QueryCondition::like("name", term))
            .or(QueryCondition::equals("sys_id", term)),
    )
    .with_fields(table.fields())
    .with_limit(CATALOG_LIMIT)
}

/// Searches the three APM tables and merges the results.
///
/// Tables are queried one after another in [`CatalogTable::ALL`] order and
/// their records concatenated in API response order. Records the instance
/// returned that do not actually match the term are dropped. A failing
/// table is reported in `failed_tables`; the search only fails when every
/// table fails.
///
/// # Errors
///
/// - `SnowlineError::Validation` if the term is blank or contains `^`
/// - the last table's error if all three tables fail
pub async fn search_catalog(
    client: &SnClient,
    search_term: &str,
) -> Result<CatalogSearch, SnowlineError> {
    require("search_term", search_term)?;
    validate_query_value("search_term", search_term)?;

    let mut results = Vec::new();
    let mut failed_tables = Vec::new();
    let mut last_error = None;

    for table in CatalogTable::ALL {
        let query = catalog_query(table, search_term);
        match client
            .query_table::<CatalogRecord>(table.table_name(), &query)
            .await
        {
            Ok(records) => {
                let returned = records.len();
                results.extend(
                    records
                        .into_iter()
                        .filter(|record| record.matches_term(search_term))
                        .map(|record| CatalogHit {
                            source: table,
                            record,
                        }),
                );
                tracing::debug!(table = table.table_name(), returned, "Catalog table queried");
            }
            Err(e) => {
                let error = client.describe_error(&e);
                tracing::warn!(table = table.table_name(), error = %error, "Catalog table query failed");
                failed_tables.push(TableFailure { table, error });
                last_error = Some(e);
            }
        }
    }

    if failed_tables.len() == CatalogTable::ALL.len() {
        if let Some(e) = last_error {
            return Err(e);
        }
    }

    Ok(CatalogSearch {
        search_term: search_term.to_string(),
        count: results.len(),
        partial: !failed_tables.is_empty(),
        results,
        failed_tables,
    })
}
