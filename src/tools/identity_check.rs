//! Identity and entitlement check for a single user.

use serde::de::DeserializeOwned;

use crate::client::{SnClient, TableQuery};
use crate::error::SnowlineError;
use crate::models::{
    is_sys_id, validate_query_value, AccessControlRule, EncodedQuery, Entitlement,
    GroupMembership, IdentityReport, QueryCondition, RoleAssignment, Section, User, ACL_FIELDS,
    ENTITLEMENT_FIELDS, GROUP_FIELDS, ROLE_FIELDS, USER_FIELDS,
};

use super::inputs::require;

/// Rows requested per user lookup; more than one row is an ambiguity.
const USER_LOOKUP_LIMIT: u32 = 10;

/// Rows requested per identity sub-section.
pub const SECTION_LIMIT: u32 = 100;

/// The `sys_user` fields tried, in order, to resolve an identifier.
fn lookup_fields(identifier: &str) -> Vec<&'static str> {
    let mut fields = Vec::with_capacity(3);
    if is_sys_id(identifier) {
        fields.push("sys_id");
    }
    fields.push("email");
    fields.push("user_name");
    fields
}

/// Resolves an identifier to exactly one active user.
///
/// Each lookup is a separate call; the first field with any match decides.
///
/// # Errors
///
/// - `SnowlineError::Ambiguous` if the deciding lookup returns several users
/// - `SnowlineError::NotFound` if no lookup matches
/// - any API error from a lookup call
pub async fn resolve_user(client: &SnClient, identifier: &str) -> Result<User, SnowlineError> {
    for field in lookup_fields(identifier) {
        let query = TableQuery::new(
            EncodedQuery::new()
                .and(QueryCondition::equals(field, identifier))
                .and(QueryCondition::equals("active", "true")),
        )
        .with_fields(USER_FIELDS)
        .with_limit(USER_LOOKUP_LIMIT);

        let mut users: Vec<User> = client.query_table("sys_user", &query).await?;
        tracing::debug!(field, matches = users.len(), "User lookup");

        if users.len() > 1 {
            return Err(SnowlineError::ambiguous(
                format!("active users with {} {:?}", field, identifier),
                users.len(),
            ));
        }
        if let Some(user) = users.pop() {
            return Ok(user);
        }
    }

    Err(SnowlineError::not_found(format!(
        "active user matching {:?}",
        identifier
    )))
}

/// Loads one sub-section filtered by `user={user_id}`, degrading to a failed section.
async fn load_section<T>(
    client: &SnClient,
    table: &str,
    fields: &[&str],
    user_id: &str,
) -> Section<T>
where
    T: DeserializeOwned,
{
    let query = TableQuery::new(EncodedQuery::new().and(QueryCondition::equals("user", user_id)))
        .with_fields(fields)
        .with_limit(SECTION_LIMIT);

    match client.query_table(table, &query).await {
        Ok(records) => Section::complete(records),
        Err(e) => {
            let error = client.describe_error(&e);
            tracing::warn!(table, error = %error, "Identity section unavailable");
            Section::failed(error)
        }
    }
}

/// Resolves a user and gathers roles, groups, entitlements and ACLs.
///
/// The identifier may be a sys_id, an email address or a user name. The
/// user lookup is required; each of the four follow-up sections fails
/// independently and marks the report as partial.
///
/// # Errors
///
/// - `SnowlineError::Validation` if the identifier is blank or contains `^`
/// - any error from [`resolve_user`]
pub async fn check_identity(
    client: &SnClient,
    user_identifier: &str,
) -> Result<IdentityReport, SnowlineError> {
    require("user_identifier", user_identifier)?;
    validate_query_value("user_identifier", user_identifier)?;

    let user = resolve_user(client, user_identifier).await?;
    let user_id = user.sys_id.clone();
    tracing::debug!(user = %user_id, name = %user.display_name(), "User resolved");

    let roles: Section<RoleAssignment> =
        load_section(client, "sys_user_has_role", ROLE_FIELDS, &user_id).await;
    let groups: Section<GroupMembership> =
        load_section(client, "sys_user_grmember", GROUP_FIELDS, &user_id).await;
    let entitlements: Section<Entitlement> =
        load_section(client, "sys_user_entitlement", ENTITLEMENT_FIELDS, &user_id).await;
    let access_control_rules: Section<AccessControlRule> =
        load_section(client, "sys_security_acl", ACL_FIELDS, &user_id).await;

    let partial =
        roles.partial || groups.partial || entitlements.partial || access_control_rules.partial;

    Ok(IdentityReport {
        user,
        roles,
        groups,
        entitlements,
        access_control_rules,
        partial,
    })
}
