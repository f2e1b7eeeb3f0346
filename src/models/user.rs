//! User and entitlement models for the identity check.
//!
//! Role and group names are read through dot-walked fields
//! (`role.name`, `group.name`) so that each section needs a single call.

use serde::{Deserialize, Serialize};

use super::common::{deserialize_field, deserialize_flag, Section};

/// Fields requested from `sys_user`.
pub const USER_FIELDS: &[&str] = &[
    "sys_id",
    "user_name",
    "first_name",
    "last_name",
    "email",
    "active",
    "locked_out",
    "last_login_time",
    "department",
    "location",
];

/// Fields requested from `sys_user_has_role`.
pub const ROLE_FIELDS: &[&str] = &[
    "sys_id",
    "role",
    "role.name",
    "role.description",
    "inherited",
    "state",
];

/// Fields requested from `sys_user_grmember`.
pub const GROUP_FIELDS: &[&str] = &["sys_id", "group", "group.name", "group.description"];

/// Fields requested from `sys_user_entitlement`.
pub const ENTITLEMENT_FIELDS: &[&str] = &[
    "sys_id",
    "entitlement",
    "name",
    "description",
    "active",
    "expires",
];

/// Fields requested from `sys_security_acl`.
pub const ACL_FIELDS: &[&str] = &[
    "sys_id",
    "name",
    "operation",
    "type",
    "condition",
    "active",
];

/// A ServiceNow user record.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct User {
    /// Unique user ID.
    #[serde(default)]
    pub sys_id: String,

    /// Login name.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub user_name: Option<String>,

    /// First name.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub first_name: Option<String>,

    /// Last name.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub last_name: Option<String>,

    /// Email address.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub email: Option<String>,

    /// Whether the account is active.
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub active: Option<bool>,

    /// Whether the account is locked out.
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub locked_out: Option<bool>,

    /// Last login timestamp as reported by the instance.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub last_login_time: Option<String>,

    /// Department reference.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub department: Option<String>,

    /// Location reference.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub location: Option<String>,
}

impl User {
    /// Returns "First Last", falling back to the user name or sys_id.
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self
                .user_name
                .clone()
                .unwrap_or_else(|| self.sys_id.clone()),
        }
    }
}

/// A role granted to a user (`sys_user_has_role`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RoleAssignment {
    /// Assignment record ID.
    #[serde(default)]
    pub sys_id: String,

    /// Role sys_id.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub role: Option<String>,

    /// Role name.
    #[serde(
        default,
        rename(deserialize = "role.name", serialize = "name"),
        deserialize_with = "deserialize_field"
    )]
    pub name: Option<String>,

    /// Role description.
    #[serde(
        default,
        rename(deserialize = "role.description", serialize = "description"),
        deserialize_with = "deserialize_field"
    )]
    pub description: Option<String>,

    /// Whether the role is inherited through a group or another role.
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub inherited: Option<bool>,

    /// Assignment state (e.g. "active").
    #[serde(default, deserialize_with = "deserialize_field")]
    pub state: Option<String>,
}

/// A group the user belongs to (`sys_user_grmember`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GroupMembership {
    /// Membership record ID.
    #[serde(default)]
    pub sys_id: String,

    /// Group sys_id.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub group: Option<String>,

    /// Group name.
    #[serde(
        default,
        rename(deserialize = "group.name", serialize = "name"),
        deserialize_with = "deserialize_field"
    )]
    pub name: Option<String>,

    /// Group description.
    #[serde(
        default,
        rename(deserialize = "group.description", serialize = "description"),
        deserialize_with = "deserialize_field"
    )]
    pub description: Option<String>,
}

/// An entitlement held by the user (`sys_user_entitlement`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Entitlement {
    /// Entitlement record ID.
    #[serde(default)]
    pub sys_id: String,

    /// Referenced entitlement definition.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub entitlement: Option<String>,

    /// Entitlement name.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub name: Option<String>,

    /// Entitlement description.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub description: Option<String>,

    /// Whether the entitlement is active.
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub active: Option<bool>,

    /// Expiry date, if any.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub expires: Option<String>,
}

/// An access control rule associated with the user (`sys_security_acl`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AccessControlRule {
    /// ACL record ID.
    #[serde(default)]
    pub sys_id: String,

    /// Protected object, e.g. `incident.*`.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub name: Option<String>,

    /// Operation: read, write, create, delete.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub operation: Option<String>,

    /// ACL type, e.g. `record`.
    #[serde(
        default,
        rename = "type",
        deserialize_with = "deserialize_field"
    )]
    pub acl_type: Option<String>,

    /// Condition script summary.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub condition: Option<String>,

    /// Whether the rule is active.
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub active: Option<bool>,
}

/// Aggregated identity and entitlement report for one user.
///
/// The report does not echo the identifier that was used to find the user,
/// so looking a user up by sys_id, email or user name yields the same output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityReport {
    /// The resolved user.
    pub user: User,

    /// Roles held by the user.
    pub roles: Section<RoleAssignment>,

    /// Group memberships.
    pub groups: Section<GroupMembership>,

    /// Entitlements.
    pub entitlements: Section<Entitlement>,

    /// Access control rules.
    pub access_control_rules: Section<AccessControlRule>,

    /// True if any section failed to load.
    pub partial: bool,
}
