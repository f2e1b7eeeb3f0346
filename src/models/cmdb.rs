//! CMDB models: relationship edges, configuration items, AWS instances and
//! the server report produced by the CMDB query.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::catalog::CatalogRecord;
use super::common::deserialize_field;

/// Base class of all server CIs.
pub const SERVER_CLASS: &str = "cmdb_ci_server";
/// Class (and table) of AWS EC2 instance CIs.
pub const AWS_INSTANCE_CLASS: &str = "cmdb_ci_aws_instance";
/// Base class of service CIs.
pub const SERVICE_CLASS: &str = "cmdb_ci_service";

/// Fields requested from `cmdb_rel_ci`.
pub const RELATIONSHIP_FIELDS: &[&str] = &[
    "sys_id",
    "parent",
    "child",
    "type",
    "child.name",
    "child.sys_class_name",
];

/// Fields requested from `cmdb_ci` for each server.
pub const CI_FIELDS: &[&str] = &[
    "sys_id",
    "name",
    "host_name",
    "ip_address",
    "os_name",
    "os_version",
    "cpu_count",
    "ram",
    "disk_space",
    "location",
    "serial_number",
    "asset_tag",
    "operational_status",
    "sys_class_name",
    "tags",
];

/// Fields requested from `cmdb_ci_aws_instance`.
pub const AWS_FIELDS: &[&str] = &[
    "sys_id",
    "aws_account_id",
    "aws_region",
    "aws_instance_id",
    "aws_instance_type",
    "aws_availability_zone",
    "aws_vpc_id",
    "aws_subnet_id",
    "aws_tags",
];

/// Returns true if the CI class is an AWS instance.
pub fn is_aws_class(class_name: &str) -> bool {
    class_name.eq_ignore_ascii_case(AWS_INSTANCE_CLASS)
}

/// A relationship edge from `cmdb_rel_ci`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Relationship {
    /// Edge record ID.
    #[serde(default)]
    pub sys_id: String,

    /// Parent CI sys_id.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub parent: Option<String>,

    /// Child CI sys_id.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub child: Option<String>,

    /// Relationship type, e.g. "Runs on::Runs".
    #[serde(default, rename = "type", deserialize_with = "deserialize_field")]
    pub rel_type: Option<String>,

    /// Child CI name (dot-walked).
    #[serde(default, rename = "child.name", deserialize_with = "deserialize_field")]
    pub child_name: Option<String>,

    /// Child CI class (dot-walked).
    #[serde(
        default,
        rename = "child.sys_class_name",
        deserialize_with = "deserialize_field"
    )]
    pub child_class: Option<String>,
}

/// Attributes of a configuration item from `cmdb_ci`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConfigurationItem {
    /// Unique CI ID.
    #[serde(default)]
    pub sys_id: String,

    /// CI name.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub name: Option<String>,

    /// Host name.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub host_name: Option<String>,

    /// Primary IP address.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub ip_address: Option<String>,

    /// Operating system.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub os_name: Option<String>,

    /// Operating system version.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub os_version: Option<String>,

    /// CPU count.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub cpu_count: Option<String>,

    /// RAM in MB.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub ram: Option<String>,

    /// Disk space in GB.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub disk_space: Option<String>,

    /// Location reference.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub location: Option<String>,

    /// Serial number.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub serial_number: Option<String>,

    /// Asset tag.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub asset_tag: Option<String>,

    /// Operational status.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub operational_status: Option<String>,

    /// CI class, e.g. `cmdb_ci_linux_server`.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub sys_class_name: Option<String>,

    /// Raw tag text.
    #[serde(default, deserialize_with = "deserialize_field")]
    pub tags: Option<String>,
}

impl ConfigurationItem {
    /// Returns true if this CI is classed as an AWS instance.
    pub fn is_aws_instance(&self) -> bool {
        self.sys_class_name.as_deref().is_some_and(is_aws_class)
    }
}

/// AWS-specific attributes from `cmdb_ci_aws_instance`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AwsInstance {
    /// AWS account ID.
    #[serde(
        default,
        rename(deserialize = "aws_account_id", serialize = "account_id"),
        deserialize_with = "deserialize_field"
    )]
    pub account_id: Option<String>,

    /// AWS region.
    #[serde(
        default,
        rename(deserialize = "aws_region", serialize = "region"),
        deserialize_with = "deserialize_field"
    )]
    pub region: Option<String>,

    /// EC2 instance ID.
    #[serde(
        default,
        rename(deserialize = "aws_instance_id", serialize = "instance_id"),
        deserialize_with = "deserialize_field"
    )]
    pub instance_id: Option<String>,

    /// EC2 instance type.
    #[serde(
        default,
        rename(deserialize = "aws_instance_type", serialize = "instance_type"),
        deserialize_with = "deserialize_field"
    )]
    pub instance_type: Option<String>,

    /// Availability zone.
    #[serde(
        default,
        rename(deserialize = "aws_availability_zone", serialize = "availability_zone"),
        deserialize_with = "deserialize_field"
    )]
    pub availability_zone: Option<String>,

    /// VPC ID.
    #[serde(
        default,
        rename(deserialize = "aws_vpc_id", serialize = "vpc_id"),
        deserialize_with = "deserialize_field"
    )]
    pub vpc_id: Option<String>,

    /// Subnet ID.
    #[serde(
        default,
        rename(deserialize = "aws_subnet_id", serialize = "subnet_id"),
        deserialize_with = "deserialize_field"
    )]
    pub subnet_id: Option<String>,

    /// Raw AWS tag text; merged into the server's tag map.
    #[serde(default, skip_serializing, deserialize_with = "deserialize_field")]
    pub aws_tags: Option<String>,
}

/// How a server was reached from the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "via", rename_all = "snake_case")]
pub enum DiscoveryPath {
    /// Application → server.
    Direct,
    /// Application → service → server.
    Service {
        /// Service CI sys_id.
        sys_id: String,
        /// Service name, if known.
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

/// A server linked to the application, with optional AWS enrichment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Server {
    /// Unique CI ID.
    pub sys_id: String,
    /// CI name.
    pub name: Option<String>,
    /// Host name.
    pub host_name: Option<String>,
    /// Primary IP address.
    pub ip_address: Option<String>,
    /// Operating system.
    pub os_name: Option<String>,
    /// Operating system version.
    pub os_version: Option<String>,
    /// CPU count.
    pub cpu_count: Option<String>,
    /// RAM in MB.
    pub ram: Option<String>,
    /// Disk space in GB.
    pub disk_space: Option<String>,
    /// Location reference.
    pub location: Option<String>,
    /// Serial number.
    pub serial_number: Option<String>,
    /// Asset tag.
    pub asset_tag: Option<String>,
    /// Operational status.
    pub operational_status: Option<String>,
    /// CI class.
    pub class_name: Option<String>,
    /// Tag mapping (CI tags, overridden by AWS tags on collision).
    pub tags: BTreeMap<String, String>,
    /// AWS attributes; present only for AWS-classed CIs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsInstance>,
    /// Why AWS enrichment failed, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws_error: Option<String>,
    /// Every path through which this server was discovered.
    pub discovered_via: Vec<DiscoveryPath>,
}

impl Server {
    /// Builds a server entry from its CI attributes.
    pub fn from_ci(ci: ConfigurationItem, discovered_via: Vec<DiscoveryPath>) -> Self {
        let tags = ci.tags.as_deref().map(parse_tags).unwrap_or_default();
        Self {
            sys_id: ci.sys_id,
            name: ci.name,
            host_name: ci.host_name,
            ip_address: ci.ip_address,
            os_name: ci.os_name,
            os_version: ci.os_version,
            cpu_count: ci.cpu_count,
            ram: ci.ram,
            disk_space: ci.disk_space,
            location: ci.location,
            serial_number: ci.serial_number,
            asset_tag: ci.asset_tag,
            operational_status: ci.operational_status,
            class_name: ci.sys_class_name,
            tags,
            aws: None,
            aws_error: None,
            discovered_via,
        }
    }

    /// Merges AWS attributes into this server, folding AWS tags into `tags`.
    pub fn merge_aws(&mut self, aws: AwsInstance) {
        if let Some(raw) = aws.aws_tags.as_deref() {
            self.tags.extend(parse_tags(raw));
        }
        self.aws = Some(aws);
    }
}

/// A service CI linked to the application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkedService {
    /// Service CI sys_id.
    pub sys_id: String,
    /// Service name.
    pub name: Option<String>,
    /// Service CI class.
    pub class_name: Option<String>,
    /// Number of server edges found under this service (before deduplication).
    pub server_links: usize,
}

/// Result of the CMDB query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CmdbReport {
    /// The resolved application.
    pub application: CatalogRecord,
    /// Services linked to the application.
    pub services: Vec<LinkedService>,
    /// Number of unique servers.
    pub server_count: usize,
    /// Unique servers in first-discovery order.
    pub servers: Vec<Server>,
    /// Server ids referenced by relationships whose CI record no longer exists.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unresolved_server_ids: Vec<String>,
    /// True if any server's AWS enrichment failed.
    pub partial: bool,
}

/// Parses ServiceNow tag text into a sorted key/value map.
///
/// Accepts a JSON object (`{"env": "prod"}`), a JSON array of
/// `{"key", "value"}` pairs, or delimited `key=value` / `key:value` text
/// separated by commas or semicolons. Bare words become keys with empty values.
pub fn parse_tags(raw: &str) -> BTreeMap<String, String> {
    let raw = raw.trim();
    let mut tags = BTreeMap::new();
    if raw.is_empty() {
        return tags;
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, value) in map {
                    tags.insert(key, json_text(value));
                }
                return tags;
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    let key = item.get("key").or_else(|| item.get("Key"));
                    let value = item.get("value").or_else(|| item.get("Value"));
                    if let Some(key) = key.and_then(|k| k.as_str()) {
                        tags.insert(
                            key.to_string(),
                            value.cloned().map(json_text).unwrap_or_default(),
                        );
                    }
                }
                return tags;
            }
            _ => {}
        }
    }

    for pair in raw.split([',', ';']) {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair
            .split_once('=')
            .or_else(|| pair.split_once(':'))
            .unwrap_or((pair, ""));
        tags.insert(key.trim().to_string(), value.trim().to_string());
    }
    tags
}

fn json_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
