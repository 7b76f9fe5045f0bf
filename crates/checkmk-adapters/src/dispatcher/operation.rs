//! Typed resource operations.
//!
//! [`ResourceOperation::parse`] reads one input item through
//! [`ItemParams`] and produces a value that carries exactly the fields its
//! operation needs.  All required-field checks happen here, before any
//! request exists.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value, json};

use super::resource::{Operation, Resource};
use crate::error::{AdapterError, Result};
use crate::params::ItemParams;

/// Default page size for non-`returnAll` listings.
pub const DEFAULT_LIMIT: usize = 50;

pub const DEFAULT_ACK_COMMENT: &str = "Acknowledged via automation";
pub const DEFAULT_DOWNTIME_COMMENT: &str = "Scheduled downtime via automation";

// ---------------------------------------------------------------------------
// Shared pieces
// ---------------------------------------------------------------------------

/// How a listing is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    /// Follow pagination links to the end.
    All,
    /// One request, the first `n` records.
    Limit(usize),
}

impl ListMode {
    fn parse(params: &ItemParams<'_>) -> Result<Self> {
        if params.bool_or("returnAll", false)? {
            return Ok(Self::All);
        }
        let limit = params
            .optional_u64("limit")?
            .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
            .unwrap_or(DEFAULT_LIMIT);
        Ok(Self::Limit(limit))
    }
}

/// Configuration objects addressed by a plain name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedKind {
    HostGroup,
    ServiceGroup,
    ContactGroup,
    User,
    TimePeriod,
}

impl NamedKind {
    /// The Checkmk domain type behind the resource.
    pub fn domain_type(self) -> &'static str {
        match self {
            Self::HostGroup => "host_group_config",
            Self::ServiceGroup => "service_group_config",
            Self::ContactGroup => "contact_group_config",
            Self::User => "user_config",
            Self::TimePeriod => "time_period",
        }
    }

    fn is_group(self) -> bool {
        matches!(self, Self::HostGroup | Self::ServiceGroup | Self::ContactGroup)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NamedOp {
    Create { body: Map<String, Value> },
    Get { name: String },
    GetMany(ListMode),
    Update { name: String, body: Map<String, Value> },
    Delete { name: String },
}

/// Setup entities keyed by an explicit id parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    AuxTag,
    HostTagGroup,
    LdapConnection,
    OpenTelemetry,
    SamlConnection,
    UserRole,
}

impl EntityKind {
    pub fn domain_type(self) -> &'static str {
        match self {
            Self::AuxTag => "aux_tag",
            Self::HostTagGroup => "host_tag_group",
            Self::LdapConnection => "ldap_connection",
            Self::OpenTelemetry => "open_telemetry_collector",
            Self::SamlConnection => "saml_connection",
            Self::UserRole => "user_role",
        }
    }

    /// Parameter holding the entity id.
    fn id_param(self) -> &'static str {
        match self {
            Self::AuxTag => "tagId",
            Self::HostTagGroup => "tagGroupId",
            Self::LdapConnection => "connectionId",
            Self::OpenTelemetry => "collectorId",
            Self::SamlConnection => "samlConnectionId",
            Self::UserRole => "roleId",
        }
    }

    /// Body field carrying the id on creation.
    fn id_field(self) -> &'static str {
        match self {
            Self::AuxTag => "tag_id",
            Self::HostTagGroup => "tag_group_id",
            Self::LdapConnection | Self::SamlConnection => "connection_id",
            Self::OpenTelemetry => "collector_id",
            Self::UserRole => "role_id",
        }
    }

    /// Human-readable name used in delete confirmations.
    pub fn label(self) -> &'static str {
        match self {
            Self::AuxTag => "Aux tag",
            Self::HostTagGroup => "Host tag group",
            Self::LdapConnection => "LDAP connection",
            Self::OpenTelemetry => "OpenTelemetry collector",
            Self::SamlConnection => "SAML connection",
            Self::UserRole => "User role",
        }
    }

    /// The attribute body shared by create and update.
    fn attributes(self, params: &ItemParams<'_>) -> Result<Map<String, Value>> {
        let mut body = Map::new();
        match self {
            Self::AuxTag | Self::HostTagGroup => {
                body.insert("title".into(), params.required_str("title")?.into());
                body.insert("topic".into(), params.str_or("topic", "")?.into());
                body.insert("help".into(), params.str_or("help", "")?.into());
            }
            Self::LdapConnection => {
                body.insert("server_url".into(), params.required_str("serverUrl")?.into());
                body.insert("bind_dn".into(), params.required_str("bindDn")?.into());
                body.insert(
                    "bind_password".into(),
                    params.required_str("bindPassword")?.into(),
                );
            }
            Self::OpenTelemetry => {
                body.insert("name".into(), params.required_str("collectorName")?.into());
                let port = params.required_u64("port")?;
                if port == 0 || port > u64::from(u16::MAX) {
                    return Err(AdapterError::invalid(
                        "openTelemetry",
                        format!("`port` must be between 1 and 65535, got {port}"),
                    ));
                }
                body.insert("port".into(), port.into());
            }
            Self::SamlConnection => {
                body.insert(
                    "identity_provider_metadata".into(),
                    params.required_str("identityProviderMetadata")?.into(),
                );
            }
            Self::UserRole => {
                body.insert("alias".into(), params.required_str("roleAlias")?.into());
                body.insert("permissions".into(), json!(params.csv_list("permissions")?));
            }
        }
        Ok(body)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityOp {
    Create { body: Map<String, Value> },
    GetMany,
    Update { id: String, body: Map<String, Value> },
    Delete { id: String },
}

/// Collections that are only ever listed, envelope and all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    BiPack,
    BiRule,
    EventConsole,
    Metric,
    Agent,
    NotificationRule,
    Password,
    Ruleset,
    BackgroundJob,
    BrokerConnection,
    Certificate,
    ConfigurationEntity,
    Dcd,
    QuickSetup,
}

impl Listing {
    pub fn domain_type(self) -> &'static str {
        match self {
            Self::BiPack => "bi_pack",
            Self::BiRule => "bi_rule",
            Self::EventConsole => "event_console",
            Self::Metric => "metric",
            Self::Agent => "agent",
            Self::NotificationRule => "notification_rule",
            Self::Password => "password",
            Self::Ruleset => "ruleset",
            Self::BackgroundJob => "background_job",
            Self::BrokerConnection => "broker_connection",
            Self::Certificate => "certificate",
            Self::ConfigurationEntity => "configuration_entity",
            Self::Dcd => "dcd",
            Self::QuickSetup => "quick_setup",
        }
    }
}

// ---------------------------------------------------------------------------
// Per-resource operations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    Create {
        host_name: String,
        folder: String,
        attributes: Map<String, Value>,
    },
    Get { host_name: String },
    GetMany(ListMode),
    Update {
        host_name: String,
        attributes: Map<String, Value>,
    },
    Delete { host_name: String },
    Move { host_name: String, target_folder: String },
    Rename { host_name: String, new_name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FolderOp {
    Create {
        title: String,
        parent: String,
        fields: Map<String, Value>,
    },
    Get { folder: String },
    GetMany(ListMode),
    Update {
        folder: String,
        fields: Map<String, Value>,
    },
    Delete { folder: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleOp {
    Get { rule_id: String },
    GetMany(ListMode),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryOp {
    Run { host_name: String, mode: String },
    Status { host_name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActivationOp {
    Activate {
        sites: Vec<String>,
        force_foreign_changes: bool,
    },
    Pending,
    Running,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SiteOp {
    Get { site: String },
    GetMany,
    Login { site: String },
    Logout { site: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceOp {
    Get {
        host_name: String,
        service_description: String,
    },
    GetMany {
        host_name: Option<String>,
        list: ListMode,
    },
    Acknowledge {
        host_name: String,
        service_description: String,
        comment: String,
    },
}

/// A downtime request.  Missing times are resolved when the call is planned.
#[derive(Debug, Clone, PartialEq)]
pub struct DowntimeRequest {
    pub downtime_type: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub comment: String,
    pub host_name: Option<String>,
    pub service_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DowntimeOp {
    Create(DowntimeRequest),
    Get { downtime_id: String },
    GetMany(ListMode),
    Delete { downtime_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommentOp {
    Create {
        host_name: String,
        text: String,
        persistent: bool,
    },
    GetMany,
    Delete { comment_id: String },
}

/// One condition of a livestatus query (`{"op", "left", "right"}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCondition {
    pub column: String,
    pub value: String,
}

// ---------------------------------------------------------------------------
// ResourceOperation
// ---------------------------------------------------------------------------

/// A validated resource × operation request for one input item.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceOperation {
    Host(HostOp),
    Named { kind: NamedKind, op: NamedOp },
    Folder(FolderOp),
    Rule(RuleOp),
    Discovery(DiscoveryOp),
    Activation(ActivationOp),
    Site(SiteOp),
    Service(ServiceOp),
    Downtime(DowntimeOp),
    Problems(ListMode),
    HostStatus {
        conditions: Vec<QueryCondition>,
        list: ListMode,
    },
    ServiceStatus {
        host_name: Option<String>,
        list: ListMode,
    },
    AuditLog {
        user_id: Option<String>,
        object_type: Option<String>,
        list: ListMode,
    },
    BiAggregationState {
        filter_names: Option<String>,
        filter_groups: Option<String>,
    },
    Comment(CommentOp),
    SlaCompute {
        configuration: String,
        time_range: String,
    },
    Entity { kind: EntityKind, op: EntityOp },
    ParentScan { host_name: String },
    LicenseUsage,
    List(Listing),
}

impl ResourceOperation {
    /// Build the typed operation for one item.  `operation` must already be
    /// one the resource supports (see [`Resource::operation`]).
    pub fn parse(resource: Resource, operation: Operation, params: &ItemParams<'_>) -> Result<Self> {
        use Operation as Op;

        let parsed = match resource {
            Resource::Host => Self::Host(parse_host(operation, params)?),
            Resource::HostGroup => named(NamedKind::HostGroup, operation, params)?,
            Resource::ServiceGroup => named(NamedKind::ServiceGroup, operation, params)?,
            Resource::ContactGroup => named(NamedKind::ContactGroup, operation, params)?,
            Resource::User => named(NamedKind::User, operation, params)?,
            Resource::TimePeriod => named(NamedKind::TimePeriod, operation, params)?,
            Resource::Folder => Self::Folder(parse_folder(operation, params)?),
            Resource::Rule => Self::Rule(match operation {
                Op::Get => RuleOp::Get {
                    rule_id: params.required_str("ruleId")?,
                },
                _ => RuleOp::GetMany(ListMode::parse(params)?),
            }),
            Resource::Discovery => {
                let host_name = params.required_str("hostName")?;
                Self::Discovery(match operation {
                    Op::Run => DiscoveryOp::Run {
                        host_name,
                        mode: params.str_or("mode", "new")?,
                    },
                    _ => DiscoveryOp::Status { host_name },
                })
            }
            Resource::ActivateChanges => Self::Activation(match operation {
                Op::Activate => ActivationOp::Activate {
                    sites: params.csv_list("activateOnSites")?,
                    force_foreign_changes: params.bool_or("forceForeignChanges", false)?,
                },
                Op::GetPending => ActivationOp::Pending,
                _ => ActivationOp::Running,
            }),
            Resource::Site => Self::Site(match operation {
                Op::GetMany => SiteOp::GetMany,
                Op::Login => SiteOp::Login {
                    site: params.required_str("siteName")?,
                },
                Op::Logout => SiteOp::Logout {
                    site: params.required_str("siteName")?,
                },
                _ => SiteOp::Get {
                    site: params.required_str("siteName")?,
                },
            }),
            Resource::Service => Self::Service(parse_service(operation, params)?),
            Resource::Downtime => Self::Downtime(parse_downtime(operation, params)?),
            Resource::Problem => Self::Problems(ListMode::parse(params)?),
            Resource::HostStatus => {
                let mut conditions = Vec::new();
                if let Some(name) = params.optional_str("hostname")? {
                    conditions.push(QueryCondition {
                        column: "name".into(),
                        value: name,
                    });
                }
                if let Some(state) = params.optional_str("state")? {
                    conditions.push(QueryCondition {
                        column: "state".into(),
                        value: state,
                    });
                }
                Self::HostStatus {
                    conditions,
                    list: ListMode::parse(params)?,
                }
            }
            Resource::ServiceStatus => {
                let fields = params.object("additionalFields")?;
                Self::ServiceStatus {
                    host_name: non_empty(&fields, "hostName"),
                    list: ListMode::parse(params)?,
                }
            }
            Resource::AuditLog => {
                let fields = params.object("additionalFields")?;
                Self::AuditLog {
                    user_id: non_empty(&fields, "userId"),
                    object_type: non_empty(&fields, "objectType"),
                    list: ListMode::parse(params)?,
                }
            }
            Resource::BiAggregation => Self::BiAggregationState {
                filter_names: params.optional_str("filterNames")?,
                filter_groups: params.optional_str("filterGroups")?,
            },
            Resource::Comment => Self::Comment(match operation {
                Op::Create => CommentOp::Create {
                    host_name: params.required_str("hostName")?,
                    text: params.required_str("commentText")?,
                    persistent: params.bool_or("persistent", false)?,
                },
                Op::Delete => CommentOp::Delete {
                    comment_id: params.required_str("commentId")?,
                },
                _ => CommentOp::GetMany,
            }),
            Resource::Sla => Self::SlaCompute {
                configuration: params.required_str("slaConfiguration")?,
                time_range: params.required_str("timeRange")?,
            },
            Resource::AuxTag => entity(EntityKind::AuxTag, operation, params)?,
            Resource::HostTagGroup => entity(EntityKind::HostTagGroup, operation, params)?,
            Resource::LdapConnection => entity(EntityKind::LdapConnection, operation, params)?,
            Resource::OpenTelemetry => entity(EntityKind::OpenTelemetry, operation, params)?,
            Resource::SamlConnection => entity(EntityKind::SamlConnection, operation, params)?,
            Resource::UserRole => entity(EntityKind::UserRole, operation, params)?,
            Resource::ParentScan => Self::ParentScan {
                host_name: params.required_str("scanHostName")?,
            },
            Resource::LicenseUsage => Self::LicenseUsage,
            Resource::BiPack => Self::List(Listing::BiPack),
            Resource::BiRule => Self::List(Listing::BiRule),
            Resource::EventConsole => Self::List(Listing::EventConsole),
            Resource::Metric => Self::List(Listing::Metric),
            Resource::Agent => Self::List(Listing::Agent),
            Resource::NotificationRule => Self::List(Listing::NotificationRule),
            Resource::Password => Self::List(Listing::Password),
            Resource::Ruleset => Self::List(Listing::Ruleset),
            Resource::BackgroundJob => Self::List(Listing::BackgroundJob),
            Resource::BrokerConnection => Self::List(Listing::BrokerConnection),
            Resource::Certificate => Self::List(Listing::Certificate),
            Resource::ConfigurationEntity => Self::List(Listing::ConfigurationEntity),
            Resource::Dcd => Self::List(Listing::Dcd),
            Resource::QuickSetup => Self::List(Listing::QuickSetup),
        };
        Ok(parsed)
    }
}

fn non_empty(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_host(operation: Operation, params: &ItemParams<'_>) -> Result<HostOp> {
    if operation == Operation::GetMany {
        return Ok(HostOp::GetMany(ListMode::parse(params)?));
    }
    let host_name = params.required_str("hostName")?;
    let op = match operation {
        Operation::Create => HostOp::Create {
            host_name,
            folder: params.str_or("folder", "/")?,
            attributes: params.object("additionalFields")?,
        },
        Operation::Update => HostOp::Update {
            host_name,
            attributes: params.object("additionalFields")?,
        },
        Operation::Delete => HostOp::Delete { host_name },
        Operation::Move => HostOp::Move {
            host_name,
            target_folder: params.required_str("folder")?,
        },
        Operation::Rename => {
            let fields = params.object("additionalFields")?;
            let new_name = match non_empty(&fields, "newName") {
                Some(name) => name,
                None => params.required_str("newName")?,
            };
            HostOp::Rename {
                host_name,
                new_name,
            }
        }
        _ => HostOp::Get { host_name },
    };
    Ok(op)
}

fn named(kind: NamedKind, operation: Operation, params: &ItemParams<'_>) -> Result<ResourceOperation> {
    let op = match operation {
        Operation::GetMany => NamedOp::GetMany(ListMode::parse(params)?),
        Operation::Create => {
            let name = params.required_str("name")?;
            let mut body = Map::new();
            match kind {
                NamedKind::User => {
                    body.insert("username".into(), name.into());
                    body.extend(params.object("additionalFields")?);
                }
                NamedKind::TimePeriod => {
                    let alias = params.str_or("alias", &name)?;
                    body.insert("name".into(), name.into());
                    body.insert("alias".into(), alias.into());
                    body.extend(params.object("additionalFields")?);
                }
                _ => {
                    let alias = params.str_or("alias", &name)?;
                    body.insert("name".into(), name.into());
                    body.insert("alias".into(), alias.into());
                }
            }
            NamedOp::Create { body }
        }
        Operation::Update => {
            let name = params.required_str("name")?;
            let body = if kind.is_group() {
                let mut body = Map::new();
                body.insert("alias".into(), params.required_str("alias")?.into());
                body
            } else {
                params.object("additionalFields")?
            };
            NamedOp::Update { name, body }
        }
        Operation::Delete => NamedOp::Delete {
            name: params.required_str("name")?,
        },
        _ => NamedOp::Get {
            name: params.required_str("name")?,
        },
    };
    Ok(ResourceOperation::Named { kind, op })
}

fn parse_folder(operation: Operation, params: &ItemParams<'_>) -> Result<FolderOp> {
    let folder = params.str_or("folder", "/")?;
    let op = match operation {
        Operation::Create => FolderOp::Create {
            title: params.required_str("folderName")?,
            parent: folder,
            fields: params.object("additionalFields")?,
        },
        Operation::GetMany => FolderOp::GetMany(ListMode::parse(params)?),
        Operation::Update => FolderOp::Update {
            folder,
            fields: params.object("additionalFields")?,
        },
        Operation::Delete => FolderOp::Delete { folder },
        _ => FolderOp::Get { folder },
    };
    Ok(op)
}

fn parse_service(operation: Operation, params: &ItemParams<'_>) -> Result<ServiceOp> {
    let op = match operation {
        Operation::GetMany => ServiceOp::GetMany {
            host_name: params.optional_str("hostName")?,
            list: ListMode::parse(params)?,
        },
        Operation::Acknowledge => {
            let fields = params.object("additionalFields")?;
            ServiceOp::Acknowledge {
                host_name: params.required_str("hostName")?,
                service_description: params.required_str("serviceDescription")?,
                comment: non_empty(&fields, "comment")
                    .unwrap_or_else(|| DEFAULT_ACK_COMMENT.to_string()),
            }
        }
        _ => ServiceOp::Get {
            host_name: params.required_str("hostName")?,
            service_description: params.required_str("serviceDescription")?,
        },
    };
    Ok(op)
}

fn parse_downtime(operation: Operation, params: &ItemParams<'_>) -> Result<DowntimeOp> {
    let op = match operation {
        Operation::Create => {
            let fields = params.object("additionalFields")?;
            DowntimeOp::Create(DowntimeRequest {
                downtime_type: params.required_str("downtimeType")?,
                start: parse_time("startTime", params.optional_str("startTime")?)?,
                end: parse_time("endTime", params.optional_str("endTime")?)?,
                comment: params.str_or("comment", DEFAULT_DOWNTIME_COMMENT)?,
                host_name: params.optional_str("hostName")?,
                service_description: non_empty(&fields, "serviceDescription"),
            })
        }
        Operation::GetMany => DowntimeOp::GetMany(ListMode::parse(params)?),
        Operation::Delete => DowntimeOp::Delete {
            downtime_id: params.required_str("downtimeId")?,
        },
        _ => DowntimeOp::Get {
            downtime_id: params.required_str("downtimeId")?,
        },
    };
    Ok(op)
}

/// Parse an RFC 3339 timestamp, or a zone-less `YYYY-MM-DDTHH:MM:SS` taken
/// as UTC.
fn parse_time(name: &str, raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Some(naive.and_utc()));
        }
    }
    Err(AdapterError::invalid(
        "downtime.create",
        format!("`{name}` is not a valid timestamp: \"{raw}\""),
    ))
}

fn entity(kind: EntityKind, operation: Operation, params: &ItemParams<'_>) -> Result<ResourceOperation> {
    let op = match operation {
        Operation::Create => {
            let mut body = Map::new();
            body.insert(
                kind.id_field().into(),
                params.required_str(kind.id_param())?.into(),
            );
            body.extend(kind.attributes(params)?);
            EntityOp::Create { body }
        }
        Operation::Update => EntityOp::Update {
            id: params.required_str(kind.id_param())?,
            body: kind.attributes(params)?,
        },
        Operation::Delete => EntityOp::Delete {
            id: params.required_str(kind.id_param())?,
        },
        _ => EntityOp::GetMany,
    };
    Ok(ResourceOperation::Entity { kind, op })
}
