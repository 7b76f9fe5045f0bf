//! The resource and operation catalogue.
//!
//! One table lists every resource with its host-facing name, its tool name,
//! the operations it offers and the parameters those operations read.  The
//! table drives parsing, tool discovery and the JSON schemas handed to the
//! host.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::error::AdapterError;

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

macro_rules! define_operations {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// An operation name as selected in the host.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Operation {
            $($variant),+
        }

        impl Operation {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }

            fn lookup(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

define_operations! {
    Create => "create",
    Get => "get",
    GetMany => "getMany",
    Update => "update",
    Delete => "delete",
    Move => "move",
    Rename => "rename",
    Run => "run",
    GetStatus => "getStatus",
    Activate => "activate",
    GetPending => "getPending",
    Login => "login",
    Logout => "logout",
    Acknowledge => "acknowledge",
    GetState => "getState",
    Compute => "compute",
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Resource
// ---------------------------------------------------------------------------

macro_rules! define_resources {
    ($(
        $variant:ident => $name:literal, $tool:literal,
            [$($op:ident),+ $(,)?],
            {$($field:literal : $ty:literal),* $(,)?};
    )+) => {
        /// A Checkmk resource the adapter can act on.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Resource {
            $($variant),+
        }

        impl Resource {
            /// Every resource, in catalogue order.
            pub const ALL: &'static [Resource] = &[$(Resource::$variant),+];

            /// The host-facing name (`hostGroup`).
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }

            /// The tool name exposed through the adapter (`checkmk_host_group`).
            pub fn tool_name(self) -> &'static str {
                match self {
                    $(Self::$variant => concat!("checkmk_", $tool)),+
                }
            }

            /// The operations this resource offers.
            pub fn operations(self) -> &'static [Operation] {
                match self {
                    $(Self::$variant => &[$(Operation::$op),+]),+
                }
            }

            /// Parameters read by this resource's operations, with their
            /// JSON schema types.
            pub fn fields(self) -> &'static [(&'static str, &'static str)] {
                match self {
                    $(Self::$variant => &[$(($field, $ty)),*]),+
                }
            }

            fn lookup(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

define_resources! {
    Host => "host", "host",
        [Create, Get, GetMany, Update, Delete, Move, Rename],
        {"hostName": "string", "folder": "string", "additionalFields": "object",
         "returnAll": "boolean", "limit": "integer"};
    HostGroup => "hostGroup", "host_group",
        [Create, Get, GetMany, Update, Delete],
        {"name": "string", "alias": "string", "returnAll": "boolean", "limit": "integer"};
    ServiceGroup => "serviceGroup", "service_group",
        [Create, Get, GetMany, Update, Delete],
        {"name": "string", "alias": "string", "returnAll": "boolean", "limit": "integer"};
    Folder => "folder", "folder",
        [Create, Get, GetMany, Update, Delete],
        {"folder": "string", "folderName": "string", "additionalFields": "object",
         "returnAll": "boolean", "limit": "integer"};
    User => "user", "user",
        [Create, Get, GetMany, Update, Delete],
        {"name": "string", "additionalFields": "object", "returnAll": "boolean", "limit": "integer"};
    ContactGroup => "contactGroup", "contact_group",
        [Create, Get, GetMany, Update, Delete],
        {"name": "string", "alias": "string", "returnAll": "boolean", "limit": "integer"};
    TimePeriod => "timePeriod", "time_period",
        [Create, Get, GetMany, Update, Delete],
        {"name": "string", "alias": "string", "additionalFields": "object",
         "returnAll": "boolean", "limit": "integer"};
    Rule => "rule", "rule",
        [Get, GetMany],
        {"ruleId": "string", "returnAll": "boolean", "limit": "integer"};
    Discovery => "discovery", "discovery",
        [Run, GetStatus],
        {"hostName": "string", "mode": "string"};
    ActivateChanges => "activateChanges", "activate_changes",
        [Activate, GetPending, GetStatus],
        {"activateOnSites": "string", "forceForeignChanges": "boolean"};
    Site => "site", "site",
        [Get, GetMany, Login, Logout],
        {"siteName": "string"};
    Service => "service", "service",
        [Get, GetMany, Acknowledge],
        {"hostName": "string", "serviceDescription": "string", "additionalFields": "object",
         "returnAll": "boolean", "limit": "integer"};
    Downtime => "downtime", "downtime",
        [Create, Get, GetMany, Delete],
        {"downtimeType": "string", "startTime": "string", "endTime": "string",
         "comment": "string", "hostName": "string", "downtimeId": "string",
         "additionalFields": "object", "returnAll": "boolean", "limit": "integer"};
    Problem => "problem", "problem",
        [GetMany],
        {"returnAll": "boolean", "limit": "integer"};
    BiAggregation => "biAggregation", "bi_aggregation",
        [GetState],
        {"filterNames": "string", "filterGroups": "string"};
    BiPack => "biPack", "bi_pack", [GetMany], {};
    BiRule => "biRule", "bi_rule", [GetMany], {};
    Comment => "comment", "comment",
        [Create, GetMany, Delete],
        {"hostName": "string", "commentText": "string", "persistent": "boolean",
         "commentId": "string"};
    EventConsole => "eventConsole", "event_console", [GetMany], {};
    HostStatus => "hostStatus", "host_status",
        [GetMany],
        {"hostname": "string", "state": "string", "returnAll": "boolean", "limit": "integer"};
    Metric => "metric", "metric", [GetMany], {};
    ServiceStatus => "serviceStatus", "service_status",
        [GetMany],
        {"additionalFields": "object", "returnAll": "boolean", "limit": "integer"};
    Sla => "sla", "sla",
        [Compute],
        {"slaConfiguration": "string", "timeRange": "string"};
    Agent => "agent", "agent", [GetMany], {};
    AuditLog => "auditLog", "audit_log",
        [GetMany],
        {"additionalFields": "object", "returnAll": "boolean", "limit": "integer"};
    AuxTag => "auxTag", "aux_tag",
        [Create, GetMany, Update, Delete],
        {"tagId": "string", "title": "string", "topic": "string", "help": "string"};
    HostTagGroup => "hostTagGroup", "host_tag_group",
        [Create, GetMany, Update, Delete],
        {"tagGroupId": "string", "title": "string", "topic": "string", "help": "string"};
    LdapConnection => "ldapConnection", "ldap_connection",
        [Create, GetMany, Update, Delete],
        {"connectionId": "string", "serverUrl": "string", "bindDn": "string",
         "bindPassword": "string"};
    NotificationRule => "notificationRule", "notification_rule", [GetMany], {};
    OpenTelemetry => "openTelemetry", "open_telemetry",
        [Create, GetMany, Update, Delete],
        {"collectorId": "string", "collectorName": "string", "port": "integer"};
    ParentScan => "parentScan", "parent_scan",
        [Run],
        {"scanHostName": "string"};
    Password => "password", "password", [GetMany], {};
    Ruleset => "ruleset", "ruleset", [GetMany], {};
    SamlConnection => "samlConnection", "saml_connection",
        [Create, GetMany, Update, Delete],
        {"samlConnectionId": "string", "identityProviderMetadata": "string"};
    UserRole => "userRole", "user_role",
        [Create, GetMany, Update, Delete],
        {"roleId": "string", "roleAlias": "string", "permissions": "string"};
    BackgroundJob => "backgroundJob", "background_job", [GetMany], {};
    BrokerConnection => "brokerConnection", "broker_connection", [GetMany], {};
    Certificate => "certificate", "certificate", [GetMany], {};
    ConfigurationEntity => "configurationEntity", "configuration_entity", [GetMany], {};
    Dcd => "dcd", "dcd", [GetMany], {};
    LicenseUsage => "licenseUsage", "license_usage", [Get], {};
    QuickSetup => "quickSetup", "quick_setup", [GetMany], {};
}

impl Resource {
    /// Resolve a tool name back to its resource.
    pub fn from_tool_name(tool: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.tool_name() == tool)
    }

    pub fn supports(self, operation: Operation) -> bool {
        self.operations().contains(&operation)
    }

    /// Resolve an operation name for this resource.
    pub fn operation(self, name: &str) -> Result<Operation, AdapterError> {
        Operation::lookup(name)
            .filter(|op| self.supports(*op))
            .ok_or_else(|| AdapterError::UnsupportedOperation {
                resource: self.as_str().to_string(),
                operation: name.to_string(),
            })
    }
}

impl FromStr for Resource {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or_else(|| AdapterError::UnknownResource(s.to_string()))
    }
}

impl Display for Resource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
