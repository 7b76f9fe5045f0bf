//! Turning a typed operation into a call against the client.
//!
//! A [`CallPlan`] is plain data: which client helper to use, the request it
//! sends, and, for deletes, the record reported instead of the (empty)
//! response body.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use checkmk_client::{CheckmkClient, Credentials, RequestSpec, normalize_folder_id, page_items};
use serde_json::{Map, Value, json};
use tracing::debug;

use super::operation::{
    ActivationOp, CommentOp, DiscoveryOp, DowntimeOp, DowntimeRequest, EntityOp, FolderOp,
    HostOp, ListMode, NamedOp, QueryCondition, ResourceOperation, RuleOp, ServiceOp, SiteOp,
};
use crate::error::Result;

const PENDING_CHANGES: &str = "/domain-types/activation_run/collections/pending_changes";
const PROBLEM_STATES: &str = "warn,crit,unknown";

/// Which client helper executes the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallKind {
    /// One plain request; the body is one record.
    Single,
    /// One plain request; the whole collection envelope is one record.
    Raw,
    /// One plain request; the envelope's `value` items are the records.
    Values,
    /// One plain request; the first `n` items of `value`.
    Limited(usize),
    /// Every page of a collection.
    All,
    /// `If-Match` mutation, tag read from the addressed object.
    Conditional,
    /// `If-Match` mutation, tag read from the given endpoint.
    ConditionalFrom(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallPlan {
    pub kind: CallKind,
    pub request: RequestSpec,
    /// Reported instead of the response body when set.
    pub record: Option<Value>,
}

impl CallPlan {
    fn new(kind: CallKind, request: RequestSpec) -> Self {
        Self {
            kind,
            request,
            record: None,
        }
    }

    fn single(request: RequestSpec) -> Self {
        Self::new(CallKind::Single, request)
    }

    fn conditional(request: RequestSpec) -> Self {
        Self::new(CallKind::Conditional, request)
    }

    fn listing(list: ListMode, request: RequestSpec) -> Self {
        let kind = match list {
            ListMode::All => CallKind::All,
            ListMode::Limit(n) => CallKind::Limited(n),
        };
        Self::new(kind, request)
    }

    fn reporting(mut self, record: Value) -> Self {
        self.record = Some(record);
        self
    }

    /// Run the plan and return its output records.
    pub async fn execute(self, client: &CheckmkClient, credentials: &Credentials) -> Result<Vec<Value>> {
        debug!(
            kind = ?self.kind,
            method = %self.request.method,
            path = %self.request.path,
            "executing call plan"
        );

        let records = match self.kind {
            CallKind::Single | CallKind::Raw => {
                vec![client.request(credentials, self.request).await?]
            }
            CallKind::Values => page_items(client.request(credentials, self.request).await?),
            CallKind::Limited(limit) => {
                let body = client.request(credentials, self.request).await?;
                match body {
                    Value::Object(mut map) => match map.remove("value") {
                        Some(Value::Array(items)) => items.into_iter().take(limit).collect(),
                        _ => Vec::new(),
                    },
                    _ => Vec::new(),
                }
            }
            CallKind::All => client.collect_all(credentials, self.request).await?,
            CallKind::Conditional => vec![client.mutate(credentials, self.request).await?],
            CallKind::ConditionalFrom(endpoint) => vec![
                client
                    .mutate_with_tag_from(credentials, self.request, &endpoint)
                    .await?,
            ],
        };

        if let Some(record) = self.record {
            return Ok(vec![record]);
        }
        Ok(records
            .into_iter()
            .map(|record| match record {
                Value::Null => json!({ "success": true }),
                other => other,
            })
            .collect())
    }
}

/// Percent-encode one path segment.
fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn object_path(domain_type: &str, id: &str) -> String {
    format!("/objects/{domain_type}/{}", segment(id))
}

fn collection_path(domain_type: &str) -> String {
    format!("/domain-types/{domain_type}/collections/all")
}

fn folder_path(folder: &str) -> String {
    object_path("folder_config", &normalize_folder_id(folder))
}

/// ISO 8601 UTC with millisecond precision (`2024-05-01T10:00:00.000Z`).
fn iso(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The livestatus query expression for a set of equality conditions.
pub fn query_expression(conditions: &[QueryCondition]) -> Option<Value> {
    let mut exprs: Vec<Value> = conditions
        .iter()
        .map(|c| json!({ "op": "=", "left": c.column, "right": c.value }))
        .collect();
    match exprs.len() {
        0 => None,
        1 => exprs.pop(),
        _ => Some(json!({ "op": "and", "expr": exprs })),
    }
}

impl DowntimeRequest {
    /// The request body, with missing times resolved against `now`: start
    /// defaults to `now`, end to one hour later.
    pub fn body_at(&self, now: DateTime<Utc>) -> Value {
        let start = self.start.unwrap_or(now);
        let end = self.end.unwrap_or_else(|| now + Duration::hours(1));
        let mut body = Map::new();
        body.insert("downtime_type".into(), self.downtime_type.clone().into());
        body.insert("start_time".into(), iso(start).into());
        body.insert("end_time".into(), iso(end).into());
        body.insert("comment".into(), self.comment.clone().into());
        if let Some(host) = &self.host_name {
            body.insert("host_name".into(), host.clone().into());
        }
        if let Some(service) = &self.service_description {
            body.insert("service_description".into(), service.clone().into());
        }
        Value::Object(body)
    }
}

impl ResourceOperation {
    /// Plan the call using the current time for time defaults.
    pub fn plan(&self) -> CallPlan {
        self.plan_at(Utc::now())
    }

    /// Plan the call, resolving time defaults against `now`.
    pub fn plan_at(&self, now: DateTime<Utc>) -> CallPlan {
        match self {
            Self::Host(op) => plan_host(op),
            Self::Named { kind, op } => {
                let domain = kind.domain_type();
                match op {
                    NamedOp::Create { body } => CallPlan::single(
                        RequestSpec::post(collection_path(domain)).with_body(Value::Object(body.clone())),
                    ),
                    NamedOp::Get { name } => CallPlan::single(RequestSpec::get(object_path(domain, name))),
                    NamedOp::GetMany(list) => {
                        CallPlan::listing(*list, RequestSpec::get(collection_path(domain)))
                    }
                    NamedOp::Update { name, body } => CallPlan::conditional(
                        RequestSpec::put(object_path(domain, name)).with_body(Value::Object(body.clone())),
                    ),
                    NamedOp::Delete { name } => {
                        CallPlan::conditional(RequestSpec::delete(object_path(domain, name)))
                            .reporting(json!({ "success": true, "name": name }))
                    }
                }
            }
            Self::Folder(op) => plan_folder(op),
            Self::Rule(op) => match op {
                RuleOp::Get { rule_id } => CallPlan::single(RequestSpec::get(object_path("rule", rule_id))),
                RuleOp::GetMany(list) => CallPlan::listing(*list, RequestSpec::get(collection_path("rule"))),
            },
            Self::Discovery(op) => match op {
                DiscoveryOp::Run { host_name, mode } => CallPlan::single(
                    RequestSpec::post(format!(
                        "/objects/host/{}/actions/discover_services/invoke",
                        segment(host_name)
                    ))
                    .with_body(json!({ "host_name": host_name, "mode": mode })),
                ),
                DiscoveryOp::Status { host_name } => CallPlan::single(RequestSpec::get(format!(
                    "/objects/host/{}/collections/services",
                    segment(host_name)
                ))),
            },
            Self::Activation(op) => match op {
                ActivationOp::Activate {
                    sites,
                    force_foreign_changes,
                } => CallPlan::new(
                    CallKind::ConditionalFrom(PENDING_CHANGES.to_string()),
                    RequestSpec::post("/domain-types/activation_run/actions/activate-changes/invoke")
                        .with_body(json!({
                            "sites": sites,
                            "force_foreign_changes": force_foreign_changes,
                        })),
                ),
                ActivationOp::Pending => CallPlan::single(RequestSpec::get(PENDING_CHANGES)),
                ActivationOp::Running => CallPlan::single(RequestSpec::get(
                    "/domain-types/activation_run/collections/running",
                )),
            },
            Self::Site(op) => match op {
                SiteOp::Get { site } => CallPlan::single(RequestSpec::get(object_path("site", site))),
                SiteOp::GetMany => {
                    CallPlan::new(CallKind::Values, RequestSpec::get(collection_path("site")))
                }
                SiteOp::Login { site } => CallPlan::single(RequestSpec::post(format!(
                    "/objects/site/{}/actions/login/invoke",
                    segment(site)
                ))),
                SiteOp::Logout { site } => CallPlan::single(RequestSpec::post(format!(
                    "/objects/site/{}/actions/logout/invoke",
                    segment(site)
                ))),
            },
            Self::Service(op) => plan_service(op),
            Self::Downtime(op) => match op {
                DowntimeOp::Create(request) => CallPlan::single(
                    RequestSpec::post(collection_path("downtime")).with_body(request.body_at(now)),
                ),
                DowntimeOp::Get { downtime_id } => {
                    CallPlan::single(RequestSpec::get(object_path("downtime", downtime_id)))
                }
                DowntimeOp::GetMany(list) => {
                    CallPlan::listing(*list, RequestSpec::get(collection_path("downtime")))
                }
                DowntimeOp::Delete { downtime_id } => {
                    CallPlan::single(RequestSpec::delete(object_path("downtime", downtime_id)))
                        .reporting(json!({ "success": true, "downtimeId": downtime_id }))
                }
            },
            Self::Problems(list) => CallPlan::listing(
                *list,
                RequestSpec::get(collection_path("service")).with_query("state", PROBLEM_STATES),
            ),
            Self::HostStatus { conditions, list } => {
                let mut request = RequestSpec::get(collection_path("host"));
                if let Some(query) = query_expression(conditions) {
                    request = request.with_query("query", query.to_string());
                }
                request = request.with_query("columns", "name").with_query("columns", "state");
                CallPlan::listing(*list, request)
            }
            Self::ServiceStatus { host_name, list } => {
                let mut request = RequestSpec::get(collection_path("service"));
                if let Some(host) = host_name {
                    request = request.with_query("host_name", host);
                }
                CallPlan::listing(*list, request)
            }
            Self::AuditLog {
                user_id,
                object_type,
                list,
            } => {
                let mut request = RequestSpec::get(collection_path("audit_log"));
                if let Some(user) = user_id {
                    request = request.with_query("user_id", user);
                }
                if let Some(kind) = object_type {
                    request = request.with_query("object_type", kind);
                }
                CallPlan::listing(*list, request)
            }
            Self::BiAggregationState {
                filter_names,
                filter_groups,
            } => {
                let mut request =
                    RequestSpec::get("/domain-types/bi_aggregation/actions/aggregation_state/invoke");
                if let Some(names) = filter_names {
                    request = request.with_query("filter_names", names);
                }
                if let Some(groups) = filter_groups {
                    request = request.with_query("filter_groups", groups);
                }
                CallPlan::single(request)
            }
            Self::Comment(op) => match op {
                CommentOp::Create {
                    host_name,
                    text,
                    persistent,
                } => CallPlan::single(
                    RequestSpec::post(format!(
                        "/objects/host/{}/actions/add_comment/invoke",
                        segment(host_name)
                    ))
                    .with_body(json!({ "comment": text, "persistent": persistent })),
                ),
                CommentOp::GetMany => {
                    CallPlan::new(CallKind::Raw, RequestSpec::get(collection_path("comment")))
                }
                CommentOp::Delete { comment_id } => {
                    CallPlan::single(RequestSpec::delete(object_path("comment", comment_id)))
                        .reporting(json!({ "success": true, "message": "Comment deleted" }))
                }
            },
            Self::SlaCompute {
                configuration,
                time_range,
            } => CallPlan::single(
                RequestSpec::post("/domain-types/sla/actions/compute/invoke").with_body(json!({
                    "sla_configuration": configuration,
                    "time_range": time_range,
                })),
            ),
            Self::Entity { kind, op } => {
                let domain = kind.domain_type();
                match op {
                    EntityOp::Create { body } => CallPlan::single(
                        RequestSpec::post(collection_path(domain)).with_body(Value::Object(body.clone())),
                    ),
                    EntityOp::GetMany => {
                        CallPlan::new(CallKind::Raw, RequestSpec::get(collection_path(domain)))
                    }
                    EntityOp::Update { id, body } => CallPlan::conditional(
                        RequestSpec::put(object_path(domain, id)).with_body(Value::Object(body.clone())),
                    ),
                    EntityOp::Delete { id } => {
                        CallPlan::conditional(RequestSpec::delete(object_path(domain, id))).reporting(
                            json!({ "success": true, "message": format!("{} deleted", kind.label()) }),
                        )
                    }
                }
            }
            Self::ParentScan { host_name } => CallPlan::single(
                RequestSpec::post("/domain-types/parent_scan/actions/run/invoke")
                    .with_body(json!({ "host_name": host_name })),
            ),
            Self::LicenseUsage => CallPlan::single(RequestSpec::get(
                "/domain-types/license_usage/actions/usage/invoke",
            )),
            Self::List(listing) => CallPlan::new(
                CallKind::Raw,
                RequestSpec::get(collection_path(listing.domain_type())),
            ),
        }
    }
}

fn plan_host(op: &HostOp) -> CallPlan {
    const DOMAIN: &str = "host_config";
    match op {
        HostOp::Create {
            host_name,
            folder,
            attributes,
        } => CallPlan::single(RequestSpec::post(collection_path(DOMAIN)).with_body(json!({
            "host_name": host_name,
            "folder": folder,
            "attributes": attributes,
        }))),
        HostOp::Get { host_name } => CallPlan::single(RequestSpec::get(object_path(DOMAIN, host_name))),
        HostOp::GetMany(list) => CallPlan::listing(*list, RequestSpec::get(collection_path(DOMAIN))),
        HostOp::Update {
            host_name,
            attributes,
        } => CallPlan::conditional(
            RequestSpec::put(object_path(DOMAIN, host_name))
                .with_body(json!({ "attributes": attributes })),
        ),
        HostOp::Delete { host_name } => {
            CallPlan::conditional(RequestSpec::delete(object_path(DOMAIN, host_name)))
                .reporting(json!({ "success": true, "hostName": host_name }))
        }
        HostOp::Move {
            host_name,
            target_folder,
        } => CallPlan::conditional(
            RequestSpec::post(format!("{}/actions/move/invoke", object_path(DOMAIN, host_name)))
                .with_body(json!({ "target_folder": target_folder })),
        ),
        HostOp::Rename {
            host_name,
            new_name,
        } => CallPlan::conditional(
            RequestSpec::put(format!("{}/actions/rename/invoke", object_path(DOMAIN, host_name)))
                .with_body(json!({ "new_name": new_name })),
        ),
    }
}

fn plan_folder(op: &FolderOp) -> CallPlan {
    match op {
        FolderOp::Create {
            title,
            parent,
            fields,
        } => {
            let mut body = Map::new();
            body.insert("title".into(), title.clone().into());
            body.insert("parent".into(), parent.clone().into());
            body.extend(fields.clone());
            CallPlan::single(
                RequestSpec::post(collection_path("folder_config")).with_body(Value::Object(body)),
            )
        }
        FolderOp::Get { folder } => CallPlan::single(RequestSpec::get(folder_path(folder))),
        FolderOp::GetMany(list) => {
            CallPlan::listing(*list, RequestSpec::get(collection_path("folder_config")))
        }
        FolderOp::Update { folder, fields } => CallPlan::conditional(
            RequestSpec::put(folder_path(folder)).with_body(Value::Object(fields.clone())),
        ),
        FolderOp::Delete { folder } => CallPlan::conditional(RequestSpec::delete(folder_path(folder)))
            .reporting(json!({ "success": true, "folder": folder })),
    }
}

fn plan_service(op: &ServiceOp) -> CallPlan {
    match op {
        ServiceOp::Get {
            host_name,
            service_description,
        } => CallPlan::single(
            RequestSpec::get(format!(
                "/objects/host/{}/actions/show_service/invoke",
                segment(host_name)
            ))
            .with_query("service_description", service_description.as_str()),
        ),
        ServiceOp::GetMany { host_name, list } => {
            let mut request = RequestSpec::get(collection_path("service"));
            if let Some(host) = host_name {
                request = request.with_query("host_name", host.as_str());
            }
            CallPlan::listing(*list, request)
        }
        ServiceOp::Acknowledge {
            host_name,
            service_description,
            comment,
        } => CallPlan::single(
            RequestSpec::post("/domain-types/acknowledge/collections/service").with_body(json!({
                "acknowledge_type": "service",
                "host_name": host_name,
                "service_description": service_description,
                "comment": comment,
                "sticky": true,
                "notify": false,
                "persistent": false,
            })),
        ),
    }
}
