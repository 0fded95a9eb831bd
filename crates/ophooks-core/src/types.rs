//! Event types for the operation hook system.
//!
//! This module defines the values that flow through the [`Broker`](crate::Broker):
//! - `OperationKind` - the closed set of pre/post lifecycle phases
//! - `OperationEvent` - one phase of one resource operation
//! - `OperationEventResponse` / `AggregateOperationEventResponse` - subscriber outcomes

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{SubscriberError, UnknownOperationKind};

// ============================================================================
// Operation Kinds
// ============================================================================

/// Lifecycle phase of a resource operation.
///
/// Every operation the host performs is published twice, once before
/// (`Pre*`) and once after (`Post*`) the storage call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    PreCreate,
    PostCreate,
    PreRead,
    PostRead,
    PreVread,
    PostVread,
    PreUpdate,
    PostUpdate,
    PreDelete,
    PostDelete,
    PrePatch,
    PostPatch,
    PreHistoryType,
    PostHistoryType,
    PreHistoryInstance,
    PostHistoryInstance,
    PreSearchType,
    PostSearchType,
    PreTransaction,
    PostTransaction,
    PreBatch,
    PostBatch,
    PreSearchSystem,
    PostSearchSystem,
    PreHistorySystem,
    PostHistorySystem,
}

impl OperationKind {
    /// Every operation kind, in pre/post pairs.
    pub const ALL: [OperationKind; 26] = [
        OperationKind::PreCreate,
        OperationKind::PostCreate,
        OperationKind::PreRead,
        OperationKind::PostRead,
        OperationKind::PreVread,
        OperationKind::PostVread,
        OperationKind::PreUpdate,
        OperationKind::PostUpdate,
        OperationKind::PreDelete,
        OperationKind::PostDelete,
        OperationKind::PrePatch,
        OperationKind::PostPatch,
        OperationKind::PreHistoryType,
        OperationKind::PostHistoryType,
        OperationKind::PreHistoryInstance,
        OperationKind::PostHistoryInstance,
        OperationKind::PreSearchType,
        OperationKind::PostSearchType,
        OperationKind::PreTransaction,
        OperationKind::PostTransaction,
        OperationKind::PreBatch,
        OperationKind::PostBatch,
        OperationKind::PreSearchSystem,
        OperationKind::PostSearchSystem,
        OperationKind::PreHistorySystem,
        OperationKind::PostHistorySystem,
    ];

    /// Returns the string representation of the operation kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::PreCreate => "pre-create",
            OperationKind::PostCreate => "post-create",
            OperationKind::PreRead => "pre-read",
            OperationKind::PostRead => "post-read",
            OperationKind::PreVread => "pre-vread",
            OperationKind::PostVread => "post-vread",
            OperationKind::PreUpdate => "pre-update",
            OperationKind::PostUpdate => "post-update",
            OperationKind::PreDelete => "pre-delete",
            OperationKind::PostDelete => "post-delete",
            OperationKind::PrePatch => "pre-patch",
            OperationKind::PostPatch => "post-patch",
            OperationKind::PreHistoryType => "pre-history-type",
            OperationKind::PostHistoryType => "post-history-type",
            OperationKind::PreHistoryInstance => "pre-history-instance",
            OperationKind::PostHistoryInstance => "post-history-instance",
            OperationKind::PreSearchType => "pre-search-type",
            OperationKind::PostSearchType => "post-search-type",
            OperationKind::PreTransaction => "pre-transaction",
            OperationKind::PostTransaction => "post-transaction",
            OperationKind::PreBatch => "pre-batch",
            OperationKind::PostBatch => "post-batch",
            OperationKind::PreSearchSystem => "pre-search-system",
            OperationKind::PostSearchSystem => "post-search-system",
            OperationKind::PreHistorySystem => "pre-history-system",
            OperationKind::PostHistorySystem => "post-history-system",
        }
    }

    /// True for the phase published before the storage call.
    pub fn is_pre(&self) -> bool {
        self.as_str().starts_with("pre-")
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OperationKind {
    type Err = UnknownOperationKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationKind::ALL
            .iter()
            .find(|kind| kind.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownOperationKind(s.to_string()))
    }
}

// ============================================================================
// Request Context
// ============================================================================

/// Which dimensions a request is scoped to.
///
/// A tenant identifier of `""` is still a tenant; only an absent value
/// selects the unscoped or resource-type-only variants.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestScope {
    /// Neither tenant nor resource type
    #[default]
    Unscoped,
    /// Tenant only (system-level operations)
    Tenant(String),
    /// Resource type without a tenant (single-tenant deployments)
    ResourceType(String),
    /// Both tenant and resource type
    TenantResource {
        tenant_id: String,
        resource_type: String,
    },
}

impl RequestScope {
    /// Build a scope from the two optional request fields.
    pub fn from_parts(tenant_id: Option<String>, resource_type: Option<String>) -> Self {
        match (tenant_id, resource_type) {
            (None, None) => RequestScope::Unscoped,
            (Some(tenant_id), None) => RequestScope::Tenant(tenant_id),
            (None, Some(resource_type)) => RequestScope::ResourceType(resource_type),
            (Some(tenant_id), Some(resource_type)) => RequestScope::TenantResource {
                tenant_id,
                resource_type,
            },
        }
    }

    pub fn tenant_id(&self) -> Option<&str> {
        match self {
            RequestScope::Tenant(t) | RequestScope::TenantResource { tenant_id: t, .. } => Some(t),
            _ => None,
        }
    }

    pub fn resource_type(&self) -> Option<&str> {
        match self {
            RequestScope::ResourceType(rt)
            | RequestScope::TenantResource {
                resource_type: rt, ..
            } => Some(rt),
            _ => None,
        }
    }
}

/// Request side of an operation event.
///
/// Serialized as a flat `{tenantId?, resourceType?, resource?}` object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawRequestContext", into = "RawRequestContext")]
pub struct RequestContext {
    pub scope: RequestScope,
    /// The resource body, if the operation carries one
    pub resource: Option<serde_json::Value>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRequestContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resource: Option<serde_json::Value>,
}

impl From<RawRequestContext> for RequestContext {
    fn from(raw: RawRequestContext) -> Self {
        Self {
            scope: RequestScope::from_parts(raw.tenant_id, raw.resource_type),
            resource: raw.resource,
        }
    }
}

impl From<RequestContext> for RawRequestContext {
    fn from(ctx: RequestContext) -> Self {
        let (tenant_id, resource_type) = match ctx.scope {
            RequestScope::Unscoped => (None, None),
            RequestScope::Tenant(t) => (Some(t), None),
            RequestScope::ResourceType(rt) => (None, Some(rt)),
            RequestScope::TenantResource {
                tenant_id,
                resource_type,
            } => (Some(tenant_id), Some(resource_type)),
        };
        Self {
            tenant_id,
            resource_type,
            resource: ctx.resource,
        }
    }
}

impl RequestContext {
    pub fn new(scope: RequestScope) -> Self {
        Self {
            scope,
            resource: None,
        }
    }

    /// Set the resource body.
    pub fn with_resource(mut self, resource: serde_json::Value) -> Self {
        self.resource = Some(resource);
        self
    }
}

// ============================================================================
// Operation Event
// ============================================================================

/// One phase of one resource operation, as published by the host.
///
/// Events are never mutated after construction; subscribers only see a
/// shared reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationEvent {
    /// Lifecycle phase
    pub operation: OperationKind,
    /// When the host produced the event
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Opaque requester identity, as provided by the auth layer
    #[serde(default)]
    pub user_identity: Vec<serde_json::Value>,
    /// Request side, if the operation has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestContext>,
    /// Response side, only present on post-phase events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
}

impl OperationEvent {
    /// Create an event with no request or response context.
    pub fn new(operation: OperationKind) -> Self {
        Self {
            operation,
            timestamp: OffsetDateTime::now_utc(),
            user_identity: Vec::new(),
            request: None,
            response: None,
        }
    }

    /// Set the request context.
    pub fn with_request(mut self, request: RequestContext) -> Self {
        self.request = Some(request);
        self
    }

    /// Set the request context from a scope alone.
    pub fn with_scope(self, scope: RequestScope) -> Self {
        self.with_request(RequestContext::new(scope))
    }

    /// Set the response context.
    pub fn with_response(mut self, response: serde_json::Value) -> Self {
        self.response = Some(response);
        self
    }

    /// Set the requester identity.
    pub fn with_user_identity(mut self, identity: Vec<serde_json::Value>) -> Self {
        self.user_identity = identity;
        self
    }

    /// Request scope, or `Unscoped` when there is no request.
    pub fn scope(&self) -> &RequestScope {
        const UNSCOPED: &RequestScope = &RequestScope::Unscoped;
        self.request.as_ref().map_or(UNSCOPED, |r| &r.scope)
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Outcome reported by a single subscriber.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperationEventResponse {
    pub success: bool,
    pub errors: Vec<SubscriberError>,
}

impl OperationEventResponse {
    /// A successful response with no errors.
    pub fn ok() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
        }
    }

    /// A failed response carrying the given errors.
    pub fn failed(errors: Vec<SubscriberError>) -> Self {
        Self {
            success: false,
            errors,
        }
    }
}

/// Combined outcome of every subscriber for one published event.
///
/// `responses` is in settlement order, not registration order.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateOperationEventResponse {
    pub success: bool,
    pub responses: Vec<OperationEventResponse>,
    pub errors: Vec<SubscriberError>,
}

impl AggregateOperationEventResponse {
    /// Result of publishing to a kind with no subscribers.
    pub fn empty() -> Self {
        Self {
            success: true,
            responses: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl Default for AggregateOperationEventResponse {
    fn default() -> Self {
        Self::empty()
    }
}
