//! Composite metric keys.
//!
//! A key joins operation, tenant and resource type with `|`:
//! `operation`, `operation|tenant`, `operation|tenant|resourceType` or,
//! without a tenant, `operation||resourceType`. Each key is an independent
//! counter.

use ophooks_core::{OperationEvent, RequestScope};

use crate::sinks::Dimension;

pub const KEY_SEPARATOR: char = '|';

pub const DIMENSION_OPERATION: &str = "Operation";
pub const DIMENSION_TENANT_ID: &str = "TenantId";
pub const DIMENSION_RESOURCE_TYPE: &str = "ResourceType";

/// Keys to increment for one event, most general first.
pub fn keys_for(event: &OperationEvent) -> Vec<String> {
    let op = event.operation.as_str();
    match event.scope() {
        RequestScope::Unscoped => vec![op.to_string()],
        RequestScope::Tenant(tenant_id) => vec![op.to_string(), format!("{op}|{tenant_id}")],
        RequestScope::ResourceType(resource_type) => {
            vec![op.to_string(), format!("{op}||{resource_type}")]
        }
        RequestScope::TenantResource {
            tenant_id,
            resource_type,
        } => vec![
            op.to_string(),
            format!("{op}|{tenant_id}"),
            format!("{op}|{tenant_id}|{resource_type}"),
        ],
    }
}

/// Dimensions encoded in a composite key.
///
/// The operation is always present; empty tenant or resource type segments
/// are omitted.
pub fn dimensions(key: &str) -> Vec<Dimension> {
    let mut segments = key.split(KEY_SEPARATOR);
    let mut dimensions = vec![Dimension::new(
        DIMENSION_OPERATION,
        segments.next().unwrap_or_default(),
    )];

    if let Some(tenant_id) = segments.next()
        && !tenant_id.is_empty()
    {
        dimensions.push(Dimension::new(DIMENSION_TENANT_ID, tenant_id));
    }
    if let Some(resource_type) = segments.next()
        && !resource_type.is_empty()
    {
        dimensions.push(Dimension::new(DIMENSION_RESOURCE_TYPE, resource_type));
    }

    dimensions
}
