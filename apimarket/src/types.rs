//! Common type definitions and permission system types.
//!
//! This module defines:
//! - Type aliases for entity IDs (UserId, ProductId, etc.)
//! - Permission and authorization types
//! - Resource and operation enums for access control
//!
//! # ID Types
//!
//! All entity IDs are UUIDs wrapped in type aliases for better type safety:
//!
//! - [`UserId`]: Identity-provider subject, also the profile primary key
//! - [`ProductId`]: API product identifier
//! - [`PlanId`]: Billing plan identifier
//! - [`GroupId`]: Endpoint group identifier
//! - [`EndpointId`]: Endpoint identifier
//! - [`EntitlementId`]: Buyer subscription identifier
//! - [`ApiKeyId`]: Buyer API key identifier
//!
//! # Permission System
//!
//! Every mutating operation in the marketplace is gated on ownership: the caller must be the
//! creator recorded in the row's `owner_id` (or the buyer in `user_id`). Callers carrying the
//! configured admin role act with elevated rights and skip that check.
//!
//! ## Operations
//!
//! Operations come in two flavors:
//! - **All**: Unrestricted access to all entities (e.g., `ReadAll`, `DeleteAll`)
//! - **Own**: Restricted to user's own entities (e.g., `ReadOwn`, `UpdateOwn`)

use std::fmt;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type ProductId = Uuid;
pub type PlanId = Uuid;
pub type GroupId = Uuid;
pub type EndpointId = Uuid;
pub type EntitlementId = Uuid;
pub type ApiKeyId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

// Operations that can be performed on resources
// *-All means unrestricted access, *-Own means restricted to own resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateOwn,
    ReadAll,
    ReadOwn,
    UpdateAll,
    UpdateOwn,
    DeleteAll,
    DeleteOwn,
}

// Resources that can be operated on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Profiles,
    Products,
    Plans,
    Groups,
    Endpoints,
    Entitlements,
    ApiKeys,
}

// Permission types for authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// Simple permission: (Resource, Operation)
    Allow(Resource, Operation),
    /// Caller must own the specific resource instance
    Owner,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateOwn => write!(f, "Create"),
            Operation::ReadAll | Operation::ReadOwn => write!(f, "Read"),
            Operation::UpdateAll | Operation::UpdateOwn => write!(f, "Update"),
            Operation::DeleteAll | Operation::DeleteOwn => write!(f, "Delete"),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Profiles => "profile",
            Resource::Products => "product",
            Resource::Plans => "plan",
            Resource::Groups => "endpoint group",
            Resource::Endpoints => "endpoint",
            Resource::Entitlements => "entitlement",
            Resource::ApiKeys => "API key",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_uuid() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }

    #[test]
    fn test_operation_display_collapses_scope() {
        assert_eq!(Operation::UpdateAll.to_string(), "Update");
        assert_eq!(Operation::UpdateOwn.to_string(), "Update");
        assert_eq!(Operation::CreateOwn.to_string(), "Create");
    }
}
