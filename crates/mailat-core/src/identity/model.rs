//! Identity and domain models.

use serde::{Deserialize, Serialize};

/// Unique identifier for an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrgId(pub i64);

/// Unique identifier for a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainId(pub i64);

/// Unique identifier for an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityId(pub i64);

impl OrgId {
    /// Create a new organization ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl DomainId {
    /// Create a new domain ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl IdentityId {
    /// Create a new identity ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A receiving domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    /// Unique identifier.
    pub id: DomainId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Domain name, lowercase.
    pub name: String,
    /// Container raw messages are delivered to, if receiving is configured.
    pub receiving_container: Option<String>,
}

/// An address or catch-all binding owned by a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Unique identifier.
    pub id: IdentityId,
    /// Owning domain.
    pub domain_id: DomainId,
    /// Owning organization (through the domain).
    pub org_id: OrgId,
    /// Address, lowercase.
    pub email: String,
    /// Receives mail for any address at the domain without its own identity.
    pub is_catch_all: bool,
}

/// Returns the domain part of an address, if it has one.
#[must_use]
pub(crate) fn domain_of(address: &str) -> Option<&str> {
    address
        .split_once('@')
        .map(|(_, domain)| domain)
        .filter(|domain| !domain.is_empty())
}
