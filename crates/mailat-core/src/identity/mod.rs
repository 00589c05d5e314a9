//! Identities: addresses and catch-all bindings that route inbound mail.
//!
//! An identity belongs to a domain, and a domain to an organization.
//! This crate only reads identities; their lifecycle is managed elsewhere.

mod model;
mod repository;

pub use model::{Domain, DomainId, Identity, IdentityId, OrgId};
pub use repository::IdentityRepository;

pub(crate) use model::domain_of;
