//! # warden-policy
//!
//! Tenant-scoped data governance for Warden.
//!
//! The [`PolicyEngine`] runs every governed operation through three gates:
//!
//! - **authorize**: a fixed decision tree over the caller's [`PolicyContext`]
//!   (roles, permissions, tenant, consent, license tier). Success yields a
//!   [`PolicyDecision`] whose `decision_hash` depends only on the operation
//!   and identity, never on time.
//! - **sanitize**: rejects raw query-language input and turns request
//!   parameters into [`SanitizedParams`] bounded by the tenant's
//!   [`CapabilityMap`].
//! - **redact**: strips deny-listed fields from result rows, then projects
//!   onto the allow-list.
//!
//! ## Key invariants
//!
//! - **Tenant-first lookups**: the [`CapabilityRegistry`] is keyed by tenant
//!   before operation, so one tenant's key can never resolve another's rules.
//! - **Cross-tenant parameters denied**: a `clientId` parameter that differs
//!   from the context's client is always `CROSS_TENANT_DENIED`.
//! - **Deny before allow**: `deny_fields` are removed before `allowed_fields`
//!   projection.

pub mod capability;
pub mod context;
pub mod engine;
pub mod error;
pub mod redact;
pub mod sanitize;

pub use capability::{CapabilityMap, CapabilityRegistry, OperationCapability, ParamType, ParamsSchema};
pub use context::{
    ConsentStore, PermissionResolver, PolicyContext, ResolvedIdentity, StaticConsentStore,
    StaticPermissionResolver,
};
pub use engine::{LicenseTier, PolicyDecision, PolicyEngine};
pub use error::{PolicyError, PolicyErrorCode, RegistryError};
pub use redact::RedactedResult;
pub use sanitize::{QueryConstraints, SanitizedParams};
