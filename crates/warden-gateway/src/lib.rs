//! # warden-gateway
//!
//! Where agent tool calls meet governance.
//!
//! The gateway owns the pieces an orchestrator run needs besides policy and
//! review: who an agent is ([`AgentProfile`]), which tools exist and what
//! they require ([`ToolRouter`]), and the on-disk layout everything is
//! loaded from ([`WardenConfig`], [`GatewayState`]).
//!
//! ## Key components
//!
//! - [`AgentProfile`] / [`YamlProfileStore`]: per-agent tools, permissions
//!   and review policy, loaded once from YAML
//! - [`ToolRouter`]: checks the profile, then dispatches to a
//!   [`ToolHandler`]; violations are fatal [`RouterError`]s
//! - [`tools`]: built-in `logs.append`, `drafts.create`, `drafts.finalize`
//!   and `customer_data.query`, registered through [`tools::BuiltinTools`]
//! - [`WardenConfig`]: `.warden/` layout plus `warden.toml` settings

pub mod access;
pub mod config;
pub mod error;
pub mod profile;
pub mod router;
pub mod state;
pub mod tools;

pub use access::AccessFile;
pub use config::{Settings, WardenConfig};
pub use error::{GatewayError, RouterError};
pub use profile::{AgentProfile, ProfileStore, ReviewMode, ReviewPolicy, YamlProfileStore};
pub use router::{ToolCall, ToolFailure, ToolHandler, ToolKind, ToolProvider, ToolResult, ToolRouter};
pub use state::GatewayState;
