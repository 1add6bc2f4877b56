//! # warden-connectors
//!
//! Read-only data sources behind the policy engine.
//!
//! A [`Connector`] serves the read models of one data source for one tenant.
//! The [`ConnectorRegistry`] maps tenant → source → connector, so a caller
//! must name its tenant before it can reach any source at all.
//!
//! Connectors never see raw caller input: by the time
//! [`Connector::execute_read_model`] runs, parameters have been sanitized and
//! carry [`QueryConstraints`](warden_policy::QueryConstraints) (row cap and
//! field projection) from the tenant's capability map.
//!
//! Two implementations ship with the crate:
//!
//! - [`InMemoryConnector`]: fixture rows held in memory.
//! - [`JsonlConnector`]: rows read from a JSON Lines file on every call.

pub mod connector;
pub mod error;
pub mod jsonl;
pub mod memory;
pub mod registry;

pub use connector::{Connector, ConnectorResult, ExecutionMetrics, ResultMetadata};
pub use error::ConnectorError;
pub use jsonl::JsonlConnector;
pub use memory::InMemoryConnector;
pub use registry::ConnectorRegistry;
