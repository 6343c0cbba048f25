//! Connector Hub - multi-tenant tool execution over resolved credentials.
//!
//! Each tool (market data, news, image/voice generation, smart home) is a
//! [`Connector`] built around a credential resolved for one tenant. Requests
//! name a tool, an operation and its arguments, and always receive the
//! uniform result envelope.
//!
//! # Architecture
//!
//! ```text
//!   POST /api/tools/:tool/execute  (X-Tenant-Id)
//!          ↓
//! ┌─────────────────────────────────────────┐
//! │       ConnectorPool                      │
//! │  - one connector per tool/cred/tenant    │
//! │  - resolves credentials on first use     │
//! └─────────────────────────────────────────┘
//!          ↓
//! ┌─────────────────────────────────────────┐
//! │       Connector (implements trait)       │
//! │  - validates arguments                   │
//! │  - calls the upstream API                │
//! │  - refreshes OAuth tokens when stale     │
//! └─────────────────────────────────────────┘
//!          ↓
//!   {"success": bool, "error"?: "...", ...}
//! ```

mod args;
mod connector;
pub mod api;
pub mod connectors;
pub mod pool;
pub mod registry;

pub use args::Args;
pub use connector::{not_configured, unknown_operation, Connector};
pub use pool::{ConnectorPool, HubError};
pub use registry::{all_tools, build_connector, find_tool, ConnectorContext, ToolSpec};
