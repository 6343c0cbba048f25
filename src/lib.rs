// Configuration (TOML + env overrides)
pub mod config;

// Credential model, store and resolver
pub mod credentials;

// OAuth2 token lifecycle
pub mod token;

// Uniform connector result envelope
pub mod envelope;

// Gateway error taxonomy
pub mod error;

// Shared outbound HTTP client
pub mod http;

pub use config::GatewayConfig;
pub use credentials::{
    CredentialKey, CredentialProfile, CredentialRecord, CredentialResolver, CredentialStore,
    CredentialType, ResolvedCredential, SourceMode,
};
pub use envelope::ToolResult;
pub use error::GatewayError;
pub use token::{RefreshError, TokenManager};
