//! OAuth2 token lifecycle for one credential.
//!
//! # State machine
//!
//! ```text
//!   Fresh ──(now ≥ expires_at − 60s, refresh token present)──► Stale
//!     ▲                                                         │
//!     │                                                   refresh task
//!     │                                                         ▼
//!     └──────────────── 200 + access_token ◄────────────── Refreshing
//!                       (any failure: state unchanged, stale token used)
//! ```
//!
//! Refreshes are single-flight: the refresh runs in a spawned task that owns
//! the per-credential refresh lock, so concurrent callers queue behind it and a
//! caller that gives up never cancels a refresh other callers depend on.

mod refresh;

pub use refresh::RefreshError;

use crate::config::GatewayConfig;
use crate::credentials::{
    CredentialKey, CredentialStore, CredentialType, OAuth2Credential, ResolvedCredential,
};
use chrono::Utc;
use refresh::{RefreshRequest, RefreshedTokens};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Refresh this long before `expires_at` to absorb clock skew and latency.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// Mutable token material. Only the refresh routine writes it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenState {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds)
    pub expires_at: Option<i64>,
    pub in_flight_refresh: bool,
}

impl TokenState {
    /// True when a refresh should happen before using the access token.
    ///
    /// Requires a refresh token and a known expiry inside the margin. Without
    /// an expiry the token is treated as fresh.
    pub fn needs_refresh(&self, now: i64) -> bool {
        match (&self.refresh_token, self.expires_at) {
            (Some(_), Some(expires_at)) => now >= expires_at - EXPIRY_MARGIN_SECS,
            _ => false,
        }
    }
}

/// Tunables taken from [`GatewayConfig`].
#[derive(Clone, Debug)]
pub struct TokenOptions {
    /// Quiet period after a failed automatic refresh (zero disables)
    pub refresh_backoff: Duration,
    /// Write refreshed bundles as encrypted rows
    pub encrypt_at_rest: bool,
}

impl Default for TokenOptions {
    fn default() -> Self {
        Self {
            refresh_backoff: Duration::from_secs(30),
            encrypt_at_rest: false,
        }
    }
}

impl From<&GatewayConfig> for TokenOptions {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            refresh_backoff: Duration::from_secs(config.token.refresh_backoff_secs),
            encrypt_at_rest: config.credentials.encrypt_at_rest,
        }
    }
}

/// Hands out valid bearer tokens for one credential key.
///
/// Cheap to clone; clones share the same state and refresh lock.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<Inner>,
}

struct Inner {
    key: CredentialKey,
    base_url: Option<String>,
    static_token: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    /// Explicit token URL, or `{base_url}/auth/token`
    token_url: Option<String>,
    state: RwLock<TokenState>,
    refresh_lock: Arc<tokio::sync::Mutex<()>>,
    /// Unix timestamp before which automatic refreshes are skipped
    retry_after: Mutex<Option<i64>>,
    store: Arc<dyn CredentialStore>,
    http: reqwest::Client,
    options: TokenOptions,
}

impl TokenManager {
    pub fn new(
        key: CredentialKey,
        base_url: Option<&str>,
        auth: &OAuth2Credential,
        store: Arc<dyn CredentialStore>,
        http: reqwest::Client,
        options: TokenOptions,
    ) -> Self {
        let base_url = base_url.filter(|u| !u.is_empty()).map(str::to_string);
        let token_url = auth
            .token_url
            .clone()
            .or_else(|| base_url.as_ref().map(|b| format!("{}/auth/token", b)));

        Self {
            inner: Arc::new(Inner {
                key,
                base_url,
                static_token: auth.static_token.clone(),
                client_id: auth.client_id.clone(),
                client_secret: auth.client_secret.clone(),
                token_url,
                state: RwLock::new(TokenState {
                    access_token: auth.access_token.clone(),
                    refresh_token: auth.refresh_token.clone(),
                    expires_at: auth.expires_at,
                    in_flight_refresh: false,
                }),
                refresh_lock: Arc::new(tokio::sync::Mutex::new(())),
                retry_after: Mutex::new(None),
                store,
                http,
                options,
            }),
        }
    }

    /// Builds a manager for token-bearing credentials; `None` for API keys
    /// and unconfigured credentials.
    pub fn for_credential(
        key: CredentialKey,
        credential: &ResolvedCredential,
        store: Arc<dyn CredentialStore>,
        http: reqwest::Client,
        options: TokenOptions,
    ) -> Option<Self> {
        let auth = credential.oauth2()?;
        Some(Self::new(key, credential.base_url(), auth, store, http, options))
    }

    pub fn key(&self) -> &CredentialKey {
        &self.inner.key
    }

    /// Snapshot of the current token state.
    pub fn state(&self) -> TokenState {
        self.inner.read_state().clone()
    }

    /// `Authorization` header for the next outbound call, refreshing first
    /// when the token is stale. Empty when there is no token at all.
    ///
    /// Refresh failures are logged and swallowed; the (possibly expired)
    /// current token is returned and the remote side reports the failure.
    pub async fn auth_header(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        if let Some(token) = self.bearer_token().await {
            headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        }
        headers
    }

    /// Current usable token, refreshing first when stale.
    pub async fn bearer_token(&self) -> Option<String> {
        if let Some(token) = &self.inner.static_token {
            return Some(token.clone());
        }

        let now = Utc::now().timestamp();
        if self.inner.read_state().needs_refresh(now) && !self.inner.in_backoff(now) {
            if let Err(e) = self.run_refresh(false).await {
                warn!(
                    tool = %self.inner.key.tool_name,
                    tenant = %self.inner.key.tenant_slot(),
                    error = %e,
                    "Token refresh failed, continuing with current token"
                );
            }
        }

        self.inner.read_state().access_token.clone()
    }

    /// Refreshes now, regardless of expiry or backoff.
    pub async fn force_refresh(&self) -> Result<(), RefreshError> {
        self.run_refresh(true).await
    }

    async fn run_refresh(&self, force: bool) -> Result<(), RefreshError> {
        let guard = Arc::clone(&self.inner.refresh_lock).lock_owned().await;

        if !force {
            // Another caller may have finished a refresh while we waited
            let now = Utc::now().timestamp();
            if !self.inner.read_state().needs_refresh(now) || self.inner.in_backoff(now) {
                return Ok(());
            }
        }

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let _guard = guard;
            inner.refresh().await
        });

        task.await
            .unwrap_or_else(|e| Err(RefreshError::Transport(format!("refresh task aborted: {}", e))))
    }
}

impl Inner {
    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, TokenState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, TokenState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn in_backoff(&self, now: i64) -> bool {
        let retry_after = self.retry_after.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(*retry_after, Some(t) if now < t)
    }

    fn set_backoff(&self, failed: bool) {
        let mut retry_after = self.retry_after.lock().unwrap_or_else(PoisonError::into_inner);
        *retry_after = if failed && !self.options.refresh_backoff.is_zero() {
            Some(Utc::now().timestamp() + self.options.refresh_backoff.as_secs() as i64)
        } else {
            None
        };
    }

    /// Runs with the refresh lock held.
    async fn refresh(&self) -> Result<(), RefreshError> {
        let refresh_token = self
            .read_state()
            .refresh_token
            .clone()
            .ok_or(RefreshError::NoRefreshToken)?;
        let token_url = self.token_url.clone().ok_or(RefreshError::NoTokenEndpoint)?;

        info!(
            tool = %self.key.tool_name,
            tenant = %self.key.tenant_slot(),
            "Refreshing OAuth token"
        );

        self.write_state().in_flight_refresh = true;
        let result = RefreshRequest {
            token_url: &token_url,
            refresh_token: &refresh_token,
            client_id: self.client_id.as_deref(),
            client_secret: self.client_secret.as_deref(),
        }
        .send(&self.http)
        .await;
        self.write_state().in_flight_refresh = false;

        match result {
            Ok(tokens) => {
                let updated = self.apply(tokens);
                self.set_backoff(false);
                self.persist(&updated, &refresh_token);
                info!(
                    tool = %self.key.tool_name,
                    tenant = %self.key.tenant_slot(),
                    expires_at = ?updated.expires_at,
                    "OAuth token refreshed"
                );
                Ok(())
            }
            Err(e) => {
                self.set_backoff(true);
                Err(e)
            }
        }
    }

    fn apply(&self, tokens: RefreshedTokens) -> TokenState {
        let now = Utc::now().timestamp();
        let mut state = self.write_state();
        state.access_token = Some(tokens.access_token);
        if let Some(rotated) = tokens.refresh_token {
            state.refresh_token = Some(rotated);
        }
        // Without expires_in the previous expiry stands
        if let Some(secs) = tokens.expires_in {
            state.expires_at = Some(now + secs);
        }
        state.clone()
    }

    /// Writes the full bundle back so other instances see the new tokens.
    ///
    /// Skipped when the stored record no longer carries `used_refresh_token`:
    /// the credential was replaced or removed while the refresh was in flight.
    fn persist(&self, state: &TokenState, used_refresh_token: &str) {
        if self.key.tenant_id.is_none() {
            debug!(tool = %self.key.tool_name, "Unscoped credential, refreshed token kept in memory");
            return;
        }

        match self.store.get(&self.key) {
            Ok(Some(record))
                if record.text("refresh_token").as_deref() == Some(used_refresh_token) => {}
            Ok(_) => {
                info!(
                    credential = %self.key,
                    "Stored credential changed during refresh, not overwriting"
                );
                return;
            }
            Err(e) => {
                warn!(
                    credential = %self.key,
                    error = %e,
                    "Failed to read stored credential, refreshed token not persisted"
                );
                return;
            }
        }

        let bundle = OAuth2Credential {
            access_token: state.access_token.clone(),
            refresh_token: state.refresh_token.clone(),
            expires_at: state.expires_at,
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            token_url: self.token_url.clone(),
            static_token: self.static_token.clone(),
        };
        let data = bundle.to_credential_data(self.base_url.as_deref());

        if let Err(e) = self.store.save(
            &self.key,
            CredentialType::OAuth2,
            &data,
            self.options.encrypt_at_rest,
        ) {
            warn!(
                credential = %self.key,
                error = %e,
                "Failed to persist refreshed token"
            );
        }
    }
}
