use super::CredentialRecord;
use serde_json::{Map, Value};
use std::fmt;

/// OAuth2 (or static bearer) secret fields.
///
/// All strings are trimmed and non-empty when present.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct OAuth2Credential {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds)
    pub expires_at: Option<i64>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub token_url: Option<String>,
    /// Non-expiring bearer token (e.g. a Home Assistant long-lived token)
    pub static_token: Option<String>,
}

impl OAuth2Credential {
    pub fn from_record(record: &CredentialRecord) -> Self {
        Self {
            access_token: record.text("access_token"),
            refresh_token: record.text("refresh_token"),
            expires_at: record.integer("expires_at"),
            client_id: record.text("client_id"),
            client_secret: record.text("client_secret"),
            token_url: record.text("token_url"),
            static_token: record.text("token"),
        }
    }

    pub fn static_token(token: impl Into<String>) -> Self {
        Self {
            static_token: Some(token.into()),
            ..Default::default()
        }
    }

    /// At least one field that can authorize a request (now or after refresh).
    pub fn has_secret(&self) -> bool {
        self.static_token.is_some() || self.access_token.is_some() || self.refresh_token.is_some()
    }

    /// Full bundle in stored form. Absent strings are written as `""`.
    pub fn to_credential_data(&self, base_url: Option<&str>) -> Map<String, Value> {
        fn text(v: &Option<String>) -> Value {
            Value::String(v.clone().unwrap_or_default())
        }

        let mut data = Map::new();
        if let Some(base_url) = base_url {
            data.insert("base_url".into(), Value::String(base_url.to_string()));
        }
        data.insert("token".into(), text(&self.static_token));
        data.insert("access_token".into(), text(&self.access_token));
        data.insert("refresh_token".into(), text(&self.refresh_token));
        data.insert("client_id".into(), text(&self.client_id));
        data.insert("client_secret".into(), text(&self.client_secret));
        data.insert("token_url".into(), text(&self.token_url));
        data.insert(
            "expires_at".into(),
            self.expires_at.map(Value::from).unwrap_or(Value::Null),
        );
        data
    }
}

impl fmt::Debug for OAuth2Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn mask(v: &Option<String>) -> &'static str {
            if v.is_some() {
                "<redacted>"
            } else {
                "<none>"
            }
        }
        f.debug_struct("OAuth2Credential")
            .field("access_token", &mask(&self.access_token))
            .field("refresh_token", &mask(&self.refresh_token))
            .field("expires_at", &self.expires_at)
            .field("client_id", &self.client_id)
            .field("client_secret", &mask(&self.client_secret))
            .field("token_url", &self.token_url)
            .field("static_token", &mask(&self.static_token))
            .finish()
    }
}

/// Outcome of credential resolution.
#[derive(Clone, PartialEq, Eq)]
pub enum ResolvedCredential {
    ApiKey {
        value: String,
    },
    OAuth2(OAuth2Credential),
    /// Self-hosted endpoint plus its token (static or OAuth2).
    BaseUrlAuth {
        base_url: String,
        auth: OAuth2Credential,
    },
    /// No usable credential found.
    Unconfigured,
}

impl ResolvedCredential {
    pub fn is_configured(&self) -> bool {
        match self {
            ResolvedCredential::ApiKey { value } => !value.is_empty(),
            ResolvedCredential::OAuth2(auth) => auth.has_secret(),
            ResolvedCredential::BaseUrlAuth { base_url, auth } => {
                !base_url.is_empty() && auth.has_secret()
            }
            ResolvedCredential::Unconfigured => false,
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        match self {
            ResolvedCredential::ApiKey { value } => Some(value),
            _ => None,
        }
    }

    pub fn oauth2(&self) -> Option<&OAuth2Credential> {
        match self {
            ResolvedCredential::OAuth2(auth) | ResolvedCredential::BaseUrlAuth { auth, .. } => {
                Some(auth)
            }
            _ => None,
        }
    }

    pub fn base_url(&self) -> Option<&str> {
        match self {
            ResolvedCredential::BaseUrlAuth { base_url, .. } => Some(base_url),
            _ => None,
        }
    }
}

impl fmt::Debug for ResolvedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedCredential::ApiKey { .. } => f.write_str("ApiKey { value: <redacted> }"),
            ResolvedCredential::OAuth2(auth) => f.debug_tuple("OAuth2").field(auth).finish(),
            ResolvedCredential::BaseUrlAuth { base_url, auth } => f
                .debug_struct("BaseUrlAuth")
                .field("base_url", base_url)
                .field("auth", auth)
                .finish(),
            ResolvedCredential::Unconfigured => f.write_str("Unconfigured"),
        }
    }
}
