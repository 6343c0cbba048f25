use super::GatewayConfig;
use crate::credentials::Environment;
use tracing::warn;

/// Applies `TOOLGATE_*` environment overrides on top of a loaded config.
///
/// Unparseable values are logged and ignored, leaving the file/default value.
pub fn apply_env_overrides(config: &mut GatewayConfig, env: &dyn Environment) {
    if let Some(v) = parsed::<bool>(env, "TOOLGATE_CREDENTIALS_STRICT") {
        config.credentials.strict = v;
    }
    if let Some(v) = env.var("TOOLGATE_CREDENTIALS_DB") {
        config.credentials.db_path = v;
    }
    if let Some(v) = parsed::<bool>(env, "TOOLGATE_ENCRYPT_AT_REST") {
        config.credentials.encrypt_at_rest = v;
    }
    if let Some(v) = parsed::<u64>(env, "TOOLGATE_HTTP_TIMEOUT_SECS") {
        config.http.timeout_secs = v;
    }
    if let Some(v) = parsed::<u64>(env, "TOOLGATE_REFRESH_BACKOFF_SECS") {
        config.token.refresh_backoff_secs = v;
    }
    if let Some(v) = parsed::<u16>(env, "TOOLGATE_API_PORT") {
        config.api.port = v;
    }
}

fn parsed<T: std::str::FromStr>(env: &dyn Environment, name: &str) -> Option<T> {
    let raw = env.var(name)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = name, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::SourceMode;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(
            &mut config,
            &env(&[
                ("TOOLGATE_CREDENTIALS_STRICT", "true"),
                ("TOOLGATE_CREDENTIALS_DB", "/tmp/creds.db"),
                ("TOOLGATE_HTTP_TIMEOUT_SECS", "30"),
                ("TOOLGATE_API_PORT", "9000"),
            ]),
        );

        assert_eq!(config.source_mode(), SourceMode::Strict);
        assert_eq!(config.credentials.db_path, "/tmp/creds.db");
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.api.port, 9000);
    }

    #[test]
    fn test_bad_values_ignored() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(
            &mut config,
            &env(&[
                ("TOOLGATE_CREDENTIALS_STRICT", "yes please"),
                ("TOOLGATE_API_PORT", "99999"),
            ]),
        );

        assert!(!config.credentials.strict);
        assert_eq!(config.api.port, 3001);
    }
}
