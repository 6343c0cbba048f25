//! SQLite-backed credential store.
//!
//! Stores one JSON credential bundle per (tool, credential id, tenant).
//! Rows flagged `encrypted` hold a sealed bundle instead of plain JSON.

use super::{CredentialKey, CredentialRecord, CredentialStore, CredentialType, SecretBox};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Credential storage backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE tool_credentials (
///     id INTEGER PRIMARY KEY,
///     tool_name TEXT NOT NULL,
///     credential_id TEXT NOT NULL,
///     tenant_id TEXT NOT NULL,          -- 'none' when unscoped
///     credential_type TEXT NOT NULL,    -- api_key | oauth2 | token
///     credential_data TEXT NOT NULL,    -- JSON, or sealed JSON when encrypted
///     encrypted INTEGER NOT NULL,
///     created_at TEXT NOT NULL,
///     updated_at TEXT NOT NULL,
///     UNIQUE(tool_name, credential_id, tenant_id)
/// );
/// ```
///
/// # Thread Safety
/// - Connection is wrapped in a Mutex; safe to share behind `Arc`
pub struct SqliteCredentialStore {
    conn: Mutex<Connection>,
    secret_box: Option<SecretBox>,
}

impl SqliteCredentialStore {
    /// Creates or opens a credential store.
    ///
    /// # Arguments
    /// * `db_path` - Path to SQLite database file (`":memory:"` for tests)
    /// * `encryption_key` - Base64-encoded 32-byte master key. Without one,
    ///   encrypted rows can be neither written nor read.
    pub fn new<P: AsRef<Path>>(db_path: P, encryption_key: Option<&str>) -> Result<Self> {
        let secret_box = encryption_key
            .map(SecretBox::from_base64)
            .transpose()
            .context("Invalid encryption key")?;

        let conn = Connection::open(db_path).context("Failed to open database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS tool_credentials (
                id INTEGER PRIMARY KEY,
                tool_name TEXT NOT NULL,
                credential_id TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                credential_type TEXT NOT NULL,
                credential_data TEXT NOT NULL,
                encrypted INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(tool_name, credential_id, tenant_id)
            )
            "#,
            [],
        )
        .context("Failed to create tool_credentials table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tool_credentials_tenant ON tool_credentials(tenant_id, tool_name)",
            [],
        )
        .context("Failed to create index")?;

        Ok(Self {
            conn: Mutex::new(conn),
            secret_box,
        })
    }

    /// Lists `(tool_name, credential_id)` pairs stored for a tenant.
    pub fn list_for_tenant(&self, tenant_id: Option<&str>) -> Result<Vec<(String, String)>> {
        let slot = CredentialKey::new("", "", tenant_id).tenant_slot().to_string();
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT tool_name, credential_id FROM tool_credentials WHERE tenant_id = ?1 ORDER BY tool_name, credential_id",
            )
            .context("Failed to prepare query")?;

        let pairs = stmt
            .query_map(params![slot], |row| Ok((row.get(0)?, row.get(1)?)))
            .context("Failed to execute query")?
            .collect::<Result<Vec<(String, String)>, _>>()
            .context("Failed to read results")?;

        Ok(pairs)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Credential store connection lock poisoned"))
    }

    fn secret_box(&self) -> Result<&SecretBox> {
        self.secret_box
            .as_ref()
            .ok_or_else(|| anyhow!("Encrypted credential requires TOOLGATE_ENCRYPTION_KEY"))
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn get(&self, key: &CredentialKey) -> Result<Option<CredentialRecord>> {
        let row: Option<(String, String, bool)> = self
            .conn()?
            .query_row(
                r#"
                SELECT credential_type, credential_data, encrypted
                FROM tool_credentials
                WHERE tool_name = ?1 AND credential_id = ?2 AND tenant_id = ?3
                "#,
                params![key.tool_name, key.credential_id, key.tenant_slot()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .context("Failed to query credential")?;

        let Some((credential_type, raw, encrypted)) = row else {
            return Ok(None);
        };

        let json = if encrypted {
            self.secret_box()?
                .open(&raw)
                .with_context(|| format!("Failed to decrypt credential {}", key))?
        } else {
            raw
        };

        let credential_data: Map<String, Value> =
            serde_json::from_str(&json).context("Credential data is not a JSON object")?;

        Ok(Some(CredentialRecord {
            credential_data,
            credential_type: credential_type.parse()?,
            encrypted,
        }))
    }

    fn save(
        &self,
        key: &CredentialKey,
        credential_type: CredentialType,
        credential_data: &Map<String, Value>,
        encrypted: bool,
    ) -> Result<()> {
        let json = serde_json::to_string(credential_data).context("Failed to encode credential")?;
        let stored = if encrypted {
            self.secret_box()?
                .seal(&json)
                .context("Failed to encrypt credential")?
        } else {
            json
        };

        let now = Utc::now().to_rfc3339();

        self.conn()?
            .execute(
                r#"
                INSERT INTO tool_credentials (
                    tool_name, credential_id, tenant_id,
                    credential_type, credential_data, encrypted,
                    created_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(tool_name, credential_id, tenant_id) DO UPDATE SET
                    credential_type = excluded.credential_type,
                    credential_data = excluded.credential_data,
                    encrypted = excluded.encrypted,
                    updated_at = excluded.updated_at
                "#,
                params![
                    key.tool_name,
                    key.credential_id,
                    key.tenant_slot(),
                    credential_type.as_str(),
                    stored,
                    encrypted,
                    now,
                    now,
                ],
            )
            .context("Failed to store credential")?;

        Ok(())
    }

    fn delete(&self, key: &CredentialKey) -> Result<bool> {
        let rows_affected = self
            .conn()?
            .execute(
                "DELETE FROM tool_credentials WHERE tool_name = ?1 AND credential_id = ?2 AND tenant_id = ?3",
                params![key.tool_name, key.credential_id, key.tenant_slot()],
            )
            .context("Failed to delete credential")?;

        Ok(rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use serde_json::json;

    fn test_key() -> String {
        BASE64.encode([0u8; 32])
    }

    fn create_test_store() -> SqliteCredentialStore {
        SqliteCredentialStore::new(":memory:", Some(&test_key())).expect("Failed to create test store")
    }

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_save_and_get_plain() {
        let store = create_test_store();
        let key = CredentialKey::new("fmp", "fmp", Some("tenant-a"));

        store
            .save(&key, CredentialType::ApiKey, &data(json!({"api_key": "k1"})), false)
            .unwrap();

        let record = store.get(&key).unwrap().expect("Credential not found");
        assert_eq!(record.credential_type, CredentialType::ApiKey);
        assert!(!record.encrypted);
        assert_eq!(record.text("api_key").as_deref(), Some("k1"));
    }

    #[test]
    fn test_save_and_get_encrypted() {
        let store = create_test_store();
        let key = CredentialKey::new("home_assistant", "home_assistant", Some("tenant-a"));
        let bundle = data(json!({
            "base_url": "http://ha.local:8123",
            "access_token": "at",
            "refresh_token": "rt",
            "expires_at": 1_900_000_000i64,
        }));

        store.save(&key, CredentialType::OAuth2, &bundle, true).unwrap();

        // Raw column must not contain the secret
        let raw: String = store
            .conn()
            .unwrap()
            .query_row("SELECT credential_data FROM tool_credentials", [], |row| row.get(0))
            .unwrap();
        assert!(!raw.contains("refresh_token"));

        let record = store.get(&key).unwrap().unwrap();
        assert!(record.encrypted);
        assert_eq!(record.credential_data, bundle);
        assert_eq!(record.integer("expires_at"), Some(1_900_000_000));
    }

    #[test]
    fn test_encrypted_requires_key() {
        let store = SqliteCredentialStore::new(":memory:", None).unwrap();
        let key = CredentialKey::new("fmp", "fmp", None);
        let result = store.save(&key, CredentialType::ApiKey, &data(json!({"api_key": "k"})), true);
        assert!(result.is_err());
    }

    #[test]
    fn test_get_nonexistent() {
        let store = create_test_store();
        let key = CredentialKey::new("fmp", "fmp", Some("tenant-a"));
        assert!(store.get(&key).unwrap().is_none());
    }

    #[test]
    fn test_upsert_replaces() {
        let store = create_test_store();
        let key = CredentialKey::new("fmp", "fmp", Some("tenant-a"));

        store
            .save(&key, CredentialType::ApiKey, &data(json!({"api_key": "old"})), false)
            .unwrap();
        store
            .save(&key, CredentialType::ApiKey, &data(json!({"api_key": "new"})), true)
            .unwrap();

        let record = store.get(&key).unwrap().unwrap();
        assert_eq!(record.text("api_key").as_deref(), Some("new"));
        assert!(record.encrypted);
        assert_eq!(store.list_for_tenant(Some("tenant-a")).unwrap().len(), 1);
    }

    #[test]
    fn test_tenants_isolated() {
        let store = create_test_store();
        let a = CredentialKey::new("fmp", "fmp", Some("tenant-a"));
        let b = CredentialKey::new("fmp", "fmp", Some("tenant-b"));
        let unscoped = CredentialKey::new("fmp", "fmp", None);

        store
            .save(&a, CredentialType::ApiKey, &data(json!({"api_key": "a"})), false)
            .unwrap();

        assert!(store.get(&b).unwrap().is_none());
        assert!(store.get(&unscoped).unwrap().is_none());

        store
            .save(&unscoped, CredentialType::ApiKey, &data(json!({"api_key": "dev"})), false)
            .unwrap();
        assert_eq!(
            store.list_for_tenant(None).unwrap(),
            vec![("fmp".to_string(), "fmp".to_string())]
        );
    }

    #[test]
    fn test_delete() {
        let store = create_test_store();
        let key = CredentialKey::new("polygon", "polygon", Some("tenant-a"));
        store
            .save(&key, CredentialType::ApiKey, &data(json!({"api_key": "k"})), false)
            .unwrap();

        assert!(store.delete(&key).unwrap());
        assert!(store.get(&key).unwrap().is_none());
        assert!(!store.delete(&key).unwrap());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.db");
        let key = CredentialKey::new("newsapi", "newsapi", Some("tenant-a"));

        {
            let store = SqliteCredentialStore::new(&path, Some(&test_key())).unwrap();
            store
                .save(&key, CredentialType::ApiKey, &data(json!({"api_key": "k"})), true)
                .unwrap();
        }

        let reopened = SqliteCredentialStore::new(&path, Some(&test_key())).unwrap();
        let record = reopened.get(&key).unwrap().unwrap();
        assert_eq!(record.text("api_key").as_deref(), Some("k"));

        // Opening without the key still works, but encrypted rows cannot be read
        let keyless = SqliteCredentialStore::new(&path, None).unwrap();
        assert!(keyless.get(&key).is_err());
    }

    #[test]
    fn test_invalid_encryption_key() {
        assert!(SqliteCredentialStore::new(":memory:", Some("short")).is_err());
        assert!(SqliteCredentialStore::new(":memory:", Some("not-valid-base64!@#$")).is_err());
    }
}
