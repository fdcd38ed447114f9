use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::error::{HealthError, Result};
use crate::model::{Preferences, Theme, UserRecord, VitalsEntry};

const USERS_KEY: &str = "users";
const CURRENT_USER_KEY: &str = "current_user";
const TOKEN_KEY: &str = "token";
const THEME_KEY: &str = "theme";
const VOICE_KEY: &str = "voice";

/// Raw string key/value persistence. Writes are single key replacements.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// SQLite-backed store: one `kv_store` table, upsert on write.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await?;
        Self::with_pool(pool).await
    }

    /// A private in-memory database. Pinned to one connection, since every
    /// new SQLite memory connection is a fresh empty database.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query("CREATE TABLE IF NOT EXISTS kv_store (key TEXT PRIMARY KEY NOT NULL, value TEXT NOT NULL)")
            .execute(&pool)
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO kv_store (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Process-local store. Lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| HealthError::Storage(format!("memory store poisoned: {}", e)))?;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| HealthError::Storage(format!("memory store poisoned: {}", e)))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| HealthError::Storage(format!("memory store poisoned: {}", e)))?;
        entries.remove(key);
        Ok(())
    }
}

/// Typed tables over a [`KeyValueStore`].
///
/// Reads are forgiving: a missing or malformed value comes back as the
/// type's empty default instead of an error.
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn KeyValueStore>,
}

impl Repository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    async fn read_json<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(T::default());
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(value),
            Err(e) => {
                log::warn!("⚠️ Ignoring malformed value under {}: {}", key, e);
                Ok(T::default())
            }
        }
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)
            .map_err(|e| HealthError::Storage(format!("cannot encode {}: {}", key, e)))?;
        log::debug!("💾 put {} ({} bytes)", key, raw.len());
        self.store.put(key, &raw).await
    }

    // --- users ---

    pub async fn users(&self) -> Result<Vec<UserRecord>> {
        self.read_json(USERS_KEY).await
    }

    pub async fn save_users(&self, users: &[UserRecord]) -> Result<()> {
        self.write_json(USERS_KEY, users).await
    }

    // --- session pointer ---

    pub async fn current_user(&self) -> Result<Option<UserRecord>> {
        self.read_json(CURRENT_USER_KEY).await
    }

    pub async fn set_current_user(&self, user: &UserRecord) -> Result<()> {
        self.write_json(CURRENT_USER_KEY, user).await
    }

    pub async fn clear_current_user(&self) -> Result<()> {
        self.store.remove(CURRENT_USER_KEY).await
    }

    /// The token is stored as a bare string, not JSON.
    pub async fn token(&self) -> Result<Option<String>> {
        self.store.get(TOKEN_KEY).await
    }

    pub async fn set_token(&self, token: &str) -> Result<()> {
        self.store.put(TOKEN_KEY, token).await
    }

    pub async fn clear_token(&self) -> Result<()> {
        self.store.remove(TOKEN_KEY).await
    }

    // --- per-user tables ---

    pub async fn ledger_for(&self, derived_id: &str) -> Result<Vec<VitalsEntry>> {
        self.read_json(&format!("records_{}", derived_id)).await
    }

    pub async fn save_ledger(&self, derived_id: &str, entries: &[VitalsEntry]) -> Result<()> {
        self.write_json(&format!("records_{}", derived_id), entries).await
    }

    /// `None` when nothing was ever cached for this identifier.
    pub async fn conditions_for(&self, derived_id: &str) -> Result<Option<Vec<String>>> {
        self.read_json(&format!("diseases_{}", derived_id)).await
    }

    /// The cache value exactly as stored, for display fallbacks.
    pub async fn raw_conditions_for(&self, derived_id: &str) -> Result<Option<String>> {
        self.store.get(&format!("diseases_{}", derived_id)).await
    }

    pub async fn save_conditions_for(&self, derived_id: &str, conditions: &[String]) -> Result<()> {
        self.write_json(&format!("diseases_{}", derived_id), conditions).await
    }

    // --- preferences ---

    /// A missing voice flag is written back as enabled on first read.
    pub async fn preferences(&self) -> Result<Preferences> {
        let theme = match self.store.get(THEME_KEY).await?.as_deref() {
            Some("dark") => Theme::Dark,
            _ => Theme::Light,
        };
        let voice = match self.store.get(VOICE_KEY).await? {
            Some(flag) => flag,
            None => {
                self.store.put(VOICE_KEY, "1").await?;
                "1".to_string()
            }
        };
        Ok(Preferences {
            theme,
            voice_enabled: voice != "0",
        })
    }

    pub async fn set_theme(&self, theme: Theme) -> Result<()> {
        self.store.put(THEME_KEY, theme.as_str()).await
    }

    pub async fn set_voice_enabled(&self, enabled: bool) -> Result<()> {
        self.store.put(VOICE_KEY, if enabled { "1" } else { "0" }).await
    }

    /// Direct access for tests that need to plant raw values.
    #[cfg(test)]
    pub fn raw(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_values_read_as_empty() {
        let repo = Repository::in_memory();
        repo.raw().put("users", "{not json").await.unwrap();
        repo.raw().put("records_anon", "[1,2").await.unwrap();
        repo.raw().put("current_user", "42").await.unwrap();

        assert!(repo.users().await.unwrap().is_empty());
        assert!(repo.ledger_for("anon").await.unwrap().is_empty());
        assert!(repo.current_user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_voice_flag_defaults_to_enabled_and_is_persisted() {
        let repo = Repository::in_memory();
        let prefs = repo.preferences().await.unwrap();
        assert!(prefs.voice_enabled);
        assert_eq!(prefs.theme, Theme::Light);
        assert_eq!(repo.raw().get("voice").await.unwrap().as_deref(), Some("1"));

        repo.set_voice_enabled(false).await.unwrap();
        repo.set_theme(Theme::Dark).await.unwrap();
        let prefs = repo.preferences().await.unwrap();
        assert!(!prefs.voice_enabled);
        assert_eq!(prefs.theme, Theme::Dark);
        assert_eq!(repo.raw().get("theme").await.unwrap().as_deref(), Some("dark"));
    }

    #[tokio::test]
    async fn sqlite_store_upserts_and_removes() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert_eq!(store.get("token").await.unwrap(), None);

        store.put("token", "local-a").await.unwrap();
        store.put("token", "local-b").await.unwrap();
        assert_eq!(store.get("token").await.unwrap().as_deref(), Some("local-b"));

        store.remove("token").await.unwrap();
        assert_eq!(store.get("token").await.unwrap(), None);
    }

    #[tokio::test]
    async fn ledger_survives_through_sqlite() {
        let repo = Repository::new(Arc::new(SqliteStore::in_memory().await.unwrap()));
        let entry = VitalsEntry {
            name: "Asha".into(),
            bp: "120/80".into(),
            sugar: "110".into(),
            pulse: String::new(),
            weight: "61.5".into(),
            ts: 1_700_000_000_000,
        };
        repo.save_ledger("user_asha", std::slice::from_ref(&entry)).await.unwrap();
        assert_eq!(repo.ledger_for("user_asha").await.unwrap(), vec![entry]);
        assert!(repo.ledger_for("anon").await.unwrap().is_empty());
    }
}
