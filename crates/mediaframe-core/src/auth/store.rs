//! Durable storage for the access/refresh token pair.
//!
//! Both tokens live in one record under the keys `accessToken` and
//! `refreshToken`, so saving or clearing them is a single write.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::TokenPair;

/// Session file name in the data directory
const SESSION_FILE: &str = "session.json";

/// Keychain service name
const KEYRING_SERVICE: &str = "mediaframe";

/// Keychain account holding the serialized token record
const KEYRING_ACCOUNT: &str = "session";

pub trait TokenStore: Send + Sync {
    /// Read the persisted pair. A record missing either token is returned
    /// as-is; callers decide what to do with it.
    fn load(&self) -> Result<Option<TokenPair>>;

    fn save(&self, tokens: &TokenPair) -> Result<()>;

    /// Remove both tokens. Clearing an empty store succeeds.
    fn clear(&self) -> Result<()>;
}

#[derive(Serialize, Deserialize)]
struct StoredTokens {
    #[serde(rename = "accessToken", default)]
    access_token: String,
    #[serde(rename = "refreshToken", default)]
    refresh_token: String,
}

impl StoredTokens {
    fn from_pair(pair: &TokenPair) -> Self {
        Self {
            access_token: pair.access.clone(),
            refresh_token: pair.refresh.clone(),
        }
    }

    fn into_pair(self) -> TokenPair {
        TokenPair::new(self.access_token, self.refresh_token)
    }
}

// ============================================================================
// File store
// ============================================================================

/// JSON record on disk, replaced atomically on every save.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store `session.json` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SESSION_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<TokenPair>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&self.path).context("Failed to read session file")?;
        let stored: StoredTokens =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(stored.into_pair()))
    }

    fn save(&self, tokens: &TokenPair) -> Result<()> {
        let dir = self.dir();
        std::fs::create_dir_all(dir).context("Failed to create session directory")?;

        let contents = serde_json::to_vec_pretty(&StoredTokens::from_pair(tokens))?;

        // The temp file is created owner-only (0600 on unix) before any byte is written.
        let mut temp = tempfile::Builder::new()
            .prefix(".session")
            .suffix(".tmp")
            .tempfile_in(dir)
            .context("Failed to create session file")?;
        temp.write_all(&contents).context("Failed to write session file")?;
        temp.as_file().sync_all().context("Failed to flush session file")?;
        temp.persist(&self.path).context("Failed to replace session file")?;
        debug!(path = %self.path.display(), "Session saved");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to remove session file"),
        }
    }
}

// ============================================================================
// Keychain store
// ============================================================================

/// Token record kept in the OS keychain as a single entry.
pub struct KeyringTokenStore {
    service: String,
    account: String,
}

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self::with_names(KEYRING_SERVICE, KEYRING_ACCOUNT)
    }

    pub fn with_names(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, &self.account).context("Failed to create keyring entry")
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Result<Option<TokenPair>> {
        match self.entry()?.get_password() {
            Ok(secret) => {
                let stored: StoredTokens = serde_json::from_str(&secret)
                    .context("Failed to parse session from keychain")?;
                Ok(Some(stored.into_pair()))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read session from keychain"),
        }
    }

    fn save(&self, tokens: &TokenPair) -> Result<()> {
        let secret = serde_json::to_string(&StoredTokens::from_pair(tokens))?;
        self.entry()?
            .set_password(&secret)
            .context("Failed to store session in keychain")
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete session from keychain"),
        }
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store, for embedding and tests.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<TokenPair>>> {
        self.tokens
            .lock()
            .map_err(|_| anyhow!("Token store lock poisoned"))
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<TokenPair>> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, tokens: &TokenPair) -> Result<()> {
        *self.lock()? = Some(tokens.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.lock()? = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_roundtrip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::in_dir(&dir.path().join("nested"));

        assert!(store.load().unwrap().is_none());

        store.save(&TokenPair::new("A1", "R1")).unwrap();
        assert_eq!(store.load().unwrap(), Some(TokenPair::new("A1", "R1")));
        // Only the session file remains; the temp file was renamed over it.
        let entries = std::fs::read_dir(dir.path().join("nested")).unwrap().count();
        assert_eq!(entries, 1);

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::in_dir(dir.path());
        store.save(&TokenPair::new("A1", "R1")).unwrap();
        store.save(&TokenPair::new("A2", "R2")).unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(store.load().unwrap(), Some(TokenPair::new("A2", "R2")));
    }

    #[test]
    fn test_file_store_uses_storage_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::in_dir(dir.path());
        store.save(&TokenPair::new("A1", "R1")).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["accessToken"], "A1");
        assert_eq!(value["refreshToken"], "R1");
        assert_eq!(value.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_file_store_partial_record_loads_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::in_dir(dir.path());
        std::fs::write(store.path(), r#"{"accessToken": "A1"}"#).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert!(!loaded.is_complete());
    }

    #[test]
    fn test_file_store_corrupt_record_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::in_dir(dir.path());
        std::fs::write(store.path(), "not json").unwrap();
        assert!(store.load().is_err());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::with_tokens(TokenPair::new("A", "R"));
        assert!(store.load().unwrap().is_some());
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }
}
