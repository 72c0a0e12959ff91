//! Durable storage for the session token pair
//!
//! A flat JSON object of string entries. The token pair lives under
//! `access_token` and `refresh_token`; absence of either key is a valid
//! logged-out state. Other entries (the cached user profile) share the file.
//!
//! All writes go through a tokio Mutex and use atomic temp-file + rename, so
//! a crash mid-write leaves the previous contents intact. The in-memory map is
//! updated before the write, so a failed write still leaves this process with
//! the new values.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::constants::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::error::{Error, Result};

type Entries = BTreeMap<String, String>;

/// Key-value token store, optionally backed by a file.
pub struct TokenStore {
    path: Option<PathBuf>,
    state: Mutex<Entries>,
}

impl TokenStore {
    /// Load the store from `path`, creating an empty file when missing.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading token file: {e}")))?;
            let entries: Entries = serde_json::from_str(&contents)
                .map_err(|e| Error::StoreParse(format!("parsing token file: {e}")))?;
            info!(path = %path.display(), entries = entries.len(), "loaded token store");
            entries
        } else {
            info!(path = %path.display(), "token file not found, starting logged out");
            let entries = Entries::new();
            write_atomic(&path, &entries).await?;
            entries
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    /// Store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(Entries::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.state.lock().await.get(key).cloned()
    }

    pub async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut state = self.state.lock().await;
        state.insert(key.to_string(), value);
        debug!(key, "stored entry");
        self.persist(&state).await
    }

    /// Remove an entry. Writes only if something was removed.
    pub async fn remove(&self, key: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.remove(key).is_some() {
            debug!(key, "removed entry");
            self.persist(&state).await?;
        }
        Ok(())
    }

    pub async fn access_token(&self) -> Option<String> {
        self.get(ACCESS_TOKEN_KEY).await
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.get(REFRESH_TOKEN_KEY).await
    }

    /// Overwrite the token pair in a single write.
    pub async fn set_tokens(&self, access: &str, refresh: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.insert(ACCESS_TOKEN_KEY.to_string(), access.to_string());
        state.insert(REFRESH_TOKEN_KEY.to_string(), refresh.to_string());
        debug!("stored token pair");
        self.persist(&state).await
    }

    /// Remove both token entries in a single write.
    pub async fn clear_tokens(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let had_access = state.remove(ACCESS_TOKEN_KEY).is_some();
        let had_refresh = state.remove(REFRESH_TOKEN_KEY).is_some();
        if had_access || had_refresh {
            debug!("cleared token pair");
            self.persist(&state).await?;
        }
        Ok(())
    }

    async fn persist(&self, state: &Entries) -> Result<()> {
        match &self.path {
            Some(path) => write_atomic(path, state).await,
            None => Ok(()),
        }
    }
}

/// Write entries to `path` via a temp file in the same directory, mode 0600.
async fn write_atomic(path: &Path, entries: &Entries) -> Result<()> {
    let json = serde_json::to_string_pretty(entries)
        .map_err(|e| Error::StoreParse(format!("serializing token store: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Io("token path has no file name".into()))?
        .to_string_lossy();
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted token store");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::USER_KEY;

    #[tokio::test]
    async fn tokens_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let store = TokenStore::load(path.clone()).await.unwrap();
        store.set_tokens("A1", "R1").await.unwrap();

        let reloaded = TokenStore::load(path).await.unwrap();
        assert_eq!(reloaded.access_token().await.as_deref(), Some("A1"));
        assert_eq!(reloaded.refresh_token().await.as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn persisted_layout_uses_two_plain_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let store = TokenStore::load(path.clone()).await.unwrap();
        store.set_tokens("A1", "R1").await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let raw: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({"access_token": "A1", "refresh_token": "R1"})
        );
    }

    #[tokio::test]
    async fn cold_start_is_logged_out_and_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        assert!(!path.exists());
        let store = TokenStore::load(path.clone()).await.unwrap();
        assert!(store.access_token().await.is_none());
        assert!(store.refresh_token().await.is_none());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn clear_tokens_keeps_other_entries() {
        let store = TokenStore::in_memory();
        store.set_tokens("A1", "R1").await.unwrap();
        store.set(USER_KEY, "{}".into()).await.unwrap();

        store.clear_tokens().await.unwrap();

        assert!(store.access_token().await.is_none());
        assert!(store.refresh_token().await.is_none());
        assert_eq!(store.get(USER_KEY).await.as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn clear_tokens_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let store = TokenStore::load(path.clone()).await.unwrap();
        store.set_tokens("A1", "R1").await.unwrap();
        store.clear_tokens().await.unwrap();

        let reloaded = TokenStore::load(path).await.unwrap();
        assert!(reloaded.access_token().await.is_none());
        assert!(reloaded.refresh_token().await.is_none());
    }

    #[tokio::test]
    async fn set_tokens_overwrites_previous_pair() {
        let store = TokenStore::in_memory();
        store.set_tokens("A1", "R1").await.unwrap();
        store.set_tokens("A2", "R2").await.unwrap();
        assert_eq!(store.access_token().await.as_deref(), Some("A2"));
        assert_eq!(store.refresh_token().await.as_deref(), Some("R2"));
    }

    #[tokio::test]
    async fn corrupt_file_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let result = TokenStore::load(path).await;
        assert!(matches!(result, Err(Error::StoreParse(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let store = TokenStore::load(path.clone()).await.unwrap();
        store.set_tokens("A1", "R1").await.unwrap();

        let metadata = tokio::fs::metadata(&path).await.unwrap();
        let mode = metadata.permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "token file must be 0600, got {mode:o}");
    }
}
