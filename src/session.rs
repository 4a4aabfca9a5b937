use crate::error::StorageError;
use crate::models::{Credential, User};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::{info, warn};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_KEY: &str = "user";

/// Snapshot published to every subscriber of the store.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionState {
    pub user: Option<User>,
    pub credential: Option<Credential>,
    pub is_loading: bool,
}

impl SessionState {
    fn loading() -> Self {
        SessionState {
            user: None,
            credential: None,
            is_loading: true,
        }
    }

    fn anonymous() -> Self {
        SessionState {
            user: None,
            credential: None,
            is_loading: false,
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.credential.as_ref().map(|c| c.access_token.as_str())
    }
}

/// Durable key/value storage backing the session.
pub trait SessionStorage: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

// JSON object of string values, rewritten on every change
pub struct FileStorage {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStorage {
    /// Opens the file at `path`. A missing or unreadable file starts out empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|err| {
                warn!(path = %path.display(), %err, "ignoring corrupted session file");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        FileStorage { path, entries }
    }

    fn flush(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, content)?;
        restrict_permissions(&self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    entries: BTreeMap<String, String>,
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Owner of the current credential and user.
///
/// Starts out loading; `hydrate` restores whatever the storage holds. Readers
/// get a `watch::Receiver` from `subscribe` and never touch the state directly.
pub struct SessionStore {
    storage: Box<dyn SessionStorage>,
    tx: watch::Sender<SessionState>,
}

impl SessionStore {
    pub fn new(storage: Box<dyn SessionStorage>) -> Self {
        let (tx, _rx) = watch::channel(SessionState::loading());
        SessionStore { storage, tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    pub fn hydrate(&mut self) {
        let state = match self.read_stored() {
            Some((credential, user)) => {
                info!(user_id = %user.id, "restored stored session");
                SessionState {
                    user: Some(user),
                    credential: Some(credential),
                    is_loading: false,
                }
            }
            None => SessionState::anonymous(),
        };
        self.tx.send_replace(state);
    }

    fn read_stored(&self) -> Option<(Credential, User)> {
        let access_token = self.storage.get(ACCESS_TOKEN_KEY)?;
        let raw_user = self.storage.get(USER_KEY)?;
        let user = match serde_json::from_str::<User>(&raw_user) {
            Ok(user) => user,
            Err(err) => {
                warn!(%err, "stored user record is unreadable, starting anonymous");
                return None;
            }
        };
        if access_token.is_empty() {
            return None;
        }
        let refresh_token = self.storage.get(REFRESH_TOKEN_KEY).unwrap_or_default();
        Some((
            Credential {
                access_token,
                refresh_token,
            },
            user,
        ))
    }

    pub fn set_session(&mut self, credential: Credential, user: User) {
        if let Err(err) = self.persist(&credential, &user) {
            warn!(%err, "session will not survive a restart");
        }
        info!(user_id = %user.id, "session started");
        self.tx.send_replace(SessionState {
            user: Some(user),
            credential: Some(credential),
            is_loading: false,
        });
    }

    fn persist(&mut self, credential: &Credential, user: &User) -> Result<(), StorageError> {
        let raw_user = serde_json::to_string(user)?;
        self.storage.set(ACCESS_TOKEN_KEY, &credential.access_token)?;
        self.storage.set(REFRESH_TOKEN_KEY, &credential.refresh_token)?;
        self.storage.set(USER_KEY, &raw_user)?;
        Ok(())
    }

    pub fn clear(&mut self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
            if let Err(err) = self.storage.remove(key) {
                warn!(key, %err, "failed to remove stored session entry");
            }
        }
        info!("session cleared");
        self.tx.send_replace(SessionState::anonymous());
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    pub(crate) fn sample_user() -> User {
        User {
            id: "u1".to_string(),
            email: "a@b.com".to_string(),
            name: "Alice".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
        }
    }

    pub(crate) fn sample_credential() -> Credential {
        Credential {
            access_token: "access-123".to_string(),
            refresh_token: "refresh-456".to_string(),
        }
    }

    #[test]
    fn test_new_store_is_loading() {
        let store = SessionStore::new(Box::new(MemoryStorage::default()));
        let state = store.snapshot();
        assert!(state.is_loading);
        assert!(state.user.is_none());
    }

    #[test]
    fn test_hydrate_empty_storage_is_anonymous() {
        let mut store = SessionStore::new(Box::new(MemoryStorage::default()));
        store.hydrate();
        assert_eq!(store.snapshot(), SessionState::anonymous());
    }

    #[test]
    fn test_hydrate_corrupted_user_is_anonymous() {
        let mut storage = MemoryStorage::default();
        storage.set(ACCESS_TOKEN_KEY, "token").unwrap();
        storage.set(USER_KEY, "{not json").unwrap();
        let mut store = SessionStore::new(Box::new(storage));
        store.hydrate();
        assert_eq!(store.snapshot(), SessionState::anonymous());
    }

    #[test]
    fn test_session_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let mut store = SessionStore::new(Box::new(FileStorage::open(&path)));
        store.hydrate();
        store.set_session(sample_credential(), sample_user());

        let mut reopened = SessionStore::new(Box::new(FileStorage::open(&path)));
        reopened.hydrate();
        let state = reopened.snapshot();
        assert!(!state.is_loading);
        assert_eq!(state.user, Some(sample_user()));
        assert_eq!(state.credential, Some(sample_credential()));
    }

    #[test]
    fn test_clear_removes_every_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut store = SessionStore::new(Box::new(FileStorage::open(&path)));
        store.set_session(sample_credential(), sample_user());
        store.clear();

        let storage = FileStorage::open(&path);
        assert_eq!(storage.get(ACCESS_TOKEN_KEY), None);
        assert_eq!(storage.get(REFRESH_TOKEN_KEY), None);
        assert_eq!(storage.get(USER_KEY), None);
        assert_eq!(store.snapshot(), SessionState::anonymous());
    }

    #[test]
    fn test_corrupted_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "garbage").unwrap();

        let mut store = SessionStore::new(Box::new(FileStorage::open(&path)));
        store.hydrate();
        assert_eq!(store.snapshot(), SessionState::anonymous());
    }

    #[test]
    fn test_subscribers_see_changes() {
        let mut store = SessionStore::new(Box::new(MemoryStorage::default()));
        let rx = store.subscribe();
        store.hydrate();
        assert!(!rx.borrow().is_loading);

        store.set_session(sample_credential(), sample_user());
        assert_eq!(rx.borrow().access_token(), Some("access-123"));

        store.clear();
        assert_eq!(rx.borrow().access_token(), None);
    }
}
