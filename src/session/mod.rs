//! Durable session record and its in-memory mirror.
//!
//! The record lives under [`SESSION_KEY`] as `{ "user": ..., "token": ... }`.
//! Every mutation writes the durable store first and only then the mirror, while
//! holding the mirror's write lock, so the two never disagree once a call has
//! returned. [`SessionStore::clear`] is the exception: signing out always
//! empties the mirror, and an undeletable record is overwritten with an empty
//! one.

mod storage;

pub use self::storage::{
    FileStorage, KeyValueStorage, MemoryStorage, StorageError, StorageResult,
};

use crate::{api::SessionGate, auth::types::User};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock, RwLockWriteGuard},
};
use tracing::{debug, error, warn};

/// Storage key of the session record.
pub const SESSION_KEY: &str = "auth";

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub token: Option<String>,
}

impl Session {
    #[must_use]
    pub fn new(user: User, token: Option<String>) -> Self {
        Self {
            user: Some(user),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user.as_ref().map(|u| &u.email))
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

pub struct SessionStore {
    storage: Arc<dyn KeyValueStorage>,
    mirror: RwLock<Session>,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("session", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Creates an empty store; call [`SessionStore::hydrate`] to load the record.
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            mirror: RwLock::new(Session::default()),
        }
    }

    /// Loads the durable record into the mirror. Never fails: a missing,
    /// unreadable or corrupt record means no session, and a corrupt record is
    /// removed so both sides agree.
    pub fn hydrate(&self) -> Session {
        let mut mirror = self.write_mirror();

        let loaded = match self.storage.get(SESSION_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Session>(&raw) {
                Ok(session) => Session {
                    token: session.token.filter(|t| !t.is_empty()),
                    ..session
                },
                Err(err) => {
                    warn!("discarding unreadable session record: {err}");
                    if let Err(err) = self.storage.delete(SESSION_KEY) {
                        warn!("failed to remove unreadable session record: {err}");
                    }
                    Session::default()
                }
            },
            Ok(None) => Session::default(),
            Err(err) => {
                warn!("failed to read session record: {err}");
                Session::default()
            }
        };

        debug!(authenticated = loaded.is_authenticated(), "session hydrated");
        *mirror = loaded.clone();
        loaded
    }

    /// Writes `{ user, token }` in one durable write, then updates the mirror.
    ///
    /// # Errors
    /// Returns an error if the record cannot be encoded or stored; the mirror
    /// is left unchanged.
    pub fn persist(&self, user: User, token: Option<String>) -> StorageResult<Session> {
        let session = Session::new(user, token);
        let mut mirror = self.write_mirror();
        self.write_record(&session)?;
        *mirror = session.clone();
        Ok(session)
    }

    /// Shallow-merges `partial` into the current user and re-persists it with
    /// the same token. Returns `None` when there is no user to update.
    ///
    /// # Errors
    /// Returns an error if the merged user is invalid or cannot be stored.
    pub fn update_user(&self, partial: &Map<String, Value>) -> StorageResult<Option<User>> {
        let mut mirror = self.write_mirror();
        let Some(current) = mirror.user.as_ref() else {
            debug!("update_user ignored: no session");
            return Ok(None);
        };

        let mut merged = match serde_json::to_value(current)? {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        for (key, value) in partial {
            merged.insert(key.clone(), value.clone());
        }
        let user: User = serde_json::from_value(Value::Object(merged))?;

        let session = Session {
            user: Some(user.clone()),
            token: mirror.token.clone(),
        };
        self.write_record(&session)?;
        *mirror = session;
        Ok(Some(user))
    }

    /// Removes the durable record and resets the mirror. When the record
    /// cannot be removed it is overwritten with an empty session instead.
    /// The mirror is reset in every case.
    ///
    /// # Errors
    /// Returns an error if the record can be neither removed nor overwritten.
    pub fn clear(&self) -> StorageResult<()> {
        let mut mirror = self.write_mirror();
        *mirror = Session::default();

        if let Err(err) = self.storage.delete(SESSION_KEY) {
            warn!("failed to remove session record, overwriting it: {err}");
            self.write_record(&Session::default())?;
        }
        Ok(())
    }

    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.mirror
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.snapshot().user
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.mirror
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .clone()
    }

    fn write_record(&self, session: &Session) -> StorageResult<()> {
        let encoded = serde_json::to_string(session)?;
        self.storage.set(SESSION_KEY, &encoded)
    }

    fn write_mirror(&self) -> RwLockWriteGuard<'_, Session> {
        self.mirror.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionGate for SessionStore {
    fn bearer_token(&self) -> Option<String> {
        self.token()
    }

    fn invalidate(&self) {
        if let Err(err) = self.clear() {
            error!("failed to clear rejected session: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory storage whose writes or deletes can be switched off.
    #[derive(Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        fail: AtomicBool,
        fail_delete: AtomicBool,
    }

    impl KeyValueStorage for FlakyStorage {
        fn set(&self, key: &str, value: &str) -> StorageResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StorageError::Io(std::io::Error::other("disk full")));
            }
            self.inner.set(key, value)
        }

        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            self.inner.get(key)
        }

        fn delete(&self, key: &str) -> StorageResult<bool> {
            if self.fail.load(Ordering::SeqCst) || self.fail_delete.load(Ordering::SeqCst) {
                return Err(StorageError::Io(std::io::Error::other("read-only")));
            }
            self.inner.delete(key)
        }
    }

    fn durable(storage: &dyn KeyValueStorage) -> Session {
        storage
            .get(SESSION_KEY)
            .ok()
            .flatten()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    #[test]
    fn persist_writes_user_and_token_together() -> StorageResult<()> {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone());

        let user = User::new("u1", "u@x.io");
        store.persist(user.clone(), Some("tok".into()))?;

        assert_eq!(store.snapshot(), durable(storage.as_ref()));
        assert_eq!(store.user(), Some(user));
        assert_eq!(store.token().as_deref(), Some("tok"));
        Ok(())
    }

    #[test]
    fn empty_token_is_stored_as_null() -> StorageResult<()> {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone());
        store.persist(User::new("u1", "u@x.io"), Some(String::new()))?;

        let raw = storage.get(SESSION_KEY)?.unwrap_or_default();
        let value: Value = serde_json::from_str(&raw)?;
        assert_eq!(value.get("token"), Some(&Value::Null));
        assert_eq!(store.token(), None);
        Ok(())
    }

    #[test]
    fn failed_write_leaves_mirror_untouched() -> StorageResult<()> {
        let storage = Arc::new(FlakyStorage::default());
        let store = SessionStore::new(storage.clone());
        store.persist(User::new("u1", "u@x.io"), Some("old".into()))?;

        storage.fail.store(true, Ordering::SeqCst);
        assert!(
            store
                .persist(User::new("u2", "v@x.io"), Some("new".into()))
                .is_err()
        );

        assert_eq!(store.token().as_deref(), Some("old"));
        assert_eq!(store.snapshot(), durable(storage.as_ref()));
        Ok(())
    }

    #[test]
    fn clear_overwrites_record_when_delete_fails() -> StorageResult<()> {
        let storage = Arc::new(FlakyStorage::default());
        let store = SessionStore::new(storage.clone());
        store.persist(User::new("u1", "u@x.io"), Some("tok".into()))?;

        storage.fail_delete.store(true, Ordering::SeqCst);
        store.clear()?;

        assert_eq!(store.token(), None);
        assert_eq!(store.snapshot(), Session::default());
        let raw = storage.get(SESSION_KEY)?.unwrap_or_default();
        assert_eq!(serde_json::from_str::<Value>(&raw)?, json!({ "user": null, "token": null }));

        let fresh = SessionStore::new(storage);
        assert!(!fresh.hydrate().is_authenticated());
        Ok(())
    }

    #[test]
    fn clear_resets_mirror_even_when_storage_is_stuck() -> StorageResult<()> {
        let storage = Arc::new(FlakyStorage::default());
        let store = SessionStore::new(storage.clone());
        store.persist(User::new("u1", "u@x.io"), Some("tok".into()))?;

        storage.fail.store(true, Ordering::SeqCst);
        assert!(store.clear().is_err());
        assert_eq!(store.token(), None);
        assert!(store.user().is_none());
        Ok(())
    }

    #[test]
    fn hydrate_restores_previous_session() -> StorageResult<()> {
        let storage = Arc::new(MemoryStorage::new());
        SessionStore::new(storage.clone()).persist(User::new("u1", "u@x.io"), Some("t".into()))?;

        let fresh = SessionStore::new(storage);
        assert!(!fresh.snapshot().is_authenticated());
        let session = fresh.hydrate();
        assert!(session.is_authenticated());
        assert_eq!(fresh.token().as_deref(), Some("t"));
        Ok(())
    }

    #[test]
    fn hydrate_discards_corrupt_record() -> StorageResult<()> {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(SESSION_KEY, "{not json")?;

        let store = SessionStore::new(storage.clone());
        assert_eq!(store.hydrate(), Session::default());
        assert_eq!(storage.get(SESSION_KEY)?, None);
        Ok(())
    }

    #[test]
    fn update_user_merges_shallowly() -> StorageResult<()> {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone());
        store.persist(User::new("u1", "u@x.io"), Some("tok".into()))?;

        let partial = json!({ "name": "Ada", "theme": "dark" });
        let partial = partial.as_object().cloned().unwrap_or_default();
        let updated = store.update_user(&partial)?;

        let updated = updated.ok_or_else(|| StorageError::InvalidKey("missing".into()))?;
        assert_eq!(updated.name.as_deref(), Some("Ada"));
        assert_eq!(updated.email, "u@x.io");
        assert_eq!(updated.extra.get("theme"), Some(&json!("dark")));
        assert_eq!(store.token().as_deref(), Some("tok"));
        assert_eq!(store.snapshot(), durable(storage.as_ref()));
        Ok(())
    }

    #[test]
    fn update_user_without_session_is_noop() -> StorageResult<()> {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone());
        let partial = json!({ "name": "Ada" }).as_object().cloned().unwrap_or_default();
        assert_eq!(store.update_user(&partial)?, None);
        assert_eq!(storage.get(SESSION_KEY)?, None);
        Ok(())
    }

    #[test]
    fn update_user_rejects_invalid_merge() -> StorageResult<()> {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage);
        store.persist(User::new("u1", "u@x.io"), None)?;

        let partial = json!({ "email": 7 }).as_object().cloned().unwrap_or_default();
        assert!(store.update_user(&partial).is_err());
        assert_eq!(store.user().map(|u| u.email), Some("u@x.io".to_string()));
        Ok(())
    }

    #[test]
    fn update_user_accepts_numeric_id() -> StorageResult<()> {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone());
        store.persist(User::new("u1", "u@x.io"), None)?;

        let partial = json!({ "id": 5 }).as_object().cloned().unwrap_or_default();
        let updated = store.update_user(&partial)?;
        assert_eq!(updated.map(|u| u.id), Some("5".to_string()));
        assert_eq!(store.snapshot(), durable(storage.as_ref()));

        let partial = json!({ "id": { "n": 5 } }).as_object().cloned().unwrap_or_default();
        assert!(store.update_user(&partial).is_err());
        assert_eq!(store.user().map(|u| u.id), Some("5".to_string()));
        Ok(())
    }

    #[test]
    fn invalidate_clears_everything() -> StorageResult<()> {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone());
        store.persist(User::new("u1", "u@x.io"), Some("tok".into()))?;

        store.invalidate();
        assert_eq!(store.bearer_token(), None);
        assert_eq!(storage.get(SESSION_KEY)?, None);
        Ok(())
    }

    #[test]
    fn debug_redacts_token() -> StorageResult<()> {
        let store = SessionStore::new(Arc::new(MemoryStorage::new()));
        store.persist(User::new("u1", "u@x.io"), Some("super-secret".into()))?;
        let rendered = format!("{store:?}");
        assert!(!rendered.contains("super-secret"));
        Ok(())
    }
}
