//! Login state machine shared by the login flow, guards and the maintenance
//! poller. Transitions never fail: problems are logged and the machine settles
//! in a consistent state.

use super::types::{AuthStep, PendingLogin, Role, User};
use crate::{
    api::SessionGate,
    session::{Session, SessionStore},
};
use serde_json::{Map, Value};
use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Read-only view of the auth state handed to guards and subscribers.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthSnapshot {
    pub user: Option<User>,
    pub has_token: bool,
    pub role: Role,
    pub step: AuthStep,
    pub pending: Option<PendingLogin>,
    pub maintenance: bool,
    pub loading: bool,
}

impl Default for AuthSnapshot {
    fn default() -> Self {
        Self {
            user: None,
            has_token: false,
            role: Role::Guest,
            step: AuthStep::Idle,
            pending: None,
            maintenance: false,
            loading: true,
        }
    }
}

#[derive(Debug)]
struct Inner {
    step: AuthStep,
    pending: Option<PendingLogin>,
    maintenance: bool,
    loading: bool,
}

pub struct AuthMachine {
    session: Arc<SessionStore>,
    inner: Mutex<Inner>,
    updates: watch::Sender<AuthSnapshot>,
}

impl fmt::Debug for AuthMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthMachine")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl AuthMachine {
    /// Starts in `loading` until [`AuthMachine::hydrate`] runs.
    #[must_use]
    pub fn new(session: Arc<SessionStore>) -> Self {
        let (updates, _) = watch::channel(AuthSnapshot::default());
        Self {
            session,
            inner: Mutex::new(Inner {
                step: AuthStep::Idle,
                pending: None,
                maintenance: false,
                loading: true,
            }),
            updates,
        }
    }

    /// The underlying store. Writes made through it are not published to
    /// subscribers until the next machine call, e.g. [`AuthMachine::hydrate`].
    #[must_use]
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Loads the durable session and leaves the loading state.
    pub fn hydrate(&self) -> AuthSnapshot {
        let mut inner = self.lock();
        self.session.hydrate();
        inner.loading = false;
        self.publish(&inner)
    }

    #[must_use]
    pub fn state(&self) -> AuthSnapshot {
        let inner = self.lock();
        snapshot(&inner, &self.session.snapshot())
    }

    /// Receives a fresh snapshot after every transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.updates.subscribe()
    }

    /// Stages a pending login after a successful password check.
    ///
    /// MFA accounts go straight to the `mfa` step; everyone else must confirm
    /// an emailed code first. A flow already in progress is replaced.
    pub fn begin_login_flow(
        &self,
        user: User,
        token: Option<String>,
        mfa_required: bool,
        mfa_token: Option<String>,
    ) -> AuthSnapshot {
        let mut inner = self.lock();

        if let Some(previous) = inner.pending.as_ref() {
            warn!(
                previous = %previous.user.email,
                step = %inner.step,
                "restarting login flow that was still pending"
            );
        }

        inner.pending = Some(PendingLogin {
            user,
            token: token.filter(|t| !t.is_empty()),
            mfa_required,
            mfa_token: if mfa_required { mfa_token } else { None },
        });
        inner.step = if mfa_required {
            AuthStep::Mfa
        } else {
            AuthStep::EmailOtp
        };

        info!(step = %inner.step, "login flow started");
        self.publish(&inner)
    }

    /// Confirms the emailed code; moves on to MFA or completes the login.
    pub fn complete_email_otp(&self) -> AuthSnapshot {
        let mut inner = self.lock();

        let Some(pending) = inner.pending.clone() else {
            warn!("complete_email_otp called with no pending login");
            return self.publish(&inner);
        };

        if inner.step != AuthStep::EmailOtp {
            warn!(step = %inner.step, "complete_email_otp called outside the email-otp step");
            return self.publish(&inner);
        }

        if pending.mfa_required {
            inner.step = AuthStep::Mfa;
            debug!("email code accepted, MFA still required");
            return self.publish(&inner);
        }

        self.finalize(&mut inner, pending.user, pending.token);
        self.publish(&inner)
    }

    /// Completes the MFA step. Explicit `user` / `token` win over the staged
    /// ones, since the MFA endpoint issues the real access token.
    pub fn complete_mfa(&self, user: Option<User>, token: Option<String>) -> AuthSnapshot {
        let mut inner = self.lock();

        let Some(pending) = inner.pending.clone() else {
            warn!("complete_mfa called with no pending login");
            return self.publish(&inner);
        };

        if inner.step != AuthStep::Mfa {
            warn!(step = %inner.step, "complete_mfa called outside the mfa step");
            return self.publish(&inner);
        }

        let user = user.unwrap_or(pending.user);
        let token = token.filter(|t| !t.is_empty()).or(pending.token);
        self.finalize(&mut inner, user, token);
        self.publish(&inner)
    }

    /// Drops the session and any pending login. Safe to call repeatedly.
    pub fn logout(&self) -> AuthSnapshot {
        let mut inner = self.lock();
        if let Err(err) = self.session.clear() {
            error!("failed to clear session on logout: {err}");
        }
        inner.pending = None;
        inner.step = AuthStep::Idle;
        debug!("logged out");
        self.publish(&inner)
    }

    /// Shallow-merges profile changes into the stored user.
    pub fn update_user(&self, partial: &Map<String, Value>) -> AuthSnapshot {
        let inner = self.lock();
        if let Err(err) = self.session.update_user(partial) {
            error!("failed to update stored user: {err}");
        }
        self.publish(&inner)
    }

    pub fn set_maintenance_mode(&self, enabled: bool) -> AuthSnapshot {
        let mut inner = self.lock();
        if inner.maintenance != enabled {
            info!(enabled, "maintenance mode changed");
        }
        inner.maintenance = enabled;
        self.publish(&inner)
    }

    #[must_use]
    pub fn maintenance_mode(&self) -> bool {
        self.lock().maintenance
    }

    fn finalize(&self, inner: &mut Inner, user: User, token: Option<String>) {
        match self.session.persist(user, token) {
            Ok(session) => info!(
                user = session.user.as_ref().map(|u| u.email.as_str()),
                "login completed"
            ),
            Err(err) => error!("failed to persist session, login abandoned: {err}"),
        }
        inner.pending = None;
        inner.step = AuthStep::Idle;
    }

    fn publish(&self, inner: &Inner) -> AuthSnapshot {
        let state = snapshot(inner, &self.session.snapshot());
        self.updates.send_replace(state.clone());
        state
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionGate for AuthMachine {
    fn bearer_token(&self) -> Option<String> {
        self.session.token()
    }

    fn invalidate(&self) {
        self.logout();
    }
}

fn snapshot(inner: &Inner, session: &Session) -> AuthSnapshot {
    AuthSnapshot {
        role: Role::of(session.user.as_ref()),
        user: session.user.clone(),
        has_token: session.token.is_some(),
        step: inner.step,
        pending: inner.pending.clone(),
        maintenance: inner.maintenance,
        loading: inner.loading,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{KeyValueStorage, MemoryStorage, SESSION_KEY, StorageError, StorageResult};
    use serde_json::json;

    fn machine() -> (Arc<MemoryStorage>, AuthMachine) {
        let storage = Arc::new(MemoryStorage::new());
        let store = Arc::new(SessionStore::new(storage.clone()));
        let machine = AuthMachine::new(store);
        machine.hydrate();
        (storage, machine)
    }

    fn alice() -> User {
        User::new("u1", "alice@obai.io")
    }

    #[test]
    fn starts_loading_until_hydrated() {
        let store = Arc::new(SessionStore::new(Arc::new(MemoryStorage::new())));
        let machine = AuthMachine::new(store);
        assert!(machine.state().loading);
        assert!(!machine.hydrate().loading);
    }

    #[test]
    fn password_then_email_otp_logs_in() -> StorageResult<()> {
        let (storage, machine) = machine();

        let state = machine.begin_login_flow(alice(), Some("T1".into()), false, None);
        assert_eq!(state.step, AuthStep::EmailOtp);
        assert_eq!(storage.get(SESSION_KEY)?, None);

        let state = machine.complete_email_otp();
        assert_eq!(state.step, AuthStep::Idle);
        assert_eq!(state.pending, None);
        assert_eq!(state.role, Role::User);
        assert_eq!(machine.bearer_token().as_deref(), Some("T1"));
        assert!(storage.get(SESSION_KEY)?.is_some());
        Ok(())
    }

    #[test]
    fn email_otp_then_mfa_keeps_session_empty_until_done() -> StorageResult<()> {
        let (storage, machine) = machine();

        machine.begin_login_flow(alice(), None, true, Some("M".into()));
        assert_eq!(machine.state().step, AuthStep::Mfa);

        // Email OTP is not a listed transition from the mfa step.
        let state = machine.complete_email_otp();
        assert_eq!(state.step, AuthStep::Mfa);
        assert_eq!(storage.get(SESSION_KEY)?, None);

        let state = machine.complete_mfa(None, Some("T2".into()));
        assert_eq!(state.step, AuthStep::Idle);
        assert_eq!(state.user, Some(alice()));
        assert_eq!(machine.bearer_token().as_deref(), Some("T2"));
        Ok(())
    }

    #[test]
    fn email_otp_moves_to_mfa_when_required() {
        let (_, machine) = machine();
        // A pending login that needs both factors but was staged at email-otp.
        {
            let mut inner = machine.lock();
            inner.pending = Some(PendingLogin {
                user: alice(),
                token: None,
                mfa_required: true,
                mfa_token: Some("M".into()),
            });
            inner.step = AuthStep::EmailOtp;
        }
        let state = machine.complete_email_otp();
        assert_eq!(state.step, AuthStep::Mfa);
        assert!(state.user.is_none());
        assert!(state.pending.is_some());
    }

    #[test]
    fn complete_mfa_prefers_explicit_user() {
        let (_, machine) = machine();
        machine.begin_login_flow(alice(), Some("staged".into()), true, Some("M".into()));

        let fresh = User::new("u1", "alice@obai.io").admin();
        let state = machine.complete_mfa(Some(fresh), None);
        assert_eq!(state.role, Role::Admin);
        assert_eq!(machine.bearer_token().as_deref(), Some("staged"));
    }

    #[test]
    fn completions_without_pending_are_noops() {
        let (storage, machine) = machine();
        let before = machine.state();

        assert_eq!(machine.complete_email_otp(), before);
        assert_eq!(machine.complete_mfa(Some(alice()), Some("T".into())), before);
        assert_eq!(storage.get(SESSION_KEY).ok().flatten(), None);
    }

    #[test]
    fn begin_again_restarts_flow() {
        let (_, machine) = machine();
        machine.begin_login_flow(alice(), None, true, Some("M1".into()));

        let bob = User::new("u2", "bob@obai.io");
        let state = machine.begin_login_flow(bob.clone(), Some("T".into()), false, Some("ignored".into()));
        assert_eq!(state.step, AuthStep::EmailOtp);
        let pending = state.pending.unwrap_or_else(|| PendingLogin {
            user: alice(),
            token: None,
            mfa_required: true,
            mfa_token: None,
        });
        assert_eq!(pending.user, bob);
        assert_eq!(pending.mfa_token, None);
    }

    #[test]
    fn logout_is_idempotent() {
        let (storage, machine) = machine();
        machine.begin_login_flow(alice(), Some("T".into()), false, None);
        machine.complete_email_otp();

        let first = machine.logout();
        let second = machine.logout();
        assert_eq!(first, second);
        assert_eq!(first.step, AuthStep::Idle);
        assert_eq!(first.role, Role::Guest);
        assert_eq!(storage.get(SESSION_KEY).ok().flatten(), None);
    }

    #[test]
    fn logout_mid_flow_discards_pending() {
        let (_, machine) = machine();
        machine.begin_login_flow(alice(), None, true, Some("M".into()));
        let state = machine.logout();
        assert_eq!(state.pending, None);
        assert_eq!(state.step, AuthStep::Idle);
    }

    #[test]
    fn failed_persist_returns_to_idle_without_session() {
        struct ReadOnly;
        impl KeyValueStorage for ReadOnly {
            fn set(&self, _: &str, _: &str) -> StorageResult<()> {
                Err(StorageError::Io(std::io::Error::other("read-only")))
            }
            fn get(&self, _: &str) -> StorageResult<Option<String>> {
                Ok(None)
            }
            fn delete(&self, _: &str) -> StorageResult<bool> {
                Ok(false)
            }
        }

        let machine = AuthMachine::new(Arc::new(SessionStore::new(Arc::new(ReadOnly))));
        machine.hydrate();
        machine.begin_login_flow(alice(), Some("T".into()), false, None);
        let state = machine.complete_email_otp();
        assert_eq!(state.step, AuthStep::Idle);
        assert!(state.user.is_none());
        assert!(state.pending.is_none());
    }

    #[test]
    fn logout_signs_out_when_record_cannot_be_deleted() {
        struct Undeletable(MemoryStorage);
        impl KeyValueStorage for Undeletable {
            fn set(&self, key: &str, value: &str) -> StorageResult<()> {
                self.0.set(key, value)
            }
            fn get(&self, key: &str) -> StorageResult<Option<String>> {
                self.0.get(key)
            }
            fn delete(&self, _: &str) -> StorageResult<bool> {
                Err(StorageError::Io(std::io::Error::other("read-only")))
            }
        }

        let storage = Arc::new(Undeletable(MemoryStorage::new()));
        let machine = AuthMachine::new(Arc::new(SessionStore::new(storage.clone())));
        machine.hydrate();
        machine.begin_login_flow(alice(), Some("T1".into()), false, None);
        assert_eq!(machine.complete_email_otp().role, Role::User);

        let state = machine.logout();
        assert_eq!(state.role, Role::Guest);
        assert_eq!(state.step, AuthStep::Idle);
        assert!(state.user.is_none());
        assert_eq!(machine.bearer_token(), None);

        let reloaded = AuthMachine::new(Arc::new(SessionStore::new(storage)));
        assert_eq!(reloaded.hydrate().role, Role::Guest);
    }

    #[test]
    fn update_user_merges_and_publishes() {
        let (_, machine) = machine();
        machine.begin_login_flow(alice(), Some("T".into()), false, None);
        machine.complete_email_otp();

        let mut updates = machine.subscribe();
        let partial = json!({ "name": "Alice" }).as_object().cloned().unwrap_or_default();
        machine.update_user(&partial);

        assert!(updates.has_changed().unwrap_or(false));
        let name = updates.borrow_and_update().user.as_ref().and_then(|u| u.name.clone());
        assert_eq!(name.as_deref(), Some("Alice"));
    }

    #[test]
    fn maintenance_flag_is_published() {
        let (_, machine) = machine();
        let updates = machine.subscribe();
        machine.set_maintenance_mode(true);
        assert!(updates.borrow().maintenance);
        assert!(machine.maintenance_mode());
        machine.set_maintenance_mode(false);
        assert!(!machine.state().maintenance);
    }

    #[test]
    fn invalidate_through_gate_logs_out() {
        let (_, machine) = machine();
        machine.begin_login_flow(alice(), Some("T".into()), false, None);
        machine.complete_email_otp();
        machine.invalidate();
        assert_eq!(machine.state().role, Role::Guest);
        assert_eq!(machine.bearer_token(), None);
    }
}
