//! In-memory session state container.

use crate::errors::Result;
use crate::models::{User, UserUpdate};
use crate::store::TokenStore;
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tracing::{debug, info};

/// The canonical in-memory session, rebuilt from the token store on boot.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    /// Whether both tokens are present and unexpired
    pub authenticated: bool,

    /// The signed-in user, if fetched
    pub user: Option<User>,

    /// Whether a session operation is in progress
    pub loading: bool,

    /// Most recent session-level error, if any
    pub error: Option<String>,
}

impl SessionState {
    /// The logged-out default.
    pub fn logged_out() -> Self {
        Self {
            authenticated: false,
            user: None,
            loading: false,
            error: None,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::logged_out()
    }
}

/// Owns the session state and exposes its mutation actions.
///
/// Every action is a synchronous state transition applied in call order;
/// observers receive a snapshot after each change.
pub struct SessionHandle {
    store: Arc<TokenStore>,
    state: RwLock<SessionState>,
    changes: watch::Sender<SessionState>,
}

impl SessionHandle {
    /// Create a handle over the given token store, starting logged out.
    pub fn new(store: Arc<TokenStore>) -> Self {
        let initial = SessionState::logged_out();
        let (changes, _) = watch::channel(initial.clone());
        Self {
            store,
            state: RwLock::new(initial),
            changes,
        }
    }

    /// The token store backing this session.
    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// Current state snapshot.
    pub fn snapshot(&self) -> SessionState {
        self.state.read().unwrap().clone()
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.changes.subscribe()
    }

    /// Persist tokens and enter the authenticated state.
    ///
    /// Clears any error and loading flag; a failed token store leaves the
    /// session untouched.
    pub fn login(&self, access_token: &str, refresh_token: Option<&str>, user: User) -> Result<()> {
        self.store.store(access_token, refresh_token)?;
        info!(user = %user.email, "session authenticated");
        self.mutate(|state| {
            state.authenticated = true;
            state.user = Some(user);
            state.loading = false;
            state.error = None;
        });
        Ok(())
    }

    /// Clear all token state and reset to the logged-out default.
    pub fn logout(&self) {
        self.store.clear();
        info!("session logged out");
        self.mutate(|state| *state = SessionState::logged_out());
    }

    /// Like [`login`](Self::login) but preserves the error and loading
    /// flags; used after a mid-session silent refresh.
    pub fn refresh_auth(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        user: User,
    ) -> Result<()> {
        self.store.store(access_token, refresh_token)?;
        debug!("session tokens refreshed");
        self.mutate(|state| {
            state.authenticated = true;
            state.user = Some(user);
        });
        Ok(())
    }

    /// Mark the session authenticated with the given user without touching
    /// token storage; used by restoration after tokens were validated.
    pub fn restore_authenticated(&self, user: User, error: Option<String>) {
        self.mutate(|state| {
            state.authenticated = true;
            state.user = Some(user);
            state.error = error;
        });
    }

    /// Replace the user record, e.g. after a background re-validation.
    pub fn replace_user(&self, user: User) {
        self.mutate(|state| {
            state.user = Some(user);
        });
    }

    /// Shallow-merge a partial update into the current user. No-op when no
    /// user is set.
    pub fn update_user(&self, update: UserUpdate) {
        self.mutate(|state| {
            if let Some(user) = state.user.as_mut() {
                user.apply_update(update);
            }
        });
    }

    /// Record a session-level error.
    pub fn set_error(&self, error: impl Into<String>) {
        let error = error.into();
        self.mutate(|state| state.error = Some(error));
    }

    /// Clear the session-level error.
    pub fn clear_error(&self) {
        self.mutate(|state| state.error = None);
    }

    /// Set the loading flag.
    pub fn set_loading(&self, loading: bool) {
        self.mutate(|state| state.loading = loading);
    }

    /// Drop the authenticated state without a server round-trip; used when
    /// another tab cleared the tokens.
    pub fn force_logout(&self) {
        self.store.clear();
        info!("session invalidated externally, logging out");
        self.mutate(|state| *state = SessionState::logged_out());
    }

    fn mutate(&self, apply: impl FnOnce(&mut SessionState)) {
        let snapshot = {
            let mut state = self.state.write().unwrap();
            apply(&mut state);
            state.clone()
        };
        let _ = self.changes.send(snapshot);
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("state", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::config::AuthConfig;
    use crate::models::UserRole;
    use crate::storage::{storage_bus, MemoryStore};
    use crate::testing::{mint_token, test_user};
    use chrono::{Duration as ChronoDuration, Utc};

    fn handle() -> (SessionHandle, Clock) {
        let clock = Clock::fixed(Utc::now());
        let store = TokenStore::new(
            AuthConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
            clock.clone(),
            storage_bus(),
        );
        (SessionHandle::new(store), clock)
    }

    fn tokens(clock: &Clock) -> (String, String) {
        let now = clock.now();
        (
            mint_token(
                "user-1",
                "user@example.com",
                UserRole::Writer,
                now,
                now + ChronoDuration::minutes(30),
            ),
            mint_token(
                "user-1",
                "user@example.com",
                UserRole::Writer,
                now,
                now + ChronoDuration::days(7),
            ),
        )
    }

    #[test]
    fn login_sets_state_and_persists_tokens() {
        let (session, clock) = handle();
        let (access, refresh) = tokens(&clock);

        session.set_error("stale error");
        session.set_loading(true);
        session
            .login(&access, Some(&refresh), test_user(UserRole::Writer))
            .unwrap();

        let state = session.snapshot();
        assert!(state.authenticated);
        assert!(state.user.is_some());
        assert!(!state.loading);
        assert_eq!(state.error, None);
        assert!(session.store().is_authenticated());
    }

    #[test]
    fn failed_login_persistence_leaves_state_untouched() {
        let (session, _clock) = handle();

        let result = session.login("not-a-jwt", None, test_user(UserRole::Writer));
        assert!(result.is_err());
        assert!(!session.snapshot().authenticated);
    }

    #[test]
    fn refresh_auth_preserves_error_and_loading() {
        let (session, clock) = handle();
        let (access, refresh) = tokens(&clock);

        session.set_error("banner");
        session.set_loading(true);
        session
            .refresh_auth(&access, Some(&refresh), test_user(UserRole::Writer))
            .unwrap();

        let state = session.snapshot();
        assert!(state.authenticated);
        assert_eq!(state.error.as_deref(), Some("banner"));
        assert!(state.loading);
    }

    #[test]
    fn logout_resets_to_default() {
        let (session, clock) = handle();
        let (access, refresh) = tokens(&clock);
        session
            .login(&access, Some(&refresh), test_user(UserRole::Writer))
            .unwrap();

        session.logout();

        assert_eq!(session.snapshot(), SessionState::logged_out());
        assert!(!session.store().has_tokens());
    }

    #[test]
    fn update_user_is_noop_without_user() {
        let (session, _clock) = handle();
        session.update_user(UserUpdate {
            display_name: Some("Ghost".to_string()),
            ..UserUpdate::default()
        });
        assert_eq!(session.snapshot().user, None);
    }

    #[test]
    fn update_user_merges_shallowly() {
        let (session, clock) = handle();
        let (access, refresh) = tokens(&clock);
        session
            .login(&access, Some(&refresh), test_user(UserRole::Writer))
            .unwrap();

        session.update_user(UserUpdate {
            display_name: Some("New Name".to_string()),
            ..UserUpdate::default()
        });

        let user = session.snapshot().user.unwrap();
        assert_eq!(user.display_name.as_deref(), Some("New Name"));
        assert_eq!(user.role, UserRole::Writer);
    }

    #[test]
    fn observers_see_each_transition() {
        let (session, _clock) = handle();
        let mut rx = session.subscribe();

        session.set_loading(true);
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().loading);

        session.set_error("oops");
        assert_eq!(rx.borrow_and_update().error.as_deref(), Some("oops"));

        session.clear_error();
        assert_eq!(rx.borrow_and_update().error, None);
    }
}
