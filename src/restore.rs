//! Session restoration across process starts.
//!
//! On boot the service decides, once, what the persisted tokens are worth:
//! a valid session, one that needs a silent refresh first, or nothing. UI
//! layers must hold protected content until the phase reaches
//! [`RestorePhase::Initialized`].

use crate::api::AuthApi;
use crate::config::AuthConfig;
use crate::errors::Result;
use crate::models::User;
use crate::refresh::RefreshCoordinator;
use crate::session::SessionHandle;
use crate::store::TokenStore;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Restoration lifecycle phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePhase {
    /// Restoration has not started
    Uninitialized,
    /// Restoration is deciding what the persisted tokens are worth
    Restoring,
    /// A restore-or-logged-out decision was reached
    Initialized,
    /// Restoration hit an unexpected internal error
    Failed,
}

/// Restores and re-validates the session.
pub struct RestorationService {
    api: Arc<dyn AuthApi>,
    store: Arc<TokenStore>,
    session: Arc<SessionHandle>,
    refresher: Arc<RefreshCoordinator>,
    config: AuthConfig,
    phase: watch::Sender<RestorePhase>,
}

impl RestorationService {
    /// Create a restoration service over the session's collaborators.
    pub fn new(
        api: Arc<dyn AuthApi>,
        store: Arc<TokenStore>,
        session: Arc<SessionHandle>,
        refresher: Arc<RefreshCoordinator>,
        config: AuthConfig,
    ) -> Self {
        Self {
            api,
            store,
            session,
            refresher,
            config,
            phase: watch::channel(RestorePhase::Uninitialized).0,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> RestorePhase {
        *self.phase.borrow()
    }

    /// Observe phase transitions.
    pub fn subscribe_phase(&self) -> watch::Receiver<RestorePhase> {
        self.phase.subscribe()
    }

    /// Decide what the persisted session is worth.
    ///
    /// Always reaches `Initialized` for the expected outcomes — including
    /// an expired session, which is normal, not an error. An expiring
    /// session is refreshed first and the current-user fetch only runs
    /// after the refresh settles.
    pub async fn restore(&self) -> Result<()> {
        self.set_phase(RestorePhase::Restoring);
        self.session.set_loading(true);

        let outcome = self.try_restore().await;

        self.session.set_loading(false);
        match outcome {
            Ok(()) => {
                self.set_phase(RestorePhase::Initialized);
                Ok(())
            }
            Err(err) => {
                warn!("restoration failed unexpectedly: {err}");
                self.set_phase(RestorePhase::Failed);
                Err(err)
            }
        }
    }

    async fn try_restore(&self) -> Result<()> {
        if !self.store.has_tokens() {
            debug!("no persisted session, starting logged out");
            self.session.logout();
            return Ok(());
        }

        if self.store.should_refresh() {
            debug!("persisted session near expiry, refreshing before validation");
            // A rejection clears the tokens, which the check below observes;
            // a transient failure falls through to the current-user fetch.
            let _ = self.refresher.refresh_outcome().await;
        }

        let Some(access_token) = self.store.access_token() else {
            debug!("no usable access token after refresh, starting logged out");
            self.session.logout();
            return Ok(());
        };

        match self.api.current_user(&access_token).await {
            Ok(user) => {
                info!(user = %user.email, "session restored");
                self.session.restore_authenticated(user, None);
            }
            Err(error) if error.is_auth_rejection() => {
                info!("persisted session rejected by backend, clearing");
                self.store.clear();
                self.session.logout();
            }
            Err(error) => {
                // Product policy: a backend outage must not bounce a
                // returning user to the login page.
                warn!("keeping session through transient failure: {error}");
                self.session
                    .restore_authenticated(User::placeholder(), Some(error.to_string()));
            }
        }
        Ok(())
    }

    /// Re-validate the live session once: refresh the user record, or log
    /// out if the backend rejects the credential.
    pub async fn revalidate(&self) {
        let Some(access_token) = self.store.access_token() else {
            if self.session.snapshot().authenticated {
                debug!("tokens gone at revalidation, logging out");
                self.session.logout();
            }
            return;
        };

        match self.api.current_user(&access_token).await {
            Ok(user) => self.session.replace_user(user),
            Err(error) if error.is_auth_rejection() => {
                warn!("session rejected during revalidation, clearing");
                self.store.clear();
                self.session.logout();
            }
            Err(error) => debug!("transient revalidation failure ignored: {error}"),
        }
    }

    /// Spawn the periodic re-validation loop.
    pub fn spawn_revalidation(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(service.config.revalidation_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // immediate first tick
            loop {
                ticker.tick().await;
                if service.session.snapshot().authenticated {
                    service.revalidate().await;
                }
            }
        })
    }

    /// Spawn the cross-tab listener: a foreign clear of the access-token
    /// key logs this session out without any network call.
    pub fn spawn_storage_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let mut events = self.store.subscribe();
        let access_key = self.store.access_token_key();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let foreign = event.origin != service.store.instance_id();
                        let cleared =
                            event.new_value.as_deref().map_or(true, |value| value.is_empty());
                        if foreign && event.key == access_key && cleared {
                            info!("access token cleared by another tab, logging out");
                            service.session.force_logout();
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "storage event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn set_phase(&self, phase: RestorePhase) {
        debug!(?phase, "restoration phase");
        let _ = self.phase.send(phase);
    }
}

impl std::fmt::Debug for RestorationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestorationService")
            .field("phase", &self.phase())
            .finish()
    }
}
