//! Top-level authentication client wiring the session services together.

use crate::api::{AuthApi, HttpAuthApi};
use crate::clock::{Clock, SessionClock};
use crate::config::AuthConfig;
use crate::errors::Result;
use crate::models::{RegisterRequest, User};
use crate::refresh::RefreshCoordinator;
use crate::restore::RestorationService;
use crate::session::SessionHandle;
use crate::storage::{storage_bus, FileStore, KeyValueStore, MemoryStore, StorageBus};
use crate::store::TokenStore;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// The authentication client.
///
/// Owns one instance of every session service and the background loops
/// that keep them current. Construct one per process ("tab"); instances
/// sharing a storage bus observe each other's logouts.
pub struct AuthClient {
    config: AuthConfig,
    api: Arc<dyn AuthApi>,
    store: Arc<TokenStore>,
    session: Arc<SessionHandle>,
    refresher: Arc<RefreshCoordinator>,
    restoration: Arc<RestorationService>,
    session_clock: Arc<SessionClock>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AuthClient {
    /// Create a client talking to the configured backend over HTTP.
    pub fn new(config: AuthConfig) -> Result<Self> {
        config.validate()?;
        let api: Arc<dyn AuthApi> = Arc::new(HttpAuthApi::new(&config)?);
        Ok(Self::assemble(config, api, Clock::system(), storage_bus()))
    }

    /// Create a client over an injected backend, clock, and storage bus.
    ///
    /// The seam tests and embedders use to run the full lifecycle against
    /// mock collaborators.
    pub fn with_api(
        config: AuthConfig,
        api: Arc<dyn AuthApi>,
        clock: Clock,
        events: StorageBus,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, api, clock, events))
    }

    fn assemble(
        config: AuthConfig,
        api: Arc<dyn AuthApi>,
        clock: Clock,
        events: StorageBus,
    ) -> Self {
        let primary: Arc<dyn KeyValueStore> = match &config.storage_path {
            Some(path) => Arc::new(FileStore::open(path)),
            None => Arc::new(MemoryStore::new()),
        };
        let fallback = Arc::new(MemoryStore::new());

        let store = TokenStore::new(config.clone(), primary, fallback, clock, events);
        let session = Arc::new(SessionHandle::new(Arc::clone(&store)));
        let refresher = Arc::new(RefreshCoordinator::new(Arc::clone(&api), Arc::clone(&store)));
        let restoration = Arc::new(RestorationService::new(
            Arc::clone(&api),
            Arc::clone(&store),
            Arc::clone(&session),
            Arc::clone(&refresher),
            config.clone(),
        ));
        let session_clock = Arc::new(SessionClock::new(
            Arc::clone(&store),
            config.health_poll_interval,
        ));

        Self {
            config,
            api,
            store,
            session,
            refresher,
            restoration,
            session_clock,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Restore any persisted session and start the background loops
    /// (periodic re-validation, cross-tab listener, health monitor).
    pub async fn initialize(&self) -> Result<()> {
        self.restoration.restore().await?;

        let mut tasks = self.tasks.lock().unwrap();
        if tasks.is_empty() {
            tasks.push(self.restoration.spawn_revalidation());
            tasks.push(self.restoration.spawn_storage_listener());
            tasks.push(self.session_clock.spawn_monitor());
            info!("authentication client initialized");
        }
        Ok(())
    }

    /// Authenticate with credentials and open a session.
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        self.session.set_loading(true);
        self.session.clear_error();

        match self.api.login(email, password).await {
            Ok(response) => {
                let user = response.user.clone();
                if let Err(err) = self.session.login(
                    &response.access_token,
                    response.refresh_token.as_deref(),
                    response.user,
                ) {
                    self.session.set_loading(false);
                    self.session.set_error(err.to_string());
                    return Err(err);
                }
                Ok(user)
            }
            Err(error) => {
                self.session.set_loading(false);
                self.session.set_error(error.to_string());
                Err(error.into())
            }
        }
    }

    /// Create an account. No session is opened; the email address must be
    /// verified before the first login.
    pub async fn register(&self, request: &RegisterRequest) -> Result<User> {
        Ok(self.api.register(request).await?)
    }

    /// Log out: best-effort server notification, unconditional local clear.
    pub async fn logout(&self) {
        if let Some(access_token) = self.store.access_token() {
            if let Err(error) = self.api.logout(&access_token).await {
                debug!("server logout notification failed: {error}");
            }
        }
        self.session.logout();
    }

    /// Force an immediate token refresh, superseding any in-flight attempt.
    pub async fn refresh_now(&self) -> Result<String> {
        self.refresher.force_refresh().await
    }

    /// Request a password-reset email.
    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        Ok(self.api.forgot_password(email).await?)
    }

    /// Complete a password reset.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<()> {
        Ok(self.api.reset_password(token, new_password).await?)
    }

    /// Confirm an email address with a verification token.
    pub async fn verify_email(&self, token: &str) -> Result<()> {
        Ok(self.api.verify_email(token).await?)
    }

    /// Re-send the verification email.
    pub async fn resend_verification(&self, email: &str) -> Result<()> {
        Ok(self.api.resend_verification(email).await?)
    }

    /// Stop the background loops. Idempotent; also runs on drop.
    pub fn shutdown(&self) {
        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
    }

    /// The session state container.
    pub fn session(&self) -> &Arc<SessionHandle> {
        &self.session
    }

    /// The token store.
    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// The refresh coordinator.
    pub fn refresher(&self) -> &Arc<RefreshCoordinator> {
        &self.refresher
    }

    /// The restoration service.
    pub fn restoration(&self) -> &Arc<RestorationService> {
        &self.restoration
    }

    /// The token health clock.
    pub fn session_clock(&self) -> &Arc<SessionClock> {
        &self.session_clock
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

impl Drop for AuthClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClient")
            .field("store", &self.store)
            .finish()
    }
}
