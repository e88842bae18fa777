//! Silent token refresh with single-flight coordination.

use crate::api::AuthApi;
use crate::errors::{ApiError, AuthError, Result, TokenError};
use crate::store::TokenStore;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

/// Result of a refresh attempt, shared verbatim with every joined caller.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// A new access token was stored alongside the existing refresh token.
    Refreshed { access_token: String },

    /// The attempt failed; see [`RefreshFailure`] for the token-state
    /// consequences.
    Failed(RefreshFailure),
}

/// Why a refresh attempt failed.
#[derive(Debug, Clone)]
pub enum RefreshFailure {
    /// No refresh token is available; nothing was attempted.
    MissingRefreshToken,

    /// The backend rejected the refresh token; all tokens were cleared.
    Rejected { error: ApiError },

    /// Transient failure (timeout, 5xx, network); tokens were left intact.
    Transient { error: ApiError },

    /// Persisting the new token failed in every storage backend.
    Storage { message: String },

    /// The attempt was discarded by a forced refresh.
    Superseded,
}

impl RefreshOutcome {
    /// Convert to a `Result`, yielding the new access token on success.
    pub fn into_result(self) -> Result<String> {
        match self {
            Self::Refreshed { access_token } => Ok(access_token),
            Self::Failed(RefreshFailure::MissingRefreshToken) => {
                Err(TokenError::MissingRefreshToken.into())
            }
            Self::Failed(RefreshFailure::Rejected { error })
            | Self::Failed(RefreshFailure::Transient { error }) => Err(error.into()),
            Self::Failed(RefreshFailure::Storage { message }) => {
                Err(AuthError::session(format!("refresh not persisted: {message}")))
            }
            Self::Failed(RefreshFailure::Superseded) => {
                Err(AuthError::session("refresh superseded by a forced refresh"))
            }
        }
    }

    /// Whether the attempt produced a new access token.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Refreshed { .. })
    }
}

struct Inflight {
    generation: u64,
    current: Option<broadcast::Sender<RefreshOutcome>>,
}

/// Coordinates token refreshes so at most one backend call is in flight.
///
/// Concurrent callers join the in-flight attempt and all receive the same
/// outcome; this is the session lifecycle's only synchronization primitive.
pub struct RefreshCoordinator {
    api: Arc<dyn AuthApi>,
    store: Arc<TokenStore>,
    inflight: Mutex<Inflight>,
    notifications: broadcast::Sender<RefreshOutcome>,
}

impl RefreshCoordinator {
    /// Create a coordinator over the given backend and token store.
    pub fn new(api: Arc<dyn AuthApi>, store: Arc<TokenStore>) -> Self {
        Self {
            api,
            store,
            inflight: Mutex::new(Inflight {
                generation: 0,
                current: None,
            }),
            notifications: broadcast::channel(16).0,
        }
    }

    /// Refresh the access token, joining any in-flight attempt.
    pub async fn refresh(&self) -> Result<String> {
        self.run(false).await.into_result()
    }

    /// Discard any in-flight attempt and start a fresh one.
    pub async fn force_refresh(&self) -> Result<String> {
        self.run(true).await.into_result()
    }

    /// Like [`refresh`](Self::refresh), returning the raw outcome.
    pub async fn refresh_outcome(&self) -> RefreshOutcome {
        self.run(false).await
    }

    /// Observe the outcome of every completed refresh attempt.
    pub fn subscribe(&self) -> broadcast::Receiver<RefreshOutcome> {
        self.notifications.subscribe()
    }

    /// Whether a refresh is currently in flight.
    pub async fn is_refreshing(&self) -> bool {
        self.inflight.lock().await.current.is_some()
    }

    async fn run(&self, force: bool) -> RefreshOutcome {
        let (generation, joined) = {
            let mut inflight = self.inflight.lock().await;
            if force {
                // Dropping the sender wakes joiners with `Superseded`; the
                // abandoned leader's completion is ignored by generation.
                if inflight.current.take().is_some() {
                    debug!("forced refresh superseding in-flight attempt");
                }
                inflight.generation += 1;
            }
            match inflight.current.as_ref().map(|sender| sender.subscribe()) {
                Some(receiver) => (inflight.generation, Some(receiver)),
                None => {
                    let (sender, _) = broadcast::channel(1);
                    inflight.current = Some(sender);
                    (inflight.generation, None)
                }
            }
        };

        if let Some(mut receiver) = joined {
            return match receiver.recv().await {
                Ok(outcome) => outcome,
                Err(_) => RefreshOutcome::Failed(RefreshFailure::Superseded),
            };
        }

        let outcome = self.perform().await;

        let superseded = {
            let mut inflight = self.inflight.lock().await;
            if inflight.generation == generation {
                if let Some(sender) = inflight.current.take() {
                    let _ = sender.send(outcome.clone());
                }
                false
            } else {
                true
            }
        };

        if !superseded {
            let _ = self.notifications.send(outcome.clone());
        }
        outcome
    }

    async fn perform(&self) -> RefreshOutcome {
        let Some(refresh_token) = self.store.refresh_token() else {
            debug!("refresh requested without a refresh token");
            return RefreshOutcome::Failed(RefreshFailure::MissingRefreshToken);
        };

        debug!("exchanging refresh token for a new access token");
        match self.api.refresh(&refresh_token).await {
            Ok(response) => {
                // The backend only rotates the access token; the refresh
                // token stays.
                match self.store.store(&response.access_token, Some(&refresh_token)) {
                    Ok(()) => RefreshOutcome::Refreshed {
                        access_token: response.access_token,
                    },
                    Err(err) => RefreshOutcome::Failed(RefreshFailure::Storage {
                        message: err.to_string(),
                    }),
                }
            }
            Err(error) if error.is_auth_rejection() => {
                warn!("refresh token rejected by backend, clearing session");
                self.store.clear();
                RefreshOutcome::Failed(RefreshFailure::Rejected { error })
            }
            Err(error) => {
                debug!("transient refresh failure, keeping tokens: {error}");
                RefreshOutcome::Failed(RefreshFailure::Transient { error })
            }
        }
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RefreshCoordinator")
    }
}
