//! Persistent token store with fallback storage and cookie mirroring.

use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::errors::{Result, StorageError};
use crate::storage::{CookieMirror, KeyValueStore, StorageBus, StorageEvent};
use crate::tokens::{self, TokenClaims};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Durable home of the session's token material.
///
/// All token persistence goes through this store so the primary backend,
/// the fallback backend, and the cookie mirror can never drift apart. The
/// decoded payload is a UI convenience only; the backend re-validates every
/// token it receives.
pub struct TokenStore {
    config: AuthConfig,
    primary: Arc<dyn KeyValueStore>,
    fallback: Arc<dyn KeyValueStore>,
    mirror: Arc<CookieMirror>,
    clock: Clock,
    events: StorageBus,
    instance_id: u64,
    cleanup: Mutex<Option<JoinHandle<()>>>,
    weak_self: Weak<TokenStore>,
}

impl TokenStore {
    /// Create a token store over the given backends.
    pub fn new(
        config: AuthConfig,
        primary: Arc<dyn KeyValueStore>,
        fallback: Arc<dyn KeyValueStore>,
        clock: Clock,
        events: StorageBus,
    ) -> Arc<Self> {
        let mirror = Arc::new(CookieMirror::new(config.cookie.clone()));
        Arc::new_cyclic(|weak_self| Self {
            config,
            primary,
            fallback,
            mirror,
            clock,
            events,
            instance_id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            cleanup: Mutex::new(None),
            weak_self: weak_self.clone(),
        })
    }

    /// Identifier distinguishing this store instance in storage events.
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    /// The cookie mirror, for embedding layers that flush `Set-Cookie` headers.
    pub fn mirror(&self) -> &Arc<CookieMirror> {
        &self.mirror
    }

    /// Observe storage changes (this instance's and foreign ones sharing the bus).
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }

    /// Fully qualified key under which the access token is stored.
    pub fn access_token_key(&self) -> String {
        self.config.access_token_key()
    }

    /// Persist a token pair.
    ///
    /// Fails fast if the access token's payload can't be decoded, clearing
    /// any partial state so a malformed token is never half-trusted. An
    /// undecodable refresh token is dropped with a warning and the access
    /// token is stored alone.
    pub fn store(&self, access_token: &str, refresh_token: Option<&str>) -> Result<()> {
        let claims = match tokens::decode_claims(access_token) {
            Ok(claims) => claims,
            Err(err) => {
                self.clear();
                return Err(err.into());
            }
        };

        let refresh_token = refresh_token.filter(|token| match tokens::decode_claims(token) {
            Ok(_) => true,
            Err(err) => {
                warn!("refresh token is undecodable, storing access token alone: {err}");
                false
            }
        });

        self.write_key(&self.config.access_token_key(), access_token)?;
        match refresh_token {
            Some(token) => self.write_key(&self.config.refresh_token_key(), token)?,
            None => self.remove_key(&self.config.refresh_token_key()),
        }
        self.write_key(&self.config.token_expiry_key(), &claims.exp.to_string())?;
        self.write_key(&self.config.token_issued_at_key(), &claims.iat.to_string())?;

        if let Some(expires_at) = claims.expires_at() {
            self.schedule_cleanup(expires_at);
        }

        debug!(subject = %claims.sub, expires = claims.exp, "stored session tokens");
        Ok(())
    }

    /// The stored access token, or `None` if absent or expired.
    ///
    /// An expired token is never returned: expiry atomically clears all
    /// token state.
    pub fn access_token(&self) -> Option<String> {
        let token = self.read_key(&self.config.access_token_key())?;
        match self.stored_expiry() {
            Some(exp) if exp > self.clock.now().timestamp() => Some(token),
            _ => {
                debug!("access token expired, clearing session state");
                self.clear();
                None
            }
        }
    }

    /// The stored refresh token, or `None` if absent or expired.
    pub fn refresh_token(&self) -> Option<String> {
        let token = self.read_key(&self.config.refresh_token_key())?;
        match tokens::decode_claims(&token) {
            Ok(claims) if !claims.is_expired_at(self.clock.now()) => Some(token),
            Ok(_) => {
                debug!("refresh token expired, clearing session state");
                self.clear();
                None
            }
            Err(err) => {
                warn!("stored refresh token is undecodable, treating as absent: {err}");
                None
            }
        }
    }

    /// Whether any token material is present, without expiry side effects.
    pub fn has_tokens(&self) -> bool {
        self.read_key(&self.config.access_token_key()).is_some()
            || self.read_key(&self.config.refresh_token_key()).is_some()
    }

    /// Whether a silent refresh should run now: the access token is within
    /// the refresh threshold of expiry, or absent while a refresh token
    /// remains.
    pub fn should_refresh(&self) -> bool {
        let access = self.read_key(&self.config.access_token_key());
        let refresh = self.read_key(&self.config.refresh_token_key());
        match (access, refresh) {
            (None, Some(_)) => true,
            (None, None) => false,
            (Some(_), _) => match self.remaining_seconds() {
                Some(remaining) => remaining <= self.config.refresh_threshold.as_secs() as i64,
                None => true,
            },
        }
    }

    /// Whether both tokens are present and unexpired.
    pub fn is_authenticated(&self) -> bool {
        let now = self.clock.now().timestamp();
        let access_ok = self.read_key(&self.config.access_token_key()).is_some()
            && matches!(self.stored_expiry(), Some(exp) if exp > now);
        if !access_ok {
            return false;
        }
        match self.read_key(&self.config.refresh_token_key()) {
            Some(token) => match tokens::decode_claims(&token) {
                Ok(claims) => !claims.is_expired_at(self.clock.now()),
                Err(_) => false,
            },
            None => false,
        }
    }

    /// Seconds until the stored access token expires; `None` if absent.
    pub fn remaining_seconds(&self) -> Option<i64> {
        self.read_key(&self.config.access_token_key())?;
        let exp = self.stored_expiry()?;
        Some(exp - self.clock.now().timestamp())
    }

    /// Decoded claims of the stored access token, if present and decodable.
    pub fn access_claims(&self) -> Option<TokenClaims> {
        let token = self.read_key(&self.config.access_token_key())?;
        tokens::decode_claims(&token).ok()
    }

    /// Remove all token state from every backend and the cookie mirror.
    ///
    /// Idempotent: clearing an already-empty store does nothing and raises
    /// no error. Any scheduled cleanup is cancelled.
    pub fn clear(&self) {
        for key in self.all_keys() {
            self.remove_key(&key);
        }
        if let Some(task) = self.cleanup.lock().unwrap().take() {
            task.abort();
        }
    }

    /// Arm the safety-net cleanup to fire at `expires_at + cleanup_grace`.
    ///
    /// At most one cleanup is outstanding per store; arming replaces any
    /// previous timer. The timer handle lives only in memory, never in the
    /// storage it is racing to clear. A no-op outside a tokio runtime.
    pub fn schedule_cleanup(&self, expires_at: DateTime<Utc>) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("no async runtime, skipping cleanup scheduling");
            return;
        };

        let grace = ChronoDuration::from_std(self.config.cleanup_grace)
            .unwrap_or_else(|_| ChronoDuration::hours(24));
        let fire_at = expires_at + grace;
        let delay = (fire_at - self.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO);

        let weak = self.weak_self.clone();
        let task = handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(store) = weak.upgrade() {
                info!("cleanup timer fired, clearing leftover token state");
                store.clear();
            }
        });

        if let Some(previous) = self.cleanup.lock().unwrap().replace(task) {
            previous.abort();
        }
    }

    /// Whether a cleanup timer is currently armed.
    pub fn cleanup_armed(&self) -> bool {
        self.cleanup
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    fn all_keys(&self) -> [String; 4] {
        [
            self.config.access_token_key(),
            self.config.refresh_token_key(),
            self.config.token_expiry_key(),
            self.config.token_issued_at_key(),
        ]
    }

    fn stored_expiry(&self) -> Option<i64> {
        self.read_key(&self.config.token_expiry_key())?
            .parse()
            .ok()
    }

    /// Read through primary then fallback; read failures are swallowed and
    /// treated as absent (fail closed to logged-out).
    fn read_key(&self, key: &str) -> Option<String> {
        match self.primary.get(key) {
            Ok(Some(value)) => return Some(value),
            Ok(None) => {}
            Err(err) => debug!(backend = self.primary.name(), "read failed: {err}"),
        }
        match self.fallback.get(key) {
            Ok(value) => value,
            Err(err) => {
                debug!(backend = self.fallback.name(), "read failed: {err}");
                None
            }
        }
    }

    /// Write to primary, falling back to the secondary backend; errors only
    /// if both fail. Every successful write is mirrored into a cookie.
    fn write_key(&self, key: &str, value: &str) -> Result<()> {
        let old_value = self.read_key(key);

        if let Err(primary_err) = self.primary.set(key, value) {
            warn!(
                backend = self.primary.name(),
                "primary storage write failed, falling back: {primary_err}"
            );
            if let Err(fallback_err) = self.fallback.set(key, value) {
                return Err(StorageError::all_backends_failed(format!(
                    "{}: {primary_err}; {}: {fallback_err}",
                    self.primary.name(),
                    self.fallback.name(),
                ))
                .into());
            }
        }

        self.mirror.set(key, value);
        self.emit(key, old_value, Some(value.to_string()));
        Ok(())
    }

    /// Remove from both backends and expire the mirrored cookie; emits an
    /// event only if the key was present.
    fn remove_key(&self, key: &str) {
        let old_value = self.read_key(key);

        if let Err(err) = self.primary.remove(key) {
            debug!(backend = self.primary.name(), "remove failed: {err}");
        }
        if let Err(err) = self.fallback.remove(key) {
            debug!(backend = self.fallback.name(), "remove failed: {err}");
        }

        if old_value.is_some() {
            self.mirror.clear(key);
            self.emit(key, old_value, None);
        }
    }

    fn emit(&self, key: &str, old_value: Option<String>, new_value: Option<String>) {
        let _ = self.events.send(StorageEvent {
            key: key.to_string(),
            old_value,
            new_value,
            origin: self.instance_id,
        });
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("instance_id", &self.instance_id)
            .field("primary", &self.primary.name())
            .field("fallback", &self.fallback.name())
            .finish()
    }
}
