//! Testing utilities for secret-safe-auth.
//!
//! Mock implementations and helpers for exercising the session lifecycle
//! without a backend: a scriptable [`MockAuthApi`], signed test tokens, and
//! an always-failing storage backend.

use crate::api::AuthApi;
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::errors::{ApiError, StorageError};
use crate::models::{LoginResponse, RefreshResponse, RegisterRequest, User, UserRole};
use crate::storage::{storage_bus, KeyValueStore, MemoryStore, StorageBus};
use crate::store::TokenStore;
use crate::tokens::TokenClaims;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Signing key for minted test tokens. The client never verifies
/// signatures, so any stable secret works.
pub const TEST_SIGNING_SECRET: &[u8] = b"secret-safe-test-signing-key";

/// Mint a structurally valid signed token with the given claims.
pub fn mint_token(
    sub: impl Into<String>,
    email: impl Into<String>,
    role: UserRole,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> String {
    let claims = TokenClaims {
        sub: sub.into(),
        email: Some(email.into()),
        role: Some(role),
        iat: issued_at.timestamp(),
        exp: expires_at.timestamp(),
        jti: Some(Uuid::new_v4().to_string()),
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TEST_SIGNING_SECRET),
    )
    .expect("test token encoding cannot fail")
}

/// Mint an access/refresh token pair issued "now" on the given clock.
pub fn mint_token_pair(clock: &Clock, access_lifetime: Duration) -> (String, String) {
    let now = clock.now();
    let access_lifetime =
        ChronoDuration::from_std(access_lifetime).unwrap_or_else(|_| ChronoDuration::minutes(30));
    let access = mint_token(
        "user-1",
        "user@example.com",
        UserRole::Writer,
        now,
        now + access_lifetime,
    );
    let refresh = mint_token(
        "user-1",
        "user@example.com",
        UserRole::Writer,
        now,
        now + ChronoDuration::days(7),
    );
    (access, refresh)
}

/// A fully populated user for tests.
pub fn test_user(role: UserRole) -> User {
    User {
        id: Uuid::new_v4(),
        email: "user@example.com".to_string(),
        display_name: Some("Test User".to_string()),
        role,
        is_verified: true,
        is_active: true,
        subscription_tier: "free".to_string(),
        avatar_url: None,
        bio: None,
        created_at: Utc::now(),
        last_check_in: None,
    }
}

/// A memory-backed token store on the given clock and bus.
pub fn memory_token_store(clock: Clock, events: StorageBus) -> Arc<TokenStore> {
    TokenStore::new(
        AuthConfig::default(),
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
        clock,
        events,
    )
}

/// A memory-backed token store with its own private event bus.
pub fn isolated_token_store(clock: Clock) -> Arc<TokenStore> {
    memory_token_store(clock, storage_bus())
}

/// Storage backend that fails every operation.
#[derive(Debug)]
pub struct FailingStore {
    name: &'static str,
}

impl FailingStore {
    /// Create a failing store with the given backend name.
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl KeyValueStore for FailingStore {
    fn name(&self) -> &'static str {
        self.name
    }

    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::unavailable(self.name, "simulated failure"))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::write_failed(self.name, "simulated failure"))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::unavailable(self.name, "simulated failure"))
    }
}

type Scripted<T> = Mutex<ScriptedInner<T>>;

struct ScriptedInner<T> {
    queue: VecDeque<Result<T, ApiError>>,
    default: Result<T, ApiError>,
}

impl<T: Clone> ScriptedInner<T> {
    fn next(&mut self) -> Result<T, ApiError> {
        self.queue.pop_front().unwrap_or_else(|| self.default.clone())
    }
}

fn scripted<T>(default: Result<T, ApiError>) -> Scripted<T> {
    Mutex::new(ScriptedInner {
        queue: VecDeque::new(),
        default,
    })
}

/// Scriptable backend for exercising the session lifecycle.
///
/// Each endpoint returns queued one-shot responses first, then its default.
/// Call counters expose how many backend requests each flow issued.
pub struct MockAuthApi {
    login_responses: Scripted<LoginResponse>,
    register_responses: Scripted<User>,
    me_responses: Scripted<User>,
    refresh_responses: Scripted<RefreshResponse>,
    refresh_delay: Mutex<Option<Duration>>,
    login_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    me_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
}

impl Default for MockAuthApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAuthApi {
    /// Create a mock where every credentialed endpoint rejects by default.
    pub fn new() -> Self {
        Self {
            login_responses: scripted(Err(ApiError::unauthorized("no login scripted"))),
            register_responses: scripted(Err(ApiError::status(400, "no register scripted"))),
            me_responses: scripted(Err(ApiError::unauthorized("no user scripted"))),
            refresh_responses: scripted(Err(ApiError::unauthorized("no refresh scripted"))),
            refresh_delay: Mutex::new(None),
            login_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            me_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    /// Make `/auth/me` return this user by default.
    pub fn with_current_user(self, user: User) -> Self {
        *self.me_responses.lock().unwrap() = ScriptedInner {
            queue: VecDeque::new(),
            default: Ok(user),
        };
        self
    }

    /// Queue a one-shot `/auth/me` response.
    pub fn queue_me(&self, response: Result<User, ApiError>) {
        self.me_responses.lock().unwrap().queue.push_back(response);
    }

    /// Queue a one-shot `/auth/refresh` response.
    pub fn queue_refresh(&self, response: Result<RefreshResponse, ApiError>) {
        self.refresh_responses
            .lock()
            .unwrap()
            .queue
            .push_back(response);
    }

    /// Make `/auth/refresh` return this access token by default.
    pub fn with_refresh_token_response(self, access_token: impl Into<String>) -> Self {
        *self.refresh_responses.lock().unwrap() = ScriptedInner {
            queue: VecDeque::new(),
            default: Ok(RefreshResponse {
                access_token: access_token.into(),
                token_type: Some("bearer".to_string()),
                expires_in: Some(1800),
            }),
        };
        self
    }

    /// Make `/auth/refresh` fail with this error by default.
    pub fn with_refresh_error(self, error: ApiError) -> Self {
        *self.refresh_responses.lock().unwrap() = ScriptedInner {
            queue: VecDeque::new(),
            default: Err(error),
        };
        self
    }

    /// Delay every `/auth/refresh` response, to hold attempts in flight.
    pub fn with_refresh_delay(self, delay: Duration) -> Self {
        *self.refresh_delay.lock().unwrap() = Some(delay);
        self
    }

    /// Make `/auth/login` succeed with this response by default.
    pub fn with_login_response(self, response: LoginResponse) -> Self {
        *self.login_responses.lock().unwrap() = ScriptedInner {
            queue: VecDeque::new(),
            default: Ok(response),
        };
        self
    }

    /// Make `/auth/register` return this created profile by default.
    pub fn with_register_response(self, user: User) -> Self {
        *self.register_responses.lock().unwrap() = ScriptedInner {
            queue: VecDeque::new(),
            default: Ok(user),
        };
        self
    }

    /// How many refresh requests reached the backend.
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// How many current-user requests reached the backend.
    pub fn me_calls(&self) -> usize {
        self.me_calls.load(Ordering::SeqCst)
    }

    /// How many login requests reached the backend.
    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    /// How many logout requests reached the backend.
    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    /// Total requests across all counted endpoints.
    pub fn total_calls(&self) -> usize {
        self.login_calls() + self.logout_calls() + self.me_calls() + self.refresh_calls()
    }
}

#[async_trait]
impl AuthApi for MockAuthApi {
    async fn login(&self, _email: &str, _password: &str) -> Result<LoginResponse, ApiError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.login_responses.lock().unwrap().next()
    }

    async fn register(&self, _request: &RegisterRequest) -> Result<User, ApiError> {
        self.register_responses.lock().unwrap().next()
    }

    async fn logout(&self, _access_token: &str) -> Result<(), ApiError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn current_user(&self, _access_token: &str) -> Result<User, ApiError> {
        self.me_calls.fetch_add(1, Ordering::SeqCst);
        self.me_responses.lock().unwrap().next()
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<RefreshResponse, ApiError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.refresh_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.refresh_responses.lock().unwrap().next()
    }

    async fn forgot_password(&self, _email: &str) -> Result<(), ApiError> {
        Ok(())
    }

    async fn reset_password(&self, _token: &str, _new_password: &str) -> Result<(), ApiError> {
        Ok(())
    }

    async fn verify_email(&self, _token: &str) -> Result<(), ApiError> {
        Ok(())
    }

    async fn resend_verification(&self, _email: &str) -> Result<(), ApiError> {
        Ok(())
    }
}

impl std::fmt::Debug for MockAuthApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockAuthApi")
            .field("refresh_calls", &self.refresh_calls())
            .field("me_calls", &self.me_calls())
            .finish()
    }
}
