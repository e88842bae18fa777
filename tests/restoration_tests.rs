// Session restoration: boot-time reconciliation and cross-tab propagation.

use secret_safe_auth::api::AuthApi;
use secret_safe_auth::clock::Clock;
use secret_safe_auth::config::AuthConfig;
use secret_safe_auth::errors::ApiError;
use secret_safe_auth::models::UserRole;
use secret_safe_auth::refresh::RefreshCoordinator;
use secret_safe_auth::restore::{RestorationService, RestorePhase};
use secret_safe_auth::session::SessionHandle;
use secret_safe_auth::storage::{storage_bus, MemoryStore};
use secret_safe_auth::store::TokenStore;
use secret_safe_auth::testing::{mint_token, mint_token_pair, test_user, MockAuthApi};
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

struct Tab {
    api: Arc<MockAuthApi>,
    store: Arc<TokenStore>,
    session: Arc<SessionHandle>,
    restoration: Arc<RestorationService>,
}

fn tab(api: MockAuthApi, clock: &Clock) -> Tab {
    let store = TokenStore::new(
        AuthConfig::default(),
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
        clock.clone(),
        storage_bus(),
    );
    tab_with_store(api, store)
}

fn tab_with_store(api: MockAuthApi, store: Arc<TokenStore>) -> Tab {
    let api = Arc::new(api);
    let session = Arc::new(SessionHandle::new(Arc::clone(&store)));
    let refresher = Arc::new(RefreshCoordinator::new(
        Arc::clone(&api) as Arc<dyn AuthApi>,
        Arc::clone(&store),
    ));
    let restoration = Arc::new(RestorationService::new(
        Arc::clone(&api) as Arc<dyn AuthApi>,
        Arc::clone(&store),
        Arc::clone(&session),
        refresher,
        AuthConfig::default(),
    ));
    Tab {
        api,
        store,
        session,
        restoration,
    }
}

#[tokio::test]
async fn empty_storage_initializes_logged_out_with_zero_requests() {
    let clock = Clock::fixed(Utc::now());
    let tab = tab(MockAuthApi::new(), &clock);

    tab.restoration.restore().await.unwrap();

    assert_eq!(tab.restoration.phase(), RestorePhase::Initialized);
    assert!(!tab.session.snapshot().authenticated);
    assert_eq!(tab.api.total_calls(), 0);
}

#[tokio::test]
async fn valid_tokens_restore_an_authenticated_session() {
    let clock = Clock::fixed(Utc::now());
    let user = test_user(UserRole::Writer);
    let tab = tab(MockAuthApi::new().with_current_user(user.clone()), &clock);

    let (access, refresh) = mint_token_pair(&clock, Duration::from_secs(30 * 60));
    tab.store.store(&access, Some(&refresh)).unwrap();

    tab.restoration.restore().await.unwrap();

    assert_eq!(tab.restoration.phase(), RestorePhase::Initialized);
    let state = tab.session.snapshot();
    assert!(state.authenticated);
    assert_eq!(state.user, Some(user));
    assert_eq!(state.error, None);
    assert_eq!(tab.api.me_calls(), 1);
    assert_eq!(tab.api.refresh_calls(), 0);
}

#[tokio::test]
async fn rejected_session_clears_tokens_but_still_initializes() {
    let clock = Clock::fixed(Utc::now());
    // Default mock answers /auth/me with 401.
    let tab = tab(MockAuthApi::new(), &clock);

    let (access, refresh) = mint_token_pair(&clock, Duration::from_secs(30 * 60));
    tab.store.store(&access, Some(&refresh)).unwrap();

    tab.restoration.restore().await.unwrap();

    // An expired session is expected, not an error.
    assert_eq!(tab.restoration.phase(), RestorePhase::Initialized);
    assert!(!tab.session.snapshot().authenticated);
    assert!(!tab.store.is_authenticated());
    assert!(!tab.store.has_tokens());
}

#[tokio::test]
async fn transient_failure_keeps_the_session_with_an_error_banner() {
    let clock = Clock::fixed(Utc::now());
    let api = MockAuthApi::new();
    api.queue_me(Err(ApiError::status(500, "database down")));
    let tab = tab(api, &clock);

    let (access, refresh) = mint_token_pair(&clock, Duration::from_secs(30 * 60));
    tab.store.store(&access, Some(&refresh)).unwrap();

    tab.restoration.restore().await.unwrap();

    assert_eq!(tab.restoration.phase(), RestorePhase::Initialized);
    let state = tab.session.snapshot();
    assert!(state.authenticated);
    assert!(state.user.as_ref().is_some_and(|u| u.is_placeholder()));
    assert!(state.error.is_some());
    // The tokens survive the outage.
    assert!(tab.store.is_authenticated());
}

#[tokio::test]
async fn near_expiry_session_refreshes_before_the_user_fetch() {
    let clock = Clock::fixed(Utc::now());
    let user = test_user(UserRole::Writer);
    let new_access = mint_token(
        "user-1",
        "user@example.com",
        UserRole::Writer,
        clock.now(),
        clock.now() + ChronoDuration::minutes(30),
    );
    let tab = tab(
        MockAuthApi::new()
            .with_current_user(user)
            .with_refresh_token_response(new_access.clone()),
        &clock,
    );

    // Four minutes of lifetime left: inside the five-minute threshold.
    let (access, refresh) = mint_token_pair(&clock, Duration::from_secs(4 * 60));
    tab.store.store(&access, Some(&refresh)).unwrap();
    assert!(tab.store.should_refresh());

    tab.restoration.restore().await.unwrap();

    assert_eq!(tab.api.refresh_calls(), 1);
    assert_eq!(tab.api.me_calls(), 1);
    assert_eq!(tab.store.access_token(), Some(new_access));
    assert!(tab.session.snapshot().authenticated);
}

#[tokio::test]
async fn rejected_refresh_at_boot_ends_logged_out_without_user_fetch() {
    let clock = Clock::fixed(Utc::now());
    let tab = tab(
        MockAuthApi::new().with_refresh_error(ApiError::unauthorized("refresh revoked")),
        &clock,
    );

    let (access, refresh) = mint_token_pair(&clock, Duration::from_secs(4 * 60));
    tab.store.store(&access, Some(&refresh)).unwrap();

    tab.restoration.restore().await.unwrap();

    assert_eq!(tab.restoration.phase(), RestorePhase::Initialized);
    assert!(!tab.session.snapshot().authenticated);
    assert_eq!(tab.api.me_calls(), 0);
}

#[tokio::test]
async fn revalidation_rejection_clears_the_session() {
    let clock = Clock::fixed(Utc::now());
    let user = test_user(UserRole::Writer);
    let tab = tab(MockAuthApi::new().with_current_user(user), &clock);

    let (access, refresh) = mint_token_pair(&clock, Duration::from_secs(30 * 60));
    tab.store.store(&access, Some(&refresh)).unwrap();
    tab.restoration.restore().await.unwrap();
    assert!(tab.session.snapshot().authenticated);

    tab.api.queue_me(Err(ApiError::unauthorized("token revoked")));
    tab.restoration.revalidate().await;

    assert!(!tab.session.snapshot().authenticated);
    assert!(!tab.store.has_tokens());
}

#[tokio::test]
async fn revalidation_transient_failure_changes_nothing() {
    let clock = Clock::fixed(Utc::now());
    let user = test_user(UserRole::Writer);
    let tab = tab(MockAuthApi::new().with_current_user(user.clone()), &clock);

    let (access, refresh) = mint_token_pair(&clock, Duration::from_secs(30 * 60));
    tab.store.store(&access, Some(&refresh)).unwrap();
    tab.restoration.restore().await.unwrap();

    tab.api.queue_me(Err(ApiError::Timeout));
    tab.restoration.revalidate().await;

    let state = tab.session.snapshot();
    assert!(state.authenticated);
    assert_eq!(state.user, Some(user));
}

#[tokio::test]
async fn cross_tab_logout_propagates_without_network_calls() {
    let clock = Clock::fixed(Utc::now());
    let bus = storage_bus();
    let primary = Arc::new(MemoryStore::new());
    let fallback = Arc::new(MemoryStore::new());

    let store_a = TokenStore::new(
        AuthConfig::default(),
        primary.clone(),
        fallback.clone(),
        clock.clone(),
        bus.clone(),
    );
    let store_b = TokenStore::new(
        AuthConfig::default(),
        primary,
        fallback,
        clock.clone(),
        bus,
    );

    let user = test_user(UserRole::Writer);
    let tab_b = tab_with_store(MockAuthApi::new().with_current_user(user), store_b);

    // Tab A signs in; tab B restores the shared session.
    let (access, refresh) = mint_token_pair(&clock, Duration::from_secs(30 * 60));
    store_a.store(&access, Some(&refresh)).unwrap();
    tab_b.restoration.restore().await.unwrap();
    assert!(tab_b.session.snapshot().authenticated);
    let requests_before = tab_b.api.total_calls();

    let listener = tab_b.restoration.spawn_storage_listener();
    tokio::task::yield_now().await;

    // Tab A logs out; the storage event reaches tab B.
    store_a.clear();

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while tab_b.session.snapshot().authenticated {
        assert!(std::time::Instant::now() < deadline, "logout never propagated");
        tokio::task::yield_now().await;
    }

    assert!(!tab_b.session.snapshot().authenticated);
    assert_eq!(tab_b.api.total_calls(), requests_before);
    listener.abort();
}
