//! Convenience re-exports for common usage.

pub use crate::api::{AuthApi, HttpAuthApi};
pub use crate::client::AuthClient;
pub use crate::clock::{Clock, SessionClock, TokenHealth};
pub use crate::config::{AuthConfig, CookieConfig, CookieSameSite};
pub use crate::errors::{ApiError, AuthError, Result, StorageError, TokenError};
pub use crate::models::{LoginResponse, RegisterRequest, User, UserRole, UserUpdate};
pub use crate::policy::{check_feature_access, check_route_access, AccessDecision, AccessRule};
pub use crate::refresh::{RefreshCoordinator, RefreshFailure, RefreshOutcome};
pub use crate::restore::{RestorationService, RestorePhase};
pub use crate::session::{SessionHandle, SessionState};
pub use crate::storage::{CookieMirror, FileStore, KeyValueStore, MemoryStore, StorageEvent};
pub use crate::store::TokenStore;
pub use crate::tokens::{decode_claims, TokenClaims};
