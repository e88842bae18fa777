/*!
# Secret Safe Auth

Client-side authentication session lifecycle for the Secret Safe dead
man's switch messaging product.

This crate owns the session state a client keeps between requests: token
persistence with storage fallback and cookie mirroring, expiry tracking,
silent single-flight token refresh, session restoration across process
starts, and route/feature access policy. All business logic (messages,
encryption, check-in scheduling, delivery) lives in the backend API this
crate talks to.

## Quick start

```rust,no_run
use secret_safe_auth::{AuthClient, AuthConfig};

# #[tokio::main]
# async fn main() -> Result<(), Box<dyn std::error::Error>> {
let config = AuthConfig::new()
    .api_base_url("https://api.secretsafe.app")
    .storage_path("/var/lib/secret-safe/session.json");

let client = AuthClient::new(config)?;

// Restore any persisted session and start the background loops.
client.initialize().await?;

if !client.session().snapshot().authenticated {
    client.login("user@example.com", "hunter2!").await?;
}
# Ok(())
# }
```

## Security model

Token payloads are decoded **without** signature verification: the
decoded claims drive expiry countdowns and role-gated rendering only.
They are never an authorization boundary — the backend re-validates the
token on every request, and the user's profile is always re-fetched
rather than trusted from storage.
*/

pub mod api;
pub mod client;
pub mod clock;
pub mod config;
pub mod errors;
pub mod models;
pub mod policy;
pub mod prelude;
pub mod refresh;
pub mod restore;
pub mod session;
pub mod storage;
pub mod store;
pub mod testing;
pub mod tokens;

pub use client::AuthClient;
pub use config::AuthConfig;
pub use errors::{ApiError, AuthError, Result, StorageError, TokenError};
pub use models::{User, UserRole};
pub use session::SessionState;
