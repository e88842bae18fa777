//! Backend API surface.
//!
//! The session lifecycle talks to the backend exclusively through the
//! [`AuthApi`] trait so orchestration can be exercised against mock
//! backends; [`HttpAuthApi`] is the production implementation.

mod http;

pub use http::HttpAuthApi;

use crate::errors::ApiError;
use crate::models::{LoginResponse, RefreshResponse, RegisterRequest, User};
use async_trait::async_trait;

/// The backend authentication endpoints the client consumes.
///
/// Error conventions: a 401 surfaces as [`ApiError::Unauthorized`] and
/// means the presented credential was authoritatively rejected; timeouts,
/// connection failures, and 5xx responses surface as transient variants.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange credentials for a token pair and the user's profile.
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError>;

    /// Create an account. Returns the created profile; no tokens are issued
    /// until the email address is verified.
    async fn register(&self, request: &RegisterRequest) -> Result<User, ApiError>;

    /// Best-effort server-side logout notification.
    async fn logout(&self, access_token: &str) -> Result<(), ApiError>;

    /// Fetch the authenticated user's profile.
    async fn current_user(&self, access_token: &str) -> Result<User, ApiError>;

    /// Exchange a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiError>;

    /// Request a password-reset email.
    async fn forgot_password(&self, email: &str) -> Result<(), ApiError>;

    /// Complete a password reset.
    async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), ApiError>;

    /// Confirm an email address with a verification token.
    async fn verify_email(&self, token: &str) -> Result<(), ApiError>;

    /// Re-send the verification email.
    async fn resend_verification(&self, email: &str) -> Result<(), ApiError>;
}
