//! HTTP implementation of the backend API.

use crate::api::AuthApi;
use crate::config::AuthConfig;
use crate::errors::{ApiError, Result};
use crate::models::{AckResponse, LoginResponse, RefreshResponse, RegisterRequest, User};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Backend client over HTTP.
///
/// Every request carries the configured timeout; a timed-out request is a
/// transient failure, never a credential rejection.
pub struct HttpAuthApi {
    base_url: String,
    client: reqwest::Client,
}

/// Error body shape the backend uses for failures.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

impl HttpAuthApi {
    /// Create a client from the configuration.
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ApiError::from)?;

        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Map a response into success or the error taxonomy.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.detail)
            .unwrap_or_else(|| status.to_string());

        if status == StatusCode::UNAUTHORIZED {
            Err(ApiError::unauthorized(detail))
        } else {
            Err(ApiError::status(status.as_u16(), detail))
        }
    }

    async fn json_of<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        response.json().await.map_err(ApiError::from)
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        debug!("POST /auth/login");
        let response = self
            .client
            .post(self.endpoint("/auth/login"))
            .form(&[("username", email), ("password", password)])
            .send()
            .await?;
        Self::json_of(Self::check(response).await?).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<User, ApiError> {
        debug!("POST /auth/register");
        let response = self
            .client
            .post(self.endpoint("/auth/register"))
            .json(request)
            .send()
            .await?;
        Self::json_of(Self::check(response).await?).await
    }

    async fn logout(&self, access_token: &str) -> Result<(), ApiError> {
        debug!("POST /auth/logout");
        let response = self
            .client
            .post(self.endpoint("/auth/logout"))
            .bearer_auth(access_token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn current_user(&self, access_token: &str) -> Result<User, ApiError> {
        debug!("GET /auth/me");
        let response = self
            .client
            .get(self.endpoint("/auth/me"))
            .bearer_auth(access_token)
            .send()
            .await?;
        Self::json_of(Self::check(response).await?).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiError> {
        debug!("POST /auth/refresh");
        let response = self
            .client
            .post(self.endpoint("/auth/refresh"))
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        Self::json_of(Self::check(response).await?).await
    }

    async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
        debug!("POST /auth/forgot-password");
        let response = self
            .client
            .post(self.endpoint("/auth/forgot-password"))
            .json(&json!({ "email": email }))
            .send()
            .await?;
        let ack: AckResponse = Self::json_of(Self::check(response).await?).await?;
        debug!(message = %ack.message, "password reset requested");
        Ok(())
    }

    async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), ApiError> {
        debug!("POST /auth/reset-password");
        let response = self
            .client
            .post(self.endpoint("/auth/reset-password"))
            .json(&json!({ "token": token, "new_password": new_password }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn verify_email(&self, token: &str) -> Result<(), ApiError> {
        debug!("POST /verification/verify-email");
        let response = self
            .client
            .post(self.endpoint("/verification/verify-email"))
            .json(&json!({ "token": token }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn resend_verification(&self, email: &str) -> Result<(), ApiError> {
        debug!("POST /verification/resend-verification");
        let response = self
            .client
            .post(self.endpoint("/verification/resend-verification"))
            .json(&json!({ "email": email }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
