//! User and wire types shared across the authentication client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User roles, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Reader,
    Writer,
    Admin,
}

impl UserRole {
    /// Position in the role hierarchy (reader=1, writer=2, admin=3).
    pub fn hierarchy_level(&self) -> u8 {
        match self {
            Self::Reader => 1,
            Self::Writer => 2,
            Self::Admin => 3,
        }
    }

    /// Whether this role satisfies a minimum-role requirement.
    pub fn satisfies(&self, required: UserRole) -> bool {
        self.hierarchy_level() >= required.hierarchy_level()
    }

    /// Role name as the backend serializes it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reader => "reader",
            Self::Writer => "writer",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reader" => Ok(Self::Reader),
            "writer" => Ok(Self::Writer),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A user profile as returned by the backend.
///
/// Never persisted locally; always re-fetched with the access token so a
/// stale role can't outlive the session that granted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier
    pub id: Uuid,

    /// Email address
    pub email: String,

    /// Display name, if the user set one
    pub display_name: Option<String>,

    /// Role for access-control decisions
    pub role: UserRole,

    /// Whether the email address has been verified
    #[serde(default)]
    pub is_verified: bool,

    /// Whether the account is active
    #[serde(default = "default_true")]
    pub is_active: bool,

    /// Subscription tier (e.g. "free", "premium")
    #[serde(default = "default_tier")]
    pub subscription_tier: String,

    /// Avatar image URL
    #[serde(default)]
    pub avatar_url: Option<String>,

    /// Short biography
    #[serde(default)]
    pub bio: Option<String>,

    /// Account creation timestamp
    pub created_at: DateTime<Utc>,

    /// Most recent dead-man's-switch check-in
    #[serde(default)]
    pub last_check_in: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

fn default_tier() -> String {
    "free".to_string()
}

impl User {
    /// Placeholder user shown while the real profile can't be fetched.
    ///
    /// Used when restoration hits a transient backend failure: the session
    /// stays authenticated and the profile is filled in once the backend
    /// recovers.
    pub fn placeholder() -> Self {
        Self {
            id: Uuid::nil(),
            email: String::new(),
            display_name: None,
            role: UserRole::Reader,
            is_verified: false,
            is_active: true,
            subscription_tier: default_tier(),
            avatar_url: None,
            bio: None,
            created_at: Utc::now(),
            last_check_in: None,
        }
    }

    /// Whether this is the restoration placeholder rather than a fetched profile.
    pub fn is_placeholder(&self) -> bool {
        self.id.is_nil() && self.email.is_empty()
    }

    /// Apply a partial update, leaving unset fields untouched.
    pub fn apply_update(&mut self, update: UserUpdate) {
        if let Some(display_name) = update.display_name {
            self.display_name = Some(display_name);
        }
        if let Some(avatar_url) = update.avatar_url {
            self.avatar_url = Some(avatar_url);
        }
        if let Some(bio) = update.bio {
            self.bio = Some(bio);
        }
        if let Some(subscription_tier) = update.subscription_tier {
            self.subscription_tier = subscription_tier;
        }
        if let Some(is_verified) = update.is_verified {
            self.is_verified = is_verified;
        }
        if let Some(last_check_in) = update.last_check_in {
            self.last_check_in = Some(last_check_in);
        }
    }
}

/// Partial user update for shallow merges into the current session user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub subscription_tier: Option<String>,
    pub is_verified: Option<bool>,
    pub last_check_in: Option<DateTime<Utc>>,
}

/// Successful login response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Short-lived access token
    pub access_token: String,

    /// Longer-lived refresh token; the backend may omit one
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Token type, always "bearer"
    pub token_type: String,

    /// Access token lifetime in seconds
    pub expires_in: u64,

    /// The authenticated user's profile
    pub user: User,
}

/// Successful token refresh response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    /// Replacement access token
    pub access_token: String,

    /// Token type, always "bearer"
    #[serde(default)]
    pub token_type: Option<String>,

    /// Access token lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Registration request payload.
///
/// Registration never yields tokens: the account must verify its email
/// address before the first login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub role: UserRole,
    pub subscription_tier: String,
}

impl RegisterRequest {
    /// Create a registration request with the backend's defaults (writer, free tier).
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            first_name: None,
            last_name: None,
            display_name: None,
            role: UserRole::Writer,
            subscription_tier: "free".to_string(),
        }
    }

    /// Set the display name.
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set first and last name.
    pub fn full_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = Some(first.into());
        self.last_name = Some(last.into());
        self
    }
}

/// Generic acknowledgement body for fire-and-forget endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub message: String,
}
