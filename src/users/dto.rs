use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo_types::{User, UserChanges, UserRole};

/// Body for `/register/` and the staff-only `POST /users/`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserCreate {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub profile_picture_url: Option<String>,
    #[serde(default)]
    pub github_profile_url: Option<String>,
    #[serde(default)]
    pub linkedin_profile_url: Option<String>,
    /// Honoured only on the staff endpoint.
    #[serde(default)]
    pub role: Option<UserRole>,
}

/// Partial profile update; unknown fields are rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub profile_picture_url: Option<String>,
    pub github_profile_url: Option<String>,
    pub linkedin_profile_url: Option<String>,
    pub role: Option<UserRole>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.nickname.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.bio.is_none()
            && self.profile_picture_url.is_none()
            && self.github_profile_url.is_none()
            && self.linkedin_profile_url.is_none()
            && self.role.is_none()
    }
}

impl From<UserUpdate> for UserChanges {
    fn from(u: UserUpdate) -> Self {
        Self {
            email: u.email,
            nickname: u.nickname,
            first_name: u.first_name,
            last_name: u.last_name,
            bio: u.bio,
            profile_picture_url: u.profile_picture_url,
            github_profile_url: u.github_profile_url,
            linkedin_profile_url: u.linkedin_profile_url,
            role: u.role,
        }
    }
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub nickname: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub profile_picture_url: Option<String>,
    pub github_profile_url: Option<String>,
    pub linkedin_profile_url: Option<String>,
    pub role: UserRole,
    pub is_professional: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub professional_status_updated_at: Option<OffsetDateTime>,
    pub email_verified: bool,
    pub is_locked: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            nickname: u.nickname,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            bio: u.bio,
            profile_picture_url: u.profile_picture_url,
            github_profile_url: u.github_profile_url,
            linkedin_profile_url: u.linkedin_profile_url,
            role: u.role,
            is_professional: u.is_professional,
            professional_status_updated_at: u.professional_status_updated_at,
            email_verified: u.email_verified,
            is_locked: u.is_locked,
            last_login_at: u.last_login_at,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    10
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub items: Vec<UserResponse>,
    pub total: i64,
    pub page: i64,
    pub size: i64,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
