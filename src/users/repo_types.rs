use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Role stored on the user row and carried in the access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Anonymous,
    Authenticated,
    Manager,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Anonymous => "ANONYMOUS",
            UserRole::Authenticated => "AUTHENTICATED",
            UserRole::Manager => "MANAGER",
            UserRole::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub nickname: String,
    pub email: String,
    pub password_hash: String, // Argon2 PHC string
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub profile_picture_url: Option<String>,
    pub github_profile_url: Option<String>,
    pub linkedin_profile_url: Option<String>,
    pub role: UserRole,
    pub is_professional: bool,
    pub professional_status_updated_at: Option<OffsetDateTime>,
    pub email_verified: bool,
    pub verification_token: Option<String>,
    pub failed_login_attempts: i32,
    pub is_locked: bool,
    pub last_login_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Everything needed to insert a row; timestamps and counters start fresh.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub nickname: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub profile_picture_url: Option<String>,
    pub github_profile_url: Option<String>,
    pub linkedin_profile_url: Option<String>,
    pub role: UserRole,
    pub email_verified: bool,
    pub verification_token: Option<String>,
}

/// Partial update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
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
