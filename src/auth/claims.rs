use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::users::repo_types::UserRole;

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,      // user ID
    pub role: UserRole, // role at issue time
    pub iat: usize,     // issued at (unix timestamp)
    pub exp: usize,     // expires at (unix timestamp)
    pub iss: String,    // issuer
    pub aud: String,    // audience
}
