use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Returns the first rule `plain` breaks, if any.
pub fn strength_problem(plain: &str) -> Option<&'static str> {
    if plain.chars().count() < MIN_PASSWORD_LEN {
        return Some("Password must be at least 8 characters long");
    }
    if !plain.chars().any(|c| c.is_uppercase()) {
        return Some("Password must contain an uppercase letter");
    }
    if !plain.chars().any(|c| c.is_lowercase()) {
        return Some("Password must contain a lowercase letter");
    }
    if !plain.chars().any(|c| c.is_ascii_digit()) {
        return Some("Password must contain a digit");
    }
    if !plain.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace()) {
        return Some("Password must contain a special character");
    }
    None
}
