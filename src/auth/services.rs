use axum::extract::FromRef;
use tracing::{info, warn};

use crate::{
    auth::{jwt::JwtKeys, password::verify_password},
    email::EmailKind,
    error::ApiError,
    state::AppState,
    users::{repo_types::User, services::notify, validation::normalize_email},
};

/// Checks credentials and the account state, updating the failure counter.
///
/// Unknown email, unverified account and wrong password all produce the same
/// `Unauthorized` message. A locked account is reported as `AccountLocked`
/// before the password is looked at; the failure that reaches the threshold
/// locks the account and is reported as `AccountLocked` as well.
pub async fn authenticate(st: &AppState, email: &str, password: &str) -> Result<User, ApiError> {
    let email = normalize_email(email);
    let Some(user) = st.users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(ApiError::bad_credentials());
    };

    if user.is_locked {
        warn!(user_id = %user.id, "login attempt on locked account");
        return Err(ApiError::AccountLocked);
    }

    if !user.email_verified {
        warn!(user_id = %user.id, "login attempt on unverified account");
        return Err(ApiError::bad_credentials());
    }

    if !verify_password(password, &user.password_hash)? {
        let max = st.config.max_login_attempts;
        let updated = st.users.record_login_failure(user.id, max).await?;
        warn!(
            user_id = %user.id,
            attempts = updated.as_ref().map(|u| u.failed_login_attempts),
            "login invalid password"
        );
        if let Some(locked) = updated.filter(|u| u.is_locked) {
            warn!(user_id = %locked.id, "account locked after repeated failures");
            notify(st, &locked, EmailKind::AccountLocked).await;
            return Err(ApiError::AccountLocked);
        }
        return Err(ApiError::bad_credentials());
    }

    st.users.record_login_success(user.id).await?;
    info!(user_id = %user.id, role = %user.role, "user logged in");
    Ok(user)
}

/// Authenticates and signs an access token carrying the stored role.
pub async fn login(st: &AppState, email: &str, password: &str) -> Result<String, ApiError> {
    let user = authenticate(st, email, password).await?;
    let token = JwtKeys::from_ref(st).sign(user.id, user.role)?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::MockEmailSender;
    use crate::test_support::{seed_user, PASSWORD};
    use crate::users::repo::memory::MemoryUserRepo;
    use crate::users::repo_types::UserRole;
    use std::sync::Arc;

    #[tokio::test]
    async fn token_carries_stored_role() {
        let repo = Arc::new(MemoryUserRepo::default());
        let user = seed_user(&repo, "mgr@example.com", UserRole::Manager, |_| {});
        let st = AppState::fake_with(repo, AppState::fake().mailer);

        let token = login(&st, "MGR@example.com", PASSWORD).await.unwrap();
        let claims = JwtKeys::from_ref(&st).verify(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, UserRole::Manager);
    }

    #[tokio::test]
    async fn fifth_failure_locks_and_notifies_once() {
        let repo = Arc::new(MemoryUserRepo::default());
        let user = seed_user(&repo, "u@example.com", UserRole::Authenticated, |_| {});
        let mut mailer = MockEmailSender::new();
        mailer
            .expect_send_user_email()
            .withf(|_, kind| *kind == EmailKind::AccountLocked)
            .times(1)
            .returning(|_, _| Ok(()));
        let st = AppState::fake_with(repo.clone(), Arc::new(mailer));

        for _ in 0..4 {
            let err = authenticate(&st, "u@example.com", "Wrong$Pass123").await.unwrap_err();
            assert!(matches!(err, ApiError::Unauthorized(_)));
        }
        let err = authenticate(&st, "u@example.com", "Wrong$Pass123").await.unwrap_err();
        assert!(matches!(err, ApiError::AccountLocked));

        // correct password no longer helps
        let err = authenticate(&st, "u@example.com", PASSWORD).await.unwrap_err();
        assert!(matches!(err, ApiError::AccountLocked));
        assert_eq!(repo.get(user.id).unwrap().failed_login_attempts, 5);
    }

    #[tokio::test]
    async fn success_resets_failure_counter() {
        let repo = Arc::new(MemoryUserRepo::default());
        let user = seed_user(&repo, "u@example.com", UserRole::Authenticated, |u| {
            u.failed_login_attempts = 3;
        });
        let st = AppState::fake_with(repo.clone(), AppState::fake().mailer);

        authenticate(&st, "u@example.com", PASSWORD).await.unwrap();
        let stored = repo.get(user.id).unwrap();
        assert_eq!(stored.failed_login_attempts, 0);
        assert!(stored.last_login_at.is_some());
    }

    #[tokio::test]
    async fn unverified_gets_uniform_message() {
        let repo = Arc::new(MemoryUserRepo::default());
        seed_user(&repo, "u@example.com", UserRole::Anonymous, |u| {
            u.email_verified = false;
        });
        let st = AppState::fake_with(repo, AppState::fake().mailer);

        let err = authenticate(&st, "u@example.com", PASSWORD).await.unwrap_err();
        assert_eq!(err.to_string(), crate::error::BAD_CREDENTIALS);
    }
}
