use rand::{distributions::Alphanumeric, Rng};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::password::hash_password,
    email::EmailKind,
    error::ApiError,
    state::AppState,
    users::{
        dto::{ListParams, UserCreate, UserListResponse, UserResponse, UserUpdate},
        nickname::generate_nickname,
        repo::RepoError,
        repo_types::{NewUser, User, UserRole},
        validation::{normalize_email, validate_create, validate_update},
    },
};

const NICKNAME_ATTEMPTS: usize = 5;
const VERIFICATION_TOKEN_LEN: usize = 32;
pub const MAX_PAGE_SIZE: i64 = 100;

fn new_verification_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(VERIFICATION_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Sends `kind` to `user`. Delivery failures are logged, never returned.
pub async fn notify(st: &AppState, user: &User, kind: EmailKind) {
    if let Err(e) = st.mailer.send_user_email(user, kind).await {
        warn!(error = %e, user_id = %user.id, kind = ?kind, "notification failed");
    }
}

async fn ensure_email_free(st: &AppState, email: &str) -> Result<(), ApiError> {
    if st.users.find_by_email(email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(RepoError::EmailTaken.into());
    }
    Ok(())
}

async fn insert(
    st: &AppState,
    payload: UserCreate,
    role: UserRole,
    email_verified: bool,
    verification_token: Option<String>,
) -> Result<User, ApiError> {
    let password_hash = hash_password(&payload.password)?;
    let generated = payload.nickname.is_none();
    let mut attempts = 0;
    loop {
        let new = NewUser {
            nickname: payload.nickname.clone().unwrap_or_else(generate_nickname),
            email: payload.email.clone(),
            password_hash: password_hash.clone(),
            first_name: payload.first_name.clone(),
            last_name: payload.last_name.clone(),
            bio: payload.bio.clone(),
            profile_picture_url: payload.profile_picture_url.clone(),
            github_profile_url: payload.github_profile_url.clone(),
            linkedin_profile_url: payload.linkedin_profile_url.clone(),
            role,
            email_verified,
            verification_token: verification_token.clone(),
        };
        match st.users.create(new).await {
            Err(RepoError::NicknameTaken) if generated && attempts < NICKNAME_ATTEMPTS => {
                attempts += 1;
            }
            other => return other.map_err(ApiError::from),
        }
    }
}

/// Self-service sign-up. The very first account becomes a verified ADMIN;
/// everyone else starts ANONYMOUS and unverified and gets a verification mail.
/// A requested role is ignored.
pub async fn register(st: &AppState, mut payload: UserCreate) -> Result<User, ApiError> {
    payload.email = normalize_email(&payload.email);
    validate_create(&payload)?;
    ensure_email_free(st, &payload.email).await?;

    if st.users.count().await? == 0 {
        let user = insert(st, payload, UserRole::Admin, true, None).await?;
        info!(user_id = %user.id, email = %user.email, "first user registered as admin");
        return Ok(user);
    }

    let token = new_verification_token();
    let user = insert(st, payload, UserRole::Anonymous, false, Some(token)).await?;
    notify(st, &user, EmailKind::EmailVerification).await;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Staff creation: role honoured (default AUTHENTICATED), account pre-verified.
pub async fn create_by_staff(st: &AppState, mut payload: UserCreate) -> Result<User, ApiError> {
    payload.email = normalize_email(&payload.email);
    validate_create(&payload)?;
    ensure_email_free(st, &payload.email).await?;

    let role = payload.role.unwrap_or(UserRole::Authenticated);
    let user = insert(st, payload, role, true, None).await?;
    info!(user_id = %user.id, role = %user.role, "user created by staff");
    Ok(user)
}

pub async fn get(st: &AppState, id: Uuid) -> Result<User, ApiError> {
    st.users
        .find_by_id(id)
        .await?
        .ok_or_else(ApiError::user_not_found)
}

pub async fn list(st: &AppState, params: ListParams) -> Result<UserListResponse, ApiError> {
    if params.skip < 0 {
        return Err(ApiError::Validation("skip must be >= 0".into()));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&params.limit) {
        return Err(ApiError::Validation(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    let total = st.users.count().await?;
    let users = st.users.list(params.skip, params.limit).await?;
    let items: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();
    Ok(UserListResponse {
        total,
        page: params.skip / params.limit + 1,
        size: items.len() as i64,
        items,
    })
}

pub async fn update(st: &AppState, id: Uuid, mut payload: UserUpdate) -> Result<User, ApiError> {
    if let Some(email) = payload.email.as_mut() {
        *email = normalize_email(email);
    }
    validate_update(&payload)?;
    let user = st
        .users
        .update(id, payload.into())
        .await?
        .ok_or_else(ApiError::user_not_found)?;
    info!(user_id = %user.id, "user updated");
    Ok(user)
}

pub async fn delete(st: &AppState, id: Uuid) -> Result<(), ApiError> {
    if !st.users.delete(id).await? {
        return Err(ApiError::user_not_found());
    }
    info!(user_id = %id, "user deleted");
    Ok(())
}

/// Marks the user professional and notifies them exactly once.
pub async fn upgrade_professional(st: &AppState, id: Uuid) -> Result<User, ApiError> {
    let user = st
        .users
        .set_professional(id)
        .await?
        .ok_or_else(ApiError::user_not_found)?;
    notify(st, &user, EmailKind::ProfessionalStatusUpgrade).await;
    info!(user_id = %user.id, "user upgraded to professional status");
    Ok(user)
}

pub async fn unlock(st: &AppState, id: Uuid) -> Result<User, ApiError> {
    let user = st
        .users
        .unlock(id)
        .await?
        .ok_or_else(ApiError::user_not_found)?;
    info!(user_id = %user.id, "account unlocked");
    Ok(user)
}

pub async fn verify_email(st: &AppState, id: Uuid, token: &str) -> Result<User, ApiError> {
    match st.users.verify_email(id, token).await? {
        Some(user) => {
            info!(user_id = %user.id, role = %user.role, "email verified");
            Ok(user)
        }
        None => {
            warn!(user_id = %id, "invalid verification token");
            Err(ApiError::BadRequest(
                "Invalid or expired verification token".into(),
            ))
        }
    }
}
