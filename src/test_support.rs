//! Fixtures shared by the handler tests.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::FromRef,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use lazy_static::lazy_static;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    app::build_app,
    auth::{jwt::JwtKeys, password::hash_password},
    email::EmailSender,
    state::AppState,
    users::{
        nickname::generate_nickname,
        repo::memory::MemoryUserRepo,
        repo_types::{User, UserRole},
    },
};

pub const PASSWORD: &str = "MySuperPassword$1234";

lazy_static! {
    static ref PASSWORD_HASH: String = hash_password(PASSWORD).unwrap();
}

/// Inserts a verified, unlocked user whose password is [`PASSWORD`].
pub fn seed_user(
    repo: &MemoryUserRepo,
    email: &str,
    role: UserRole,
    tweak: impl FnOnce(&mut User),
) -> User {
    let now = OffsetDateTime::now_utc();
    let mut user = User {
        id: Uuid::new_v4(),
        nickname: generate_nickname(),
        email: email.to_string(),
        password_hash: PASSWORD_HASH.clone(),
        first_name: Some("John".into()),
        last_name: Some("Doe".into()),
        bio: None,
        profile_picture_url: None,
        github_profile_url: None,
        linkedin_profile_url: None,
        role,
        is_professional: false,
        professional_status_updated_at: None,
        email_verified: true,
        verification_token: None,
        failed_login_attempts: 0,
        is_locked: false,
        last_login_at: None,
        created_at: now,
        updated_at: now,
    };
    tweak(&mut user);
    repo.insert(user.clone());
    user
}

pub struct TestApp {
    pub state: AppState,
    pub repo: Arc<MemoryUserRepo>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_mailer(AppState::fake().mailer)
    }

    pub fn with_mailer(mailer: Arc<dyn EmailSender>) -> Self {
        let repo = Arc::new(MemoryUserRepo::default());
        let state = AppState::fake_with(repo.clone(), mailer);
        let router = build_app(state.clone());
        Self {
            state,
            repo,
            router,
        }
    }

    pub fn seed(&self, email: &str, role: UserRole) -> User {
        seed_user(&self.repo, email, role, |_| {})
    }

    pub fn token_for(&self, user: &User) -> String {
        self.token(user.id, user.role)
    }

    /// Signs a token directly, like a client holding an arbitrary claim set.
    pub fn token(&self, id: Uuid, role: UserRole) -> String {
        JwtKeys::from_ref(&self.state).sign(id, role).unwrap()
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, body)
    }

    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        self.send(req.body(Body::from(body.to_string())).unwrap()).await
    }

    pub async fn empty(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        self.send(req.body(Body::empty()).unwrap()).await
    }

    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, serde_json::Value) {
        let form = serde_urlencoded::to_string([("username", email), ("password", password)])
            .unwrap();
        let req = Request::builder()
            .method(Method::POST)
            .uri("/login/")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form))
            .unwrap();
        self.send(req).await
    }
}
