use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    /// Failed logins in a row before the account is locked.
    pub max_login_attempts: i32,
    /// Public origin used to build links in outgoing mail.
    pub server_base_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "usergate".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "usergate-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(30),
        };
        let max_login_attempts = std::env::var("MAX_LOGIN_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(5);
        let server_base_url = std::env::var("SERVER_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8080".into())
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            database_url,
            jwt,
            max_login_attempts,
            server_base_url,
        })
    }
}
