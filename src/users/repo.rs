use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::users::repo_types::{NewUser, User, UserChanges};

const USER_COLUMNS: &str = r#"
    id, nickname, email, password_hash, first_name, last_name, bio,
    profile_picture_url, github_profile_url, linkedin_profile_url, role,
    is_professional, professional_status_updated_at, email_verified,
    verification_token, failed_login_attempts, is_locked, last_login_at,
    created_at, updated_at
"#;

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("Email already exists")]
    EmailTaken,
    #[error("Nickname already exists")]
    NicknameTaken,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return match db.constraint() {
                    Some("users_nickname_key") => RepoError::NicknameTaken,
                    _ => RepoError::EmailTaken,
                };
            }
        }
        RepoError::Other(e.into())
    }
}

/// Persistence boundary for user records.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn count(&self) -> anyhow::Result<i64>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn list(&self, skip: i64, limit: i64) -> anyhow::Result<Vec<User>>;
    async fn create(&self, new: NewUser) -> Result<User, RepoError>;
    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, RepoError>;
    /// Returns `false` when no row matched.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
    /// Bumps the failure counter and locks once it reaches `max_attempts`,
    /// in a single step.
    async fn record_login_failure(&self, id: Uuid, max_attempts: i32)
        -> anyhow::Result<Option<User>>;
    async fn record_login_success(&self, id: Uuid) -> anyhow::Result<()>;
    /// Marks the e-mail verified when `token` matches; `None` otherwise.
    async fn verify_email(&self, id: Uuid, token: &str) -> anyhow::Result<Option<User>>;
    async fn set_professional(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn unlock(&self, id: Uuid) -> anyhow::Result<Option<User>>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn count(&self) -> anyhow::Result<i64> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;
        Ok(n)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn list(&self, skip: i64, limit: i64) -> anyhow::Result<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, id ASC LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query_as::<_, User>(&sql)
            .bind(limit)
            .bind(skip)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn create(&self, new: NewUser) -> Result<User, RepoError> {
        let sql = format!(
            r#"
            INSERT INTO users (
                id, nickname, email, password_hash, first_name, last_name, bio,
                profile_picture_url, github_profile_url, linkedin_profile_url,
                role, email_verified, verification_token
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.nickname)
            .bind(&new.email)
            .bind(&new.password_hash)
            .bind(&new.first_name)
            .bind(&new.last_name)
            .bind(&new.bio)
            .bind(&new.profile_picture_url)
            .bind(&new.github_profile_url)
            .bind(&new.linkedin_profile_url)
            .bind(new.role)
            .bind(new.email_verified)
            .bind(&new.verification_token)
            .fetch_one(&self.db)
            .await?;
        Ok(user)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, RepoError> {
        let sql = format!(
            r#"
            UPDATE users SET
                email = COALESCE($2, email),
                nickname = COALESCE($3, nickname),
                first_name = COALESCE($4, first_name),
                last_name = COALESCE($5, last_name),
                bio = COALESCE($6, bio),
                profile_picture_url = COALESCE($7, profile_picture_url),
                github_profile_url = COALESCE($8, github_profile_url),
                linkedin_profile_url = COALESCE($9, linkedin_profile_url),
                role = COALESCE($10, role),
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(&changes.email)
            .bind(&changes.nickname)
            .bind(&changes.first_name)
            .bind(&changes.last_name)
            .bind(&changes.bio)
            .bind(&changes.profile_picture_url)
            .bind(&changes.github_profile_url)
            .bind(&changes.linkedin_profile_url)
            .bind(changes.role)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn record_login_failure(
        &self,
        id: Uuid,
        max_attempts: i32,
    ) -> anyhow::Result<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users SET
                failed_login_attempts = failed_login_attempts + 1,
                is_locked = is_locked OR failed_login_attempts + 1 >= $2,
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(max_attempts)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn record_login_success(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET failed_login_attempts = 0, last_login_at = now(), updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn verify_email(&self, id: Uuid, token: &str) -> anyhow::Result<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users SET
                email_verified = TRUE,
                verification_token = NULL,
                role = CASE WHEN role = 'ANONYMOUS' THEN 'AUTHENTICATED'::user_role ELSE role END,
                updated_at = now()
            WHERE id = $1 AND verification_token = $2
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(token)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn set_professional(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users SET
                is_professional = TRUE,
                professional_status_updated_at = now(),
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn unlock(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users SET
                is_locked = FALSE,
                failed_login_attempts = 0,
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }
}
