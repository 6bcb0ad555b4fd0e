use async_trait::async_trait;
use tracing::info;

use crate::users::repo_types::User;

/// Notifications the service sends to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    EmailVerification,
    AccountLocked,
    ProfessionalStatusUpgrade,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_user_email(&self, user: &User, kind: EmailKind) -> anyhow::Result<()>;
}

/// Builds subject and body for `kind`. Verification mail links to
/// `{base_url}/verify-email/{id}/{token}`.
pub fn render(base_url: &str, user: &User, kind: EmailKind) -> RenderedEmail {
    let name = user.first_name.as_deref().unwrap_or(&user.nickname);
    let (subject, body) = match kind {
        EmailKind::EmailVerification => {
            let token = user.verification_token.as_deref().unwrap_or_default();
            (
                "Verify your account".to_string(),
                format!(
                    "Hello {name},\n\nPlease confirm your e-mail address by visiting:\n{base_url}/verify-email/{}/{token}\n",
                    user.id
                ),
            )
        }
        EmailKind::AccountLocked => (
            "Your account has been locked".to_string(),
            format!(
                "Hello {name},\n\nYour account was locked after too many failed login attempts. \
                 Contact an administrator to unlock it.\n"
            ),
        ),
        EmailKind::ProfessionalStatusUpgrade => (
            "You have been upgraded to professional status".to_string(),
            format!("Hello {name},\n\nCongratulations, your account now has professional status.\n"),
        ),
    };
    RenderedEmail {
        to: user.email.clone(),
        subject,
        body,
    }
}

/// Renders mail and writes it to the log instead of a transport.
#[derive(Clone)]
pub struct LogMailer {
    base_url: String,
}

impl LogMailer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl EmailSender for LogMailer {
    async fn send_user_email(&self, user: &User, kind: EmailKind) -> anyhow::Result<()> {
        let mail = render(&self.base_url, user, kind);
        info!(
            user_id = %user.id,
            to = %mail.to,
            subject = %mail.subject,
            kind = ?kind,
            body = %mail.body,
            "email dispatched"
        );
        Ok(())
    }
}
