//! Outgoing mail.
//!
//! Delivery goes through the [`Mailer`] seam so the HTTP layer can run with
//! a real SMTP relay or with [`LogMailer`], which only records and logs.

use std::sync::Mutex;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use sea_orm::DatabaseConnection;
use tracing::{error, info, instrument};

use crate::audit;
use crate::error::{Result, ServiceError};
use crate::users::get_user;

const MESSAGE_SUBJECT: &str = "Message from ClientCRM";
const VERIFICATION_SUBJECT: &str = "Email confirmation";
const PASSWORD_SUBJECT: &str = "Password change";

#[async_trait]
pub trait Mailer: Send + Sync + std::fmt::Debug {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

fn mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|_| ServiceError::Validation(format!("Invalid email address: {address}")))
}

/// Delivers through an authenticated SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(host: &str, username: &str, password: &str, from: &str) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| ServiceError::Mail(e.to_string()))?
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .build();
        Ok(Self {
            transport,
            from: mailbox(from)?,
        })
    }
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer").field("from", &self.from).finish_non_exhaustive()
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(mailbox(to)?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| ServiceError::Mail(e.to_string()))?;
        self.transport.send(message).await.map_err(|e| {
            error!("SMTP delivery to {} failed: {}", to, e);
            ServiceError::Mail(e.to_string())
        })?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Logs messages instead of sending them and keeps them for inspection.
#[derive(Debug, Default)]
pub struct LogMailer {
    outbox: Mutex<Vec<OutgoingMail>>,
}

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.outbox.lock().map(|outbox| outbox.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        mailbox(to)?;
        info!("Mail to {} with subject {:?} (not delivered)", to, subject);
        if let Ok(mut outbox) = self.outbox.lock() {
            outbox.push(OutgoingMail {
                to: to.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
        }
        Ok(())
    }
}

/// Free-form message from a user.
#[instrument(skip(db, mailer, message))]
pub async fn send_message(
    db: &DatabaseConnection,
    mailer: &dyn Mailer,
    sender_id: i32,
    to: &str,
    message: &str,
) -> Result<()> {
    mailer.send(to, MESSAGE_SUBJECT, message).await?;
    audit::record(db, sender_id, audit::MAIL, "Message", 0).await;
    Ok(())
}

#[instrument(skip(db, mailer, code))]
pub async fn send_verification_code(
    db: &DatabaseConnection,
    mailer: &dyn Mailer,
    to: &str,
    code: u32,
) -> Result<()> {
    mailer
        .send(to, VERIFICATION_SUBJECT, &format!("Your confirmation code: {code}"))
        .await?;
    audit::record(db, audit::SYSTEM_USER_ID, audit::MAIL, "Verification", 0).await;
    Ok(())
}

/// Sends a password change code to the account's own address.
#[instrument(skip(db, mailer, code))]
pub async fn send_password_change_code(
    db: &DatabaseConnection,
    mailer: &dyn Mailer,
    user_id: i32,
    code: u32,
) -> Result<()> {
    let account = get_user(db, user_id).await?;
    mailer
        .send(&account.email, PASSWORD_SUBJECT, &format!("Your confirmation code: {code}"))
        .await?;
    audit::record(db, user_id, audit::MAIL, "PasswordChange", user_id).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_user, setup_db};
    use model::entities::log;
    use sea_orm::EntityTrait;

    #[tokio::test]
    async fn test_password_code_goes_to_account_email() {
        let db = setup_db().await;
        let account = new_user(&db, "forgetful").await;
        let mailer = LogMailer::new();

        send_password_change_code(&db, &mailer, account.id, 4242).await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, account.email);
        assert!(sent[0].body.contains("4242"));
        let rows = log::Entity::find().all(&db).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action, audit::MAIL);
    }

    #[tokio::test]
    async fn test_invalid_address_rejected() {
        let db = setup_db().await;
        let mailer = LogMailer::new();

        let err = send_verification_code(&db, &mailer, "not an address", 1).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_message_is_recorded() {
        let db = setup_db().await;
        let sender = new_user(&db, "sender").await;
        let mailer = LogMailer::new();

        send_message(&db, &mailer, sender.id, "client@example.com", "See you soon").await.unwrap();
        assert_eq!(mailer.sent()[0].subject, MESSAGE_SUBJECT);
    }
}
