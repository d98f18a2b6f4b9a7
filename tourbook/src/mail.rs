//! Transactional email
//!
//! [`Email`] renders the two messages the API sends (welcome and password
//! reset) and hands them to a [`Mailer`]. [`SmtpMailer`] delivers through
//! an SMTP relay; [`LogMailer`] only logs, and is what runs when no relay
//! is configured.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;

use crate::config::EmailConfig;
use crate::context::Identity;

/// Mail delivery errors
#[derive(Debug, Error)]
pub enum MailError {
    /// Sender or recipient could not be parsed as a mailbox
    #[error("invalid address {address:?}: {reason}")]
    Address {
        /// Offending address
        address: String,
        /// Parser message
        reason: String,
    },

    /// Message could not be assembled
    #[error("failed to build message: {0}")]
    Build(String),

    /// Relay rejected or could not be reached
    #[error("SMTP transport error: {0}")]
    Transport(String),
}

/// A rendered message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    /// Sender mailbox, `Name <addr>`
    pub from: String,
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// HTML body
    pub html: String,
    /// Plain-text alternative
    pub text: String,
}

/// Delivers [`OutgoingMail`]
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    /// Send one message
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// Mailer that writes messages to the log instead of sending them
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        tracing::info!(to = %mail.to, subject = %mail.subject, "email not sent (no SMTP relay configured)");
        tracing::debug!(body = %mail.text, "email body");
        Ok(())
    }
}

/// Mailer backed by an SMTP relay
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer").finish_non_exhaustive()
    }
}

impl SmtpMailer {
    /// Build a STARTTLS transport from configuration
    ///
    /// Returns `Ok(None)` when no relay host is configured.
    pub fn from_config(config: &EmailConfig) -> Result<Option<Self>, MailError> {
        let Some(host) = config.host.as_deref() else {
            return Ok(None);
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            if !username.is_empty() {
                builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
            }
        }

        Ok(Some(Self {
            transport: builder.build(),
        }))
    }
}

fn mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|e: lettre::address::AddressError| MailError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let message = Message::builder()
            .from(mailbox(&mail.from)?)
            .to(mailbox(&mail.to)?)
            .subject(mail.subject.clone())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(mail.text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(mail.html),
                    ),
            )
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        tracing::info!(to = %mail.to, subject = %mail.subject, "email sent");
        Ok(())
    }
}

/// Subject of the signup message
pub const WELCOME_SUBJECT: &str = "Welcome to the tourbook family!";

/// Subject of the reset message
pub const RESET_SUBJECT: &str = "Your password reset token (valid for only 10 minutes)";

/// Message addressed to one user, with one call-to-action link
#[derive(Debug, Clone)]
pub struct Email {
    to: String,
    first_name: String,
    url: String,
    from: String,
}

impl Email {
    /// Address `user`, linking to `url`
    pub fn new(user: &Identity, url: impl Into<String>, from: impl Into<String>) -> Self {
        let first_name = user
            .name()
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            to: user.email().to_string(),
            first_name,
            url: url.into(),
            from: from.into(),
        }
    }

    /// Welcome message after signup
    pub fn welcome(&self) -> OutgoingMail {
        self.render(
            WELCOME_SUBJECT,
            "Welcome to tourbook, we're glad to have you!",
            "Upload your user photo and start exploring tours.",
            "Upload user photo",
        )
    }

    /// Password reset message carrying the reset link
    pub fn password_reset(&self) -> OutgoingMail {
        self.render(
            RESET_SUBJECT,
            "Forgot your password? Submit a PATCH request with your new password and passwordConfirm to the link below.",
            "If you didn't forget your password, please ignore this email!",
            "Reset your password",
        )
    }

    fn render(&self, subject: &str, lead: &str, follow_up: &str, action: &str) -> OutgoingMail {
        let html = format!(
            r#"<!DOCTYPE html>
<html>
  <body style="font-family: sans-serif;">
    <p>Hi {name},</p>
    <p>{lead}</p>
    <p><a href="{url}" style="background: #55c57a; color: #fff; padding: 10px 20px; text-decoration: none;">{action}</a></p>
    <p>{follow_up}</p>
  </body>
</html>"#,
            name = escape_html(&self.first_name),
            lead = escape_html(lead),
            url = escape_html(&self.url),
            action = action,
            follow_up = escape_html(follow_up),
        );
        let text = format!(
            "Hi {},\n\n{}\n\n{}: {}\n\n{}\n",
            self.first_name, lead, action, self.url, follow_up
        );

        OutgoingMail {
            from: self.from.clone(),
            to: self.to.clone(),
            subject: subject.to_string(),
            html,
            text,
        }
    }
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Mailer that keeps every message, optionally failing instead
    #[derive(Debug, Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<OutgoingMail>>,
        pub fail: bool,
    }

    impl RecordingMailer {
        pub fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub fn last(&self) -> Option<OutgoingMail> {
            self.sent.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
            if self.fail {
                return Err(MailError::Transport("connection refused".into()));
            }
            self.sent.lock().unwrap().push(mail);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingMailer;
    use super::*;
    use serde_json::{json, Value};

    fn identity() -> Identity {
        let Value::Object(user) = json!({"_id": "u1", "name": "Laura Wilson", "email": "laura@example.com"}) else {
            unreachable!()
        };
        Identity::new(user)
    }

    #[test]
    fn test_welcome_uses_first_name() {
        let mail = Email::new(&identity(), "http://localhost/me", "tourbook <hello@tourbook.io>").welcome();
        assert_eq!(mail.to, "laura@example.com");
        assert_eq!(mail.subject, WELCOME_SUBJECT);
        assert!(mail.text.starts_with("Hi Laura,"));
        assert!(mail.html.contains("http://localhost/me"));
    }

    #[test]
    fn test_reset_contains_url() {
        let url = "http://localhost/api/v1/users/resetPassword/abc";
        let mail = Email::new(&identity(), url, "hello@tourbook.io").password_reset();
        assert_eq!(mail.subject, RESET_SUBJECT);
        assert!(mail.text.contains(url));
    }

    #[tokio::test]
    async fn test_send_through_mailer() {
        let mailer = RecordingMailer::default();
        let mail = Email::new(&identity(), "u", "hello@tourbook.io").welcome();
        mailer.send(mail.clone()).await.unwrap();
        assert_eq!(mailer.last(), Some(mail));

        assert!(LogMailer.send(Email::new(&identity(), "u", "f").welcome()).await.is_ok());
    }

    #[test]
    fn test_smtp_mailer_needs_host() {
        assert!(SmtpMailer::from_config(&EmailConfig::default()).unwrap().is_none());
    }

    #[test]
    fn test_bad_address_is_reported() {
        assert!(matches!(mailbox("not an address"), Err(MailError::Address { .. })));
    }
}
