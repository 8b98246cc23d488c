use crate::config::SmtpSettings;
use crate::error::{IntegrityError, Result};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Message, SmtpTransport, Transport};
use tracing::debug;

/// Hosts where credentials may travel without TLS.
const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1"];

#[derive(Debug, Clone)]
pub struct SmtpMailer {
    settings: SmtpSettings,
}

impl SmtpMailer {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    fn build_message(&self, subject: &str, body: &str) -> Result<Message> {
        let from: Mailbox = self
            .settings
            .from
            .parse()
            .map_err(|e| IntegrityError::Delivery(format!("invalid From address: {e}")))?;
        let to: Mailbox = self
            .settings
            .to
            .parse()
            .map_err(|e| IntegrityError::Delivery(format!("invalid To address: {e}")))?;
        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| IntegrityError::Delivery(format!("building message: {e}")))
    }

    fn transport(&self) -> Result<SmtpTransport> {
        let host = self.settings.host.as_str();
        let params = TlsParameters::new(host.to_string())
            .map_err(|e| IntegrityError::Delivery(format!("TLS setup: {e}")))?;
        // Credentials only go out in the clear to the local host.
        let tls = if LOCAL_HOSTS.contains(&host) {
            Tls::Opportunistic(params)
        } else {
            Tls::Required(params)
        };
        let mut builder = SmtpTransport::builder_dangerous(host)
            .port(self.settings.port)
            .tls(tls);
        if !self.settings.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                self.settings.username.clone(),
                self.settings.password.clone(),
            ));
        }
        Ok(builder.build())
    }

    pub fn send(&self, subject: &str, body: &str) -> Result<()> {
        let message = self.build_message(subject, body)?;
        let transport = self.transport()?;
        debug!(
            "Sending alert via SMTP {}:{}",
            self.settings.host, self.settings.port
        );
        transport
            .send(&message)
            .map(|_| ())
            .map_err(|e| IntegrityError::Delivery(e.to_string()))
    }
}
