//! Notification policy for scan results
//!
//! Every change is written to the event log. An alert goes out only when at
//! least one change is alertable, and its body lists only alertable records.
//! Delivery problems are logged and reported back as a [`DeliveryStatus`];
//! they never fail the scan.

pub mod mailcmd;
pub mod smtp;

use crate::config::DeliveryMethod;
use crate::diff::ChangeSet;
use crate::event_log::{EventLog, EventSeverity};
use tracing::{error, info, warn};

pub use mailcmd::{MailCommand, MailCommandError};
pub use smtp::SmtpMailer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent { via: &'static str },
    Skipped(String),
    Failed { via: &'static str, reason: String },
}

/// Something that can carry an alert off the host.
pub trait Deliver {
    fn deliver(&self, subject: &str, body: &str) -> DeliveryStatus;
}

/// The configured delivery strategy.
#[derive(Debug, Clone)]
pub enum Mailer {
    Smtp(SmtpMailer),
    MailCommand(MailCommand),
    Disabled(String),
}

impl Mailer {
    pub fn from_method(method: &DeliveryMethod) -> Self {
        match method {
            DeliveryMethod::Smtp(settings) => Mailer::Smtp(SmtpMailer::new(settings.clone())),
            DeliveryMethod::MailCommand(settings) => {
                Mailer::MailCommand(MailCommand::new(settings.clone()))
            }
            DeliveryMethod::Disabled(reason) => Mailer::Disabled(reason.clone()),
        }
    }
}

impl Deliver for Mailer {
    fn deliver(&self, subject: &str, body: &str) -> DeliveryStatus {
        match self {
            Mailer::Smtp(mailer) => match mailer.send(subject, body) {
                Ok(()) => DeliveryStatus::Sent { via: "SMTP" },
                Err(e) => DeliveryStatus::Failed {
                    via: "SMTP",
                    reason: e.to_string(),
                },
            },
            Mailer::MailCommand(cmd) => match cmd.send(subject, body) {
                Ok(()) => DeliveryStatus::Sent { via: "mail command" },
                Err(MailCommandError::NotFound) => {
                    DeliveryStatus::Skipped("mail command not found".to_string())
                }
                Err(MailCommandError::Failed(e)) => DeliveryStatus::Failed {
                    via: "mail command",
                    reason: e.to_string(),
                },
            },
            Mailer::Disabled(reason) => DeliveryStatus::Skipped(reason.clone()),
        }
    }
}

/// What a scan amounted to once reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    NoChanges,
    WhitelistedOnly,
    Alerted(DeliveryStatus),
}

/// Body of the alert: one line per alertable record.
pub fn alert_body(changes: &ChangeSet) -> String {
    changes.alertable().map(|r| format!("{r}\n")).collect()
}

/// Full log text for a non-empty change set.
pub fn log_message(changes: &ChangeSet) -> Option<String> {
    if changes.is_empty() {
        return None;
    }
    let mut msg = String::new();
    if changes.has_alertable() {
        msg.push_str("Discrepancies found:\n");
        msg.push_str(&alert_body(changes));
    }
    let whitelisted: String = changes.whitelisted().map(|r| format!("{r}\n")).collect();
    if !whitelisted.is_empty() {
        if !msg.is_empty() {
            msg.push('\n');
        }
        msg.push_str("Whitelisted changes (no notification sent):\n");
        msg.push_str(&whitelisted);
    }
    Some(msg)
}

pub struct NotificationPolicy<'a, D: Deliver + ?Sized> {
    log: &'a EventLog,
    mailer: &'a D,
    subject: String,
}

impl<'a, D: Deliver + ?Sized> NotificationPolicy<'a, D> {
    pub fn new(log: &'a EventLog, mailer: &'a D, subject: impl Into<String>) -> Self {
        Self {
            log,
            mailer,
            subject: subject.into(),
        }
    }

    fn record(&self, event_type: &str, severity: EventSeverity, message: &str) {
        if let Err(e) = self.log.append(event_type, severity, message) {
            error!("Failed to write log: {}", e);
        }
    }

    pub fn report(&self, changes: &ChangeSet) -> ScanOutcome {
        let Some(message) = log_message(changes) else {
            info!("No changes detected");
            self.record("NO_CHANGES", EventSeverity::Info, "No changes detected.");
            return ScanOutcome::NoChanges;
        };

        let alert = changes.has_alertable();
        let severity = if alert {
            EventSeverity::Critical
        } else {
            EventSeverity::Warn
        };
        self.record("CHANGES_DETECTED", severity, &message);

        if !alert {
            info!("{} whitelisted changes, no notification sent", changes.len());
            return ScanOutcome::WhitelistedOnly;
        }

        let status = self.mailer.deliver(&self.subject, &alert_body(changes));
        match &status {
            DeliveryStatus::Sent { via } => {
                info!("Alert delivered via {}", via);
                self.record(
                    "NOTIFICATION_SENT",
                    EventSeverity::Info,
                    &format!("Email notification sent via {via}"),
                );
            }
            DeliveryStatus::Skipped(reason) => {
                warn!("Alert not delivered: {}", reason);
                self.record(
                    "NOTIFICATION_SKIPPED",
                    EventSeverity::Warn,
                    &format!("Email notification skipped: {reason}"),
                );
            }
            DeliveryStatus::Failed { via, reason } => {
                error!("Alert delivery via {} failed: {}", via, reason);
                self.record(
                    "NOTIFICATION_FAILED",
                    EventSeverity::Error,
                    &format!("Failed to send email via {via}: {reason}"),
                );
            }
        }
        ScanOutcome::Alerted(status)
    }
}
