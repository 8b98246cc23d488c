//! Run configuration loaded from a JSON file
//!
//! The file is read once at startup into an immutable [`Config`]; the
//! notification strategy is resolved here so later stages only see a closed
//! [`DeliveryMethod`].

use crate::digest::HashAlgorithm;
use crate::error::{IntegrityError, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_ALERT_SUBJECT: &str = "File Integrity Alert";
pub const DEFAULT_LOG_MAX_BYTES: u64 = 5 * 1024 * 1024;
pub const DEFAULT_MAIL_COMMAND: &str = "mail";

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u32),
    Text(String),
}

/// On-disk shape. Every key is optional here; [`Config::from_json`] decides
/// what is required.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    target_dir: String,
    integrity_file: String,
    log_file: String,
    email: String,
    from_email: String,
    whitelist: Vec<String>,
    smtp_server: String,
    smtp_port: Option<PortValue>,
    smtp_user: String,
    smtp_pass: String,
    email_method: String,
    mail_command: Option<String>,
    hash_algorithm: Option<String>,
    alert_subject: Option<String>,
    log_max_bytes: Option<u64>,
    extensions: Option<Vec<String>>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: String,
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailCommandSettings {
    pub program: String,
    pub from: Option<String>,
    pub to: String,
}

/// How alerts leave the host. Selected once from `email_method`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryMethod {
    Smtp(SmtpSettings),
    MailCommand(MailCommandSettings),
    /// No usable method; the reason is logged when an alert is skipped.
    Disabled(String),
}

impl DeliveryMethod {
    pub fn describe(&self) -> String {
        match self {
            Self::Smtp(s) => format!("smtp {}:{} -> {}", s.host, s.port, s.to),
            Self::MailCommand(m) => format!("mail command `{}` -> {}", m.program, m.to),
            Self::Disabled(reason) => format!("disabled ({reason})"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub target_dir: PathBuf,
    pub integrity_file: PathBuf,
    pub log_file: PathBuf,
    pub whitelist: Vec<String>,
    pub hash_algorithm: HashAlgorithm,
    pub alert_subject: String,
    pub log_max_bytes: u64,
    pub extensions: Option<Vec<String>>,
    pub delivery: DeliveryMethod,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            IntegrityError::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(text)
            .map_err(|e| IntegrityError::Config(format!("failed to parse config file: {e}")))?;

        let required = |value: &str, key: &str| -> Result<PathBuf> {
            if value.trim().is_empty() {
                Err(IntegrityError::Config(format!("{key} must be set")))
            } else {
                Ok(PathBuf::from(value))
            }
        };
        let target_dir = required(&raw.target_dir, "target_dir")?;
        let integrity_file = required(&raw.integrity_file, "integrity_file")?;
        let log_file = required(&raw.log_file, "log_file")?;

        let hash_algorithm = match &raw.hash_algorithm {
            Some(name) => name.parse()?,
            None => HashAlgorithm::default(),
        };
        let alert_subject = raw
            .alert_subject
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ALERT_SUBJECT.to_string());
        let delivery = resolve_delivery(&raw)?;

        Ok(Config {
            target_dir,
            integrity_file,
            log_file,
            whitelist: raw.whitelist,
            hash_algorithm,
            alert_subject,
            log_max_bytes: raw.log_max_bytes.unwrap_or(DEFAULT_LOG_MAX_BYTES),
            extensions: raw.extensions,
            delivery,
        })
    }
}

fn parse_port(value: &Option<PortValue>) -> Result<Option<u16>> {
    let invalid = |v: &dyn fmt::Display| IntegrityError::Config(format!("invalid smtp_port: {v}"));
    match value {
        None => Ok(None),
        Some(PortValue::Number(n)) => u16::try_from(*n).map(Some).map_err(|_| invalid(n)),
        Some(PortValue::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(PortValue::Text(s)) => s.trim().parse::<u16>().map(Some).map_err(|_| invalid(s)),
    }
}

fn resolve_delivery(raw: &RawConfig) -> Result<DeliveryMethod> {
    let port = parse_port(&raw.smtp_port)?;
    let from_email = raw.from_email.trim();
    let method = raw.email_method.trim().to_lowercase();

    if method != "smtp" && method != "mailcmd" {
        return Ok(DeliveryMethod::Disabled(
            "no valid email method configured".to_string(),
        ));
    }
    if raw.email.trim().is_empty() {
        return Ok(DeliveryMethod::Disabled("no recipient configured".to_string()));
    }

    if method == "smtp" {
        let (host, port) = match port {
            Some(port) if !raw.smtp_server.trim().is_empty() => (raw.smtp_server.trim(), port),
            _ => return Ok(DeliveryMethod::Disabled("SMTP not configured".to_string())),
        };
        let from = if from_email.is_empty() {
            raw.smtp_user.clone()
        } else {
            from_email.to_string()
        };
        return Ok(DeliveryMethod::Smtp(SmtpSettings {
            host: host.to_string(),
            port,
            username: raw.smtp_user.clone(),
            password: raw.smtp_pass.clone(),
            from,
            to: raw.email.trim().to_string(),
        }));
    }

    Ok(DeliveryMethod::MailCommand(MailCommandSettings {
        program: raw
            .mail_command
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MAIL_COMMAND.to_string()),
        from: (!from_email.is_empty()).then(|| from_email.to_string()),
        to: raw.email.trim().to_string(),
    }))
}
