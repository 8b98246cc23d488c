use crate::config::MailCommandSettings;
use crate::error::{IntegrityError, Result};
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use tracing::debug;

/// Local mail transport, invoked as `mail -s SUBJECT [-a "From: F"] TO`
/// with the body on stdin.
#[derive(Debug, Clone)]
pub struct MailCommand {
    settings: MailCommandSettings,
}

/// Why a mail command run did not deliver.
#[derive(Debug)]
pub enum MailCommandError {
    NotFound,
    Failed(IntegrityError),
}

impl MailCommand {
    pub fn new(settings: MailCommandSettings) -> Self {
        Self { settings }
    }

    pub fn args(&self, subject: &str) -> Vec<String> {
        let mut args = vec!["-s".to_string(), subject.to_string()];
        if let Some(from) = &self.settings.from {
            // mailutils accepts -a to add a header
            args.push("-a".to_string());
            args.push(format!("From: {from}"));
        }
        args.push(self.settings.to.clone());
        args
    }

    pub fn send(&self, subject: &str, body: &str) -> std::result::Result<(), MailCommandError> {
        let failed = |msg: String| MailCommandError::Failed(IntegrityError::Delivery(msg));
        debug!("Running {} for alert delivery", self.settings.program);
        let mut child = match Command::new(&self.settings.program)
            .args(self.args(subject))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(MailCommandError::NotFound),
            Err(e) => return Err(failed(format!("spawn {}: {e}", self.settings.program))),
        };

        let write_result: Result<()> = match child.stdin.take() {
            Some(mut stdin) => stdin
                .write_all(body.as_bytes())
                .map_err(|e| IntegrityError::Delivery(format!("writing body: {e}"))),
            None => Err(IntegrityError::Delivery("stdin unavailable".to_string())),
        };

        let output = child
            .wait_with_output()
            .map_err(|e| failed(format!("waiting for {}: {e}", self.settings.program)))?;
        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(failed(format!("{}: {}", output.status, combined.trim())));
        }
        write_result.map_err(MailCommandError::Failed)
    }
}
