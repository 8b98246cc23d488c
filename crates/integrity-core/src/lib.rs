//! File-integrity baseline and compare engine.
//!
//! A baseline records a SHA-256 (or BLAKE3) digest for every accepted file
//! under a target directory. A later scan recomputes the digests, reports
//! new, modified and removed files, and classifies each change as alertable
//! or whitelisted before the notification policy decides whether to alert.

pub mod baseline;
pub mod config;
pub mod diff;
pub mod digest;
pub mod error;
pub mod event_log;
pub mod notify;
pub mod scanner;
pub mod snapshot;
pub mod walker;
pub mod whitelist;

pub use baseline::BaselineStore;
pub use config::{Config, DeliveryMethod};
pub use diff::{diff, ChangeKind, ChangeRecord, ChangeSet, Classification};
pub use digest::{Digest, HashAlgorithm};
pub use error::{IntegrityError, Result};
pub use event_log::{EventLog, EventSeverity};
pub use notify::{Deliver, DeliveryStatus, Mailer, NotificationPolicy, ScanOutcome};
pub use scanner::IntegrityScanner;
pub use snapshot::Snapshot;
pub use walker::{ExtensionFilter, TreeWalker};
pub use whitelist::Whitelist;
