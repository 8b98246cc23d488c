//! End-to-end tests for the `integrity` binary.
//!
//! Each test builds a throwaway target tree and config in a temp dir and
//! runs regenerate/scan the way a cron job would.

use predicates::prelude::*;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(extra: serde_json::Value) -> Self {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("www")).unwrap();
        let mut config = serde_json::json!({
            "target_dir": dir.path().join("www"),
            "integrity_file": dir.path().join("integrity.txt"),
            "log_file": dir.path().join("integrity.log"),
        });
        if let (Some(obj), Some(extra)) = (config.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                obj.insert(k.clone(), v.clone());
            }
        }
        fs::write(
            dir.path().join("config.json"),
            serde_json::to_vec_pretty(&config).unwrap(),
        )
        .unwrap();
        Self { dir }
    }

    fn target(&self) -> PathBuf {
        self.dir.path().join("www")
    }

    fn key(&self, rel: &str) -> String {
        self.target().join(rel).display().to_string()
    }

    fn write(&self, rel: &str, content: &[u8]) {
        let path = self.target().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn cmd(&self, sub: &str) -> assert_cmd::Command {
        let mut cmd = assert_cmd::Command::cargo_bin("integrity").unwrap();
        cmd.arg("--config").arg(self.dir.path().join("config.json")).arg(sub);
        cmd
    }

    fn baseline(&self) -> String {
        fs::read_to_string(self.dir.path().join("integrity.txt")).unwrap()
    }

    fn log_messages(&self) -> Vec<(String, String)> {
        let path = self.dir.path().join("integrity.log");
        fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .map(|line| {
                let v: serde_json::Value = serde_json::from_str(line).unwrap();
                (
                    v["event_type"].as_str().unwrap().to_string(),
                    v["message"].as_str().unwrap().to_string(),
                )
            })
            .collect()
    }
}

fn sha256_hex(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

#[test]
fn empty_directory_regenerates_and_scans_clean() {
    let fx = Fixture::new(serde_json::json!({}));
    fx.cmd("regenerate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Integrity file regenerated (0 files)."));
    assert_eq!(fx.baseline(), "");

    fx.cmd("scan")
        .assert()
        .success()
        .stdout(predicate::str::contains("No changes detected."));
    let logged = fx.log_messages();
    assert_eq!(logged.last().unwrap().1, "No changes detected.");
}

#[test]
fn baseline_file_format() {
    let fx = Fixture::new(serde_json::json!({}));
    fx.write("index.php", b"<?php echo 'hi';");
    fx.write("lib/with space.php", b"<?php // lib");
    fx.write("style.css", b"body {}");
    fx.cmd("regenerate").assert().success();

    let expected = format!(
        "{}  {}\n{}  {}\n",
        sha256_hex(b"<?php echo 'hi';"),
        fx.key("index.php"),
        sha256_hex(b"<?php // lib"),
        fx.key("lib/with space.php"),
    );
    assert_eq!(fx.baseline(), expected);
}

#[test]
fn new_file_is_reported() {
    let fx = Fixture::new(serde_json::json!({}));
    fx.write("a.php", b"one");
    fx.cmd("regenerate").assert().success();
    fx.write("b.php", b"two");

    fx.cmd("scan")
        .assert()
        .success()
        .stdout(predicate::str::contains("Changes detected. Check log for details."));

    let logged = fx.log_messages();
    let changes = logged.iter().find(|(t, _)| t == "CHANGES_DETECTED").unwrap();
    assert_eq!(
        changes.1,
        format!("Discrepancies found:\nNew file detected: {}\n", fx.key("b.php"))
    );
    assert_eq!(
        logged.last().unwrap(),
        &(
            "NOTIFICATION_SKIPPED".to_string(),
            "Email notification skipped: no valid email method configured".to_string()
        )
    );
}

#[test]
fn whitelisted_modification_is_logged_only() {
    let fx = Fixture::new(serde_json::json!({ "whitelist": ["a.php"] }));
    fx.write("a.php", b"one");
    fx.cmd("regenerate").assert().success();
    fx.write("a.php", b"two");

    fx.cmd("scan")
        .assert()
        .success()
        .stdout(predicate::str::contains("Whitelisted changes only."));

    let logged = fx.log_messages();
    assert_eq!(
        logged.last().unwrap().1,
        format!(
            "Whitelisted changes (no notification sent):\nWhitelisted modified file: {}\n",
            fx.key("a.php")
        )
    );
    assert!(!logged.iter().any(|(t, _)| t.starts_with("NOTIFICATION")));
}

#[test]
fn whitelisted_removal_skips_notification() {
    let fx = Fixture::new(serde_json::json!({ "whitelist": ["*.tmp"] }));
    fx.write("a.php", b"one");
    fx.write("temp/x.tmp", b"scratch");
    fx.cmd("--ext").arg(".php,.tmp").arg("regenerate").assert().success();
    fs::remove_file(fx.target().join("temp/x.tmp")).unwrap();

    fx.cmd("--ext")
        .arg(".php,.tmp")
        .arg("scan")
        .assert()
        .success()
        .stdout(predicate::str::contains("Whitelisted changes only."));

    let logged = fx.log_messages();
    assert!(logged
        .last()
        .unwrap()
        .1
        .contains(&format!("Whitelisted file removed: {}", fx.key("temp/x.tmp"))));
}

#[test]
fn extension_filter_limits_scope() {
    let fx = Fixture::new(serde_json::json!({}));
    fx.write("a.php", b"one");
    fx.write("notes.txt", b"draft");
    fx.cmd("regenerate").assert().success();
    fx.write("notes.txt", b"edited");
    fx.write("new.html", b"<html>");

    fx.cmd("scan")
        .assert()
        .success()
        .stdout(predicate::str::contains("No changes detected."));
}

#[test]
fn extensions_from_config() {
    let fx = Fixture::new(serde_json::json!({ "extensions": ["html"] }));
    fx.write("a.php", b"one");
    fx.write("b.html", b"two");
    fx.cmd("regenerate").assert().success();
    assert!(fx.baseline().contains(&fx.key("b.html")));
    assert!(!fx.baseline().contains(&fx.key("a.php")));
}

#[test]
fn scan_without_baseline_fails() {
    let fx = Fixture::new(serde_json::json!({}));
    fx.cmd("scan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error during scanning"));
}

#[test]
fn missing_config_fails_before_any_work() {
    let dir = tempdir().unwrap();
    let mut cmd = assert_cmd::Command::cargo_bin("integrity").unwrap();
    cmd.arg("--config")
        .arg(dir.path().join("absent.json"))
        .arg("regenerate");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Error loading configuration"));
}

#[test]
fn missing_target_fails_regenerate() {
    let fx = Fixture::new(serde_json::json!({}));
    fs::remove_dir(fx.target()).unwrap();
    fx.cmd("regenerate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error during integrity file generation"));
    assert!(!Path::new(&fx.dir.path().join("integrity.txt")).exists());
}

#[test]
fn log_chain_verifies_and_events_list() {
    let fx = Fixture::new(serde_json::json!({}));
    fx.write("a.php", b"one");
    fx.cmd("regenerate").assert().success();
    fx.cmd("scan").assert().success();

    fx.cmd("verify-log")
        .assert()
        .success()
        .stdout(predicate::str::contains("Event log intact (2 entries)."));
    fx.cmd("events")
        .assert()
        .success()
        .stdout(predicate::str::contains("REGENERATED"))
        .stdout(predicate::str::contains("NO_CHANGES"));

    let log_path = fx.dir.path().join("integrity.log");
    let text = fs::read_to_string(&log_path).unwrap();
    fs::write(&log_path, text.replace("1 files", "9 files")).unwrap();
    fx.cmd("verify-log")
        .assert()
        .failure()
        .stderr(predicate::str::contains("chain broken at entry 1"));
}

#[test]
fn show_config_hides_password() {
    let fx = Fixture::new(serde_json::json!({
        "email": "ops@example.com",
        "email_method": "smtp",
        "smtp_server": "mail.example.com",
        "smtp_port": "587",
        "smtp_user": "bot@example.com",
        "smtp_pass": "hunter2",
        "whitelist": ["*.tmp", "[bad"]
    }));
    fx.cmd("show-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("smtp mail.example.com:587 -> ops@example.com"))
        .stdout(predicate::str::contains("1 pattern(s) [*.tmp]"))
        .stdout(predicate::str::contains("hunter2").not());
}

/// Shell script standing in for `mail`: writes its arguments and stdin to
/// `mail.out` next to itself.
#[cfg(unix)]
fn fake_mail(dir: &Path) -> (PathBuf, PathBuf) {
    use std::os::unix::fs::PermissionsExt;

    let captured = dir.join("mail.out");
    let script = dir.join("fake-mail");
    fs::write(
        &script,
        format!("#!/bin/sh\necho \"$@\" > '{0}'\ncat >> '{0}'\n", captured.display()),
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    (script, captured)
}

#[cfg(unix)]
#[test]
fn mail_command_receives_alert() {
    let dir = tempdir().unwrap();
    let (script, captured) = fake_mail(dir.path());

    let fx = Fixture::new(serde_json::json!({
        "email": "ops@example.com",
        "email_method": "mailcmd",
        "mail_command": script,
        "alert_subject": "PHP Integrity Alert",
    }));
    fx.write("a.php", b"one");
    fx.cmd("regenerate").assert().success();
    fx.write("a.php", b"two");
    fx.cmd("scan").assert().success();

    assert_eq!(
        fs::read_to_string(&captured).unwrap(),
        format!(
            "-s PHP Integrity Alert ops@example.com\nModified file: {}\n",
            fx.key("a.php")
        )
    );
    assert_eq!(
        fx.log_messages().last().unwrap().1,
        "Email notification sent via mail command"
    );
}

#[cfg(unix)]
#[test]
fn unusable_log_file_still_alerts() {
    let dir = tempdir().unwrap();
    let (script, captured) = fake_mail(dir.path());
    let log_dir = dir.path().join("logdir");
    fs::create_dir(&log_dir).unwrap();

    let fx = Fixture::new(serde_json::json!({
        "email": "ops@example.com",
        "email_method": "mailcmd",
        "mail_command": script,
        "log_file": log_dir,
    }));
    fx.write("a.php", b"one");
    fx.cmd("regenerate").assert().success();
    fx.write("shell.php", b"evil");

    fx.cmd("scan")
        .assert()
        .success()
        .stdout(predicate::str::contains("Changes detected."));
    assert_eq!(
        fs::read_to_string(&captured).unwrap(),
        format!(
            "-s File Integrity Alert ops@example.com\nNew file detected: {}\n",
            fx.key("shell.php")
        )
    );
}
