use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use integrity_core::config::{Config, DEFAULT_CONFIG_PATH};
use integrity_core::{
    BaselineStore, EventLog, EventSeverity, ExtensionFilter, IntegrityScanner, Mailer,
    NotificationPolicy, ScanOutcome, Whitelist,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_EXTENSIONS: &str = ".php";

#[derive(Parser, Debug)]
#[command(name = "integrity", author, version, about = "File integrity baseline and scanner", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Comma-separated list of file extensions to scan (e.g. .php,.html)
    #[arg(long, global = true)]
    ext: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Regenerate the integrity file from the target directory
    Regenerate,
    /// Scan for file changes against the integrity file
    Scan,
    /// Validate the configuration and print what it resolves to
    ShowConfig,
    /// Print recent event log entries
    Events {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Verify the event log hash chain
    VerifyLog,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config).context("Error loading configuration")?;
    match cli.command {
        Commands::Regenerate => regenerate_command(&config, cli.ext.as_deref()),
        Commands::Scan => scan_command(&config, cli.ext.as_deref()),
        Commands::ShowConfig => show_config_command(&config, cli.ext.as_deref()),
        Commands::Events { limit } => events_command(&config, limit),
        Commands::VerifyLog => verify_log_command(&config),
    }
}

fn extension_filter(config: &Config, ext: Option<&str>) -> ExtensionFilter {
    match (ext, &config.extensions) {
        (Some(list), _) => ExtensionFilter::parse(list),
        (None, Some(list)) => ExtensionFilter::new(list),
        (None, None) => ExtensionFilter::parse(DEFAULT_EXTENSIONS),
    }
}

fn scanner(config: &Config, ext: Option<&str>) -> Result<IntegrityScanner> {
    let filter = extension_filter(config, ext);
    if filter.suffixes().is_empty() {
        return Err(anyhow!("no file extensions to scan"));
    }
    Ok(IntegrityScanner::new(
        &config.target_dir,
        filter,
        config.hash_algorithm,
    ))
}

fn event_log(config: &Config) -> EventLog {
    EventLog::new(&config.log_file, config.log_max_bytes)
}

fn regenerate_command(config: &Config, ext: Option<&str>) -> Result<()> {
    let scanner = scanner(config, ext)?;
    let store = BaselineStore::new(&config.integrity_file);
    let count = scanner
        .regenerate(&store)
        .context("Error during integrity file generation")?;

    let log = event_log(config);
    if let Err(e) = log.append(
        "REGENERATED",
        EventSeverity::Info,
        &format!("Integrity file regenerated ({count} files)."),
    ) {
        tracing::error!("Failed to write log: {}", e);
    }
    println!("Integrity file regenerated ({count} files).");
    Ok(())
}

fn scan_command(config: &Config, ext: Option<&str>) -> Result<()> {
    let scanner = scanner(config, ext)?;
    let store = BaselineStore::new(&config.integrity_file);
    let whitelist = Whitelist::new(&config.whitelist);
    let changes = scanner
        .scan(&store, &whitelist)
        .context("Error during scanning")?;

    let log = event_log(config);
    let mailer = Mailer::from_method(&config.delivery);
    let policy = NotificationPolicy::new(&log, &mailer, config.alert_subject.as_str());
    let outcome = policy.report(&changes);
    info!("Scan outcome: {:?}", outcome);

    match outcome {
        ScanOutcome::NoChanges => println!("No changes detected."),
        ScanOutcome::WhitelistedOnly => {
            println!("Whitelisted changes only. Check log for details.")
        }
        ScanOutcome::Alerted(_) => println!("Changes detected. Check log for details."),
    }
    Ok(())
}

fn show_config_command(config: &Config, ext: Option<&str>) -> Result<()> {
    let filter = extension_filter(config, ext);
    println!("target_dir:     {}", config.target_dir.display());
    println!("integrity_file: {}", config.integrity_file.display());
    println!("log_file:       {}", config.log_file.display());
    println!("hash_algorithm: {}", config.hash_algorithm.as_str());
    println!("extensions:     {}", filter.suffixes().join(","));
    println!("delivery:       {}", config.delivery.describe());
    let whitelist = Whitelist::new(&config.whitelist);
    println!(
        "whitelist:      {} pattern(s) [{}]",
        whitelist.len(),
        whitelist.patterns().collect::<Vec<_>>().join(", ")
    );
    Ok(())
}

fn events_command(config: &Config, limit: usize) -> Result<()> {
    let log = event_log(config);
    let entries = log.read_recent(Some(limit))?;
    if entries.is_empty() {
        println!("No events recorded.");
        return Ok(());
    }
    for entry in entries.iter().rev() {
        println!(
            "{} #{} {:?} {} - {}",
            entry.timestamp.to_rfc3339(),
            entry.seq,
            entry.severity,
            entry.event_type,
            entry.message.trim_end()
        );
    }
    Ok(())
}

fn verify_log_command(config: &Config) -> Result<()> {
    let log = event_log(config);
    let report = log.verify_chain()?;
    match report.broken_at {
        None => {
            println!("Event log intact ({} entries).", report.entries);
            Ok(())
        }
        Some(seq) => Err(anyhow!(
            "event log chain broken at entry {} of {}",
            seq,
            log.path().display()
        )),
    }
}
