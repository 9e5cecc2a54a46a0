//! passferry command-line entry point
//!
//! Migrates an Enpass JSON export into a gopass store, a plain directory
//! store or a KeePass-style database file. Settings come from the config
//! file and are overridden by flags.

use anyhow::{Context, Result};
use clap::Parser;

use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use passferry_backend::{
    migrate_file, BackendError, CancelToken, Config, DestinationKind, MigrationReport,
    UserFriendlyError,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enpass JSON export to migrate
    source: PathBuf,

    /// Root path segment for every written secret
    #[arg(short, long)]
    prefix: Option<String>,

    /// Show what would change without writing or deleting anything
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Destination store kind
    #[arg(long, value_enum)]
    destination: Option<DestinationKind>,

    /// Root directory for the directory destination
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// YAML entry database for the keepass destination (not KDBX)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip items that fail to map instead of aborting
    #[arg(long)]
    continue_on_error: bool,
}

/// Load the configuration before logging is up; the warning is logged later
fn load_config(args: &Args) -> Result<(Config, Option<String>)> {
    match &args.config {
        Some(path) => {
            let config = Config::load(path)
                .with_context(|| format!("Failed to load config from {:?}", path))?;
            Ok((config, None))
        }
        None => {
            let path = Config::default_path();
            match Config::load(&path) {
                Ok(config) => Ok((config, None)),
                Err(e) => Ok((
                    Config::default(),
                    Some(format!(
                        "Failed to load config from {:?}: {}. Using defaults.",
                        path, e
                    )),
                )),
            }
        }
    }
}

/// Level from `--debug`, then `--log-level`, then the config file
fn resolve_log_level(args: &Args, config: &Config) -> (tracing::Level, Option<String>) {
    if args.debug {
        return (tracing::Level::DEBUG, None);
    }

    let requested = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());

    match requested.parse::<tracing::Level>() {
        Ok(level) => (level, None),
        Err(_) => (
            tracing::Level::INFO,
            Some(format!("Unknown log level {:?}, using info", requested)),
        ),
    }
}

fn init_logging(level: tracing::Level, json: bool) {
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_level(true)
    });
    let text_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_level(true)
    });

    tracing_subscriber::registry()
        .with(json_layer)
        .with(text_layer)
        .with(tracing_subscriber::filter::LevelFilter::from_level(level))
        .init();
}

/// Apply command-line overrides on top of the loaded configuration
fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(prefix) = &args.prefix {
        config.destination.prefix = prefix.trim_matches('/').to_string();
    }
    if let Some(kind) = args.destination {
        config.destination.kind = kind;
    }
    if let Some(dir) = &args.store_dir {
        config.destination.store_dir = Some(dir.clone());
    }
    if let Some(database) = &args.database {
        config.destination.database_path = Some(database.clone());
    }
    if args.dry_run {
        config.run.dry_run = true;
    }
    if args.continue_on_error {
        config.run.continue_on_error = true;
    }
}

/// Trip the cancel token on Ctrl-C or SIGTERM
fn spawn_signal_handler(cancel: CancelToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    warn!("Failed to register SIGTERM handler: {}", e);
                    if signal::ctrl_c().await.is_ok() {
                        info!("Received SIGINT, stopping migration");
                        cancel.cancel();
                    }
                    return;
                }
            };

            tokio::select! {
                _ = signal::ctrl_c() => info!("Received SIGINT, stopping migration"),
                _ = sigterm.recv() => info!("Received SIGTERM, stopping migration"),
            }
        }

        #[cfg(not(unix))]
        {
            if signal::ctrl_c().await.is_err() {
                return;
            }
            info!("Received Ctrl-C, stopping migration");
        }

        cancel.cancel();
    });
}

fn print_report(report: &MigrationReport, json: bool) {
    if json {
        match serde_json::to_string(report) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to serialize report: {}", e),
        }
    } else {
        println!("{}", report);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, load_warning) = load_config(&args)?;
    let (level, level_warning) = resolve_log_level(&args, &config);
    init_logging(level, config.logging.json_format);

    info!("Starting passferry v{}", env!("CARGO_PKG_VERSION"));
    for message in load_warning.iter().chain(level_warning.iter()) {
        warn!("{}", message);
    }

    apply_overrides(&mut config, &args);
    config
        .validate()
        .context("Configuration validation failed")?;
    info!("Configuration loaded and validated");

    let cancel = CancelToken::new();
    spawn_signal_handler(cancel.clone());

    let json = config.logging.json_format;
    let source = args.source.clone();
    let outcome = tokio::task::spawn_blocking(move || migrate_file(&config, &source, cancel))
        .await
        .context("Migration task failed")?;

    match outcome {
        Ok(report) => {
            print_report(&report, json);
            if report.cancelled {
                let error = BackendError::Cancelled;
                eprintln!("passferry: {}", error.user_message());
                return Err(error).context("Migration interrupted");
            }
            info!("Migration finished");
            Ok(())
        }
        Err(e) => {
            error!(category = %e.category(), "Migration failed: {}", e);
            eprintln!("passferry: {}", e.user_message());
            Err(e).with_context(|| format!("Failed to migrate {:?}", args.source))
        }
    }
}
