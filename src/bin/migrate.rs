//! Forecasts a chat-export migration and renders its report.
//!
//! Usage:
//!
//! ```text
//! migrate [--config <path>] [--admin <email>] <export-dir>
//! ```
//!
//! The export directory must contain `users.json`, `channels.json`, one
//! directory of day files per channel, and attachment payloads under
//! `__uploads/`. Configuration is YAML; every setting is optional.
//!
//! The run is driven against in-memory destination doubles, so nothing is
//! mutated anywhere: the output is a faithful forecast of what a live
//! destination adapter would be asked to do. The summary is printed to
//! stdout and the full report is written to `migration_report.json`.

use chatlift::migration::adapters::{FsExportReader, InMemoryFileApi, InMemorySpaceApi};
use chatlift::migration::domain::{MigrationConfig, MigrationContext};
use chatlift::migration::services::MigrationCoordinator;
use chatlift::report::{render_json, render_summary};
use mockable::DefaultClock;
use std::env;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use thiserror::Error;
use tokio::runtime::Builder;
use tracing::info;

const REPORT_PATH: &str = "migration_report.json";
const DEFAULT_ADMIN: &str = "admin@localhost";

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
enum MigrateError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("failed to read configuration at {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write report to {path}: {source}")]
    ReportWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("runtime init failed: {0}")]
    RuntimeInit(#[source] std::io::Error),
}

#[derive(Debug)]
struct Args {
    export_dir: String,
    config_path: Option<String>,
    admin: String,
}

impl Args {
    fn parse(mut raw: impl Iterator<Item = String>) -> Result<Self, MigrateError> {
        let mut positional = None;
        let mut config_path = None;
        let mut admin = None;

        while let Some(arg) = raw.next() {
            match arg.as_str() {
                "--config" => {
                    config_path = Some(raw.next().ok_or_else(|| {
                        MigrateError::InvalidArgs("--config needs a path".to_owned())
                    })?);
                }
                "--admin" => {
                    admin = Some(raw.next().ok_or_else(|| {
                        MigrateError::InvalidArgs("--admin needs an email".to_owned())
                    })?);
                }
                other if other.starts_with("--") => {
                    return Err(MigrateError::InvalidArgs(format!("unknown flag '{other}'")));
                }
                _ if positional.is_none() => positional = Some(arg),
                other => {
                    return Err(MigrateError::InvalidArgs(format!(
                        "unexpected argument '{other}'"
                    )));
                }
            }
        }

        let Some(export_dir) = positional else {
            return Err(MigrateError::InvalidArgs(
                "usage: migrate [--config <path>] [--admin <email>] <export-dir>".to_owned(),
            ));
        };
        Ok(Self {
            export_dir,
            config_path,
            admin: admin.unwrap_or_else(|| DEFAULT_ADMIN.to_owned()),
        })
    }
}

fn load_config(path: Option<&str>) -> Result<MigrationConfig, BoxError> {
    let Some(path) = path else {
        return Ok(MigrationConfig::default());
    };
    let raw = std::fs::read_to_string(path).map_err(|source| MigrateError::ConfigRead {
        path: path.to_owned(),
        source,
    })?;
    Ok(MigrationConfig::from_yaml(&raw)?)
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[expect(
    clippy::print_stdout,
    reason = "The summary is the binary's primary output"
)]
fn emit_summary(summary: &str) {
    println!("{summary}");
}

async fn run(args: Args, config: MigrationConfig) -> Result<(), BoxError> {
    let reader = FsExportReader::open(&args.export_dir)?;
    let context = MigrationContext::new(args.admin, args.export_dir, config, true);

    let clock = Arc::new(DefaultClock);
    let spaces = Arc::new(InMemorySpaceApi::new(Arc::clone(&clock)));
    let files = Arc::new(InMemoryFileApi::new());
    let coordinator = MigrationCoordinator::new(context, spaces, files, clock);

    let cancel = coordinator.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let report = coordinator.run(&reader).await?;
    std::fs::write(REPORT_PATH, render_json(&report)?).map_err(|source| {
        MigrateError::ReportWrite {
            path: REPORT_PATH.to_owned(),
            source,
        }
    })?;
    emit_summary(&render_summary(&report)?);
    info!(path = REPORT_PATH, "full report written");
    Ok(())
}

fn main() -> Result<(), BoxError> {
    init_tracing();
    let args = Args::parse(env::args().skip(1))?;
    let config = load_config(args.config_path.as_deref())?;

    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(MigrateError::RuntimeInit)?;
    runtime.block_on(run(args, config))
}
