mod config;
mod error;
mod job_controller;
mod pipeline;
mod services;
mod store;

use crate::config::{AppConfig, DEFAULT_CONFIG_FILE};
use crate::job_controller::state::JobsState;
use crate::pipeline::notifier::LogNotifier;
use crate::pipeline::orchestrator::{failure_report, PipelineOrchestrator};
use crate::pipeline::reporter::CsvReportExporter;
use crate::pipeline::{parser, PipelineConfig, RawUpload};
use crate::services::mass_update::report::ReportLocation;
use crate::store::sqlite::SqliteRecordStore;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "epos-mass-update", version, about = "Bulk update EPOS records from a CSV of IDs")]
struct Cli {
    /// Configuration file (TOML). Missing files fall back to defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Maximum number of CSV rows, header included
    #[arg(long, global = true)]
    max_rows: Option<usize>,

    /// Maximum CSV size in bytes
    #[arg(long, global = true)]
    max_file_size: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Run one mass update over a CSV file. Exits non-zero if the update fails.
    Apply {
        file: PathBuf,
        /// Update option to apply; repeat for several
        #[arg(long = "option", short = 'o')]
        options: Vec<String>,
    },
    /// Add the IDs of a CSV file to the record store
    Import { file: PathBuf },
}

#[actix_web::main]
async fn main() -> ExitCode {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = AppConfig::load(&cli.config)?;
    config.apply_cli_overrides(cli.max_rows, cli.max_file_size);
    config.validate()?;

    let store = SqliteRecordStore::open(&config.store.database_path).with_context(|| {
        format!(
            "Failed to open record store {}",
            config.store.database_path.display()
        )
    })?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            serve(&config, store).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Apply { file, options } => {
            let done = apply(&config, store, &file, options).await?;
            Ok(if done {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Import { file } => {
            import(&config, &store, &file)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_orchestrator(config: &AppConfig, store: SqliteRecordStore) -> Arc<PipelineOrchestrator> {
    let store = Arc::new(store);
    Arc::new(PipelineOrchestrator::new(
        PipelineConfig::from(config),
        store.clone(),
        store,
        Arc::new(CsvReportExporter::new(
            &config.report.output_dir,
            &config.report.file_name,
        )),
        Arc::new(LogNotifier),
    ))
}

async fn serve(config: &AppConfig, store: SqliteRecordStore) -> Result<()> {
    let host = config.server.host.clone();
    let port = config.server.port;
    let orchestrator = build_orchestrator(config, store);
    let report_location = ReportLocation(config.report_path());

    // Initialize job controller state
    let (jobs_state, rx) = JobsState::new(100);

    // Start job updater task
    let updater_state = jobs_state.clone();
    tokio::spawn(async move {
        job_controller::state::start_job_updater(updater_state, rx).await;
    });

    info!("Server running at http://{}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(jobs_state.clone()))
            .app_data(web::Data::from(Arc::clone(&orchestrator)))
            .app_data(web::Data::new(report_location.clone()))
            .service(services::mass_update::configure_routes())
    })
    .bind((host.as_str(), port))
    .with_context(|| format!("Failed to bind {}:{}", host, port))?
    .run()
    .await?;
    Ok(())
}

/// Runs one cycle and prints its outcome as JSON. Returns whether it reached `Done`.
async fn apply(
    config: &AppConfig,
    store: SqliteRecordStore,
    file: &Path,
    options: Vec<String>,
) -> Result<bool> {
    let orchestrator = build_orchestrator(config, store);
    let upload = read_upload(file, config.limits.max_file_size_bytes)?;

    for option in &options {
        orchestrator.toggle_option(option, true);
    }
    let outcome = match orchestrator.select_file(upload) {
        Ok(()) => orchestrator.submit().await,
        Err(err) => Err(err),
    };

    match outcome {
        Ok(summary) => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(true)
        }
        Err(err) => {
            println!("{}", serde_json::to_string_pretty(&failure_report(&err))?);
            Ok(false)
        }
    }
}

fn import(config: &AppConfig, store: &SqliteRecordStore, file: &Path) -> Result<()> {
    let upload = read_upload(file, config.limits.max_file_size_bytes)?;
    if upload.declared_size() > config.limits.max_file_size_bytes {
        anyhow::bail!(
            "{} is {} bytes, larger than the {} byte limit",
            file.display(),
            upload.declared_size(),
            config.limits.max_file_size_bytes
        );
    }
    let ids = parser::parse(&upload, config.limits.max_rows)?;
    let inserted = store.insert_records(ids.as_slice())?;
    info!(
        "Imported {} new records ({} ids read from {})",
        inserted,
        ids.len(),
        file.display()
    );
    Ok(())
}

/// Reads at most `limit` bytes of `path`; the declared size is the full file size.
fn read_upload(path: &Path, limit: u64) -> Result<RawUpload> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let size = file.metadata()?.len();
    let mut bytes = Vec::new();
    file.take(limit).read_to_end(&mut bytes)?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(RawUpload::with_declared_size(file_name, size, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["epos-mass-update"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn apply_collects_repeated_options() {
        let cli = Cli::try_parse_from([
            "epos-mass-update",
            "apply",
            "ids.csv",
            "--option",
            "price",
            "-o",
            "status",
            "--max-rows",
            "20",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Apply {
                file: PathBuf::from("ids.csv"),
                options: vec!["price".to_string(), "status".to_string()],
            })
        );
        assert_eq!(cli.max_rows, Some(20));
    }

    #[test]
    fn read_upload_truncates_but_reports_full_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.csv");
        fs::write(&path, "Id\nA001\nA002\n").unwrap();

        let upload = read_upload(&path, 5).unwrap();

        assert_eq!(upload.file_name(), "ids.csv");
        assert_eq!(upload.declared_size(), 14);
        assert_eq!(upload.bytes(), b"Id\nA0");
    }

    #[actix_web::test]
    async fn apply_reports_cycle_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.report.output_dir = dir.path().to_path_buf();
        let store = SqliteRecordStore::open(dir.path().join("records.sqlite")).unwrap();
        store.insert_records(&["A001".to_string()]).unwrap();

        let good = dir.path().join("good.csv");
        fs::write(&good, "Id\nA001\nA404\n").unwrap();
        let done = apply(&config, store.clone(), &good, vec!["price".into()])
            .await
            .unwrap();
        assert!(done);
        assert_eq!(store.record("A001").unwrap().unwrap().update_count, 1);
        assert!(config.report_path().exists());

        config.limits.max_rows = 1;
        let done = apply(&config, store, &good, Vec::new()).await.unwrap();
        assert!(!done);
    }

    #[test]
    fn import_seeds_the_store_from_the_first_column() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteRecordStore::open(dir.path().join("records.sqlite")).unwrap();
        let path = dir.path().join("seed.csv");
        fs::write(&path, "Id,Name\nA001,x\nA002,y\n\n").unwrap();

        import(&AppConfig::default(), &store, &path).unwrap();

        assert!(store.record("A001").unwrap().is_some());
        assert!(store.record("A002").unwrap().is_some());
    }
}
