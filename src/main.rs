//! abr-export
//!
//! Runs the export described by a TOML job file:
//!
//! ```text
//! abr-export job.toml            # encode and write the master manifest
//! abr-export job.toml --dry-run  # print the ffmpeg command only
//! abr-export --init job.toml     # write an example job file
//! ```

use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use abr_export::config_file::{generate_default_config, ConfigFile};
use abr_export::{source, ExportConfig, Exporter, LocalDisk, MediaSource};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "abr-export";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.first().map(String::as_str) == Some("--init") {
        let path = args.get(1).map(String::as_str).unwrap_or("job.toml");
        return match generate_default_config(path) {
            Ok(()) => {
                println!("Wrote example job to {}", path);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to write {}: {}", path, e);
                ExitCode::FAILURE
            }
        };
    }

    let config_path = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .cloned()
        .unwrap_or_else(|| "job.toml".to_string());
    let dry_run = args.iter().any(|a| a == "--dry-run");

    let job = match ConfigFile::from_file(&config_path) {
        Ok(job) => job,
        Err(e) => {
            eprintln!("Failed to load job file {}: {}", config_path, e);
            return ExitCode::FAILURE;
        }
    };
    let config = job.to_export_config();

    init_logging(&config);
    tracing::info!("{} v{} starting", APP_NAME, VERSION);

    match run(&job, &config, dry_run) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Export failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(job: &ConfigFile, config: &ExportConfig, dry_run: bool) -> abr_export::Result<()> {
    source::init()?;
    let media = MediaSource::open(&job.job.input)?;

    let mut exporter = Exporter::from_config(media, config);
    if let Some(dir) = &job.job.output_dir {
        exporter.to_storage(LocalDisk::new(dir))?;
    }
    for representation in job.representations()? {
        exporter.add_representation(representation)?;
    }

    if dry_run {
        let command = exporter.command(&job.job.output)?;
        println!("{}", command.display_line(&config.encoder.binary));
        return Ok(());
    }

    let outcome = exporter.save(&job.job.output)?;
    tracing::info!(
        "Export complete: {:?} over {} sub-manifests",
        outcome.master_path,
        outcome.sub_manifests.len()
    );
    Ok(())
}

/// Initialize logging with tracing
fn init_logging(config: &ExportConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("abr_export={}", config.log_level).into());

    if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
