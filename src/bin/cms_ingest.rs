use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use cms_ingest::app::{App, RunOptions};
use cms_ingest::catalog::CatalogHttpClient;
use cms_ingest::config::ConfigLoader;
use cms_ingest::error::IngestError;
use cms_ingest::output::{JsonOutput, OutputMode, TextOutput};
use cms_ingest::sqlite::SqliteStore;
use cms_ingest::store::Store;

#[derive(Parser)]
#[command(name = "cms-ingest")]
#[command(about = "Download changed CMS provider-data CSV datasets and record them in a run log")]
#[command(version, author)]
struct Cli {
    #[arg(long, help = "Path to a JSON config file (default: ./cms-ingest.json if present)")]
    config: Option<String>,

    #[arg(long, help = "Print the run summary as JSON")]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<IngestError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &IngestError) -> u8 {
    match error {
        IngestError::ConfigRead(_) | IngestError::ConfigParse(_) | IngestError::InvalidConfig(_) => {
            2
        }
        IngestError::CatalogHttp(_)
        | IngestError::CatalogStatus { .. }
        | IngestError::CatalogParse(_) => 3,
        IngestError::RunFailed { .. } => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let store = Store::new(config.data_dir.clone());
    let catalog = CatalogHttpClient::new(&config.catalog_url, config.request_timeout)?;
    let sqlite = Arc::new(SqliteStore::open(&config.database)?);
    let app = App::new(store, catalog, Arc::clone(&sqlite), sqlite);

    let summary = app.run(&RunOptions {
        theme: config.theme.clone(),
        concurrency: config.concurrency,
    })?;

    match output_mode {
        OutputMode::Json => JsonOutput::print_summary(&summary).into_diagnostic()?,
        OutputMode::Text => TextOutput::print_summary(&summary).into_diagnostic()?,
    }

    if !summary.is_success() {
        return Err(IngestError::RunFailed {
            failed: summary.failed,
            total: summary.items.len(),
        }
        .into());
    }
    Ok(())
}
