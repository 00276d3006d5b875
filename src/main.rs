//! search-export
//!
//! Exports every document of the search indexes belonging to a subscription
//! into one XML file per document.
//!
//! # Usage
//!
//! ```bash
//! # Export all indexes into /tmp/as_export
//! search-export export /tmp/as_export
//!
//! # Export one index through a staging directory, compressed
//! search-export export /tmp/as_export -i ABCD-12345 -t /tmp/as_export_tmp -c
//! ```

use tracing::{Level, error, info};

use search_export::cli::{CliInterface, ExportArgs};
use search_export::client::{HttpAccountService, HttpSearchService};
use search_export::error::Result;
use search_export::export::ExportCoordinator;

/// Application entry point
#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Main application logic
///
/// # Returns
/// * `Result<bool>` - Whether every index was exported
async fn run() -> Result<bool> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    if cli.handle_subcommand()? {
        return Ok(true);
    }

    match cli.export_args() {
        Some(args) => run_export(&cli, args).await,
        None => Ok(true),
    }
}

/// Run the export subcommand
async fn run_export(cli: &CliInterface, args: &ExportArgs) -> Result<bool> {
    let config = cli.config();
    let account = HttpAccountService::new(&config.network)?;
    let search = HttpSearchService::new(&config.search)?;

    let coordinator = ExportCoordinator::new(
        &account,
        &search,
        cli.staging_layout(&args.path),
        config.export_options(cli.show_progress()),
    );

    let report = coordinator.run(args.index.as_deref()).await?;

    for failure in &report.failures {
        error!(
            "Index {} failed ({}): {}",
            failure.index_id,
            failure.error.kind(),
            failure.error
        );
    }
    info!(
        "Exported {} documents from {} indexes",
        report.total_documents(),
        report.indexes.len()
    );

    Ok(report.is_success())
}

/// Initialize logging system based on verbosity level
fn initialize_logging(cli: &CliInterface) {
    let level: Level = cli.config().logging.level.to_tracing_level();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
