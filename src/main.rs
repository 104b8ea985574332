use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{error, info, info_span, warn};

use dynamodb_backup_rotation::cli::Args;
use dynamodb_backup_rotation::config::RetentionConfig;
use dynamodb_backup_rotation::dynamodb::DynamoDbCatalog;
use dynamodb_backup_rotation::logging;
use dynamodb_backup_rotation::rotation::Rotator;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.log_format, args.log_level);

    let _span = info_span!("dynamodb_backup_rotation").entered();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "DynamoDB backup rotation started"
    );

    // Fail fast before any table is touched
    let config = match RetentionConfig::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e).context("Failed to load configuration");
        }
    };

    let catalog = DynamoDbCatalog::new(args.region.as_deref()).await;
    config.display(catalog.region());

    let rotator = Rotator::new(&catalog, &config);

    // Dropping the rotation future cancels every in-flight request
    let summary = tokio::select! {
        summary = rotator.run() => summary,
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, cancelling in-flight backup requests");
            bail!("Backup rotation interrupted by shutdown signal");
        }
    };

    info!(
        status = %summary.status,
        table_count = summary.tables.len(),
        failed_count = summary.failed_tables().len(),
        deleted_count = summary.total_deleted(),
        total_execution_seconds = summary.total_execution_time_seconds,
        "Execution summary"
    );

    println!("{}", serde_json::to_string_pretty(&summary)?);

    match summary.into_result() {
        Ok(summary) => {
            info!(
                status = "success",
                total_execution_seconds = summary.total_execution_time_seconds,
                "Backup rotation completed successfully"
            );
            Ok(())
        }
        Err(e) => {
            error!(status = "failed", error = %e, "Backup rotation failed");
            Err(e.into())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
