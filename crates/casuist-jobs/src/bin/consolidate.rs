//! Offline consolidation runner.
//!
//! Connects to `DATABASE_URL`, runs the three repair passes, and exits
//! non-zero when any row could not be processed so operators can
//! schedule a retry.

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use casuist_db::Database;
use casuist_jobs::ConsolidationJob;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL is not set"))?;

    let db = Database::connect(&database_url).await?;
    let report = ConsolidationJob::new(db).run().await?;

    for pass in report.passes() {
        info!(
            op = pass.name,
            rows_examined = pass.examined,
            rows_removed = pass.removed,
            rows_failed = pass.failures.len(),
            "Pass summary"
        );
        for failure in &pass.failures {
            error!(op = pass.name, row = %failure.row, error = %failure.error, "Row failed");
        }
    }

    if let Some(partial) = report.as_partial_failure() {
        error!(error = %partial, "Consolidation finished with failures");
        std::process::exit(1);
    }

    info!(
        rows_removed = report.total_removed(),
        "Consolidation finished clean"
    );
    Ok(())
}
