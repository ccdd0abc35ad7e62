//! Run orchestration
//!
//! Wires the phases together: a best-effort speedboost request, catalog,
//! detail fetch, metric calculation, industry aggregation, then one
//! transactional commit. Each phase finishes completely before the next
//! starts.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::aggregate;
use crate::api::MarketDataProvider;
use crate::catalog;
use crate::database_sqlx::DatabaseManager;
use crate::fetcher::{self, FetchFailure};
use crate::metrics;
use crate::models::Config;

/// What one ETL run did
#[derive(Debug)]
pub struct RunSummary {
    pub run_timestamp: DateTime<Utc>,
    pub discovered: usize,
    pub fetched: usize,
    pub failures: Vec<FetchFailure>,
    pub industries_written: usize,
}

/// Execute one full ETL run.
///
/// Every row written by the run carries `run_timestamp`, captured once
/// here, so the snapshot and history tables can be joined on it later.
/// When nothing was discovered or nothing survived fetching, the run
/// returns a zeroed summary and the previous snapshot stays in place.
pub async fn run(
    provider: Arc<dyn MarketDataProvider>,
    database: &DatabaseManager,
    config: &Config,
    limit: Option<usize>,
) -> Result<RunSummary> {
    let run_timestamp = Utc::now();
    info!("🚀 Starting ETL run");

    // A rejected boost only means the run goes at the default rate
    if config.speedboost_enabled {
        if let Err(e) = provider.enable_speedboost().await {
            warn!(
                "⚠️ Speedboost request failed ({}), continuing at default rate",
                e
            );
        }
    } else {
        info!("Speedboost disabled, running at the default rate");
    }

    let working_set =
        catalog::fetch_working_set(provider.as_ref(), database, config, limit).await?;
    let discovered = working_set.len();

    if working_set.is_empty() {
        error!("❌ No tickers matched the configured industries; nothing to do");
        return Ok(RunSummary {
            run_timestamp,
            discovered,
            fetched: 0,
            failures: Vec::new(),
            industries_written: 0,
        });
    }

    let outcome = fetcher::fetch_details(Arc::clone(&provider), working_set, config).await?;

    // Profiles may carry fresher names than the catalog listing
    for record in &outcome.records {
        if let Some(profile) = &record.profile {
            database
                .refresh_ticker_profile(&record.symbol, profile)
                .await?;
        }
    }

    if outcome.records.is_empty() {
        error!("❌ Every ticker failed to fetch; leaving previous snapshot in place");
        return Ok(RunSummary {
            run_timestamp,
            discovered,
            fetched: 0,
            failures: outcome.failures,
            industries_written: 0,
        });
    }

    let ticker_stats =
        metrics::compute_all(outcome.records, config.compute_workers, run_timestamp).await?;
    let industry_stats = aggregate::aggregate_industries(&ticker_stats, run_timestamp);

    database.commit_run(&ticker_stats, &industry_stats).await?;

    let summary = RunSummary {
        run_timestamp,
        discovered,
        fetched: ticker_stats.len(),
        failures: outcome.failures,
        industries_written: industry_stats.len(),
    };

    info!(
        "✅ Run complete: {} discovered, {} fetched, {} dropped, {} industries",
        summary.discovered,
        summary.fetched,
        summary.failures.len(),
        summary.industries_written
    );

    Ok(summary)
}
