//! Symbol catalog fetching
//!
//! Pulls the full exchange listing once, keeps only symbols in the
//! configured industries, and upserts each survivor into the ticker
//! master table. The returned working set drives the detail fetch.

use std::collections::HashSet;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::api::MarketDataProvider;
use crate::database_sqlx::DatabaseManager;
use crate::models::{Config, Ticker};

/// Fetch the working set for this run.
///
/// The catalog call itself goes through the client retry policy; if it
/// still fails the whole run is over, since there is nothing to fetch.
/// `limit` truncates the working set after filtering, so a limited run
/// still records every discovered ticker in the master table.
pub async fn fetch_working_set(
    provider: &dyn MarketDataProvider,
    database: &DatabaseManager,
    config: &Config,
    limit: Option<usize>,
) -> Result<Vec<Ticker>> {
    info!("📋 Fetching symbol catalog");
    let entries = provider
        .get_symbols()
        .await
        .context("Failed to fetch symbol catalog")?;
    info!("📋 Catalog lists {} symbols", entries.len());

    let mut seen: HashSet<String> = HashSet::new();
    let mut working_set = Vec::new();

    for entry in entries {
        let industry = match entry.industry {
            Some(industry) => industry,
            None => continue,
        };
        if !config.industries.contains(&industry) {
            continue;
        }
        if !seen.insert(entry.symbol.clone()) {
            warn!("⚠️ Duplicate catalog entry for {}, keeping first", entry.symbol);
            continue;
        }

        let mut ticker = Ticker {
            id: None,
            symbol: entry.symbol,
            company_name: entry.company_name,
            industry,
            exchange: entry.exchange,
        };
        let id = database.upsert_ticker(&ticker).await?;
        ticker.id = Some(id);
        working_set.push(ticker);
    }

    info!(
        "📊 {} tickers match the configured industries",
        working_set.len()
    );

    if let Some(limit) = limit {
        if working_set.len() > limit {
            info!("🔢 Limiting working set to first {} tickers", limit);
            working_set.truncate(limit);
        }
    }

    Ok(working_set)
}
