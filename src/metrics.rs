//! Per-ticker metric calculation
//!
//! Pure arithmetic over already-fetched records. Every metric is
//! `Option<f64>`: when an input is missing or a denominator is zero the
//! metric is None, never a defaulted zero, so downstream aggregation
//! can tell "no data" apart from "measured zero".

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::models::{TickerMetrics, TickerRecord};

/// Compute all metrics for one ticker record
pub fn compute_metrics(record: &TickerRecord, calculated_at: DateTime<Utc>) -> TickerMetrics {
    let quarters = &record.income_quarters;

    let latest_eps = quarters.first().and_then(|q| q.eps);
    let pe_ratio = match (record.latest_price, latest_eps) {
        (Some(price), Some(eps)) if eps != 0.0 => Some(price / eps),
        _ => None,
    };

    let revenue_growth = match (
        quarters.first().and_then(|q| q.revenue),
        quarters.get(1).and_then(|q| q.revenue),
    ) {
        (Some(current), Some(previous)) if previous != 0.0 => {
            Some((current - previous) / previous)
        }
        _ => None,
    };

    let net_income_ttm = if quarters.len() >= 4 {
        let values: Vec<f64> = quarters
            .iter()
            .take(4)
            .filter_map(|q| q.net_income)
            .collect();
        if values.len() == 4 {
            Some(values.iter().sum())
        } else {
            None
        }
    } else {
        None
    };

    let debt_ratio = record.balance_years.first().and_then(|year| {
        match (year.total_debt, year.total_equity) {
            (Some(debt), Some(equity)) if equity != 0.0 => Some(debt / equity),
            _ => None,
        }
    });

    let latest_revenue = quarters.first().and_then(|q| q.revenue);

    TickerMetrics {
        symbol: record.symbol.clone(),
        industry: record.industry.clone(),
        pe_ratio,
        revenue_growth,
        net_income_ttm,
        debt_ratio,
        latest_revenue,
        calculated_at,
    }
}

/// Compute metrics for every record across a bounded concurrent stream.
///
/// The calculation phase has its own concurrency cap, independent of
/// the fetch pool; the stream is fully drained before returning, so
/// aggregation always sees the complete cohort.
pub async fn compute_all(
    records: Vec<TickerRecord>,
    workers: usize,
    calculated_at: DateTime<Utc>,
) -> Result<Vec<TickerMetrics>> {
    let total = records.len();
    let workers = workers.max(1);
    info!(
        "🧮 Calculating metrics with {} workers for {} tickers",
        workers, total
    );

    let mut in_flight = stream::iter(records)
        .map(|record| async move { compute_metrics(&record, calculated_at) })
        .buffer_unordered(workers);

    let mut results = Vec::with_capacity(total);
    while let Some(metrics) = in_flight.next().await {
        debug!("✅ Calculated {}", metrics.symbol);
        results.push(metrics);
    }
    results.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    info!("✅ Metric calculation completed for {} tickers", results.len());
    Ok(results)
}
