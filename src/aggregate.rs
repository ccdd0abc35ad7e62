//! Industry-level aggregation
//!
//! Rolls per-ticker metrics up into one row per industry. Null metrics
//! are excluded from averages and sums; an industry where every ticker
//! is null for a metric gets null for the aggregate, not zero.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::models::{IndustryMetrics, TickerMetrics};

/// Aggregate ticker metrics per industry, sorted by industry name
pub fn aggregate_industries(
    metrics: &[TickerMetrics],
    calculated_at: DateTime<Utc>,
) -> Vec<IndustryMetrics> {
    let mut by_industry: BTreeMap<&str, Vec<&TickerMetrics>> = BTreeMap::new();
    for m in metrics {
        by_industry.entry(m.industry.as_str()).or_default().push(m);
    }

    let results: Vec<IndustryMetrics> = by_industry
        .into_iter()
        .map(|(industry, members)| {
            let pe_values: Vec<f64> = members.iter().filter_map(|m| m.pe_ratio).collect();
            let growth_values: Vec<f64> =
                members.iter().filter_map(|m| m.revenue_growth).collect();
            let revenue_values: Vec<f64> =
                members.iter().filter_map(|m| m.latest_revenue).collect();

            IndustryMetrics {
                industry: industry.to_string(),
                avg_pe_ratio: mean(&pe_values),
                avg_revenue_growth: mean(&growth_values),
                total_revenue: sum(&revenue_values),
                calculated_at,
            }
        })
        .collect();

    info!("📊 Aggregated {} industries", results.len());
    results
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn sum(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticker_metrics(
        symbol: &str,
        industry: &str,
        pe_ratio: Option<f64>,
        revenue_growth: Option<f64>,
        latest_revenue: Option<f64>,
    ) -> TickerMetrics {
        TickerMetrics {
            symbol: symbol.to_string(),
            industry: industry.to_string(),
            pe_ratio,
            revenue_growth,
            net_income_ttm: None,
            debt_ratio: None,
            latest_revenue,
            calculated_at: Utc::now(),
        }
    }

    #[test]
    fn test_average_skips_null_members() {
        let metrics = vec![
            ticker_metrics("A", "Software - Application", Some(10.0), None, None),
            ticker_metrics("B", "Software - Application", Some(20.0), None, None),
            ticker_metrics("C", "Software - Application", None, None, None),
        ];
        let rows = aggregate_industries(&metrics, Utc::now());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].avg_pe_ratio, Some(15.0));
    }

    #[test]
    fn test_total_revenue_sums_known_values() {
        let metrics = vec![
            ticker_metrics("A", "Banks - Diversified", None, None, Some(100.0)),
            ticker_metrics("B", "Banks - Diversified", None, None, None),
            ticker_metrics("C", "Banks - Diversified", None, None, Some(200.0)),
        ];
        let rows = aggregate_industries(&metrics, Utc::now());
        assert_eq!(rows[0].total_revenue, Some(300.0));
    }

    #[test]
    fn test_all_null_metric_aggregates_to_null() {
        let metrics = vec![
            ticker_metrics("A", "Consumer Electronics", None, None, None),
            ticker_metrics("B", "Consumer Electronics", None, None, None),
        ];
        let rows = aggregate_industries(&metrics, Utc::now());
        assert_eq!(rows[0].avg_pe_ratio, None);
        assert_eq!(rows[0].avg_revenue_growth, None);
        assert_eq!(rows[0].total_revenue, None);
    }

    #[test]
    fn test_industries_are_grouped_and_sorted() {
        let metrics = vec![
            ticker_metrics("A", "Software - Application", Some(30.0), None, None),
            ticker_metrics("B", "Banks - Diversified", Some(8.0), None, None),
            ticker_metrics("C", "Software - Application", Some(40.0), None, None),
        ];
        let rows = aggregate_industries(&metrics, Utc::now());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].industry, "Banks - Diversified");
        assert_eq!(rows[1].industry, "Software - Application");
        assert_eq!(rows[1].avg_pe_ratio, Some(35.0));
    }

    #[test]
    fn test_empty_input_produces_no_rows() {
        let rows = aggregate_industries(&[], Utc::now());
        assert!(rows.is_empty());
    }
}
