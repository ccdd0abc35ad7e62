//! Concurrent ticker detail fetching
//!
//! Pulls profile, income statement, balance sheet, and end-of-day price
//! for every ticker in the working set using a bounded pool of workers.
//! A failure on any of the four calls drops that ticker from the run;
//! an authentication rejection aborts the whole run.

use std::fmt;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, MarketDataProvider, StatementKind};
use crate::models::{Config, StatementRow, Ticker, TickerRecord};

/// Which of the four per-ticker calls failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    Profile,
    IncomeStatement,
    BalanceSheet,
    EndOfDay,
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FetchStage::Profile => "profile",
            FetchStage::IncomeStatement => "income statement",
            FetchStage::BalanceSheet => "balance sheet",
            FetchStage::EndOfDay => "end-of-day price",
        };
        write!(f, "{}", name)
    }
}

/// One dropped ticker and the stage that sank it
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub symbol: String,
    pub stage: FetchStage,
    pub error: String,
}

/// Result of the detail fetch phase
#[derive(Debug)]
pub struct FetchOutcome {
    pub records: Vec<TickerRecord>,
    pub failures: Vec<FetchFailure>,
}

/// Fetch details for the whole working set concurrently.
///
/// All workers drain one shared queue; the function returns only after
/// every worker has finished, so callers see the complete outcome of
/// the phase before metric calculation starts.
pub async fn fetch_details(
    provider: Arc<dyn MarketDataProvider>,
    working_set: Vec<Ticker>,
    config: &Config,
) -> Result<FetchOutcome> {
    let total = working_set.len();
    let workers = config.fetch_workers.max(1);
    info!(
        "🚀 Starting detail fetch with {} workers for {} tickers",
        workers, total
    );

    let queue = Arc::new(Mutex::new(working_set));
    let records: Arc<Mutex<Vec<TickerRecord>>> = Arc::new(Mutex::new(Vec::new()));
    let failures: Arc<Mutex<Vec<FetchFailure>>> = Arc::new(Mutex::new(Vec::new()));
    let fatal: Arc<Mutex<Option<ApiError>>> = Arc::new(Mutex::new(None));

    let mut handles = Vec::new();
    for worker_id in 0..workers {
        let queue = Arc::clone(&queue);
        let records = Arc::clone(&records);
        let failures = Arc::clone(&failures);
        let fatal = Arc::clone(&fatal);
        let provider = Arc::clone(&provider);

        handles.push(tokio::spawn(async move {
            loop {
                if fatal.lock().unwrap().is_some() {
                    break;
                }
                let ticker = {
                    let mut queue = queue.lock().unwrap();
                    if queue.is_empty() {
                        break;
                    }
                    queue.remove(0)
                };

                match fetch_one(provider.as_ref(), &ticker).await {
                    Ok(record) => {
                        debug!("✅ Worker {}: fetched {}", worker_id, record.symbol);
                        records.lock().unwrap().push(record);
                    }
                    Err((stage, e)) if e.is_fatal() => {
                        error!(
                            "❌ Worker {}: {} rejected on {} fetch: {}",
                            worker_id, ticker.symbol, stage, e
                        );
                        *fatal.lock().unwrap() = Some(e);
                        break;
                    }
                    Err((stage, e)) => {
                        warn!(
                            "❌ Worker {}: dropping {} ({} fetch failed: {})",
                            worker_id, ticker.symbol, stage, e
                        );
                        failures.lock().unwrap().push(FetchFailure {
                            symbol: ticker.symbol.clone(),
                            stage,
                            error: e.to_string(),
                        });
                    }
                }
            }
        }));
    }

    // Wait for all workers to complete
    for handle in handles {
        handle.await?;
    }

    if let Some(e) = fatal.lock().unwrap().take() {
        return Err(anyhow!("Aborting run: {}", e));
    }

    let mut records = std::mem::take(&mut *records.lock().unwrap());
    let mut failures = std::mem::take(&mut *failures.lock().unwrap());
    records.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    failures.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    info!(
        "✅ Detail fetch completed: {} fetched, {} dropped",
        records.len(),
        failures.len()
    );

    Ok(FetchOutcome { records, failures })
}

/// Fetch the four payloads for one ticker, in order, stopping at the
/// first failure
async fn fetch_one(
    provider: &dyn MarketDataProvider,
    ticker: &Ticker,
) -> Result<TickerRecord, (FetchStage, ApiError)> {
    let profile = provider
        .get_profile(&ticker.symbol)
        .await
        .map_err(|e| (FetchStage::Profile, e))?;
    let income = provider
        .get_financials(&ticker.symbol, StatementKind::IncomeStatement)
        .await
        .map_err(|e| (FetchStage::IncomeStatement, e))?;
    let balance = provider
        .get_financials(&ticker.symbol, StatementKind::BalanceSheet)
        .await
        .map_err(|e| (FetchStage::BalanceSheet, e))?;
    let latest_price = provider
        .get_latest_price(&ticker.symbol)
        .await
        .map_err(|e| (FetchStage::EndOfDay, e))?;

    let mut income_quarters: Vec<StatementRow> =
        income.into_iter().filter(|r| r.is_quarterly()).collect();
    income_quarters.sort_by(|a, b| b.date.cmp(&a.date));

    let mut balance_years: Vec<StatementRow> =
        balance.into_iter().filter(|r| r.is_full_year()).collect();
    balance_years.sort_by(|a, b| b.date.cmp(&a.date));

    Ok(TickerRecord {
        symbol: ticker.symbol.clone(),
        industry: ticker.industry.clone(),
        profile,
        income_quarters,
        balance_years,
        latest_price,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompanyProfile, SymbolEntry};
    use std::collections::HashSet;
    use std::time::Duration;

    struct MockProvider {
        fail_income_for: HashSet<String>,
        unauthorized: bool,
    }

    #[async_trait::async_trait]
    impl MarketDataProvider for MockProvider {
        async fn get_symbols(&self) -> Result<Vec<SymbolEntry>, ApiError> {
            Ok(Vec::new())
        }

        async fn get_profile(&self, _symbol: &str) -> Result<Option<CompanyProfile>, ApiError> {
            if self.unauthorized {
                return Err(ApiError::Unauthorized { status: 401 });
            }
            Ok(Some(CompanyProfile {
                company_name: Some("Mock Corp".to_string()),
                industry: Some("Consumer Electronics".to_string()),
                exchange: Some("NASDAQ".to_string()),
            }))
        }

        async fn get_financials(
            &self,
            symbol: &str,
            kind: StatementKind,
        ) -> Result<Vec<StatementRow>, ApiError> {
            if kind == StatementKind::IncomeStatement && self.fail_income_for.contains(symbol) {
                return Err(ApiError::Status { status: 404 });
            }
            Ok(vec![
                StatementRow {
                    period: Some("FY".to_string()),
                    date: Some("2023-12-31".to_string()),
                    revenue: None,
                    net_income: None,
                    eps: None,
                    total_debt: Some(50.0),
                    total_equity: Some(100.0),
                },
                StatementRow {
                    period: Some("Q1".to_string()),
                    date: Some("2024-03-31".to_string()),
                    revenue: Some(100.0),
                    net_income: Some(10.0),
                    eps: Some(1.0),
                    total_debt: None,
                    total_equity: None,
                },
                StatementRow {
                    period: Some("Q4".to_string()),
                    date: Some("2023-12-31".to_string()),
                    revenue: Some(90.0),
                    net_income: Some(9.0),
                    eps: Some(0.9),
                    total_debt: None,
                    total_equity: None,
                },
            ])
        }

        async fn get_latest_price(&self, _symbol: &str) -> Result<Option<f64>, ApiError> {
            Ok(Some(42.0))
        }
    }

    fn ticker(symbol: &str) -> Ticker {
        Ticker {
            id: Some(1),
            symbol: symbol.to_string(),
            company_name: None,
            industry: "Consumer Electronics".to_string(),
            exchange: None,
        }
    }

    fn test_config() -> Config {
        Config {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            base_url: "http://localhost:9".to_string(),
            timeout: Duration::from_secs(5),
            max_retries: 0,
            retry_backoff: Duration::from_millis(1),
            retry_status_codes: HashSet::from([429, 500]),
            speedboost_enabled: false,
            speedboost_url: None,
            industries: HashSet::new(),
            fetch_workers: 3,
            compute_workers: 2,
            database_path: ":memory:".to_string(),
        }
    }

    #[tokio::test]
    async fn test_failed_ticker_is_dropped_without_sinking_the_run() {
        let provider = Arc::new(MockProvider {
            fail_income_for: HashSet::from(["BAD".to_string()]),
            unauthorized: false,
        });
        let working_set = vec![ticker("AAA"), ticker("BAD"), ticker("ZZZ")];

        let outcome = fetch_details(provider, working_set, &test_config())
            .await
            .unwrap();

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].symbol, "AAA");
        assert_eq!(outcome.records[1].symbol, "ZZZ");
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].symbol, "BAD");
        assert_eq!(outcome.failures[0].stage, FetchStage::IncomeStatement);
    }

    #[tokio::test]
    async fn test_auth_rejection_aborts_the_run() {
        let provider = Arc::new(MockProvider {
            fail_income_for: HashSet::new(),
            unauthorized: true,
        });
        let working_set = vec![ticker("AAA"), ticker("BBB")];

        let result = fetch_details(provider, working_set, &test_config()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_statement_rows_are_split_and_ordered() {
        let provider = Arc::new(MockProvider {
            fail_income_for: HashSet::new(),
            unauthorized: false,
        });

        let outcome = fetch_details(provider, vec![ticker("AAA")], &test_config())
            .await
            .unwrap();

        let record = &outcome.records[0];
        // FY row filtered out of income, quarters sorted newest first
        assert_eq!(record.income_quarters.len(), 2);
        assert_eq!(record.income_quarters[0].date.as_deref(), Some("2024-03-31"));
        assert_eq!(record.income_quarters[1].date.as_deref(), Some("2023-12-31"));
        assert_eq!(record.balance_years.len(), 1);
        assert_eq!(record.latest_price, Some(42.0));
    }
}
