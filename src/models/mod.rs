use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Master ticker record, one row per symbol ever seen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    pub id: Option<i64>,
    pub symbol: String,
    pub company_name: Option<String>,
    pub industry: String,
    pub exchange: Option<String>,
}

/// Symbol catalog response from the exchange listing endpoint
#[derive(Debug, Deserialize)]
pub struct SymbolsResponse {
    #[serde(default)]
    pub symbols: Vec<SymbolEntry>,
}

/// One entry in the symbol catalog
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolEntry {
    pub symbol: String,
    #[serde(rename = "companyName")]
    pub company_name: Option<String>,
    pub industry: Option<String>,
    pub exchange: Option<String>,
}

/// Company profile response wrapper (`/general/{symbol}`)
#[derive(Debug, Deserialize)]
pub struct GeneralResponse {
    #[serde(default)]
    pub fundamentals: Option<ProfileFundamentals>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileFundamentals {
    #[serde(default)]
    pub profile: Option<ProfileBlock>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileBlock {
    #[serde(default)]
    pub data: Vec<CompanyProfile>,
}

/// Company profile fields used for the master record
#[derive(Debug, Clone, Deserialize)]
pub struct CompanyProfile {
    #[serde(rename = "companyName")]
    pub company_name: Option<String>,
    pub industry: Option<String>,
    pub exchange: Option<String>,
}

/// Financial statement response wrapper (`/financials/{symbol}/{statement}`)
#[derive(Debug, Deserialize)]
pub struct FinancialsResponse {
    #[serde(default)]
    pub fundamentals: Option<FinancialsFundamentals>,
}

#[derive(Debug, Deserialize)]
pub struct FinancialsFundamentals {
    #[serde(default)]
    pub financials: std::collections::HashMap<String, StatementBlock>,
}

#[derive(Debug, Deserialize)]
pub struct StatementBlock {
    #[serde(default)]
    pub data: Vec<StatementRow>,
}

/// One row of a financial statement. Income statement rows carry
/// revenue/net income/EPS, balance sheet rows carry debt/equity;
/// every field is optional because upstream data is frequently sparse.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatementRow {
    pub period: Option<String>,
    pub date: Option<String>,
    pub revenue: Option<f64>,
    #[serde(rename = "netIncome")]
    pub net_income: Option<f64>,
    pub eps: Option<f64>,
    #[serde(rename = "totalDebt")]
    pub total_debt: Option<f64>,
    #[serde(rename = "totalEquity")]
    pub total_equity: Option<f64>,
}

impl StatementRow {
    /// True for quarterly income statement rows ("Q1".."Q4")
    pub fn is_quarterly(&self) -> bool {
        self.period.as_deref().map_or(false, |p| p.starts_with('Q'))
    }

    /// True for full-year balance sheet rows ("FY")
    pub fn is_full_year(&self) -> bool {
        self.period.as_deref() == Some("FY")
    }
}

/// End-of-day price response wrapper (`/eod/{symbol}`)
#[derive(Debug, Deserialize)]
pub struct EodResponse {
    #[serde(default)]
    pub stockprice: Option<PriceBlock>,
}

#[derive(Debug, Deserialize)]
pub struct PriceBlock {
    #[serde(default)]
    pub data: Vec<PriceBar>,
}

/// One end-of-day price bar; the feed appends newest bars last
#[derive(Debug, Clone, Deserialize)]
pub struct PriceBar {
    pub date: Option<String>,
    pub close: Option<f64>,
}

/// Everything fetched for one ticker, parsed and ordered, ready for
/// metric calculation
#[derive(Debug, Clone)]
pub struct TickerRecord {
    pub symbol: String,
    pub industry: String,
    pub profile: Option<CompanyProfile>,
    /// Quarterly income rows, most recent first
    pub income_quarters: Vec<StatementRow>,
    /// Full-year balance sheet rows, most recent first
    pub balance_years: Vec<StatementRow>,
    pub latest_price: Option<f64>,
}

/// Per-ticker derived metrics; None means "not computable", never zero
#[derive(Debug, Clone, Serialize)]
pub struct TickerMetrics {
    pub symbol: String,
    pub industry: String,
    pub pe_ratio: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub net_income_ttm: Option<f64>,
    pub debt_ratio: Option<f64>,
    pub latest_revenue: Option<f64>,
    pub calculated_at: DateTime<Utc>,
}

/// Per-industry aggregate metrics
#[derive(Debug, Clone, Serialize)]
pub struct IndustryMetrics {
    pub industry: String,
    pub avg_pe_ratio: Option<f64>,
    pub avg_revenue_growth: Option<f64>,
    pub total_revenue: Option<f64>,
    pub calculated_at: DateTime<Utc>,
}

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub first_name: String,
    pub last_name: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub retry_status_codes: HashSet<u16>,
    pub speedboost_enabled: bool,
    pub speedboost_url: Option<String>,
    pub industries: HashSet<String>,
    pub fetch_workers: usize,
    pub compute_workers: usize,
    pub database_path: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Ok(Config {
            first_name: std::env::var("FIRST_NAME")
                .map_err(|_| anyhow::anyhow!("FIRST_NAME environment variable required"))?,
            last_name: std::env::var("LAST_NAME")
                .map_err(|_| anyhow::anyhow!("LAST_NAME environment variable required"))?,
            base_url: std::env::var("FIINDO_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.test.fiindo.com/api/v1".to_string()),
            timeout: parse_duration_secs(
                &std::env::var("FIINDO_API_TIMEOUT").unwrap_or_else(|_| "90".to_string()),
                90.0,
            ),
            max_retries: std::env::var("FIINDO_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            retry_backoff: parse_duration_secs(
                &std::env::var("FIINDO_RETRY_BACKOFF").unwrap_or_else(|_| "30".to_string()),
                30.0,
            ),
            retry_status_codes: parse_status_codes(
                &std::env::var("FIINDO_RETRY_STATUS_CODES")
                    .unwrap_or_else(|_| "429,500".to_string()),
            ),
            speedboost_enabled: parse_bool(
                &std::env::var("FIINDO_ENABLE_SPEEDBOOST").unwrap_or_else(|_| "false".to_string()),
            ),
            speedboost_url: std::env::var("FIINDO_SPEEDBOOST_URL").ok(),
            industries: parse_industries(
                &std::env::var("FIINDO_INDUSTRIES").unwrap_or_default(),
            ),
            fetch_workers: std::env::var("MAX_FETCH_WORKERS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            compute_workers: std::env::var("MAX_WORKERS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "fiindo.db".to_string()),
        })
    }

    /// Bearer token is derived from the account holder name pair
    pub fn bearer_token(&self) -> String {
        format!("{}.{}", self.first_name, self.last_name)
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}

// Duration::from_secs_f64 panics on negative or non-finite input, so
// anything a float parse accepts still has to pass these checks before
// it becomes a Duration.
fn parse_duration_secs(raw: &str, default_secs: f64) -> Duration {
    let secs = raw
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(default_secs);
    Duration::from_secs_f64(secs)
}

fn parse_status_codes(raw: &str) -> HashSet<u16> {
    let codes: HashSet<u16> = raw
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect();
    if codes.is_empty() {
        HashSet::from([429, 500])
    } else {
        codes
    }
}

fn parse_industries(raw: &str) -> HashSet<String> {
    let industries: HashSet<String> = raw
        .split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect();
    if industries.is_empty() {
        HashSet::from([
            "Banks - Diversified".to_string(),
            "Software - Application".to_string(),
            "Consumer Electronics".to_string(),
        ])
    } else {
        industries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_codes() {
        let codes = parse_status_codes("429, 500, 503");
        assert!(codes.contains(&429));
        assert!(codes.contains(&500));
        assert!(codes.contains(&503));
        assert_eq!(codes.len(), 3);
    }

    #[test]
    fn test_parse_status_codes_falls_back_on_garbage() {
        let codes = parse_status_codes("not,numbers");
        assert_eq!(codes, HashSet::from([429, 500]));
    }

    #[test]
    fn test_parse_duration_secs_accepts_plain_seconds() {
        assert_eq!(parse_duration_secs("90", 30.0), Duration::from_secs(90));
        assert_eq!(parse_duration_secs("1.5", 30.0), Duration::from_millis(1500));
        assert_eq!(parse_duration_secs("0", 30.0), Duration::from_secs(0));
    }

    #[test]
    fn test_parse_duration_secs_falls_back_on_bad_values() {
        // Negative and non-finite inputs would panic in from_secs_f64
        assert_eq!(parse_duration_secs("-1", 90.0), Duration::from_secs(90));
        assert_eq!(parse_duration_secs("inf", 90.0), Duration::from_secs(90));
        assert_eq!(parse_duration_secs("NaN", 30.0), Duration::from_secs(30));
        assert_eq!(parse_duration_secs("soon", 30.0), Duration::from_secs(30));
        assert_eq!(parse_duration_secs("", 30.0), Duration::from_secs(30));
    }

    #[test]
    fn test_parse_bool_variants() {
        assert!(parse_bool("true"));
        assert!(parse_bool("1"));
        assert!(parse_bool("YES"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
        assert!(!parse_bool("0"));
    }

    #[test]
    fn test_parse_industries_default() {
        let industries = parse_industries("");
        assert_eq!(industries.len(), 3);
        assert!(industries.contains("Banks - Diversified"));
    }

    #[test]
    fn test_parse_industries_custom() {
        let industries = parse_industries("Semiconductors, Software - Application");
        assert_eq!(industries.len(), 2);
        assert!(industries.contains("Semiconductors"));
    }

    #[test]
    fn test_statement_row_period_helpers() {
        let quarterly = StatementRow {
            period: Some("Q3".to_string()),
            date: Some("2024-09-30".to_string()),
            revenue: Some(100.0),
            net_income: Some(10.0),
            eps: Some(0.5),
            total_debt: None,
            total_equity: None,
        };
        assert!(quarterly.is_quarterly());
        assert!(!quarterly.is_full_year());

        let annual = StatementRow {
            period: Some("FY".to_string()),
            date: Some("2024-12-31".to_string()),
            revenue: None,
            net_income: None,
            eps: None,
            total_debt: Some(500.0),
            total_equity: Some(1000.0),
        };
        assert!(annual.is_full_year());
        assert!(!annual.is_quarterly());

        let missing = StatementRow {
            period: None,
            date: None,
            revenue: None,
            net_income: None,
            eps: None,
            total_debt: None,
            total_equity: None,
        };
        assert!(!missing.is_quarterly());
        assert!(!missing.is_full_year());
    }
}
