use crate::models::{CompanyProfile, StatementRow, SymbolEntry};

pub mod fiindo_client;
pub use fiindo_client::FiindoClient;

/// Financial statement kinds served by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    IncomeStatement,
    BalanceSheet,
}

impl StatementKind {
    /// Path segment and payload key used by the API
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::IncomeStatement => "income_statement",
            StatementKind::BalanceSheet => "balance_sheet_statement",
        }
    }
}

/// Errors surfaced by the remote market data API.
///
/// `RetryExhausted` and `Status` are scoped to a single ticker and let
/// the pipeline drop that ticker while the run continues; `Unauthorized`
/// means the credentials are bad and every subsequent call would fail
/// the same way, so callers treat it as fatal.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: String },

    #[error("unexpected status {status}")]
    Status { status: u16 },

    #[error("authentication rejected (status {status})")]
    Unauthorized { status: u16 },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// True when the failure means credentials are bad for every call
    pub fn is_fatal(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}

/// Common trait for market data providers
#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Full exchange symbol catalog
    async fn get_symbols(&self) -> Result<Vec<SymbolEntry>, ApiError>;

    /// Company profile, or None when the provider has no record
    async fn get_profile(&self, symbol: &str) -> Result<Option<CompanyProfile>, ApiError>;

    /// Statement rows as served, most recent first
    async fn get_financials(
        &self,
        symbol: &str,
        kind: StatementKind,
    ) -> Result<Vec<StatementRow>, ApiError>;

    /// Most recent end-of-day closing price, if the feed has one
    async fn get_latest_price(&self, symbol: &str) -> Result<Option<f64>, ApiError>;

    /// Ask the provider to lift its rate cap for this session.
    /// Providers without the knob keep the no-op default.
    async fn enable_speedboost(&self) -> Result<(), ApiError> {
        Ok(())
    }
}
