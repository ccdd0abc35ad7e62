use anyhow::Result;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::models::{
    CompanyProfile, Config, EodResponse, FinancialsResponse, GeneralResponse, StatementRow,
    SymbolEntry, SymbolsResponse,
};

use super::{ApiError, MarketDataProvider, StatementKind};

/// Fiindo market data API client.
///
/// Every GET goes through one retry core: configured status codes and
/// transport timeouts/connection failures are retried with a fixed
/// backoff, auth rejections and other statuses fail immediately.
pub struct FiindoClient {
    client: Client,
    base_url: String,
    config: Config,
}

impl FiindoClient {
    /// Create a new Fiindo client
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent("fiindo-etl/1.0")
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            config: config.clone(),
        })
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.config.bearer_token())
    }

    fn classify(&self, error: reqwest::Error) -> ApiError {
        if error.is_timeout() {
            ApiError::Timeout(self.config.timeout)
        } else {
            ApiError::Transport(error.to_string())
        }
    }

    /// GET a JSON payload with the client-wide retry policy.
    ///
    /// Total attempts = max_retries + 1. A retryable attempt sleeps the
    /// fixed backoff before the next one; the final failure is wrapped
    /// in `RetryExhausted` with the attempt count.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let attempts = self.config.max_retries + 1;
        let mut last_error: Option<ApiError> = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                debug!("⏳ Retrying {} (attempt {}/{})", path, attempt, attempts);
                tokio::time::sleep(self.config.retry_backoff).await;
            }

            match self
                .client
                .get(&url)
                .header("Authorization", self.auth_header())
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<T>()
                            .await
                            .map_err(|e| ApiError::Decode(e.to_string()));
                    }

                    let code = status.as_u16();
                    if code == 401 || code == 403 {
                        return Err(ApiError::Unauthorized { status: code });
                    }
                    if self.config.retry_status_codes.contains(&code) {
                        warn!(
                            "⚠️ {} returned status {} (attempt {}/{})",
                            path, code, attempt, attempts
                        );
                        last_error = Some(ApiError::Status { status: code });
                        continue;
                    }
                    return Err(ApiError::Status { status: code });
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    warn!("⚠️ {} failed: {} (attempt {}/{})", path, e, attempt, attempts);
                    last_error = Some(self.classify(e));
                    continue;
                }
                Err(e) => return Err(ApiError::Transport(e.to_string())),
            }
        }

        Err(ApiError::RetryExhausted {
            attempts,
            last: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string()),
        })
    }

    /// Raw diagnostic payload for a symbol, passed through unparsed
    pub async fn get_debug(&self, symbol: &str) -> Result<serde_json::Value, ApiError> {
        self.get_json(&format!("/debug/{}", symbol)).await
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for FiindoClient {
    async fn get_symbols(&self) -> Result<Vec<SymbolEntry>, ApiError> {
        let response: SymbolsResponse = self.get_json("/symbols").await?;
        Ok(response.symbols)
    }

    async fn get_profile(&self, symbol: &str) -> Result<Option<CompanyProfile>, ApiError> {
        let response: GeneralResponse = self.get_json(&format!("/general/{}", symbol)).await?;
        Ok(response
            .fundamentals
            .and_then(|f| f.profile)
            .and_then(|block| block.data.into_iter().next()))
    }

    async fn get_financials(
        &self,
        symbol: &str,
        kind: StatementKind,
    ) -> Result<Vec<StatementRow>, ApiError> {
        let path = format!("/financials/{}/{}", symbol, kind.as_str());
        let response: FinancialsResponse = self.get_json(&path).await?;
        Ok(response
            .fundamentals
            .and_then(|mut f| f.financials.remove(kind.as_str()))
            .map(|block| block.data)
            .unwrap_or_default())
    }

    async fn get_latest_price(&self, symbol: &str) -> Result<Option<f64>, ApiError> {
        let response: EodResponse = self.get_json(&format!("/eod/{}", symbol)).await?;
        Ok(response
            .stockprice
            .and_then(|block| block.data.last().and_then(|bar| bar.close)))
    }

    /// Ask the API to lift the sandbox rate cap for this account.
    ///
    /// Single attempt, no retries. Callers treat failure as advisory:
    /// a rejected boost only means the run goes at the default rate.
    async fn enable_speedboost(&self) -> Result<(), ApiError> {
        let url = self
            .config
            .speedboost_url
            .clone()
            .unwrap_or_else(|| format!("{}/speedboost", self.base_url));
        let body = serde_json::json!({
            "first_name": self.config.first_name,
            "last_name": self.config.last_name,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if status.is_success() {
            info!("🚀 Speedboost enabled");
            Ok(())
        } else if status.as_u16() == 401 || status.as_u16() == 403 {
            Err(ApiError::Unauthorized {
                status: status.as_u16(),
            })
        } else {
            Err(ApiError::Status {
                status: status.as_u16(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    fn test_config(base_url: &str) -> Config {
        Config {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            base_url: base_url.to_string(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
            retry_backoff: Duration::from_millis(1),
            retry_status_codes: HashSet::from([429, 500]),
            speedboost_enabled: false,
            speedboost_url: None,
            industries: HashSet::new(),
            fetch_workers: 5,
            compute_workers: 3,
            database_path: ":memory:".to_string(),
        }
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = FiindoClient::new(&test_config("http://localhost:9/api/v1/")).unwrap();
        assert_eq!(client.base_url, "http://localhost:9/api/v1");
    }

    #[test]
    fn test_auth_header_joins_names_with_dot() {
        let client = FiindoClient::new(&test_config("http://localhost:9")).unwrap();
        assert_eq!(client.auth_header(), "Bearer Ada.Lovelace");
    }
}
