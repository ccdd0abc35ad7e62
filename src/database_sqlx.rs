use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, SqlitePool,
};
use tracing::info;

use crate::models::{CompanyProfile, IndustryMetrics, Ticker, TickerMetrics};

/// SQLX-based database manager for the ETL pipeline.
///
/// Owns five tables: the ticker master, the current-run snapshot and
/// append-only history for ticker stats, and the same pair for
/// industry stats.
#[derive(Clone)]
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// Open (or create) the database and make sure the schema exists
    pub async fn new(database_path: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(database_path)
                    .create_if_missing(true),
            )
            .await?;

        // WAL so the db-check binary can read while a run is writing
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tickers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT UNIQUE NOT NULL,
                company_name TEXT,
                industry TEXT NOT NULL,
                exchange TEXT,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ticker_stats (
                symbol TEXT PRIMARY KEY,
                industry TEXT NOT NULL,
                pe_ratio REAL,
                revenue_growth REAL,
                net_income_ttm REAL,
                debt_ratio REAL,
                latest_revenue REAL,
                calculated_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ticker_stats_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                industry TEXT NOT NULL,
                pe_ratio REAL,
                revenue_growth REAL,
                net_income_ttm REAL,
                debt_ratio REAL,
                latest_revenue REAL,
                calculated_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS industry_stats (
                industry TEXT PRIMARY KEY,
                avg_pe_ratio REAL,
                avg_revenue_growth REAL,
                total_revenue REAL,
                calculated_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS industry_stats_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                industry TEXT NOT NULL,
                avg_pe_ratio REAL,
                avg_revenue_growth REAL,
                total_revenue REAL,
                calculated_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_ticker_stats_history_symbol
             ON ticker_stats_history(symbol)",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Upsert a ticker into the master table, returning its id.
    ///
    /// Null company/exchange values never clobber known ones, so a
    /// sparse catalog entry cannot erase data from an earlier run.
    pub async fn upsert_ticker(&self, ticker: &Ticker) -> Result<i64> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO tickers (symbol, company_name, industry, exchange, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(symbol) DO UPDATE SET
                company_name = COALESCE(excluded.company_name, tickers.company_name),
                industry = excluded.industry,
                exchange = COALESCE(excluded.exchange, tickers.exchange),
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(&ticker.symbol)
        .bind(&ticker.company_name)
        .bind(&ticker.industry)
        .bind(&ticker.exchange)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(result.get::<i64, _>("id"))
    }

    /// Refresh master metadata from a fetched company profile
    pub async fn refresh_ticker_profile(
        &self,
        symbol: &str,
        profile: &CompanyProfile,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE tickers SET
                company_name = COALESCE(?, company_name),
                exchange = COALESCE(?, exchange),
                updated_at = ?
            WHERE symbol = ?
            "#,
        )
        .bind(&profile.company_name)
        .bind(&profile.exchange)
        .bind(Utc::now())
        .bind(symbol)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a ticker master record by symbol
    pub async fn get_ticker(&self, symbol: &str) -> Result<Option<Ticker>> {
        let row = sqlx::query(
            r#"
            SELECT id, symbol, company_name, industry, exchange
            FROM tickers
            WHERE symbol = ?
            "#,
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Ticker {
            id: Some(r.get::<i64, _>("id")),
            symbol: r.get::<String, _>("symbol"),
            company_name: r.get::<Option<String>, _>("company_name"),
            industry: r.get::<String, _>("industry"),
            exchange: r.get::<Option<String>, _>("exchange"),
        }))
    }

    /// Replace both snapshots and append to both histories in one
    /// transaction.
    ///
    /// Every row must resolve to a master ticker record and the run
    /// must be non-empty; otherwise nothing is written and the previous
    /// snapshot survives untouched.
    pub async fn commit_run(
        &self,
        ticker_stats: &[TickerMetrics],
        industry_stats: &[IndustryMetrics],
    ) -> Result<()> {
        if ticker_stats.is_empty() {
            anyhow::bail!("Refusing to commit an empty run over the existing snapshot");
        }

        let mut tx = self.pool.begin().await?;

        for stats in ticker_stats {
            let known = sqlx::query("SELECT id FROM tickers WHERE symbol = ?")
                .bind(&stats.symbol)
                .fetch_optional(&mut *tx)
                .await?;
            if known.is_none() {
                anyhow::bail!(
                    "No master record for {}; refusing to write its stats",
                    stats.symbol
                );
            }
        }

        sqlx::query("DELETE FROM ticker_stats").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM industry_stats").execute(&mut *tx).await?;

        for stats in ticker_stats {
            sqlx::query(
                r#"
                INSERT INTO ticker_stats
                    (symbol, industry, pe_ratio, revenue_growth, net_income_ttm,
                     debt_ratio, latest_revenue, calculated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&stats.symbol)
            .bind(&stats.industry)
            .bind(stats.pe_ratio)
            .bind(stats.revenue_growth)
            .bind(stats.net_income_ttm)
            .bind(stats.debt_ratio)
            .bind(stats.latest_revenue)
            .bind(stats.calculated_at)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO ticker_stats_history
                    (symbol, industry, pe_ratio, revenue_growth, net_income_ttm,
                     debt_ratio, latest_revenue, calculated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&stats.symbol)
            .bind(&stats.industry)
            .bind(stats.pe_ratio)
            .bind(stats.revenue_growth)
            .bind(stats.net_income_ttm)
            .bind(stats.debt_ratio)
            .bind(stats.latest_revenue)
            .bind(stats.calculated_at)
            .execute(&mut *tx)
            .await?;
        }

        for stats in industry_stats {
            sqlx::query(
                r#"
                INSERT INTO industry_stats
                    (industry, avg_pe_ratio, avg_revenue_growth, total_revenue, calculated_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&stats.industry)
            .bind(stats.avg_pe_ratio)
            .bind(stats.avg_revenue_growth)
            .bind(stats.total_revenue)
            .bind(stats.calculated_at)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO industry_stats_history
                    (industry, avg_pe_ratio, avg_revenue_growth, total_revenue, calculated_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&stats.industry)
            .bind(stats.avg_pe_ratio)
            .bind(stats.avg_revenue_growth)
            .bind(stats.total_revenue)
            .bind(stats.calculated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            "💾 Committed {} ticker and {} industry stat rows",
            ticker_stats.len(),
            industry_stats.len()
        );
        Ok(())
    }

    /// Current ticker stats snapshot, ordered by symbol
    pub async fn get_ticker_stats(&self) -> Result<Vec<TickerMetrics>> {
        let rows = sqlx::query(
            r#"
            SELECT symbol, industry, pe_ratio, revenue_growth, net_income_ttm,
                   debt_ratio, latest_revenue, calculated_at
            FROM ticker_stats
            ORDER BY symbol
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| ticker_metrics_from_row(&r)).collect())
    }

    /// Current industry stats snapshot, ordered by industry
    pub async fn get_industry_stats(&self) -> Result<Vec<IndustryMetrics>> {
        let rows = sqlx::query(
            r#"
            SELECT industry, avg_pe_ratio, avg_revenue_growth, total_revenue, calculated_at
            FROM industry_stats
            ORDER BY industry
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| IndustryMetrics {
                industry: r.get::<String, _>("industry"),
                avg_pe_ratio: r.get::<Option<f64>, _>("avg_pe_ratio"),
                avg_revenue_growth: r.get::<Option<f64>, _>("avg_revenue_growth"),
                total_revenue: r.get::<Option<f64>, _>("total_revenue"),
                calculated_at: r.get::<DateTime<Utc>, _>("calculated_at"),
            })
            .collect())
    }

    /// Full stats history for one symbol, oldest run first
    pub async fn get_ticker_history(&self, symbol: &str) -> Result<Vec<TickerMetrics>> {
        let rows = sqlx::query(
            r#"
            SELECT symbol, industry, pe_ratio, revenue_growth, net_income_ttm,
                   debt_ratio, latest_revenue, calculated_at
            FROM ticker_stats_history
            WHERE symbol = ?
            ORDER BY id
            "#,
        )
        .bind(symbol)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| ticker_metrics_from_row(&r)).collect())
    }

    /// Master symbols that have no row in the current snapshot
    pub async fn get_symbols_without_stats(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT t.symbol
            FROM tickers t
            LEFT JOIN ticker_stats s ON s.symbol = t.symbol
            WHERE s.symbol IS NULL
            ORDER BY t.symbol
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| r.get::<String, _>("symbol"))
            .collect())
    }

    /// Timestamp of the most recent committed run, if any
    pub async fn latest_run_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT MAX(calculated_at) AS latest FROM ticker_stats")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get::<Option<DateTime<Utc>>, _>("latest"))
    }

    /// Row count for one of the pipeline's tables
    pub async fn count_rows(&self, table: &str) -> Result<i64> {
        const TABLES: [&str; 5] = [
            "tickers",
            "ticker_stats",
            "ticker_stats_history",
            "industry_stats",
            "industry_stats_history",
        ];
        if !TABLES.contains(&table) {
            anyhow::bail!("Unknown table: {}", table);
        }

        let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", table))
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n"))
    }
}

fn ticker_metrics_from_row(r: &sqlx::sqlite::SqliteRow) -> TickerMetrics {
    TickerMetrics {
        symbol: r.get::<String, _>("symbol"),
        industry: r.get::<String, _>("industry"),
        pe_ratio: r.get::<Option<f64>, _>("pe_ratio"),
        revenue_growth: r.get::<Option<f64>, _>("revenue_growth"),
        net_income_ttm: r.get::<Option<f64>, _>("net_income_ttm"),
        debt_ratio: r.get::<Option<f64>, _>("debt_ratio"),
        latest_revenue: r.get::<Option<f64>, _>("latest_revenue"),
        calculated_at: r.get::<DateTime<Utc>, _>("calculated_at"),
    }
}
